use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{OutputMode, OutputType};

use super::ui::info;

/// Timing of one completed iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct IterationRecord {
    pub iteration: u64,
    pub memory_cost: u32,
    pub batch_size: u32,
    pub samples_ns: Vec<u64>,
    pub mean_ns: f64,
    pub hps: f64,
}

impl IterationRecord {
    pub(crate) fn new(
        iteration: u64,
        memory_cost: u32,
        batch_size: u32,
        samples: &[Duration],
    ) -> Self {
        let samples_ns: Vec<u64> = samples
            .iter()
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .collect();
        let values: Vec<f64> = samples_ns.iter().map(|&ns| ns as f64).collect();
        let mean_ns = mean(&values);
        let hps = if mean_ns > 0.0 {
            f64::from(batch_size) * 1e9 / mean_ns
        } else {
            0.0
        };

        Self {
            iteration,
            memory_cost,
            batch_size,
            samples_ns,
            mean_ns,
            hps,
        }
    }

    /// Sample values in the unit selected by `output_type`.
    fn values(&self, output_type: OutputType) -> Vec<f64> {
        let divisor = match output_type {
            OutputType::Ns => 1.0,
            OutputType::NsPerHash => f64::from(self.batch_size.max(1)),
        };
        self.samples_ns
            .iter()
            .map(|&ns| ns as f64 / divisor)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StopReason {
    Shutdown,
    IterationCap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RunReport {
    pub backend: String,
    pub device_index: usize,
    pub iterations: u64,
    pub skipped: u64,
    pub final_difficulty: u32,
    pub stop_reason: StopReason,
    pub mean_ns_per_hash: f64,
    pub median_hps: f64,
    pub runs: Vec<IterationRecord>,
}

/// Formats one iteration's timing as stdout lines for the chosen output mode.
pub(crate) fn render_iteration(
    record: &IterationRecord,
    output_mode: OutputMode,
    output_type: OutputType,
) -> Vec<String> {
    let values = record.values(output_type);
    let mean_value = mean(&values);
    let unit = unit_label(output_type);

    match output_mode {
        OutputMode::Raw => values.iter().map(|v| format!("{v:.0}")).collect(),
        OutputMode::Mean => vec![format!("{mean_value:.0}")],
        OutputMode::MeanAndMdev => {
            vec![format!("{mean_value:.0}\t{:.0}", mean_deviation(&values))]
        }
        OutputMode::Verbose => {
            let mut lines = Vec::with_capacity(values.len() + 3);
            lines.push(format!(
                "[iter {}] memory_cost={} KiB batch={}",
                record.iteration, record.memory_cost, record.batch_size
            ));
            for (idx, value) in values.iter().enumerate() {
                lines.push(format!("  sample {}: {value:.0} {unit}", idx + 1));
            }
            lines.push(format!(
                "  mean: {mean_value:.0} {unit} | mdev: {:.0} {unit} | {}",
                mean_deviation(&values),
                format_hashrate(record.hps)
            ));
            lines
        }
    }
}

pub(crate) fn build_report(
    backend: &str,
    device_index: usize,
    iterations: u64,
    skipped: u64,
    final_difficulty: u32,
    stop_reason: StopReason,
    runs: Vec<IterationRecord>,
) -> RunReport {
    let per_hash: Vec<f64> = runs
        .iter()
        .flat_map(|run| run.values(OutputType::NsPerHash))
        .collect();
    let mut sorted_hps: Vec<f64> = runs.iter().map(|run| run.hps).collect();
    sorted_hps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    RunReport {
        backend: backend.to_string(),
        device_index,
        iterations,
        skipped,
        final_difficulty,
        stop_reason,
        mean_ns_per_hash: mean(&per_hash),
        median_hps: median(&sorted_hps),
        runs,
    }
}

pub(crate) fn summarize(report: &RunReport, output: Option<&Path>) -> Result<()> {
    info(
        "SUMMARY",
        format!(
            "iterations={} completed={} skipped={} final_difficulty={} stop={:?} mean={:.0} ns/hash median={}",
            report.iterations,
            report.runs.len(),
            report.skipped,
            report.final_difficulty,
            report.stop_reason,
            report.mean_ns_per_hash,
            format_hashrate(report.median_hps),
        ),
    );

    if let Some(path) = output {
        let json =
            serde_json::to_string_pretty(report).context("failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write run report {}", path.display()))?;
        info("SUMMARY", format!("wrote report to {}", path.display()));
    }
    Ok(())
}

fn unit_label(output_type: OutputType) -> &'static str {
    match output_type {
        OutputType::Ns => "ns",
        OutputType::NsPerHash => "ns/hash",
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean absolute deviation from the mean.
fn mean_deviation(values: &[f64]) -> f64 {
    let center = mean(values);
    mean(&values.iter().map(|v| (v - center).abs()).collect::<Vec<_>>())
}

fn median(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn format_hashrate(hps: f64) -> String {
    if hps >= 1_000_000.0 {
        return format!("{:.3} MH/s", hps / 1_000_000.0);
    }
    if hps >= 1_000.0 {
        return format!("{:.3} KH/s", hps / 1_000.0);
    }
    format!("{hps:.3} H/s")
}
