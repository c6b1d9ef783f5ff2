use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::backend::{
    DeviceExecutive, DeviceInfo, ExecutiveError, MemoryProbe, WorkloadDescriptor,
};

const BACKEND_NAME: &str = "cuda";
const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
struct NvidiaDeviceInfo {
    index: usize,
    name: String,
    memory_total_mib: u64,
    memory_free_mib: Option<u64>,
}

/// CUDA devices as reported by the NVIDIA driver through `nvidia-smi`.
/// Argon2 kernels are not part of this build, so workloads are refused.
pub struct CudaExecutive {
    query: fn() -> Result<String>,
}

impl CudaExecutive {
    pub fn new() -> Self {
        Self {
            query: query_device_table,
        }
    }

    fn devices(&self) -> Result<Vec<NvidiaDeviceInfo>, ExecutiveError> {
        let raw = (self.query)().map_err(|err| unavailable(format!("{err:#}")))?;
        let devices =
            parse_device_table(&raw).map_err(|err| unavailable(format!("{err:#}")))?;
        if devices.is_empty() {
            return Err(unavailable("nvidia-smi reported no NVIDIA devices"));
        }
        Ok(devices)
    }
}

impl DeviceExecutive for CudaExecutive {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, ExecutiveError> {
        Ok(self
            .devices()?
            .into_iter()
            .map(|device| DeviceInfo {
                index: device.index,
                name: device.name,
                total_bytes: device.memory_total_mib.saturating_mul(MIB),
            })
            .collect())
    }

    fn probe_memory(&self, device_index: usize) -> Result<MemoryProbe, ExecutiveError> {
        let devices = self.devices()?;
        let device = devices
            .iter()
            .find(|device| device.index == device_index)
            .ok_or_else(|| {
                unavailable(format!(
                    "invalid device index {device_index} ({} device(s) present)",
                    devices.len()
                ))
            })?;

        let total_bytes = device.memory_total_mib.saturating_mul(MIB);
        // Older drivers omit memory.free; fall back to the global size.
        let free_bytes = device
            .memory_free_mib
            .map_or(total_bytes, |free| free.saturating_mul(MIB).min(total_bytes));

        Ok(MemoryProbe {
            free_bytes,
            total_bytes,
        })
    }

    fn run(&mut self, workload: &WorkloadDescriptor) -> Result<Vec<Duration>, ExecutiveError> {
        Err(unavailable(format!(
            "argonbench is not built with CUDA kernels ({} kernel, precompute_refs={}, device {})",
            workload.kernel_type, workload.precompute_refs, workload.device_index
        )))
    }
}

fn unavailable(reason: impl Into<String>) -> ExecutiveError {
    ExecutiveError::unavailable(BACKEND_NAME, reason)
}

const QUERY_FIELDS: &str = "index,name,memory.total,memory.free";

fn query_device_table() -> Result<String> {
    let output = Command::new("nvidia-smi")
        .arg(format!("--query-gpu={QUERY_FIELDS}"))
        .arg("--format=csv,noheader,nounits")
        .output()
        .context("nvidia-smi could not be started; is the NVIDIA driver installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        match stderr.trim() {
            "" => bail!("nvidia-smi exited with {}", output.status),
            detail => bail!("nvidia-smi exited with {}: {detail}", output.status),
        }
    }

    String::from_utf8(output.stdout).context("nvidia-smi printed non-UTF-8 output")
}

/// One device per non-blank CSV row of `index, name, total MiB[, free MiB]`.
fn parse_device_table(raw: &str) -> Result<Vec<NvidiaDeviceInfo>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(row, line)| {
            parse_device_row(line)
                .with_context(|| format!("nvidia-smi row {}: '{}'", row + 1, line.trim()))
        })
        .collect()
}

fn parse_device_row(line: &str) -> Result<NvidiaDeviceInfo> {
    let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
    let Some((index, rest)) = fields.split_first() else {
        bail!("empty row");
    };
    let index = index
        .parse::<usize>()
        .with_context(|| format!("device index '{index}' is not a number"))?;

    // Names may contain commas, so memory columns are counted from the end.
    let (name, total, free) = match rest {
        [name @ .., total, free] if !name.is_empty() => (name.join(","), *total, Some(*free)),
        [name, total] => ((*name).to_string(), *total, None),
        _ => bail!("expected index, name and memory columns"),
    };
    if name.is_empty() {
        bail!("device name is missing");
    }

    Ok(NvidiaDeviceInfo {
        index,
        name,
        memory_total_mib: parse_mib(total, "memory.total")?,
        memory_free_mib: free.map(|free| parse_mib(free, "memory.free")).transpose()?,
    })
}

fn parse_mib(value: &str, field: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .with_context(|| format!("{field} value '{value}' is not a MiB count"))
}
