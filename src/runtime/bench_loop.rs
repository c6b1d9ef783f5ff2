use std::time::Duration;

use argonbench_params::{BENCH_ITERATIONS, BENCH_PARALLELISM};
use thiserror::Error;

use crate::backend::{DeviceExecutive, ExecutiveError, WorkloadDescriptor};
use crate::config::{Config, KernelType, OutputMode, OutputType};

use super::report::{render_iteration, IterationRecord, StopReason};
use super::sizing::{resolve_batch_size, SizingError};
use super::ui::{error, info};
use super::RuntimeContext;

#[derive(Debug, Clone)]
pub(crate) struct LoopSettings {
    pub device_index: usize,
    /// Zero sizes each batch from the memory probe.
    pub batch_size: u32,
    pub samples: u32,
    pub kernel_type: KernelType,
    pub precompute_refs: bool,
    pub output_mode: OutputMode,
    pub output_type: OutputType,
    pub max_iterations: u64,
    pub skip_delay: Duration,
}

impl LoopSettings {
    pub(crate) fn from_config(cfg: &Config) -> Self {
        Self {
            device_index: cfg.device_index,
            batch_size: cfg.batch_size,
            samples: cfg.samples,
            kernel_type: cfg.kernel_type,
            precompute_refs: cfg.precompute_refs,
            output_mode: cfg.output_mode,
            output_type: cfg.output_type,
            max_iterations: cfg.max_iterations,
            skip_delay: cfg.skip_delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopState {
    Running,
    /// Shutdown was requested while an iteration was in flight.
    Draining,
    Stopped,
}

/// Why an iteration produced no timing.
#[derive(Debug, Error)]
enum SkipReason {
    #[error("batch sizing failed: {0}")]
    Sizing(#[from] SizingError),
    #[error(transparent)]
    Executive(#[from] ExecutiveError),
}

#[derive(Debug)]
pub(crate) struct LoopOutcome {
    pub iterations: u64,
    pub skipped: u64,
    pub stop_reason: StopReason,
    pub completed: Vec<IterationRecord>,
}

pub(crate) struct BenchmarkLoop<'a> {
    ctx: &'a RuntimeContext,
    executive: &'a mut dyn DeviceExecutive,
    settings: LoopSettings,
    state: LoopState,
    emit: Box<dyn FnMut(&str) + 'a>,
}

impl<'a> BenchmarkLoop<'a> {
    pub(crate) fn new(
        ctx: &'a RuntimeContext,
        executive: &'a mut dyn DeviceExecutive,
        settings: LoopSettings,
    ) -> Self {
        Self {
            ctx,
            executive,
            settings,
            state: LoopState::Running,
            emit: Box::new(|line| println!("{line}")),
        }
    }

    #[cfg(test)]
    fn with_output(mut self, emit: impl FnMut(&str) + 'a) -> Self {
        self.emit = Box::new(emit);
        self
    }

    #[cfg(test)]
    fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until shutdown is observed at an iteration boundary or the
    /// iteration ceiling is reached. The loop cannot be restarted.
    pub(crate) fn run(&mut self) -> LoopOutcome {
        let mut outcome = LoopOutcome {
            iterations: 0,
            skipped: 0,
            stop_reason: StopReason::IterationCap,
            completed: Vec::new(),
        };
        if self.state == LoopState::Stopped {
            return outcome;
        }

        while outcome.iterations < self.settings.max_iterations {
            if self.ctx.shutdown().is_requested() {
                break;
            }

            outcome.iterations += 1;
            match self.run_iteration(outcome.iterations) {
                Ok(record) => outcome.completed.push(record),
                Err(reason) => {
                    outcome.skipped += 1;
                    error(
                        "LOOP",
                        format!("iteration {} skipped: {reason}", outcome.iterations),
                    );
                    self.ctx.sleep_unless_shutdown(self.settings.skip_delay);
                }
            }

            if self.ctx.shutdown().is_requested() && self.state == LoopState::Running {
                self.state = LoopState::Draining;
                info("SHUTDOWN", "interrupt received; stopping after current iteration");
            }
        }

        // An interrupt during the final iteration still owes its adjustment.
        if self.ctx.shutdown().is_requested() {
            self.ctx.apply_shutdown_adjustment();
            outcome.stop_reason = StopReason::Shutdown;
        } else {
            info(
                "LOOP",
                format!("reached iteration ceiling of {}", self.settings.max_iterations),
            );
        }
        self.state = LoopState::Stopped;
        outcome
    }

    fn run_iteration(&mut self, iteration: u64) -> Result<IterationRecord, SkipReason> {
        let memory_cost = self.ctx.difficulty().get();
        info("LOOP", format!("Current difficulty: {memory_cost}"));

        let device_index = self.settings.device_index;
        let executive = &*self.executive;
        let batch_size = resolve_batch_size(self.settings.batch_size, memory_cost, || {
            executive.probe_memory(device_index)
        })?;
        if self.settings.batch_size == 0 {
            info("LOOP", format!("using batchsize:{batch_size}"));
        }

        let workload = WorkloadDescriptor {
            device_index,
            memory_cost,
            parallelism: BENCH_PARALLELISM,
            iterations: BENCH_ITERATIONS,
            batch_size,
            samples: self.settings.samples,
            kernel_type: self.settings.kernel_type,
            precompute_refs: self.settings.precompute_refs,
            output_mode: self.settings.output_mode,
            output_type: self.settings.output_type,
        };

        let samples = self.executive.run(&workload)?;
        let record = IterationRecord::new(iteration, memory_cost, batch_size.get(), &samples);
        for line in render_iteration(&record, workload.output_mode, workload.output_type) {
            (self.emit)(&line);
        }
        Ok(record)
    }
}
