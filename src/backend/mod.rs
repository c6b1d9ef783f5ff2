use std::num::NonZeroU32;
use std::time::Duration;

use thiserror::Error;

use crate::config::{BackendMode, Config, KernelType, OutputMode, OutputType};

pub mod cpu;
pub mod nvidia;
pub mod opencl;

/// Free and total memory of one device, sampled at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryProbe {
    pub free_bytes: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub total_bytes: u64,
}

/// Parameters for one benchmark iteration. Built fresh from the difficulty
/// snapshot each time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadDescriptor {
    pub device_index: usize,
    /// Argon2 memory cost in KiB.
    pub memory_cost: u32,
    pub parallelism: u32,
    pub iterations: u32,
    pub batch_size: NonZeroU32,
    pub samples: u32,
    pub kernel_type: KernelType,
    pub precompute_refs: bool,
    pub output_mode: OutputMode,
    pub output_type: OutputType,
}

#[derive(Debug, Error)]
pub enum ExecutiveError {
    #[error("{backend} device unavailable: {reason}")]
    DeviceUnavailable {
        backend: &'static str,
        reason: String,
    },
    #[error("{backend} workload failed: {reason}")]
    Workload {
        backend: &'static str,
        reason: String,
    },
}

impl ExecutiveError {
    pub(crate) fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    pub(crate) fn workload(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Workload {
            backend,
            reason: reason.into(),
        }
    }
}

/// Backend that can report device memory and execute a benchmark workload.
/// Owned by the foreground loop for the whole run.
pub trait DeviceExecutive: Send {
    fn name(&self) -> &'static str;

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, ExecutiveError>;

    fn probe_memory(&self, device_index: usize) -> Result<MemoryProbe, ExecutiveError>;

    /// Runs `workload.samples` timed batches and returns one duration per batch.
    fn run(&mut self, workload: &WorkloadDescriptor) -> Result<Vec<Duration>, ExecutiveError>;
}

pub fn build_executive(cfg: &Config) -> Box<dyn DeviceExecutive> {
    match cfg.mode {
        BackendMode::Cpu => Box::new(cpu::CpuExecutive::new(cfg.threads)),
        BackendMode::Cuda => Box::new(nvidia::CudaExecutive::new()),
        BackendMode::Opencl => Box::new(opencl::OpenClExecutive),
    }
}
