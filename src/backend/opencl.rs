use std::time::Duration;

use crate::backend::{
    DeviceExecutive, DeviceInfo, ExecutiveError, MemoryProbe, WorkloadDescriptor,
};

const BACKEND_NAME: &str = "opencl";
const NOT_BUILT: &str = "argonbench is not built with OpenCL";

/// Placeholder for the OpenCL mode: every device call reports the backend as
/// unavailable so the loop skips instead of running a wrong workload.
pub struct OpenClExecutive;

impl DeviceExecutive for OpenClExecutive {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, ExecutiveError> {
        Err(ExecutiveError::unavailable(BACKEND_NAME, NOT_BUILT))
    }

    fn probe_memory(&self, _device_index: usize) -> Result<MemoryProbe, ExecutiveError> {
        Err(ExecutiveError::unavailable(BACKEND_NAME, NOT_BUILT))
    }

    fn run(&mut self, _workload: &WorkloadDescriptor) -> Result<Vec<Duration>, ExecutiveError> {
        Err(ExecutiveError::unavailable(BACKEND_NAME, NOT_BUILT))
    }
}
