use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use argon2::Argon2;
use argonbench_params::{bench_hasher, BENCH_OUTPUT_LEN, BENCH_SALT_LEN};
use sysinfo::System;

use crate::backend::{
    DeviceExecutive, DeviceInfo, ExecutiveError, MemoryProbe, WorkloadDescriptor,
};

const BACKEND_NAME: &str = "cpu";

/// Runs the workload on host threads. The host is exposed as device 0.
pub struct CpuExecutive {
    threads: usize,
}

impl CpuExecutive {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    fn check_device(device_index: usize) -> Result<(), ExecutiveError> {
        if device_index != 0 {
            return Err(ExecutiveError::unavailable(
                BACKEND_NAME,
                format!("device index {device_index} out of range (only device 0 exists)"),
            ));
        }
        Ok(())
    }
}

impl DeviceExecutive for CpuExecutive {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, ExecutiveError> {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();

        let model = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "host CPU".to_string());

        Ok(vec![DeviceInfo {
            index: 0,
            name: format!("{model} ({} threads)", self.threads),
            total_bytes: system.total_memory(),
        }])
    }

    fn probe_memory(&self, device_index: usize) -> Result<MemoryProbe, ExecutiveError> {
        Self::check_device(device_index)?;

        let mut system = System::new();
        system.refresh_memory();
        let total_bytes = system.total_memory();
        if total_bytes == 0 {
            return Err(ExecutiveError::unavailable(
                BACKEND_NAME,
                "host memory information is not available on this platform",
            ));
        }

        Ok(MemoryProbe {
            free_bytes: system.available_memory().min(total_bytes),
            total_bytes,
        })
    }

    fn run(&mut self, workload: &WorkloadDescriptor) -> Result<Vec<Duration>, ExecutiveError> {
        Self::check_device(workload.device_index)?;

        let hasher = bench_hasher(
            workload.memory_cost,
            workload.iterations,
            workload.parallelism,
        )
        .map_err(|err| {
            ExecutiveError::workload(
                BACKEND_NAME,
                format!(
                    "invalid Argon2 parameters for memory cost {}: {err}",
                    workload.memory_cost
                ),
            )
        })?;

        let batch = u64::from(workload.batch_size.get());
        let mut samples = Vec::with_capacity(workload.samples as usize);
        for sample in 0..workload.samples {
            let started = Instant::now();
            hash_batch(&hasher, batch, self.threads, u64::from(sample))?;
            samples.push(started.elapsed());
        }
        Ok(samples)
    }
}

/// Hashes `batch` independent inputs on up to `threads` scoped workers that
/// pull indices from a shared counter.
fn hash_batch(
    hasher: &Argon2<'_>,
    batch: u64,
    threads: usize,
    sample: u64,
) -> Result<(), ExecutiveError> {
    let lanes = usize::try_from(batch).unwrap_or(usize::MAX).min(threads).max(1);
    let next_index = AtomicU64::new(0);
    let failed = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..lanes {
            let next_index = &next_index;
            let failed = &failed;
            scope.spawn(move || {
                let salt = bench_salt(sample);
                let mut output = [0u8; BENCH_OUTPUT_LEN];
                while !failed.load(Ordering::Relaxed) {
                    let index = next_index.fetch_add(1, Ordering::Relaxed);
                    if index >= batch {
                        break;
                    }
                    if hasher
                        .hash_password_into(&index.to_le_bytes(), &salt, &mut output)
                        .is_err()
                    {
                        failed.store(true, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    if failed.load(Ordering::Relaxed) {
        return Err(ExecutiveError::workload(
            BACKEND_NAME,
            "Argon2 hash computation failed",
        ));
    }
    Ok(())
}

fn bench_salt(sample: u64) -> [u8; BENCH_SALT_LEN] {
    let mut salt = [0u8; BENCH_SALT_LEN];
    for (i, byte) in salt.iter_mut().enumerate() {
        *byte = (i as u8)
            .wrapping_mul(37)
            .wrapping_add(11)
            .wrapping_add((sample % 251) as u8);
    }
    salt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KernelType, OutputMode, OutputType};
    use std::num::NonZeroU32;

    fn workload(memory_cost: u32, batch: u32, samples: u32) -> WorkloadDescriptor {
        WorkloadDescriptor {
            device_index: 0,
            memory_cost,
            parallelism: 1,
            iterations: 1,
            batch_size: NonZeroU32::new(batch).expect("batch must be non-zero"),
            samples,
            kernel_type: KernelType::Oneshot,
            precompute_refs: false,
            output_mode: OutputMode::Verbose,
            output_type: OutputType::Ns,
        }
    }

    #[test]
    fn run_returns_one_sample_per_batch() {
        let mut exec = CpuExecutive::new(2);
        let samples = exec.run(&workload(8, 3, 4)).expect("small workload should run");
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn run_rejects_memory_cost_below_argon2_minimum() {
        let mut exec = CpuExecutive::new(1);
        let err = exec
            .run(&workload(1, 1, 1))
            .expect_err("memory cost 1 is below the Argon2 minimum");
        assert!(matches!(err, ExecutiveError::Workload { .. }));
    }

    #[test]
    fn only_device_zero_exists() {
        let exec = CpuExecutive::new(1);
        let err = exec.probe_memory(1).expect_err("device 1 should not exist");
        assert!(matches!(err, ExecutiveError::DeviceUnavailable { .. }));

        let mut exec = CpuExecutive::new(1);
        let mut bad = workload(8, 1, 1);
        bad.device_index = 3;
        assert!(matches!(
            exec.run(&bad),
            Err(ExecutiveError::DeviceUnavailable { .. })
        ));
    }

    #[test]
    fn lists_the_host_as_device_zero() {
        let exec = CpuExecutive::new(4);
        let devices = exec.list_devices().expect("host listing should succeed");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].index, 0);
        assert!(devices[0].name.contains("4 threads"));
    }

    #[test]
    fn bench_salt_varies_by_sample() {
        assert_ne!(bench_salt(0), bench_salt(1));
        assert_eq!(bench_salt(3), bench_salt(3 + 251));
    }
}
