use argon2::{Algorithm, Argon2, Error, Params, Version};

pub const BENCH_ITERATIONS: u32 = 1;
pub const BENCH_PARALLELISM: u32 = 1;
pub const BENCH_OUTPUT_LEN: usize = 32;
pub const BENCH_SALT_LEN: usize = 16;

/// Starting memory cost (KiB) before the difficulty file is first read.
pub const DEFAULT_MEMORY_COST_KIB: u32 = 1727;

/// Allocator headroom applied per hash when sizing a batch from free memory.
pub const MEMORY_HEADROOM_FACTOR: f64 = 1.01;

/// Bytes per unit of memory cost.
pub const MEMORY_COST_UNIT_BYTES: u64 = 1024;

pub fn bench_params(
    memory_cost_kib: u32,
    iterations: u32,
    parallelism: u32,
) -> Result<Params, Error> {
    Params::new(memory_cost_kib, iterations, parallelism, Some(BENCH_OUTPUT_LEN))
}

pub fn bench_hasher(
    memory_cost_kib: u32,
    iterations: u32,
    parallelism: u32,
) -> Result<Argon2<'static>, Error> {
    Ok(Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        bench_params(memory_cost_kib, iterations, parallelism)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_params_use_single_lane_single_pass() {
        let params = bench_params(DEFAULT_MEMORY_COST_KIB, BENCH_ITERATIONS, BENCH_PARALLELISM)
            .expect("default params should be valid");
        assert_eq!(params.m_cost(), DEFAULT_MEMORY_COST_KIB);
        assert_eq!(params.t_cost(), BENCH_ITERATIONS);
        assert_eq!(params.p_cost(), BENCH_PARALLELISM);
        assert_eq!(params.output_len(), Some(BENCH_OUTPUT_LEN));
    }

    #[test]
    fn bench_params_reject_memory_below_argon2_minimum() {
        assert!(bench_params(1, BENCH_ITERATIONS, BENCH_PARALLELISM).is_err());
        assert!(bench_params(8, BENCH_ITERATIONS, 4).is_err());
    }
}
