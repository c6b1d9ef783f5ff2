use std::num::NonZeroU32;

use argonbench_params::{MEMORY_COST_UNIT_BYTES, MEMORY_HEADROOM_FACTOR};
use thiserror::Error;

use crate::backend::{ExecutiveError, MemoryProbe};

#[derive(Debug, Error)]
pub(crate) enum SizingError {
    #[error("cannot size a batch for memory cost 0")]
    ZeroMemoryCost,
    #[error("memory probe failed: {0}")]
    Probe(#[from] ExecutiveError),
    #[error("{free_bytes} free bytes cannot hold one hash at memory cost {memory_cost}")]
    InsufficientMemory { free_bytes: u64, memory_cost: u32 },
    #[error("computed batch size {0} exceeds the supported maximum")]
    TooLarge(u64),
}

/// Picks the batch size for one iteration. A non-zero `requested` is used
/// as-is and `probe` is never called; zero sizes the batch from free device
/// memory.
pub(crate) fn resolve_batch_size(
    requested: u32,
    memory_cost: u32,
    probe: impl FnOnce() -> Result<MemoryProbe, ExecutiveError>,
) -> Result<NonZeroU32, SizingError> {
    if let Some(batch) = NonZeroU32::new(requested) {
        return Ok(batch);
    }
    if memory_cost == 0 {
        return Err(SizingError::ZeroMemoryCost);
    }

    let probe = probe()?;
    tracing::debug!(
        free_bytes = probe.free_bytes,
        total_bytes = probe.total_bytes,
        memory_cost,
        "sizing batch from memory probe"
    );
    let batch = batch_for_free_memory(probe.free_bytes, memory_cost);
    let batch = u32::try_from(batch).map_err(|_| SizingError::TooLarge(batch))?;
    NonZeroU32::new(batch).ok_or(SizingError::InsufficientMemory {
        free_bytes: probe.free_bytes,
        memory_cost,
    })
}

/// `floor(free / (memory_cost * headroom) / unit)`.
fn batch_for_free_memory(free_bytes: u64, memory_cost: u32) -> u64 {
    let per_hash = f64::from(memory_cost) * MEMORY_HEADROOM_FACTOR;
    (free_bytes as f64 / per_hash / MEMORY_COST_UNIT_BYTES as f64).floor() as u64
}
