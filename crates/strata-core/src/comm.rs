//! Distributed reduction transport seam.
//!
//! Every cross-rank agreement in the scheduler goes through one of these
//! blocking collectives. Implementations must produce bit-identical results
//! on every participant: the derived schedules are required to match
//! exactly, with no particle data exchanged.

/// Blocking collective reductions over a fixed, known participant set.
///
/// Like [`crate::KickFactors`], handles may be held across the scheduler's
/// worker threads, so implementations must be `Sync`.
pub trait ReductionComm: Sync {
    /// This participant's rank, `0..world_size`.
    fn rank(&self) -> usize;

    /// Number of participants.
    fn world_size(&self) -> usize;

    /// Global minimum of one `u64` per rank.
    fn min_u64(&self, value: u64) -> u64;

    /// Global sum of one `u64` per rank.
    fn sum_u64(&self, value: u64) -> u64;

    /// Element-wise global minimum over a small fixed-size array.
    fn min_f64(&self, values: &mut [f64]);

    /// Element-wise global sum over a small fixed-size array.
    fn sum_f64(&self, values: &mut [f64]);
}

/// Single-rank transport: every reduction is the identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalComm;

impl ReductionComm for LocalComm {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn min_u64(&self, value: u64) -> u64 {
        value
    }

    fn sum_u64(&self, value: u64) -> u64 {
        value
    }

    fn min_f64(&self, _values: &mut [f64]) {}

    fn sum_f64(&self, _values: &mut [f64]) {}
}
