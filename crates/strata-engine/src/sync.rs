//! Next-sync discovery and active-bin marking.
//!
//! The synchronization point is the earliest tick at which any occupied
//! bin's cadence elapses. Every rank computes its local candidate from its
//! own registry and the result is agreed with a MIN reduction; because the
//! inputs are integers the agreement is exact.

use strata_core::{ReductionComm, Tick, TimeBin, TIMEBASE, TIMEBINS};

use crate::registry::TimeBinRegistry;

/// Find the next tick at which some occupied bin requires a force update.
///
/// Bin 0 is always due, so a nonzero bin-0 count forces an immediate
/// resync at `current` (this is how freshly seeded particles acquire their
/// first real bin). Otherwise the candidate is the smallest multiple of an
/// occupied bin's cadence strictly greater than `current`, seeded with the
/// epoch boundary. The result is identical on every rank.
pub fn find_next_sync(
    registry: &TimeBinRegistry,
    current: Tick,
    comm: &dyn ReductionComm,
) -> Tick {
    let local = if registry.count(TimeBin(0)) > 0 {
        current.local
    } else {
        let mut next = TIMEBASE;
        for n in 1..TIMEBINS {
            if registry.count(TimeBin(n as u8)) == 0 {
                continue;
            }
            let cadence = 1u32 << n;
            let next_for_bin = (current.local / cadence) * cadence + cadence;
            if next_for_bin < next {
                next = next_for_bin;
            }
        }
        next
    };
    let candidate = Tick::new(current.epoch, local);
    Tick::from_linear(comm.min_u64(candidate.linear()))
}

/// Mark the bins whose cadence elapses at `next`.
///
/// Bin 0 is always active; bin `k >= 1` is active iff `next` is a multiple
/// of `2^k`. Returns the force-update count: the number of particles whose
/// forces must be recomputed this cycle.
pub fn mark_active_bins(registry: &mut TimeBinRegistry, next: Tick) -> u64 {
    registry.set_active(TimeBin(0), true);
    let mut force_updates = u64::from(registry.count(TimeBin(0)));
    for n in 1..TIMEBINS {
        let bin = TimeBin(n as u8);
        let cadence = 1u32 << n;
        if next.local % cadence == 0 {
            registry.set_active(bin, true);
            force_updates += u64::from(registry.count(bin));
        } else {
            registry.set_active(bin, false);
        }
    }
    force_updates
}
