//! Authoritative per-bin occupancy counts and the active mask.
//!
//! Counts are mutated in two ways: wholesale recomputation by the
//! active-list builder, and merged [`BinDelta`] accumulators produced by
//! the parallel assignment pass. The invariant either way: per-bin counts
//! sum to the local particle count, for all kinds together and per kind.

use smallvec::SmallVec;
use strata_core::{ParticleKind, TimeBin, KIND_COUNT, TIMEBINS};

/// Per-bin particle counts (global and per kind) plus the active mask.
#[derive(Clone, Debug)]
pub struct TimeBinRegistry {
    count: [u32; TIMEBINS],
    count_by_kind: [[u32; TIMEBINS]; KIND_COUNT],
    active: [bool; TIMEBINS],
}

impl Default for TimeBinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeBinRegistry {
    /// Empty registry with no active bins.
    pub fn new() -> Self {
        Self {
            count: [0; TIMEBINS],
            count_by_kind: [[0; TIMEBINS]; KIND_COUNT],
            active: [false; TIMEBINS],
        }
    }

    /// Particles currently in `bin`, all kinds.
    pub fn count(&self, bin: TimeBin) -> u32 {
        self.count[bin.index()]
    }

    /// Particles of `kind` currently in `bin`.
    pub fn count_of(&self, kind: ParticleKind, bin: TimeBin) -> u32 {
        self.count_by_kind[kind.index()][bin.index()]
    }

    /// Total local particle count.
    pub fn total(&self) -> u64 {
        self.count.iter().map(|&c| u64::from(c)).sum()
    }

    /// Total local particle count of one kind.
    pub fn total_of(&self, kind: ParticleKind) -> u64 {
        self.count_by_kind[kind.index()]
            .iter()
            .map(|&c| u64::from(c))
            .sum()
    }

    /// Whether `bin`'s cadence elapses at the current synchronization point.
    pub fn is_active(&self, bin: TimeBin) -> bool {
        self.active[bin.index()]
    }

    /// The full active mask, indexed by bin.
    pub fn active_mask(&self) -> &[bool; TIMEBINS] {
        &self.active
    }

    /// The currently active bins, in ascending order.
    pub fn active_bins(&self) -> SmallVec<[TimeBin; TIMEBINS]> {
        (0..TIMEBINS)
            .filter(|&b| self.active[b])
            .map(|b| TimeBin(b as u8))
            .collect()
    }

    pub(crate) fn set_active(&mut self, bin: TimeBin, active: bool) {
        self.active[bin.index()] = active;
    }

    /// Zero all occupancy counts ahead of a ground-truth rescan.
    pub fn zero_counts(&mut self) {
        self.count = [0; TIMEBINS];
        self.count_by_kind = [[0; TIMEBINS]; KIND_COUNT];
    }

    /// Count one particle of `kind` in `bin` during a rescan.
    pub fn record(&mut self, kind: ParticleKind, bin: TimeBin) {
        self.count[bin.index()] += 1;
        self.count_by_kind[kind.index()][bin.index()] += 1;
    }

    /// Merge one worker's migration deltas into the counts.
    pub fn apply(&mut self, delta: &BinDelta) {
        for b in 0..TIMEBINS {
            self.count[b] = apply_delta(self.count[b], delta.count[b]);
            for k in 0..KIND_COUNT {
                self.count_by_kind[k][b] =
                    apply_delta(self.count_by_kind[k][b], delta.count_by_kind[k][b]);
            }
        }
    }
}

fn apply_delta(count: u32, delta: i64) -> u32 {
    let next = i64::from(count) + delta;
    debug_assert!(next >= 0, "bin count went negative");
    next.max(0) as u32
}

/// One worker's accumulated bin migrations, merged after the parallel
/// assignment pass.
///
/// Counts are associative and commutative under addition, so merging
/// per-worker deltas in any grouping reproduces the result of atomic
/// per-migration updates without the contention.
#[derive(Clone, Debug)]
pub struct BinDelta {
    count: [i64; TIMEBINS],
    count_by_kind: [[i64; TIMEBINS]; KIND_COUNT],
}

impl Default for BinDelta {
    fn default() -> Self {
        Self::new()
    }
}

impl BinDelta {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self {
            count: [0; TIMEBINS],
            count_by_kind: [[0; TIMEBINS]; KIND_COUNT],
        }
    }

    /// Record one particle of `kind` moving from `from` to `to`.
    pub fn migrate(&mut self, kind: ParticleKind, from: TimeBin, to: TimeBin) {
        self.count[from.index()] -= 1;
        self.count[to.index()] += 1;
        self.count_by_kind[kind.index()][from.index()] -= 1;
        self.count_by_kind[kind.index()][to.index()] += 1;
    }

    /// Fold another worker's accumulator into this one.
    pub fn merge(&mut self, other: &BinDelta) {
        for b in 0..TIMEBINS {
            self.count[b] += other.count[b];
            for k in 0..KIND_COUNT {
                self.count_by_kind[k][b] += other.count_by_kind[k][b];
            }
        }
    }
}
