//! Test fixtures and mock collaborators for Strata development.
//!
//! Provides an in-memory [`ParticleStore`](strata_core::ParticleStore)
//! with a builder ([`StoreBuilder`]), a tick-linear [`KickFactors`]
//! implementation whose kicks are exactly additive over adjacent
//! intervals ([`LinearFactors`]), an in-process multi-rank reduction
//! transport ([`CommGroup`]), and a recording checkpoint sink.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::{Arc, Condvar, Mutex};

use indexmap::IndexMap;

use strata_core::{
    CheckpointSink, KickFactors, ReductionComm, SnapshotId, Tick, TIMEBASE,
};

mod fixtures;

pub use fixtures::{ParticleRecord, StoreBuilder, VecStore};

// ── Kick factors ────────────────────────────────────────────────────────

/// Kick factors proportional to the tick interval, with a fixed dloga per
/// tick.
///
/// Linearity makes expected kicks trivial to compute by hand and makes
/// the two halves of a step sum exactly to the whole.
#[derive(Clone, Copy, Debug)]
pub struct LinearFactors {
    dloga_per_tick: f64,
}

impl LinearFactors {
    pub fn new(dloga_per_tick: f64) -> Self {
        Self { dloga_per_tick }
    }

    fn interval(&self, start: Tick, end: Tick) -> f64 {
        self.dloga_per_tick * f64::from(start.delta_to(end))
    }
}

impl KickFactors for LinearFactors {
    fn grav_kick(&self, start: Tick, end: Tick) -> f64 {
        self.interval(start, end)
    }

    fn hydro_kick(&self, start: Tick, end: Tick) -> f64 {
        self.interval(start, end)
    }

    fn mesh_kick(&self, start: Tick, end: Tick) -> f64 {
        self.interval(start, end)
    }

    fn dloga_from_dti(&self, dti: u32) -> f64 {
        self.dloga_per_tick * f64::from(dti)
    }

    fn dti_from_dloga(&self, dloga: f64) -> u32 {
        let ticks = (dloga / self.dloga_per_tick).floor();
        if ticks >= f64::from(TIMEBASE) {
            TIMEBASE
        } else if ticks <= 0.0 {
            0
        } else {
            ticks as u32
        }
    }
}

// ── Checkpoint sink ─────────────────────────────────────────────────────

/// Checkpoint sink that records every snapshot request.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub requests: Vec<SnapshotId>,
}

impl CheckpointSink for RecordingSink {
    fn request_snapshot(&mut self, id: SnapshotId) {
        self.requests.push(id);
    }
}

// ── In-process reduction transport ──────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum Contribution {
    Scalar(u64),
    Array(Vec<f64>),
}

struct RoundState {
    contributions: IndexMap<usize, Contribution>,
    gathered: Option<Vec<Contribution>>,
    readers_left: usize,
}

struct Shared {
    state: Mutex<RoundState>,
    ready: Condvar,
}

/// One rank's handle into an in-process reduction group.
///
/// Every collective blocks until all ranks of the group have contributed,
/// then folds the contributions in rank order so each rank computes a
/// bit-identical result. Panics (rather than erroring) on misuse, which
/// is the right failure mode for a test double.
pub struct GroupComm {
    rank: usize,
    world: usize,
    shared: Arc<Shared>,
}

/// Construct the handles for an `n`-rank in-process reduction group.
pub struct CommGroup;

impl CommGroup {
    pub fn new(world: usize) -> Vec<GroupComm> {
        assert!(world > 0, "a reduction group needs at least one rank");
        let shared = Arc::new(Shared {
            state: Mutex::new(RoundState {
                contributions: IndexMap::new(),
                gathered: None,
                readers_left: 0,
            }),
            ready: Condvar::new(),
        });
        (0..world)
            .map(|rank| GroupComm {
                rank,
                world,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl GroupComm {
    /// Contribute `value` and return every rank's contribution, ordered
    /// by rank.
    fn exchange(&self, value: Contribution) -> Vec<Contribution> {
        let mut state = self.shared.state.lock().unwrap();
        while state.readers_left > 0 {
            state = self.shared.ready.wait(state).unwrap();
        }
        let replaced = state.contributions.insert(self.rank, value);
        assert!(replaced.is_none(), "rank {} contributed twice", self.rank);
        if state.contributions.len() == self.world {
            let gathered = (0..self.world)
                .map(|rank| state.contributions[&rank].clone())
                .collect();
            state.gathered = Some(gathered);
            state.readers_left = self.world;
            self.shared.ready.notify_all();
        } else {
            while state.gathered.is_none() {
                state = self.shared.ready.wait(state).unwrap();
            }
        }
        let out = state
            .gathered
            .clone()
            .unwrap_or_else(|| unreachable!("gathered set before readers drain"));
        state.readers_left -= 1;
        if state.readers_left == 0 {
            state.contributions.clear();
            state.gathered = None;
            self.shared.ready.notify_all();
        }
        out
    }

    fn scalars(&self, value: u64) -> impl Iterator<Item = u64> {
        self.exchange(Contribution::Scalar(value))
            .into_iter()
            .map(|c| match c {
                Contribution::Scalar(v) => v,
                Contribution::Array(_) => panic!("mismatched collective: expected scalar"),
            })
    }

    fn arrays(&self, values: &[f64]) -> Vec<Vec<f64>> {
        self.exchange(Contribution::Array(values.to_vec()))
            .into_iter()
            .map(|c| match c {
                Contribution::Array(v) => v,
                Contribution::Scalar(_) => panic!("mismatched collective: expected array"),
            })
            .collect()
    }
}

impl ReductionComm for GroupComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world
    }

    fn min_u64(&self, value: u64) -> u64 {
        self.scalars(value).fold(u64::MAX, u64::min)
    }

    fn sum_u64(&self, value: u64) -> u64 {
        self.scalars(value).sum()
    }

    fn min_f64(&self, values: &mut [f64]) {
        let all = self.arrays(values);
        for contribution in all {
            for (out, v) in values.iter_mut().zip(contribution) {
                if v < *out {
                    *out = v;
                }
            }
        }
    }

    fn sum_f64(&self, values: &mut [f64]) {
        let all = self.arrays(values);
        for v in values.iter_mut() {
            *v = 0.0;
        }
        for contribution in all {
            for (out, v) in values.iter_mut().zip(contribution) {
                *out += v;
            }
        }
    }
}
