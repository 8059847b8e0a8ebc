//! Strata: hierarchical timestep scheduling for particle simulations.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Strata sub-crates. For most users, adding `strata` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let mut sched = Scheduler::new(RunConfig::default()).unwrap();
//! assert_eq!(sched.current_tick(), Tick::ZERO);
//!
//! // With no particles registered, the only constraint left is the
//! // epoch boundary.
//! let next = sched.find_next_sync(&LocalComm);
//! assert_eq!(next, Tick::new(1, 0));
//! sched.advance_clock(next);
//! assert_eq!(sched.current_tick().epoch, 1);
//! ```
//!
//! Real runs hook the scheduler up to an application-owned particle store
//! (the [`types::ParticleStore`] trait), a kick-factor provider
//! ([`types::KickFactors`]) and, for distributed runs, a reduction
//! transport ([`types::ReductionComm`]); see [`engine::cycle::Scheduler`].
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `strata-core` | Ticks, bins, particle kinds, collaborator traits, fault types |
//! | [`engine`] | `strata-engine` | The scheduler, timestep policy, bin assignment, kick integrator |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and collaborator traits (`strata-core`).
///
/// The integer timeline ([`types::Tick`], [`types::TimeBin`]), particle
/// kinds, and the seams towards external collaborators.
pub use strata_core as types;

/// The scheduler and its moving parts (`strata-engine`).
///
/// [`engine::cycle::Scheduler`] drives everything; the policy, assigner,
/// registry and kick integrator are exposed for callers that need finer
/// control.
pub use strata_engine as engine;

/// Common imports for typical Strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    pub use strata_core::{
        CheckpointSink, KickFactors, LocalComm, ParticleKind, ParticleStore, ReductionComm,
        ScaleFactors, SnapshotId, Tick, TimeBin, TIMEBASE, TIMEBINS,
    };
    pub use strata_engine::{
        CycleContext, CycleError, CycleReport, RunConfig, Scheduler,
    };
}
