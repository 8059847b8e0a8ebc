//! Core types and collaborator traits for the Strata timestep scheduler.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! integer timeline ([`Tick`], [`TimeBin`]), the particle-kind model, the
//! trait seams towards external collaborators (particle storage, kick-factor
//! provider, reduction transport, checkpoint writer), and the fault types
//! shared across the workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod checkpoint;
pub mod comm;
pub mod error;
pub mod factors;
pub mod particle;
pub mod tick;

pub use checkpoint::{CheckpointSink, SnapshotId};
pub use comm::{LocalComm, ReductionComm};
pub use error::{DegenerateStep, KickError};
pub use factors::{KickFactors, ScaleFactors, GAMMA};
pub use particle::{AccretorState, FluidState, ParticleKind, ParticleStore, KIND_COUNT};
pub use tick::{floor_power_of_two, kick_tick, Tick, TimeBin, TIMEBASE, TIMEBINS};
