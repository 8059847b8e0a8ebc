//! Hierarchical power-of-two timestep scheduler and kick integrator.
//!
//! The engine advances a distributed particle set in momentum space with a
//! symplectic kick scheme. Each particle's admissible step is computed from
//! its local force state, quantized into a shared power-of-two bin
//! hierarchy, and constrained so that no particle's cadence ever skips a
//! synchronization point. All cross-rank agreement happens through a small
//! set of blocking reductions carrying scalar payloads.
//!
//! Entry point: [`Scheduler`] in [`cycle`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod active;
pub mod assign;
pub mod config;
pub mod cycle;
pub mod kick;
pub mod parallel;
pub mod pm;
pub mod policy;
pub mod registry;
pub mod sync;

pub use active::ActiveList;
pub use assign::BinAssigner;
pub use config::{ConfigError, RunConfig};
pub use cycle::{CycleContext, CycleError, CycleReport, Scheduler};
pub use kick::KickIntegrator;
pub use pm::PmStepController;
pub use policy::TimestepPolicy;
pub use registry::{BinDelta, TimeBinRegistry};
