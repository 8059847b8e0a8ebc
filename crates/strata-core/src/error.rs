//! Fault types shared across the workspace.
//!
//! Nothing here is retried: a degenerate step signals numerical divergence
//! and terminates the run globally; a kick-time mismatch signals an internal
//! scheduling bug and is fatal locally.

use std::error::Error;
use std::fmt;

use crate::particle::ParticleKind;
use crate::tick::Tick;

/// Record of one particle whose resolved step fell outside the
/// representable range (tick count `<= 1` or `> TIMEBASE`).
///
/// Carried as data, not thrown: faults are counted during the assignment
/// pass and aggregated across ranks before the run is aborted, so every
/// rank halts on the same cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct DegenerateStep {
    /// Local index of the offending particle.
    pub index: usize,
    /// Its species.
    pub kind: ParticleKind,
    /// The resolved (rounded) tick count.
    pub ticks: u32,
    /// The admissible log-scale-factor step the policy computed.
    pub dloga: f64,
    /// Physical acceleration magnitude that produced it.
    pub accel: f64,
}

impl fmt::Display for DegenerateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "degenerate step of {} ticks for particle {} ({:?}): dloga={:e} accel={:e}",
            self.ticks, self.index, self.kind, self.dloga, self.accel
        )
    }
}

impl Error for DegenerateStep {}

/// Errors from the kick integrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KickError {
    /// A particle's recorded kick time disagrees with the interval the
    /// integrator was asked to continue from. Debug-only consistency
    /// check; indicates a scheduling logic error.
    TimeMismatch {
        /// Local index of the particle.
        index: usize,
        /// Start of the interval the integrator expected to continue from.
        expected: Tick,
        /// Kick time actually recorded on the particle.
        recorded: Tick,
    },
}

impl fmt::Display for KickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeMismatch {
                index,
                expected,
                recorded,
            } => write!(
                f,
                "kick time mismatch for particle {index}: expected {expected}, recorded {recorded}"
            ),
        }
    }
}

impl Error for KickError {}
