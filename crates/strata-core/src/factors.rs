//! Cosmology seam: scale factors and the kick-factor provider trait.
//!
//! Scale-factor bookkeeping itself is an external collaborator; the
//! scheduler only consumes a small snapshot of derived quantities
//! ([`ScaleFactors`]) plus the interval integrals exposed by
//! [`KickFactors`].

use crate::tick::{Tick, TimeBin};

/// Adiabatic index of the fluid.
pub const GAMMA: f64 = 5.0 / 3.0;

/// Derived scale-factor quantities for the current synchronization point.
///
/// Recomputed by the caller whenever the system drifts; immutable within
/// one cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleFactors {
    /// Scale factor `a`.
    pub a: f64,
    /// `1 / a^2`.
    pub a2inv: f64,
    /// `1 / a^3`.
    pub a3inv: f64,
    /// Hubble rate at `a`.
    pub hubble: f64,
}

impl ScaleFactors {
    /// Derive the inverse powers from a scale factor and Hubble rate.
    pub fn new(a: f64, hubble: f64) -> Self {
        Self {
            a,
            a2inv: 1.0 / (a * a),
            a3inv: 1.0 / (a * a * a),
            hubble,
        }
    }

    /// Non-expanding setup: `a = 1`, constant Hubble rate.
    pub fn flat(hubble: f64) -> Self {
        Self::new(1.0, hubble)
    }
}

/// Precomputed kick-factor integrals and the tick/log-scale mapping.
///
/// A pure black box: the same arguments always yield the same result, and
/// factors are additive over adjacent intervals
/// (`f(t0,t1) + f(t1,t2) == f(t0,t2)`). The tick mapping is monotonically
/// increasing in both directions.
///
/// Providers are shared with the worker threads of the decision pass, so
/// implementations must be `Sync`.
pub trait KickFactors: Sync {
    /// Gravity kick factor over `[start, end]`.
    fn grav_kick(&self, start: Tick, end: Tick) -> f64;

    /// Hydrodynamic kick factor over `[start, end]`.
    fn hydro_kick(&self, start: Tick, end: Tick) -> f64;

    /// Mesh-force kick factor over `[start, end]`.
    fn mesh_kick(&self, start: Tick, end: Tick) -> f64;

    /// Log-scale-factor interval spanned by `dti` ticks.
    fn dloga_from_dti(&self, dti: u32) -> f64;

    /// Number of ticks spanning a log-scale-factor interval.
    fn dti_from_dloga(&self, dloga: f64) -> u32;

    /// Log-scale-factor interval of one step in `bin`.
    fn dloga_for_bin(&self, bin: TimeBin) -> f64 {
        self.dloga_from_dti(bin.ticks())
    }
}
