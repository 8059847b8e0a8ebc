//! Run configuration and startup validation.
//!
//! [`RunConfig`] collects the error-control tolerances and physical
//! constants the scheduler needs. [`RunConfig::validate`] checks the
//! structural invariants once at startup; nothing is re-validated on the
//! hot path.

use std::error::Error;
use std::fmt;

use strata_core::{ParticleKind, KIND_COUNT};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`RunConfig::validate()`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A tolerance or physical constant that must be positive was not.
    NotPositive {
        /// Field name.
        name: &'static str,
        /// The offending value.
        value: f64,
    },
    /// A value that must be finite was NaN or infinite.
    NonFinite {
        /// Field name.
        name: &'static str,
        /// The offending value.
        value: f64,
    },
    /// The minimum step exceeds the maximum step.
    StepRangeInverted {
        /// Configured minimum log-scale step.
        min: f64,
        /// Configured maximum log-scale step.
        max: f64,
    },
    /// The softening length for one particle kind is not positive.
    InvalidSoftening {
        /// Index of the offending kind.
        kind: usize,
        /// The offending value.
        value: f64,
    },
    /// The RMS-displacement fraction is outside `(0, 1]`.
    DisplacementFraction {
        /// The offending value.
        value: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPositive { name, value } => {
                write!(f, "{name} must be positive, got {value}")
            }
            Self::NonFinite { name, value } => {
                write!(f, "{name} must be finite, got {value}")
            }
            Self::StepRangeInverted { min, max } => {
                write!(f, "min_timestep_dloga {min} exceeds max_timestep_dloga {max}")
            }
            Self::InvalidSoftening { kind, value } => {
                write!(f, "softening for kind {kind} must be positive, got {value}")
            }
            Self::DisplacementFraction { value } => {
                write!(f, "max_rms_displacement must be in (0, 1], got {value}")
            }
        }
    }
}

impl Error for ConfigError {}

// ── RunConfig ──────────────────────────────────────────────────────

/// Error-control policy and physical constants for one run.
///
/// Step sizes encode a physical error-control policy: the tolerances here
/// bound the integration error per step, they are not scheduling
/// priorities. Defaults are the canonical cosmological values in internal
/// units (`H0 = 0.1`, `G = 43007.1`).
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Integration-accuracy tolerance for the acceleration criterion.
    pub err_tol_int_accuracy: f64,
    /// Courant factor for the fluid signal-speed bound.
    pub courant_fac: f64,
    /// Floor on the per-particle log-scale-factor step.
    pub min_timestep_dloga: f64,
    /// Cap on any step, including the PM step.
    pub max_timestep_dloga: f64,
    /// Gravitational softening length per particle kind.
    pub softening: [f64; KIND_COUNT],
    /// Hard physical ceiling on fluid velocity magnitudes.
    pub max_gas_velocity: f64,
    /// Internal-energy floor for fluid particles; zero disables it.
    pub min_energy: f64,
    /// Maximum RMS displacement over one PM step, as a fraction of the
    /// smaller of the mesh cell size and the mean particle spacing.
    pub max_rms_displacement: f64,
    /// Mesh smoothing scale (cell size times the smoothing ratio).
    pub mesh_scale: f64,
    /// Baryon density parameter, for the mean-spacing estimate.
    pub omega_baryon: f64,
    /// Cold-dark-matter density parameter.
    pub omega_cdm: f64,
    /// Hubble constant in internal units.
    pub hubble0: f64,
    /// Gravitational constant in internal units.
    pub gravity: f64,
    /// Kind whose particles never constrain the PM step (typically the
    /// fastest-moving species).
    pub fast_kind: Option<ParticleKind>,
    /// Force every particle onto the global minimum step.
    pub force_equal_timesteps: bool,
    /// Whether short-range (tree) forces are enabled; when off, every
    /// particle takes the maximum allowed step.
    pub tree_gravity: bool,
    /// Worker threads for the per-particle decision pass. `0` = auto
    /// (`available_parallelism`, clamped to `[1, 16]`).
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            err_tol_int_accuracy: 0.02,
            courant_fac: 0.15,
            min_timestep_dloga: 0.0,
            max_timestep_dloga: 0.1,
            softening: [0.05; KIND_COUNT],
            max_gas_velocity: 3.0e5,
            min_energy: 0.0,
            max_rms_displacement: 0.125,
            mesh_scale: 1.25,
            omega_baryon: 0.0486,
            omega_cdm: 0.2589,
            hubble0: 0.1,
            gravity: 43007.1,
            fast_kind: None,
            force_equal_timesteps: false,
            tree_gravity: true,
            workers: 0,
        }
    }
}

impl RunConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives = [
            ("err_tol_int_accuracy", self.err_tol_int_accuracy),
            ("courant_fac", self.courant_fac),
            ("max_timestep_dloga", self.max_timestep_dloga),
            ("max_gas_velocity", self.max_gas_velocity),
            ("mesh_scale", self.mesh_scale),
            ("omega_baryon", self.omega_baryon),
            ("omega_cdm", self.omega_cdm),
            ("hubble0", self.hubble0),
            ("gravity", self.gravity),
        ];
        for (name, value) in positives {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
            if value <= 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        if !self.min_timestep_dloga.is_finite() || self.min_timestep_dloga < 0.0 {
            return Err(ConfigError::NonFinite {
                name: "min_timestep_dloga",
                value: self.min_timestep_dloga,
            });
        }
        if self.min_timestep_dloga > self.max_timestep_dloga {
            return Err(ConfigError::StepRangeInverted {
                min: self.min_timestep_dloga,
                max: self.max_timestep_dloga,
            });
        }
        if !self.min_energy.is_finite() || self.min_energy < 0.0 {
            return Err(ConfigError::NonFinite {
                name: "min_energy",
                value: self.min_energy,
            });
        }
        for (kind, &soft) in self.softening.iter().enumerate() {
            if !soft.is_finite() || soft <= 0.0 {
                return Err(ConfigError::InvalidSoftening { kind, value: soft });
            }
        }
        if !self.max_rms_displacement.is_finite()
            || self.max_rms_displacement <= 0.0
            || self.max_rms_displacement > 1.0
        {
            return Err(ConfigError::DisplacementFraction {
                value: self.max_rms_displacement,
            });
        }
        Ok(())
    }

    /// Resolve the worker count for the parallel decision pass.
    pub fn resolved_workers(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .clamp(1, 16),
            n => n.min(64),
        }
    }

    /// Softening length for one particle kind.
    pub fn softening_for(&self, kind: ParticleKind) -> f64 {
        self.softening[kind.index()]
    }
}
