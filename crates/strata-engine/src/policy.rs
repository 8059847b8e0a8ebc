//! Per-particle admissible-step computation.
//!
//! The policy turns one particle's local force state into the longest step
//! the error-control tolerances admit, expressed as an integer tick count.
//! The smallest of all applicable physical bounds wins; the result is a
//! physical statement, not a scheduling preference.

use strata_core::{KickFactors, ParticleStore, ScaleFactors, GAMMA};

use crate::config::RunConfig;

/// Floor applied to the acceleration magnitude so a force-free particle
/// gets the maximum step instead of a division by zero.
const ACCEL_FLOOR: f64 = 1.0e-30;

/// The policy's verdict for one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DesiredStep {
    /// Admissible step in ticks, clamped to the PM cadence.
    pub ticks: u32,
    /// The admissible log-scale-factor step before quantization.
    pub dloga: f64,
    /// Physical acceleration magnitude (diagnostic for fault reports).
    pub accel: f64,
}

/// Computes the physically admissible step for one particle.
pub struct TimestepPolicy<'a> {
    config: &'a RunConfig,
    scale: ScaleFactors,
}

impl<'a> TimestepPolicy<'a> {
    /// Bind the policy to a configuration and the cycle's scale factors.
    pub fn new(config: &'a RunConfig, scale: ScaleFactors) -> Self {
        Self { config, scale }
    }

    /// Physical acceleration magnitude of particle `i`: gravity plus mesh
    /// contribution, plus the hydro force for fluid particles.
    fn accel_magnitude<S: ParticleStore + ?Sized>(&self, store: &S, i: usize) -> f64 {
        let grav = store.gravity_accel(i);
        let mesh = store.mesh_accel(i);
        let mut acc = [
            self.scale.a2inv * (grav[0] + mesh[0]),
            self.scale.a2inv * (grav[1] + mesh[1]),
            self.scale.a2inv * (grav[2] + mesh[2]),
        ];
        if let Some(fluid) = store.fluid(i) {
            let fac = 1.0 / self.scale.a.powf(3.0 * GAMMA - 2.0);
            for (a, h) in acc.iter_mut().zip(fluid.hydro_accel) {
                *a += fac * h;
            }
        }
        let mag = (acc[0] * acc[0] + acc[1] * acc[1] + acc[2] * acc[2]).sqrt();
        mag.max(ACCEL_FLOOR)
    }

    /// Admissible log-scale-factor step for particle `i`, before the
    /// configured floor and tick quantization.
    pub fn desired_dloga<S: ParticleStore + ?Sized>(
        &self,
        store: &S,
        i: usize,
        factors: &dyn KickFactors,
    ) -> (f64, f64) {
        let ac = self.accel_magnitude(store, i);
        let soft = self.config.softening_for(store.kind(i));

        let mut dt = (2.0 * self.config.err_tol_int_accuracy * self.scale.a * soft / ac).sqrt();

        if let Some(fluid) = store.fluid(i) {
            // Courant bound from the last force evaluation's signal speed.
            let fac = self.scale.a.powf(3.0 * (1.0 - GAMMA) / 2.0);
            let dt_courant = 2.0 * self.config.courant_fac * self.scale.a
                * fluid.smoothing_length
                / (fac * fluid.max_signal_speed);
            if dt_courant < dt {
                dt = dt_courant;
            }
        }

        if let Some(sink) = store.accretor(i) {
            if sink.accretion_rate > 0.0 && sink.mass > 0.0 {
                let dt_accr = 0.25 * sink.mass / sink.accretion_rate;
                if dt_accr < dt {
                    dt = dt_accr;
                }
            }
            if let Some(limit) = sink.bin_limit {
                let dt_limit = factors.dloga_for_bin(limit) / self.scale.hubble;
                if dt_limit < dt {
                    dt = dt_limit;
                }
            }
        }

        (dt * self.scale.hubble, ac)
    }

    /// Resolve particle `i`'s admissible step in ticks, clamped to
    /// `max_ticks` (the PM cadence in force).
    ///
    /// With tree gravity disabled every particle takes the maximum step. A
    /// `max_ticks` of zero (no PM step established yet) resolves to zero;
    /// the caller surfaces that as a degenerate step.
    pub fn desired<S: ParticleStore + ?Sized>(
        &self,
        store: &S,
        i: usize,
        factors: &dyn KickFactors,
        max_ticks: u32,
    ) -> DesiredStep {
        if max_ticks == 0 {
            return DesiredStep {
                ticks: 0,
                dloga: 0.0,
                accel: 0.0,
            };
        }
        if !self.config.tree_gravity {
            return DesiredStep {
                ticks: max_ticks,
                dloga: 0.0,
                accel: 0.0,
            };
        }

        let (mut dloga, accel) = self.desired_dloga(store, i, factors);
        if dloga < self.config.min_timestep_dloga {
            dloga = self.config.min_timestep_dloga;
        }
        let ticks = factors.dti_from_dloga(dloga).min(max_ticks);
        DesiredStep {
            ticks,
            dloga,
            accel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::is_degenerate;
    use strata_core::{TimeBin, TIMEBASE};
    use strata_test_utils::{LinearFactors, StoreBuilder};

    fn flat_scale() -> ScaleFactors {
        ScaleFactors::flat(1.0)
    }

    #[test]
    fn zero_acceleration_takes_maximum_step() {
        let store = StoreBuilder::new()
            .dark_matter(1.0, [0.0; 3])
            .build();
        let config = RunConfig::default();
        let policy = TimestepPolicy::new(&config, flat_scale());
        let factors = LinearFactors::new(1.0e-6);

        let step = policy.desired(&store, 0, &factors, 128);
        assert_eq!(step.ticks, 128);
        assert!(step.dloga.is_finite());
        assert!(!is_degenerate(step.ticks));
    }

    #[test]
    fn stronger_acceleration_means_shorter_step() {
        let store = StoreBuilder::new()
            .dark_matter(1.0, [1.0e-4, 0.0, 0.0])
            .dark_matter(1.0, [1.0, 0.0, 0.0])
            .build();
        let config = RunConfig::default();
        let policy = TimestepPolicy::new(&config, flat_scale());
        let factors = LinearFactors::new(1.0e-6);

        let slow = policy.desired(&store, 0, &factors, TIMEBASE);
        let fast = policy.desired(&store, 1, &factors, TIMEBASE);
        assert!(fast.ticks < slow.ticks, "{} !< {}", fast.ticks, slow.ticks);
        assert!(fast.dloga < slow.dloga);
    }

    #[test]
    fn courant_bound_caps_fluid_step() {
        let mut builder = StoreBuilder::new();
        builder = builder.gas(1.0, [1.0e-6, 0.0, 0.0], |fluid| {
            fluid.max_signal_speed = 10.0;
            fluid.smoothing_length = 0.1;
        });
        builder = builder.dark_matter(1.0, [1.0e-6, 0.0, 0.0]);
        let store = builder.build();
        let config = RunConfig::default();
        let policy = TimestepPolicy::new(&config, flat_scale());
        let factors = LinearFactors::new(1.0e-6);

        let gas = policy.desired(&store, 0, &factors, TIMEBASE);
        let dm = policy.desired(&store, 1, &factors, TIMEBASE);
        assert!(gas.ticks < dm.ticks);
    }

    #[test]
    fn accretion_rate_bounds_sink_step() {
        let store = StoreBuilder::new()
            .black_hole(1.0, [0.0; 3], 1.0e-3, 50.0, None)
            .black_hole(1.0, [0.0; 3], 0.0, 0.0, None)
            .build();
        let config = RunConfig::default();
        let policy = TimestepPolicy::new(&config, flat_scale());
        let factors = LinearFactors::new(1.0e-6);

        // dt_accr = 0.25 * 1e-3 / 50 = 5e-6 → dloga 5e-6 → 5 ticks.
        let accreting = policy.desired(&store, 0, &factors, TIMEBASE);
        let quiescent = policy.desired(&store, 1, &factors, TIMEBASE);
        assert_eq!(accreting.ticks, 5);
        assert!(quiescent.ticks > accreting.ticks);
    }

    #[test]
    fn external_bin_limit_bounds_sink_step() {
        let store = StoreBuilder::new()
            .black_hole(1.0, [0.0; 3], 0.0, 0.0, Some(TimeBin(3)))
            .build();
        let config = RunConfig::default();
        let policy = TimestepPolicy::new(&config, flat_scale());
        let factors = LinearFactors::new(1.0e-6);

        let step = policy.desired(&store, 0, &factors, TIMEBASE);
        // One bin-3 step is 8 ticks of dloga; the limiter caps dt there.
        assert_eq!(step.ticks, 8);
    }

    #[test]
    fn tree_gravity_off_returns_max() {
        let store = StoreBuilder::new()
            .dark_matter(1.0, [5.0e3, 0.0, 0.0])
            .build();
        let mut config = RunConfig::default();
        config.tree_gravity = false;
        let policy = TimestepPolicy::new(&config, flat_scale());
        let factors = LinearFactors::new(1.0e-6);

        assert_eq!(policy.desired(&store, 0, &factors, 64).ticks, 64);
    }

    #[test]
    fn min_dloga_floors_the_step() {
        let store = StoreBuilder::new()
            .dark_matter(1.0, [1.0e12, 0.0, 0.0])
            .build();
        let mut config = RunConfig::default();
        config.min_timestep_dloga = 4.0e-6;
        let policy = TimestepPolicy::new(&config, flat_scale());
        let factors = LinearFactors::new(1.0e-6);

        let step = policy.desired(&store, 0, &factors, TIMEBASE);
        assert_eq!(step.ticks, 4);
    }

    #[test]
    fn pm_cadence_zero_resolves_to_zero() {
        let store = StoreBuilder::new().dark_matter(1.0, [0.0; 3]).build();
        let config = RunConfig::default();
        let policy = TimestepPolicy::new(&config, flat_scale());
        let factors = LinearFactors::new(1.0e-6);

        assert_eq!(policy.desired(&store, 0, &factors, 0).ticks, 0);
    }
}
