//! The long-range (mesh) step and its recomputation cadence.
//!
//! The PM step is globally shared: every rank derives the same value from
//! the same reduced velocity statistics, and it only ever changes at the
//! tick where the current step elapses.

use strata_core::{
    floor_power_of_two, KickFactors, ParticleKind, ParticleStore, ReductionComm, ScaleFactors,
    Tick, KIND_COUNT, TIMEBASE,
};

use crate::config::RunConfig;

/// Sentinel for "no particle of this kind seen yet" in the min-mass
/// reduction; any real positive mass replaces it.
const MASS_SEED: f64 = 1.0e30;

/// Owns the PM descriptor `{pm_start, pm_step}`.
#[derive(Clone, Copy, Debug)]
pub struct PmStepController {
    start: Tick,
    step: u32,
}

impl Default for PmStepController {
    fn default() -> Self {
        Self::new()
    }
}

impl PmStepController {
    /// Fresh descriptor: step zero, starting at the run origin, so the
    /// very first cycle is a PM boundary and estimates the real step.
    pub fn new() -> Self {
        Self {
            start: Tick::ZERO,
            step: 0,
        }
    }

    /// Start of the current PM step.
    pub fn start(&self) -> Tick {
        self.start
    }

    /// Length of the current PM step in ticks (a power of two, or zero
    /// before the first estimation).
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Whether `tick` is the point where the current PM step elapses.
    pub fn is_boundary(&self, tick: Tick) -> bool {
        tick.linear() == self.start.linear() + u64::from(self.step)
    }

    /// Advance the descriptor across a boundary to a newly estimated step.
    pub fn commit(&mut self, new_step: u32) {
        self.start = self.start.plus(self.step).normalized();
        self.step = new_step;
    }

    /// Estimate the admissible PM step from RMS particle velocities.
    ///
    /// Per kind, the criterion is that the RMS displacement over the step
    /// stays below the configured fraction of the smaller of the mesh
    /// smoothing scale and the mean inter-particle spacing (derived from
    /// the globally smallest particle mass of that kind). The configured
    /// fast kind never constrains the result.
    pub fn estimate_dloga<S: ParticleStore + ?Sized>(
        &self,
        store: &S,
        config: &RunConfig,
        scale: ScaleFactors,
        comm: &dyn ReductionComm,
    ) -> f64 {
        let mut vel_sq = [0.0f64; KIND_COUNT];
        let mut counts = [0.0f64; KIND_COUNT];
        let mut min_mass = [MASS_SEED; KIND_COUNT];

        for i in 0..store.len() {
            let k = store.kind(i).index();
            let v = store.velocity(i);
            vel_sq[k] += v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
            counts[k] += 1.0;
            let mass = store.mass(i);
            if mass > 0.0 && mass < min_mass[k] {
                min_mass[k] = mass;
            }
        }

        comm.sum_f64(&mut vel_sq);
        comm.sum_f64(&mut counts);
        comm.min_f64(&mut min_mass);

        let mut dloga = config.max_timestep_dloga;
        for kind in ParticleKind::ALL {
            let k = kind.index();
            if counts[k] <= 0.0 {
                continue;
            }
            let omega = match kind {
                ParticleKind::Gas | ParticleKind::Star | ParticleKind::BlackHole => {
                    config.omega_baryon
                }
                _ => config.omega_cdm,
            };
            // Mean spacing of the smallest particle of this kind:
            // (min_mass / mean_density)^(1/3).
            let mean_density =
                omega * 3.0 * config.hubble0 * config.hubble0 / (8.0 * std::f64::consts::PI * config.gravity);
            let dmean = (min_mass[k] / mean_density).cbrt();
            let rms_vel = (vel_sq[k] / counts[k]).sqrt();
            let bound = config.max_rms_displacement
                * scale.hubble
                * scale.a
                * scale.a
                * config.mesh_scale.min(dmean)
                / rms_vel;
            if config.fast_kind != Some(kind) && bound < dloga {
                dloga = bound;
            }
        }
        dloga
    }

    /// Estimate the new PM step in ticks: the dloga bound converted
    /// through the tick mapping, clamped to one epoch, rounded down to a
    /// power of two.
    pub fn estimate_step<S: ParticleStore + ?Sized>(
        &self,
        store: &S,
        config: &RunConfig,
        scale: ScaleFactors,
        factors: &dyn KickFactors,
        comm: &dyn ReductionComm,
    ) -> u32 {
        let dloga = self.estimate_dloga(store, config, scale, comm);
        let dti = factors.dti_from_dloga(dloga).min(TIMEBASE);
        floor_power_of_two(dti)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::LocalComm;
    use strata_test_utils::{LinearFactors, StoreBuilder};

    fn uniform_dm(n: usize, speed: f64) -> strata_test_utils::VecStore {
        let mut builder = StoreBuilder::new();
        for _ in 0..n {
            builder = builder
                .dark_matter(1.0, [0.0; 3])
                .with_velocity([speed, 0.0, 0.0]);
        }
        builder.build()
    }

    #[test]
    fn fresh_controller_is_immediately_at_boundary() {
        let pm = PmStepController::new();
        assert!(pm.is_boundary(Tick::ZERO));
        assert!(!pm.is_boundary(Tick::new(0, 1)));
    }

    #[test]
    fn commit_advances_start_and_replaces_step() {
        let mut pm = PmStepController::new();
        pm.commit(64);
        assert_eq!(pm.start(), Tick::ZERO);
        assert_eq!(pm.step(), 64);
        assert!(pm.is_boundary(Tick::new(0, 64)));
        pm.commit(128);
        assert_eq!(pm.start(), Tick::new(0, 64));
        assert_eq!(pm.step(), 128);
    }

    #[test]
    fn estimated_step_is_power_of_two() {
        let store = uniform_dm(32, 100.0);
        let config = RunConfig::default();
        let pm = PmStepController::new();
        let factors = LinearFactors::new(1.0e-6);
        let step = pm.estimate_step(&store, &config, ScaleFactors::flat(1.0), &factors, &LocalComm);
        assert!(step == 0 || step.is_power_of_two());
        assert!(step <= TIMEBASE);
    }

    #[test]
    fn faster_particles_shrink_the_step() {
        let config = RunConfig::default();
        let pm = PmStepController::new();
        let scale = ScaleFactors::flat(1.0);
        let slow = pm.estimate_dloga(&uniform_dm(32, 1.0), &config, scale, &LocalComm);
        let fast = pm.estimate_dloga(&uniform_dm(32, 1.0e4), &config, scale, &LocalComm);
        assert!(fast < slow);
    }

    #[test]
    fn static_particles_leave_the_cap() {
        // Zero velocity: the displacement bound is infinite, so the
        // configured maximum survives.
        let config = RunConfig::default();
        let pm = PmStepController::new();
        let dloga = pm.estimate_dloga(
            &uniform_dm(8, 0.0),
            &config,
            ScaleFactors::flat(1.0),
            &LocalComm,
        );
        assert_eq!(dloga, config.max_timestep_dloga);
    }

    #[test]
    fn fast_kind_never_constrains() {
        let mut config = RunConfig::default();
        let pm = PmStepController::new();
        let scale = ScaleFactors::flat(1.0);
        let store = uniform_dm(32, 1.0e6);
        let constrained = pm.estimate_dloga(&store, &config, scale, &LocalComm);
        assert!(constrained < config.max_timestep_dloga);
        config.fast_kind = Some(ParticleKind::DarkMatter);
        let ignored = pm.estimate_dloga(&store, &config, scale, &LocalComm);
        assert_eq!(ignored, config.max_timestep_dloga);
    }
}
