//! Velocity and internal-energy updates over half-step kick intervals.

use strata_core::{KickError, KickFactors, ParticleStore, ScaleFactors, Tick, TimeBin, GAMMA};

use crate::config::RunConfig;

/// Applies kicks between two points on the tick timeline.
///
/// The integrator is stateless apart from borrowed run parameters; the
/// interval endpoints are supplied per call so the same instance serves
/// both the regular midpoint-to-midpoint kicks and the half kicks around
/// snapshots.
pub struct KickIntegrator<'a> {
    config: &'a RunConfig,
    scale: ScaleFactors,
    factors: &'a dyn KickFactors,
}

impl<'a> KickIntegrator<'a> {
    /// Bind the run parameters and the kick-factor mapping for one cycle.
    pub fn new(config: &'a RunConfig, scale: ScaleFactors, factors: &'a dyn KickFactors) -> Self {
        Self {
            config,
            scale,
            factors,
        }
    }

    /// Kick particle `i` from `start` to `end` with its short-range
    /// acceleration, then integrate its internal energy if it is fluid.
    ///
    /// `next_bin` is the bin the particle will occupy after this cycle;
    /// the energy rate is limited so the next predicted half step cannot
    /// overdraw the energy reservoir.
    pub fn short_range_kick<S: ParticleStore + ?Sized>(
        &self,
        store: &mut S,
        i: usize,
        start: Tick,
        end: Tick,
        next_bin: TimeBin,
    ) -> Result<(), KickError> {
        if cfg!(debug_assertions) {
            if let Some(recorded) = store.kick_tick(i) {
                if recorded != start {
                    return Err(KickError::TimeMismatch {
                        index: i,
                        expected: start,
                        recorded,
                    });
                }
            }
        }
        store.set_kick_tick(i, end);

        let fgrav = self.factors.grav_kick(start, end);
        let grav = store.gravity_accel(i);
        let mut vel = store.velocity(i);
        for d in 0..3 {
            vel[d] += grav[d] * fgrav;
        }

        if let Some(fluid) = store.fluid(i) {
            let fhydro = self.factors.hydro_kick(start, end);
            for d in 0..3 {
                vel[d] += fluid.hydro_accel[d] * fhydro;
            }

            // Runaway-velocity guard: rescale to the configured cap,
            // measured in peculiar velocity units.
            let velfac = self.scale.a3inv.sqrt();
            let speed = (vel[0] * vel[0] + vel[1] * vel[1] + vel[2] * vel[2]).sqrt();
            let cap = self.config.max_gas_velocity * velfac;
            if speed > cap {
                let shrink = cap / speed;
                for v in &mut vel {
                    *v *= shrink;
                }
            }
            store.set_velocity(i, vel);

            self.integrate_energy(store, i, start, end, next_bin);
        } else {
            store.set_velocity(i, vel);
        }
        Ok(())
    }

    fn integrate_energy<S: ParticleStore + ?Sized>(
        &self,
        store: &mut S,
        i: usize,
        start: Tick,
        end: Tick,
        next_bin: TimeBin,
    ) {
        let Some(fluid) = store.fluid(i) else {
            return;
        };
        let dt_entr = self.factors.dloga_from_dti(start.delta_to(end));

        let mut energy = fluid.energy;
        let mut rate = fluid.energy_rate;

        // Cooling can at most halve the energy per interval; anything
        // steeper is truncated rather than extrapolated.
        if rate * dt_entr < -0.5 * energy {
            energy *= 0.5;
        } else {
            energy += rate * dt_entr;
        }

        // Optional temperature floor, expressed as internal energy at the
        // particle's own equation-of-state density.
        if self.config.min_energy > 0.0 {
            let floor = self.config.min_energy
                / (fluid.eom_density * self.scale.a3inv).powf(GAMMA - 1.0)
                * (GAMMA - 1.0);
            if energy < floor {
                energy = floor;
                rate = 0.0;
            }
        }

        // Limit the rate so the first half of the next step cannot drain
        // more than half the reservoir.
        let dt_next = self.factors.dloga_for_bin(next_bin) / 2.0;
        if dt_next > 0.0 && rate * dt_next < -0.5 * energy {
            rate = -0.5 * energy / dt_next;
        }

        store.set_fluid_energy(i, energy, rate);
    }

    /// Kick every particle from `start` to `end` with its long-range
    /// mesh acceleration.
    pub fn long_range_kick<S: ParticleStore + ?Sized>(&self, store: &mut S, start: Tick, end: Tick) {
        let fmesh = self.factors.mesh_kick(start, end);
        for i in 0..store.len() {
            let mesh = store.mesh_accel(i);
            let mut vel = store.velocity(i);
            for d in 0..3 {
                vel[d] += mesh[d] * fmesh;
            }
            store.set_velocity(i, vel);
        }
    }
}
