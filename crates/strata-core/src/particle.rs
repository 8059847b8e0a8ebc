//! Particle kinds and the external particle-store seam.

use crate::tick::{Tick, TimeBin};

/// Number of particle kinds.
pub const KIND_COUNT: usize = 6;

/// Particle species.
///
/// The scheduler never creates or destroys particles; the kind selects
/// which timestep bounds apply (fluid particles get the Courant bound,
/// black holes the accretion bounds) and which softening/density entries
/// are read from the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    /// Fluid (SPH) particles; the only kind with hydro state.
    Gas,
    /// Collisionless dark matter.
    DarkMatter,
    /// Collisionless disk particles.
    Disk,
    /// Collisionless bulge particles.
    Bulge,
    /// Star particles.
    Star,
    /// Massive accreting particles (sinks).
    BlackHole,
}

impl ParticleKind {
    /// All kinds, in table order.
    pub const ALL: [ParticleKind; KIND_COUNT] = [
        ParticleKind::Gas,
        ParticleKind::DarkMatter,
        ParticleKind::Disk,
        ParticleKind::Bulge,
        ParticleKind::Star,
        ParticleKind::BlackHole,
    ];

    /// Array index for per-kind tables.
    pub fn index(self) -> usize {
        match self {
            ParticleKind::Gas => 0,
            ParticleKind::DarkMatter => 1,
            ParticleKind::Disk => 2,
            ParticleKind::Bulge => 3,
            ParticleKind::Star => 4,
            ParticleKind::BlackHole => 5,
        }
    }

    /// Whether particles of this kind carry hydro state.
    pub fn is_fluid(self) -> bool {
        matches!(self, ParticleKind::Gas)
    }
}

/// Hydro state of a fluid particle, read by the timestep policy and
/// mutated (energy fields only) by the kick integrator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluidState {
    /// Hydrodynamic acceleration.
    pub hydro_accel: [f64; 3],
    /// Smoothing length.
    pub smoothing_length: f64,
    /// Mass density.
    pub density: f64,
    /// Maximum signal speed seen in the last force evaluation.
    pub max_signal_speed: f64,
    /// Internal energy per unit mass.
    pub energy: f64,
    /// Rate of change of the internal energy, per unit log scale factor.
    pub energy_rate: f64,
    /// Energy-of-motion weighted density, used for the energy floor.
    pub eom_density: f64,
}

/// Accretion state of a sink particle, read-only to the scheduler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccretorState {
    /// Accreted mass.
    pub mass: f64,
    /// Accretion rate.
    pub accretion_rate: f64,
    /// Externally imposed coarsest admissible bin, if any.
    pub bin_limit: Option<TimeBin>,
}

/// Indexed access to the externally owned particle fields.
///
/// The scheduler reads force and mass fields and mutates only the schedule
/// fields (bin, step start) and the kinematic fields (velocity, fluid
/// energy). Read-only passes run on scoped worker threads, hence the `Sync`
/// bound; all mutation goes through `&mut self` in a sequential apply pass.
pub trait ParticleStore: Sync {
    /// Number of local particles.
    fn len(&self) -> usize;

    /// Whether the local particle set is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Species of particle `i`.
    fn kind(&self, i: usize) -> ParticleKind;

    /// Mass of particle `i`.
    fn mass(&self, i: usize) -> f64;

    /// Current timestep bin of particle `i`.
    fn bin(&self, i: usize) -> TimeBin;

    /// Move particle `i` to a new bin.
    fn set_bin(&mut self, i: usize, bin: TimeBin);

    /// Tick at which particle `i`'s current step began.
    fn step_start(&self, i: usize) -> Tick;

    /// Record the start of particle `i`'s new step.
    fn set_step_start(&mut self, i: usize, tick: Tick);

    /// Velocity of particle `i`.
    fn velocity(&self, i: usize) -> [f64; 3];

    /// Overwrite the velocity of particle `i`.
    fn set_velocity(&mut self, i: usize, vel: [f64; 3]);

    /// Short-range (tree) gravitational acceleration of particle `i`.
    fn gravity_accel(&self, i: usize) -> [f64; 3];

    /// Long-range (mesh) gravitational acceleration of particle `i`.
    fn mesh_accel(&self, i: usize) -> [f64; 3];

    /// Hydro state of particle `i`, if it is a fluid particle.
    fn fluid(&self, i: usize) -> Option<FluidState>;

    /// Write back the integrated internal energy and its clamped rate.
    fn set_fluid_energy(&mut self, i: usize, energy: f64, energy_rate: f64);

    /// Accretion state of particle `i`, if it is a sink.
    fn accretor(&self, i: usize) -> Option<AccretorState>;

    /// Tick up to which particle `i`'s velocity has been kicked.
    ///
    /// Optional bookkeeping for the debug-only kick-time consistency check;
    /// stores that do not track it return `None` and the check is skipped.
    fn kick_tick(&self, i: usize) -> Option<Tick> {
        let _ = i;
        None
    }

    /// Record the tick up to which particle `i` has now been kicked.
    fn set_kick_tick(&mut self, i: usize, tick: Tick) {
        let _ = (i, tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_indices_cover_table() {
        for (i, kind) in ParticleKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn only_gas_is_fluid() {
        assert!(ParticleKind::Gas.is_fluid());
        for kind in &ParticleKind::ALL[1..] {
            assert!(!kind.is_fluid());
        }
    }
}
