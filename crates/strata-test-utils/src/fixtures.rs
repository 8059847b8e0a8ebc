//! In-memory particle store and its builder.

use strata_core::{
    AccretorState, FluidState, ParticleKind, ParticleStore, Tick, TimeBin,
};

/// One particle's worth of state, fully materialized.
#[derive(Clone, Debug)]
pub struct ParticleRecord {
    pub kind: ParticleKind,
    pub mass: f64,
    pub bin: TimeBin,
    pub step_start: Tick,
    pub velocity: [f64; 3],
    pub gravity_accel: [f64; 3],
    pub mesh_accel: [f64; 3],
    pub fluid: Option<FluidState>,
    pub accretor: Option<AccretorState>,
    pub kick_tick: Tick,
}

impl ParticleRecord {
    fn new(kind: ParticleKind, mass: f64, gravity_accel: [f64; 3]) -> Self {
        Self {
            kind,
            mass,
            bin: TimeBin(0),
            step_start: Tick::ZERO,
            velocity: [0.0; 3],
            gravity_accel,
            mesh_accel: [0.0; 3],
            fluid: None,
            accretor: None,
            kick_tick: Tick::ZERO,
        }
    }
}

/// Vec-backed [`ParticleStore`] with full kick-time bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct VecStore {
    records: Vec<ParticleRecord>,
}

impl VecStore {
    pub fn records(&self) -> &[ParticleRecord] {
        &self.records
    }

    pub fn set_gravity_accel(&mut self, i: usize, accel: [f64; 3]) {
        self.records[i].gravity_accel = accel;
    }

    pub fn set_mesh_accel(&mut self, i: usize, accel: [f64; 3]) {
        self.records[i].mesh_accel = accel;
    }
}

impl ParticleStore for VecStore {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn kind(&self, i: usize) -> ParticleKind {
        self.records[i].kind
    }

    fn mass(&self, i: usize) -> f64 {
        self.records[i].mass
    }

    fn bin(&self, i: usize) -> TimeBin {
        self.records[i].bin
    }

    fn set_bin(&mut self, i: usize, bin: TimeBin) {
        self.records[i].bin = bin;
    }

    fn step_start(&self, i: usize) -> Tick {
        self.records[i].step_start
    }

    fn set_step_start(&mut self, i: usize, tick: Tick) {
        self.records[i].step_start = tick;
    }

    fn velocity(&self, i: usize) -> [f64; 3] {
        self.records[i].velocity
    }

    fn set_velocity(&mut self, i: usize, vel: [f64; 3]) {
        self.records[i].velocity = vel;
    }

    fn gravity_accel(&self, i: usize) -> [f64; 3] {
        self.records[i].gravity_accel
    }

    fn mesh_accel(&self, i: usize) -> [f64; 3] {
        self.records[i].mesh_accel
    }

    fn fluid(&self, i: usize) -> Option<FluidState> {
        self.records[i].fluid
    }

    fn set_fluid_energy(&mut self, i: usize, energy: f64, energy_rate: f64) {
        if let Some(fluid) = &mut self.records[i].fluid {
            fluid.energy = energy;
            fluid.energy_rate = energy_rate;
        }
    }

    fn accretor(&self, i: usize) -> Option<AccretorState> {
        self.records[i].accretor
    }

    fn kick_tick(&self, i: usize) -> Option<Tick> {
        Some(self.records[i].kick_tick)
    }

    fn set_kick_tick(&mut self, i: usize, tick: Tick) {
        self.records[i].kick_tick = tick;
    }
}

/// Fluent construction of a [`VecStore`] for tests.
///
/// Every particle starts in bin 0 at tick zero with zero velocity; the
/// `with_*` methods adjust the most recently added particle.
#[derive(Clone, Debug, Default)]
pub struct StoreBuilder {
    records: Vec<ParticleRecord>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collisionless dark-matter particle.
    pub fn dark_matter(mut self, mass: f64, gravity_accel: [f64; 3]) -> Self {
        self.records
            .push(ParticleRecord::new(ParticleKind::DarkMatter, mass, gravity_accel));
        self
    }

    /// Add a star particle.
    pub fn star(mut self, mass: f64, gravity_accel: [f64; 3]) -> Self {
        self.records
            .push(ParticleRecord::new(ParticleKind::Star, mass, gravity_accel));
        self
    }

    /// Add a gas particle; `configure` adjusts its hydro state from a
    /// quiescent default.
    pub fn gas<F>(mut self, mass: f64, gravity_accel: [f64; 3], configure: F) -> Self
    where
        F: FnOnce(&mut FluidState),
    {
        let mut fluid = FluidState {
            hydro_accel: [0.0; 3],
            smoothing_length: 1.0,
            density: 1.0,
            max_signal_speed: 1.0,
            energy: 1.0,
            energy_rate: 0.0,
            eom_density: 1.0,
        };
        configure(&mut fluid);
        let mut record = ParticleRecord::new(ParticleKind::Gas, mass, gravity_accel);
        record.fluid = Some(fluid);
        self.records.push(record);
        self
    }

    /// Add a sink particle with the given accretion state.
    pub fn black_hole(
        mut self,
        mass: f64,
        gravity_accel: [f64; 3],
        accreted_mass: f64,
        accretion_rate: f64,
        bin_limit: Option<TimeBin>,
    ) -> Self {
        let mut record = ParticleRecord::new(ParticleKind::BlackHole, mass, gravity_accel);
        record.accretor = Some(AccretorState {
            mass: accreted_mass,
            accretion_rate,
            bin_limit,
        });
        self.records.push(record);
        self
    }

    /// Set the velocity of the most recently added particle.
    pub fn with_velocity(mut self, velocity: [f64; 3]) -> Self {
        if let Some(last) = self.records.last_mut() {
            last.velocity = velocity;
        }
        self
    }

    /// Set the mesh acceleration of the most recently added particle.
    pub fn with_mesh_accel(mut self, accel: [f64; 3]) -> Self {
        if let Some(last) = self.records.last_mut() {
            last.mesh_accel = accel;
        }
        self
    }

    pub fn build(self) -> VecStore {
        VecStore {
            records: self.records,
        }
    }
}
