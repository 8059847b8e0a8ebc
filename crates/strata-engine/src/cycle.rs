//! The per-cycle driver: decide new steps for active particles, kick
//! them, and keep the bin registry and PM descriptor in lockstep.

use std::error::Error;
use std::fmt;

use strata_core::{
    floor_power_of_two, kick_tick, CheckpointSink, DegenerateStep, KickError, KickFactors,
    ParticleStore, ReductionComm, ScaleFactors, SnapshotId, Tick, TimeBin, TIMEBASE,
};

use crate::active::ActiveList;
use crate::assign::{is_degenerate, BinAssigner};
use crate::config::RunConfig;
use crate::kick::KickIntegrator;
use crate::parallel::map_chunks;
use crate::pm::PmStepController;
use crate::policy::TimestepPolicy;
use crate::registry::{BinDelta, TimeBinRegistry};
use crate::sync;

// ── Errors ──────────────────────────────────────────────────────────────

/// Failure modes of a scheduler cycle.
#[derive(Debug)]
pub enum CycleError {
    /// One or more particles produced a step the timeline cannot hold.
    DegenerateSteps {
        /// Fault count summed across all ranks.
        global: u64,
        /// Diagnostics for this rank's offenders.
        local: Vec<DegenerateStep>,
    },
    /// A kick interval disagreed with a particle's recorded kick time.
    Kick(KickError),
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateSteps { global, local } => {
                write!(
                    f,
                    "{global} particle(s) produced degenerate timesteps ({} local)",
                    local.len()
                )
            }
            Self::Kick(err) => write!(f, "kick failed: {err}"),
        }
    }
}

impl Error for CycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kick(err) => Some(err),
            _ => None,
        }
    }
}

impl From<KickError> for CycleError {
    fn from(err: KickError) -> Self {
        Self::Kick(err)
    }
}

// ── Context and report ──────────────────────────────────────────────────

/// Per-cycle inputs that vary with simulation time.
pub struct CycleContext<'a> {
    /// Kick-factor and tick-mapping integrals at the current expansion
    /// state.
    pub factors: &'a dyn KickFactors,
    /// Scale-dependent prefactors at the current expansion state.
    pub scale: ScaleFactors,
    /// Reduction channel to the other ranks.
    pub comm: &'a dyn ReductionComm,
}

/// What a cycle did, for callers that log or assert on progress.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    /// Particles kicked this cycle.
    pub kicked: usize,
    /// PM step in ticks after the cycle.
    pub pm_step: u32,
    /// The forced uniform step, when equal timesteps are enabled.
    pub equal_step: Option<u32>,
    /// Whether the cycle fell on a PM boundary and re-estimated the step.
    pub pm_recomputed: bool,
}

// Outcome of the read-only decision pass for one active particle.
struct StepDecision {
    index: usize,
    bin: TimeBin,
    kick_start: Tick,
    kick_end: Tick,
}

struct ChunkOutcome {
    decisions: Vec<StepDecision>,
    delta: BinDelta,
    faults: Vec<DegenerateStep>,
}

// ── Scheduler ───────────────────────────────────────────────────────────

/// Owns the schedule state: the clock, the bin registry, the active list
/// and the PM descriptor.
pub struct Scheduler {
    config: RunConfig,
    registry: TimeBinRegistry,
    pm: PmStepController,
    active: ActiveList,
    current: Tick,
}

impl Scheduler {
    /// Validate `config` and start the schedule at the run origin, where
    /// every bin is active.
    pub fn new(config: RunConfig) -> Result<Self, crate::config::ConfigError> {
        config.validate()?;
        let mut registry = TimeBinRegistry::default();
        sync::mark_active_bins(&mut registry, Tick::ZERO);
        Ok(Self {
            config,
            registry,
            pm: PmStepController::new(),
            active: ActiveList::new(),
            current: Tick::ZERO,
        })
    }

    /// The validated run parameters.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Per-bin occupancy and activity.
    pub fn registry(&self) -> &TimeBinRegistry {
        &self.registry
    }

    /// The long-range step descriptor.
    pub fn pm(&self) -> &PmStepController {
        &self.pm
    }

    /// The scheduler clock.
    pub fn current_tick(&self) -> Tick {
        self.current
    }

    /// The cached active list from the last rebuild.
    pub fn active(&self) -> &ActiveList {
        &self.active
    }

    /// Rescan the store into the registry and active list.
    pub fn rebuild_active<S: ParticleStore + ?Sized>(&mut self, store: &S) {
        self.active.rebuild(&mut self.registry, store);
    }

    /// The next tick at which any occupied bin elapses, reduced across
    /// ranks.
    pub fn find_next_sync(&self, comm: &dyn ReductionComm) -> Tick {
        sync::find_next_sync(&self.registry, self.current, comm)
    }

    /// Move the clock to `to` and refresh the active mask for it.
    ///
    /// Returns how many particles changed activity state and will need a
    /// force update, summed over occupied bins.
    pub fn advance_clock(&mut self, to: Tick) -> u64 {
        self.current = to;
        sync::mark_active_bins(&mut self.registry, to)
    }

    /// Run one full cycle at the current tick over the active particles.
    ///
    /// With `half_step` set, kick intervals stop at the end of the
    /// elapsed step instead of the midpoint of the next one; this closes
    /// the velocities onto the positions for output.
    pub fn advance<S: ParticleStore>(
        &mut self,
        store: &mut S,
        ctx: &CycleContext<'_>,
        checkpoint: &mut dyn CheckpointSink,
        half_step: bool,
    ) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        let at_pm_boundary = self.pm.is_boundary(self.current);
        let pm_candidate = if at_pm_boundary {
            let step = self
                .pm
                .estimate_step(store, &self.config, ctx.scale, ctx.factors, ctx.comm);
            // A PM step never crosses the epoch boundary.
            let remaining = TIMEBASE - self.current.local;
            Some(step.min(floor_power_of_two(remaining)))
        } else {
            None
        };

        let equal_step = if self.config.force_equal_timesteps {
            Some(self.equal_step(store, ctx))
        } else {
            None
        };
        report.equal_step = equal_step;

        let workers = self.config.resolved_workers();
        let policy = TimestepPolicy::new(&self.config, ctx.scale);
        let assigner = BinAssigner::new(self.registry.active_mask());
        let indices = self.active.indices();
        let max_ticks = match pm_candidate {
            Some(step) => step,
            None => self.available_ticks(),
        };

        let outcomes = map_chunks(indices.len(), workers, |range| {
            let mut out = ChunkOutcome {
                decisions: Vec::with_capacity(range.len()),
                delta: BinDelta::default(),
                faults: Vec::new(),
            };
            for &i in &indices[range] {
                let desired = match equal_step {
                    Some(step) => step,
                    None => policy.desired(store, i, ctx.factors, max_ticks).ticks,
                };
                let rounded = assigner.quantize(desired);
                if is_degenerate(rounded) {
                    let (dloga, accel) = policy.desired_dloga(store, i, ctx.factors);
                    out.faults.push(DegenerateStep {
                        index: i,
                        kind: store.kind(i),
                        ticks: rounded,
                        dloga,
                        accel,
                    });
                    continue;
                }
                let old_bin = store.bin(i);
                let (bin, ticks) = assigner.assign(rounded, old_bin);
                if bin != old_bin {
                    out.delta.migrate(store.kind(i), old_bin, bin);
                }
                let step_start = store.step_start(i);
                let old_ticks = old_bin.ticks();
                let step_end = step_start.plus(old_ticks).normalized();
                let kick_end = if half_step {
                    step_end
                } else {
                    kick_tick(step_end, ticks)
                };
                out.decisions.push(StepDecision {
                    index: i,
                    bin,
                    kick_start: kick_tick(step_start, old_ticks),
                    kick_end,
                });
            }
            out
        });

        let mut faults: Vec<DegenerateStep> = Vec::new();
        let mut delta = BinDelta::default();
        let mut decisions: Vec<StepDecision> = Vec::new();
        for outcome in outcomes {
            faults.extend(outcome.faults);
            delta.merge(&outcome.delta);
            decisions.extend(outcome.decisions);
        }

        let global_faults = ctx.comm.sum_u64(faults.len() as u64);
        if global_faults > 0 {
            checkpoint.request_snapshot(SnapshotId::EMERGENCY);
            return Err(CycleError::DegenerateSteps {
                global: global_faults,
                local: faults,
            });
        }

        self.registry.apply(&delta);
        let kick = KickIntegrator::new(&self.config, ctx.scale, ctx.factors);
        for decision in &decisions {
            let i = decision.index;
            store.set_bin(i, decision.bin);
            store.set_step_start(i, self.current);
            kick.short_range_kick(store, i, decision.kick_start, decision.kick_end, decision.bin)?;
        }
        report.kicked = decisions.len();

        if let Some(new_step) = pm_candidate {
            let start = kick_tick(self.pm.start(), self.pm.step());
            let end = if half_step {
                self.current
            } else {
                kick_tick(self.current, new_step)
            };
            kick.long_range_kick(store, start, end);
            self.pm.commit(new_step);
            report.pm_recomputed = true;
        }
        report.pm_step = self.pm.step();

        Ok(report)
    }

    /// Apply the closing half kicks without touching bins or the clock.
    ///
    /// Each active particle is kicked from the start of its step to its
    /// midpoint, and the whole population gets the pending half of the
    /// PM kick. Together with a later `advance` at the same tick this is
    /// used to bracket drifted output states.
    pub fn half_kick<S: ParticleStore>(
        &self,
        store: &mut S,
        factors: &dyn KickFactors,
        scale: ScaleFactors,
    ) -> Result<(), CycleError> {
        let kick = KickIntegrator::new(&self.config, scale, factors);
        // Collect first: the active list borrows self, the kick needs
        // &mut store only.
        let plan: Vec<(usize, Tick, Tick, TimeBin)> = self
            .active
            .indices()
            .iter()
            .map(|&i| {
                let bin = store.bin(i);
                let start = store.step_start(i);
                (i, start, kick_tick(start, bin.ticks()), bin)
            })
            .collect();
        for (i, start, end, bin) in plan {
            kick.short_range_kick(store, i, start, end, bin)?;
        }
        let pm_start = self.pm.start();
        kick.long_range_kick(store, pm_start, kick_tick(pm_start, self.pm.step()));
        Ok(())
    }

    // Ticks left before the PM step elapses; particle steps never cross
    // a PM boundary. Saturates at zero: with no occupied bins anywhere,
    // the next sync point is the epoch boundary, which can lie past the
    // PM boundary.
    fn available_ticks(&self) -> u32 {
        let boundary = self.pm.start().linear() + u64::from(self.pm.step());
        boundary.saturating_sub(self.current.linear()) as u32
    }

    // Globally smallest desired step, in ticks, for forced-uniform runs.
    //
    // Degenerate desires are admitted on purpose: a collapsed minimum
    // propagates to every particle and aborts the cycle through the
    // ordinary fault path.
    fn equal_step<S: ParticleStore>(&self, store: &S, ctx: &CycleContext<'_>) -> u32 {
        let workers = self.config.resolved_workers();
        let policy = TimestepPolicy::new(&self.config, ctx.scale);
        let indices = self.active.indices();
        let max_ticks = if self.pm.step() > 0 {
            self.available_ticks()
        } else {
            TIMEBASE
        };
        let local = map_chunks(indices.len(), workers, |range| {
            let mut min = u64::from(TIMEBASE);
            for &i in &indices[range] {
                let ticks = u64::from(policy.desired(store, i, ctx.factors, max_ticks).ticks);
                min = min.min(ticks);
            }
            min
        })
        .into_iter()
        .fold(u64::from(TIMEBASE), u64::min);
        ctx.comm.min_u64(local) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::LocalComm;
    use strata_test_utils::{LinearFactors, RecordingSink, StoreBuilder};

    const RATE: f64 = 1.0e-6;

    fn context<'a>(factors: &'a LinearFactors) -> CycleContext<'a> {
        CycleContext {
            factors,
            scale: ScaleFactors::flat(1.0),
            comm: &LocalComm,
        }
    }

    fn quiet_config() -> RunConfig {
        RunConfig {
            workers: 1,
            ..RunConfig::default()
        }
    }

    #[test]
    fn new_scheduler_starts_with_everything_active() {
        let sched = Scheduler::new(quiet_config()).unwrap();
        assert_eq!(sched.current_tick(), Tick::ZERO);
        for b in 0..strata_core::TIMEBINS {
            assert!(sched.registry().is_active(TimeBin(b as u8)));
        }
    }

    #[test]
    fn first_cycle_assigns_bins_and_kicks() {
        let factors = LinearFactors::new(RATE);
        let mut store = StoreBuilder::new()
            .dark_matter(1.0, [1.0, 0.0, 0.0])
            .dark_matter(1.0, [100.0, 0.0, 0.0])
            .build();
        let mut sched = Scheduler::new(quiet_config()).unwrap();
        sched.rebuild_active(&store);
        let mut sink = RecordingSink::default();

        let report = sched
            .advance(&mut store, &context(&factors), &mut sink, false)
            .unwrap();

        assert_eq!(report.kicked, 2);
        assert!(report.pm_recomputed);
        // A gentler pull earns a longer step.
        assert!(store.bin(0).ticks() > store.bin(1).ticks());
        assert!(store.velocity(0)[0] > 0.0);
        assert!(sink.requests.is_empty());
    }

    #[test]
    fn equal_timesteps_put_everyone_in_one_bin() {
        let factors = LinearFactors::new(RATE);
        let mut store = StoreBuilder::new()
            .dark_matter(1.0, [1.0, 0.0, 0.0])
            .dark_matter(1.0, [100.0, 0.0, 0.0])
            .dark_matter(1.0, [25.0, 0.0, 0.0])
            .build();
        let mut config = quiet_config();
        config.force_equal_timesteps = true;
        let mut sched = Scheduler::new(config).unwrap();
        sched.rebuild_active(&store);
        let mut sink = RecordingSink::default();

        let report = sched
            .advance(&mut store, &context(&factors), &mut sink, false)
            .unwrap();

        assert!(report.equal_step.is_some());
        assert_eq!(store.bin(0), store.bin(1));
        assert_eq!(store.bin(1), store.bin(2));
    }

    #[test]
    fn equal_timesteps_propagate_a_collapsed_minimum() {
        let factors = LinearFactors::new(RATE);
        // One diverging particle drags the forced uniform step below one
        // tick, so every particle faults together.
        let mut store = StoreBuilder::new()
            .dark_matter(1.0, [1.0, 0.0, 0.0])
            .dark_matter(1.0, [1.0e30, 0.0, 0.0])
            .build();
        let mut config = quiet_config();
        config.force_equal_timesteps = true;
        let mut sched = Scheduler::new(config).unwrap();
        sched.rebuild_active(&store);
        let mut sink = RecordingSink::default();

        let err = sched
            .advance(&mut store, &context(&factors), &mut sink, false)
            .unwrap_err();

        match err {
            CycleError::DegenerateSteps { global, local } => {
                assert_eq!(global, 2);
                assert_eq!(local.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.requests, vec![SnapshotId::EMERGENCY]);
    }

    #[test]
    fn empty_schedule_survives_a_sync_past_the_pm_boundary() {
        let factors = LinearFactors::new(RATE);
        let mut store = StoreBuilder::new().build();
        let mut sched = Scheduler::new(quiet_config()).unwrap();
        sched.rebuild_active(&store);
        let mut sink = RecordingSink::default();
        sched
            .advance(&mut store, &context(&factors), &mut sink, false)
            .unwrap();

        // With no occupied bins the next sync is the epoch boundary,
        // well past the PM boundary.
        let next = sched.find_next_sync(&LocalComm);
        assert!(next.linear() > sched.pm().start().linear() + u64::from(sched.pm().step()));
        sched.advance_clock(next);

        let report = sched
            .advance(&mut store, &context(&factors), &mut sink, false)
            .unwrap();
        assert_eq!(report.kicked, 0);
    }

    #[test]
    fn degenerate_step_requests_emergency_snapshot() {
        let factors = LinearFactors::new(RATE);
        // An absurd acceleration drives the desired step below one tick.
        let mut store = StoreBuilder::new()
            .dark_matter(1.0, [1.0e30, 0.0, 0.0])
            .build();
        let mut sched = Scheduler::new(quiet_config()).unwrap();
        sched.rebuild_active(&store);
        let mut sink = RecordingSink::default();

        let err = sched
            .advance(&mut store, &context(&factors), &mut sink, false)
            .unwrap_err();

        match err {
            CycleError::DegenerateSteps { global, local } => {
                assert_eq!(global, 1);
                assert_eq!(local.len(), 1);
                assert_eq!(local[0].index, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.requests, vec![SnapshotId::EMERGENCY]);
    }

    #[test]
    fn clock_advance_reaches_the_next_sync() {
        let factors = LinearFactors::new(RATE);
        let mut store = StoreBuilder::new()
            .dark_matter(1.0, [1.0e-4, 0.0, 0.0])
            .build();
        let mut sched = Scheduler::new(quiet_config()).unwrap();
        sched.rebuild_active(&store);
        let mut sink = RecordingSink::default();
        sched
            .advance(&mut store, &context(&factors), &mut sink, false)
            .unwrap();
        sched.rebuild_active(&store);

        let next = sched.find_next_sync(&LocalComm);
        assert_eq!(next.linear(), u64::from(store.bin(0).ticks()));
        sched.advance_clock(next);
        assert_eq!(sched.current_tick(), next);
        assert!(sched.registry().is_active(store.bin(0)));
    }

    #[test]
    fn half_then_half_matches_one_full_kick() {
        // For tick-linear kick factors the two halves of a step are
        // additive, so closing and reopening must reproduce the plain
        // midpoint kick.
        let factors = LinearFactors::new(RATE);
        let build = || {
            StoreBuilder::new()
                .dark_matter(1.0, [2.0e-4, 0.0, 0.0])
                .build()
        };

        let mut full = build();
        let mut sched_full = Scheduler::new(quiet_config()).unwrap();
        sched_full.rebuild_active(&full);
        let mut sink = RecordingSink::default();
        sched_full
            .advance(&mut full, &context(&factors), &mut sink, false)
            .unwrap();

        let mut halved = build();
        let mut sched_half = Scheduler::new(quiet_config()).unwrap();
        sched_half.rebuild_active(&halved);
        sched_half
            .advance(&mut halved, &context(&factors), &mut sink, true)
            .unwrap();
        sched_half
            .half_kick(&mut halved, &factors, ScaleFactors::flat(1.0))
            .unwrap();

        assert!((full.velocity(0)[0] - halved.velocity(0)[0]).abs() < 1e-15);
    }
}
