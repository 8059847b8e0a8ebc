//! Integration test: multi-rank schedule agreement.
//!
//! Runs the same scheduler on two ranks holding different particle
//! subsets, wired together through an in-process reduction group, and
//! asserts that both ranks derive bit-identical synchronization points
//! and PM steps on every cycle.

use strata_core::{ReductionComm, ScaleFactors, Tick};
use strata_engine::cycle::{CycleContext, Scheduler};
use strata_engine::RunConfig;
use strata_test_utils::{CommGroup, GroupComm, LinearFactors, RecordingSink, StoreBuilder, VecStore};

const RATE: f64 = 1.0e-6;
const CYCLES: usize = 12;

fn rank_store(rank: usize) -> VecStore {
    // Different populations per rank, so agreement has to come from the
    // reductions rather than from symmetric local data.
    match rank {
        0 => StoreBuilder::new()
            .dark_matter(1.0, [1.0, 0.0, 0.0])
            .dark_matter(1.0, [25.0, 0.0, 0.0])
            .build(),
        _ => StoreBuilder::new()
            .dark_matter(1.0, [100.0, 0.0, 0.0])
            .build(),
    }
}

fn run_rank(comm: GroupComm) -> Vec<(u64, u32)> {
    let factors = LinearFactors::new(RATE);
    let ctx = CycleContext {
        factors: &factors,
        scale: ScaleFactors::flat(1.0),
        comm: &comm,
    };
    let mut store = rank_store(comm.rank());
    let mut sched = Scheduler::new(RunConfig {
        workers: 1,
        ..RunConfig::default()
    })
    .unwrap();
    let mut sink = RecordingSink::default();

    let mut trace = Vec::new();
    sched.rebuild_active(&store);
    let report = sched.advance(&mut store, &ctx, &mut sink, false).unwrap();
    trace.push((Tick::ZERO.linear(), report.pm_step));

    for _ in 0..CYCLES {
        sched.rebuild_active(&store);
        let next = sched.find_next_sync(&comm);
        sched.advance_clock(next);
        sched.rebuild_active(&store);
        let report = sched.advance(&mut store, &ctx, &mut sink, false).unwrap();
        trace.push((next.linear(), report.pm_step));
    }
    trace
}

#[test]
fn two_ranks_agree_on_every_sync_point() {
    let handles: Vec<_> = CommGroup::new(2)
        .into_iter()
        .map(|comm| std::thread::spawn(move || run_rank(comm)))
        .collect();
    let traces: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert_eq!(traces[0], traces[1]);
    // The schedule made real progress.
    let last = traces[0].last().unwrap();
    assert!(last.0 > 0);
    assert!(last.1 > 0);
}

#[test]
fn global_minimum_wins_the_sync_race() {
    // Rank 1 holds the fastest particle; rank 0's first resync must land
    // on rank 1's cadence even though rank 0 has nothing that fast.
    let handles: Vec<_> = CommGroup::new(2)
        .into_iter()
        .map(|comm| std::thread::spawn(move || run_rank(comm)))
        .collect();
    let traces: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    let first_resync = traces[0][1].0;
    // accel 100 on rank 1 resolves to a 4096-tick cadence, shorter than
    // anything rank 0 holds.
    assert_eq!(first_resync, 4096);
}
