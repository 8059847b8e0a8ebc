//! Benchmark population profiles for the Strata scheduler.
//!
//! Provides deterministic, seeded particle populations spanning many
//! decades of acceleration so benchmarks exercise the full bin hierarchy
//! rather than a single bin.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_test_utils::{StoreBuilder, VecStore};

/// Build a mixed population of `n` particles with log-uniform
/// accelerations over six decades.
///
/// Roughly 80% dark matter, 15% gas, 4% stars and 1% sinks, in a
/// deterministic seed-dependent arrangement.
pub fn mixed_population(n: usize, seed: u64) -> VecStore {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut builder = StoreBuilder::new();
    for _ in 0..n {
        let accel_mag = 10f64.powf(rng.random_range(-2.0..4.0));
        let accel = [accel_mag, 0.0, 0.0];
        let roll: f64 = rng.random_range(0.0..1.0);
        builder = if roll < 0.80 {
            builder.dark_matter(1.0, accel)
        } else if roll < 0.95 {
            let sig = rng.random_range(1.0..100.0);
            builder.gas(0.5, accel, |fluid| {
                fluid.max_signal_speed = sig;
                fluid.smoothing_length = 0.1;
            })
        } else if roll < 0.99 {
            builder.star(1.0, accel)
        } else {
            let rate = rng.random_range(0.0..10.0);
            builder.black_hole(1.0, accel, 1.0e-3, rate, None)
        };
        let speed = rng.random_range(-100.0..100.0);
        builder = builder.with_velocity([speed, 0.0, 0.0]);
    }
    builder.build()
}
