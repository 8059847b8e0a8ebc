//! Quantization of admissible steps into the power-of-two bin hierarchy.

use strata_core::{floor_power_of_two, TimeBin, TIMEBASE, TIMEBINS};

/// A resolved tick count outside the representable range.
///
/// A rounded step of zero or one tick means the admissible step collapsed
/// below the timeline resolution (divergent acceleration); anything above
/// `TIMEBASE` would span more than one epoch. Both invalidate further
/// integration and are surfaced as faults, never silently clamped.
pub fn is_degenerate(rounded_ticks: u32) -> bool {
    rounded_ticks <= 1 || rounded_ticks > TIMEBASE
}

/// Quantizes desired steps against the cycle's active mask.
///
/// The mask is the one produced at the last synchronization point; a
/// particle whose step wants to grow may only move into a bin whose
/// cadence elapses at that point, otherwise it would silently skip the
/// force update its old, finer cadence was due for.
pub struct BinAssigner<'a> {
    active: &'a [bool; TIMEBINS],
}

impl<'a> BinAssigner<'a> {
    /// Bind the assigner to the current active mask.
    pub fn new(active: &'a [bool; TIMEBINS]) -> Self {
        Self { active }
    }

    /// Round `desired` down to a power of two.
    ///
    /// Callers check the result with [`is_degenerate`] before assigning.
    pub fn quantize(&self, desired: u32) -> u32 {
        floor_power_of_two(desired)
    }

    /// Assign a bin for a quantized step, walking a growing step back down
    /// to the nearest active bin.
    ///
    /// Returns the assigned bin and its step length in ticks.
    pub fn assign(&self, rounded_ticks: u32, current: TimeBin) -> (TimeBin, u32) {
        let mut bin = TimeBin::for_ticks(rounded_ticks);
        if bin > current {
            while bin > current && !self.active[bin.index()] {
                bin = TimeBin(bin.0 - 1);
            }
        }
        (bin, bin.ticks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_ACTIVE: [bool; TIMEBINS] = [true; TIMEBINS];

    #[test]
    fn spec_scenario_rounding_and_bins() {
        let assigner = BinAssigner::new(&ALL_ACTIVE);
        let cases = [(7u32, 4u32, 2u8), (100, 64, 6), (130, 128, 7)];
        for (desired, rounded, bin) in cases {
            let q = assigner.quantize(desired.min(128));
            assert_eq!(q, rounded.min(128));
            let (b, dti) = assigner.assign(q, TimeBin(1));
            assert_eq!(b, TimeBin(bin));
            assert_eq!(dti, rounded.min(128));
        }
    }

    #[test]
    fn degenerate_range() {
        assert!(is_degenerate(0));
        assert!(is_degenerate(1));
        assert!(!is_degenerate(2));
        assert!(!is_degenerate(TIMEBASE));
        assert!(is_degenerate(TIMEBASE + 1));
    }

    #[test]
    fn growth_blocked_by_inactive_bins() {
        let mut mask = [false; TIMEBINS];
        mask[0] = true;
        mask[3] = true;
        mask[4] = true;
        // Bin 6 wants to grow from bin 3 but bins 5 and 6 are inactive:
        // walk down to bin 4, the finest active bin above current.
        let assigner = BinAssigner::new(&mask);
        let (bin, dti) = assigner.assign(64, TimeBin(3));
        assert_eq!(bin, TimeBin(4));
        assert_eq!(dti, 16);
    }

    #[test]
    fn growth_falls_back_to_current_bin() {
        let mut mask = [false; TIMEBINS];
        mask[0] = true;
        mask[3] = true;
        let assigner = BinAssigner::new(&mask);
        let (bin, dti) = assigner.assign(64, TimeBin(3));
        assert_eq!(bin, TimeBin(3));
        assert_eq!(dti, 8);
    }

    #[test]
    fn shrinking_ignores_the_mask() {
        let mask = [false; TIMEBINS];
        let assigner = BinAssigner::new(&mask);
        let (bin, dti) = assigner.assign(4, TimeBin(6));
        assert_eq!(bin, TimeBin(2));
        assert_eq!(dti, 4);
    }

    proptest! {
        #[test]
        fn assigned_step_is_power_of_two_and_bounded(
            desired in 2u32..=TIMEBASE,
            current in 1u8..TIMEBINS as u8,
        ) {
            let assigner = BinAssigner::new(&ALL_ACTIVE);
            let rounded = assigner.quantize(desired);
            prop_assume!(!is_degenerate(rounded));
            let (bin, dti) = assigner.assign(rounded, TimeBin(current));
            prop_assert!(dti.is_power_of_two());
            prop_assert!(dti <= rounded);
            prop_assert_eq!(bin.ticks(), dti);
        }

        #[test]
        fn grown_bin_is_active_in_mask(
            desired in 2u32..=TIMEBASE,
            current in 1u8..TIMEBINS as u8,
            mask_bits in proptest::collection::vec(any::<bool>(), TIMEBINS),
        ) {
            let mut mask = [false; TIMEBINS];
            mask.copy_from_slice(&mask_bits);
            mask[0] = true;
            let assigner = BinAssigner::new(&mask);
            let rounded = assigner.quantize(desired);
            prop_assume!(!is_degenerate(rounded));
            let (bin, _) = assigner.assign(rounded, TimeBin(current));
            if bin > TimeBin(current) {
                prop_assert!(mask[bin.index()]);
            }
        }
    }
}
