//! The integer timeline: [`Tick`] coordinates and [`TimeBin`] cadences.
//!
//! The full run duration is subdivided into epochs of [`TIMEBASE`] ticks
//! (one epoch spans one snapshot interval). A tick is represented as two
//! explicit fields rather than a packed bit layout, so bin arithmetic only
//! ever sees the local part.

use std::fmt;

/// Number of timestep bins. Bin indices run `0..TIMEBINS`.
pub const TIMEBINS: usize = 21;

/// Ticks per snapshot epoch. Equal to the cadence of the coarsest bin, so
/// every bin's cadence is an exact power-of-two divisor of the epoch length.
pub const TIMEBASE: u32 = 1 << (TIMEBINS - 1);

/// A coordinate on the fixed-resolution integer timeline.
///
/// `local` is the position within the current epoch, in `0..=TIMEBASE`;
/// a value of exactly `TIMEBASE` denotes the epoch boundary and can be
/// folded into the next epoch with [`Tick::normalized`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tick {
    /// Snapshot-epoch number.
    pub epoch: u32,
    /// Tick within the epoch, `0..=TIMEBASE`.
    pub local: u32,
}

impl Tick {
    /// The start of the run.
    pub const ZERO: Tick = Tick { epoch: 0, local: 0 };

    /// Construct from an epoch number and a local tick.
    pub fn new(epoch: u32, local: u32) -> Self {
        debug_assert!(local <= TIMEBASE, "local tick {local} exceeds TIMEBASE");
        Self { epoch, local }
    }

    /// Linear coordinate over the whole run, for ordering and reductions.
    pub fn linear(self) -> u64 {
        u64::from(self.epoch) * u64::from(TIMEBASE) + u64::from(self.local)
    }

    /// Inverse of [`Tick::linear`]. Always produces `local < TIMEBASE`.
    pub fn from_linear(linear: u64) -> Self {
        let base = u64::from(TIMEBASE);
        Self {
            epoch: u32::try_from(linear / base).unwrap_or(u32::MAX),
            local: (linear % base) as u32,
        }
    }

    /// Advance by `dti` ticks within the current epoch.
    ///
    /// Step lengths are power-of-two divisors of `TIMEBASE`, so a step that
    /// starts inside an epoch always ends at or before its boundary.
    pub fn plus(self, dti: u32) -> Self {
        Self::new(self.epoch, self.local + dti)
    }

    /// Fold a tick sitting exactly on the epoch boundary into the next epoch.
    pub fn normalized(self) -> Self {
        if self.local == TIMEBASE {
            Self::new(self.epoch + 1, 0)
        } else {
            self
        }
    }

    /// Tick distance to a later tick.
    pub fn delta_to(self, later: Tick) -> u32 {
        debug_assert!(later.linear() >= self.linear());
        (later.linear() - self.linear()) as u32
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.epoch, self.local)
    }
}

/// The kick time of a step: its start plus half its length.
pub fn kick_tick(start: Tick, step: u32) -> Tick {
    start.plus(step / 2)
}

/// Index into the step-size hierarchy.
///
/// Bin `b >= 1` holds particles stepping every `2^b` ticks. Bin 0 is the
/// always-active bin with a zero-length step: freshly injected particles
/// sit there until the next assignment pass gives them a real cadence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBin(pub u8);

impl TimeBin {
    /// The coarsest representable bin.
    pub const MAX: TimeBin = TimeBin((TIMEBINS - 1) as u8);

    /// Step length in ticks: `2^bin`, except bin 0 which is zero-length.
    pub fn ticks(self) -> u32 {
        debug_assert!((self.0 as usize) < TIMEBINS);
        if self.0 == 0 {
            0
        } else {
            1 << self.0
        }
    }

    /// Array index for per-bin tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The bin whose cadence equals `dti` ticks.
    ///
    /// Zero maps to bin 0; any other value maps to `floor(log2(dti))`.
    /// Callers are expected to have rounded `dti` to a power of two and
    /// rejected degenerate values first.
    pub fn for_ticks(dti: u32) -> Self {
        if dti == 0 {
            TimeBin(0)
        } else {
            TimeBin((31 - dti.leading_zeros()) as u8)
        }
    }
}

impl fmt::Display for TimeBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Round down to the nearest power of two; zero stays zero.
pub fn floor_power_of_two(value: u32) -> u32 {
    if value == 0 {
        0
    } else {
        1 << (31 - value.leading_zeros())
    }
}
