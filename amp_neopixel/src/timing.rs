//! Wire timing and cycle-counter deadlines.
//!
//! Every delay is a spin on a free-running cycle counter until a target
//! count is reached. Targets are chained from the previous target rather
//! than from "now", so time spent toggling the pin is absorbed instead of
//! accumulated.

use static_assertions::const_assert;

/// Waveform durations required by the LEDs, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeoTiming {
    /// High phase of a `1` bit.
    pub one_high_ns: u32,
    /// Low phase of a `1` bit.
    pub one_low_ns: u32,
    /// High phase of a `0` bit.
    pub zero_high_ns: u32,
    /// Low phase of a `0` bit.
    pub zero_low_ns: u32,
    /// Line-low time that latches a frame. The LEDs need at least 50 µs.
    pub reset_ns: u32,
}

/// Minimum latch time accepted by the LEDs.
pub const MIN_RESET_NS: u32 = 50_000;

/// Allowed deviation of any single phase.
pub const TOLERANCE_NS: u32 = 150;

impl NeoTiming {
    /// Timing of the RGBW string on the reference board.
    pub const RGBW: Self = Self {
        one_high_ns: 700,
        one_low_ns: 600,
        zero_high_ns: 350,
        zero_low_ns: 800,
        reset_ns: 60_000,
    };

    /// Duration of a `1` bit.
    pub const fn one_period_ns(&self) -> u32 {
        self.one_high_ns + self.one_low_ns
    }

    /// Duration of a `0` bit.
    pub const fn zero_period_ns(&self) -> u32 {
        self.zero_high_ns + self.zero_low_ns
    }
}

const_assert!(NeoTiming::RGBW.reset_ns >= MIN_RESET_NS);
const_assert!(NeoTiming::RGBW.one_high_ns > NeoTiming::RGBW.zero_high_ns);

/// Free-running cycle counter, wrapping at `u32::MAX`.
pub trait CycleCounter {
    /// Current count.
    fn now(&mut self) -> u32;

    /// Count rate in Hz.
    fn frequency_hz(&self) -> u32;
}

/// Nearest whole number of cycles for `ns` at `hz`.
pub const fn ns_to_cycles(ns: u32, hz: u32) -> u32 {
    ((ns as u64 * hz as u64 + 500_000_000) / 1_000_000_000) as u32
}

/// Cycle count of every phase at one counter frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    /// High phase of a `1` bit.
    pub one_high: u32,
    /// Low phase of a `1` bit.
    pub one_low: u32,
    /// High phase of a `0` bit.
    pub zero_high: u32,
    /// Low phase of a `0` bit.
    pub zero_low: u32,
    /// Latch.
    pub reset: u32,
    /// One millisecond.
    pub millisecond: u32,
}

impl CycleTiming {
    /// Convert `timing` for a counter running at `hz`.
    pub const fn new(timing: &NeoTiming, hz: u32) -> Self {
        Self {
            one_high: ns_to_cycles(timing.one_high_ns, hz),
            one_low: ns_to_cycles(timing.one_low_ns, hz),
            zero_high: ns_to_cycles(timing.zero_high_ns, hz),
            zero_low: ns_to_cycles(timing.zero_low_ns, hz),
            reset: ns_to_cycles(timing.reset_ns, hz),
            millisecond: ns_to_cycles(1_000_000, hz),
        }
    }
}

/// Absolute target on a wrapping cycle counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    target: u32,
}

impl Deadline {
    /// Deadline at the current count.
    pub fn now<C: CycleCounter>(counter: &mut C) -> Self {
        Self {
            target: counter.now(),
        }
    }

    /// Target count.
    pub const fn target(self) -> u32 {
        self.target
    }

    /// Deadline `cycles` after this one.
    #[must_use]
    pub const fn after(self, cycles: u32) -> Self {
        Self {
            target: self.target.wrapping_add(cycles),
        }
    }

    /// Whether `now` is at or past the target.
    ///
    /// Valid while the two are less than half the counter range apart.
    #[inline]
    pub const fn reached(self, now: u32) -> bool {
        (now.wrapping_sub(self.target) as i32) >= 0
    }

    /// Busy-wait until the target.
    #[inline]
    pub fn spin<C: CycleCounter>(self, counter: &mut C) {
        while !self.reached(counter.now()) {
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ns_to_cycles_rounds() {
        assert_eq!(ns_to_cycles(700, 100_000_000), 70);
        assert_eq!(ns_to_cycles(350, 800_000_000), 280);
        assert_eq!(ns_to_cycles(1, 600_000_000), 1);
        assert_eq!(ns_to_cycles(60_000, 800_000_000), 48_000);
    }

    #[test]
    fn test_cycle_timing() {
        let t = CycleTiming::new(&NeoTiming::RGBW, 100_000_000);
        assert_eq!((t.one_high, t.one_low), (70, 60));
        assert_eq!((t.zero_high, t.zero_low), (35, 80));
        assert_eq!(t.reset, 6_000);
        assert_eq!(t.millisecond, 100_000);
    }

    #[test]
    fn test_deadline_wraps() {
        let start = Deadline { target: u32::MAX - 10 };
        let end = start.after(20);
        assert_eq!(end.target(), 9);
        assert!(!end.reached(u32::MAX - 5));
        assert!(!end.reached(8));
        assert!(end.reached(9));
        assert!(end.reached(100));
    }

    struct Ticker(u32);

    impl CycleCounter for Ticker {
        fn now(&mut self) -> u32 {
            self.0 = self.0.wrapping_add(3);
            self.0
        }

        fn frequency_hz(&self) -> u32 {
            1_000
        }
    }

    #[test]
    fn test_spin_stops_at_first_count_past_target() {
        let mut ticker = Ticker(u32::MAX - 4);
        let deadline = Deadline { target: u32::MAX - 4 }.after(10);
        deadline.spin(&mut ticker);
        assert_eq!(ticker.0, 7);
    }

    #[test]
    fn test_periods() {
        assert_eq!(NeoTiming::RGBW.one_period_ns(), 1_300);
        assert_eq!(NeoTiming::RGBW.zero_period_ns(), 1_150);
    }
}
