//! Wire-phase state machine for one frame.
//!
//! ```text
//! Reset ─► High(0,0) ─► Low(0,0) ─► High(0,1) ─► ... ─► Low(7,31) ─► Latch ─► Done
//! ```
//!
//! Each phase yields the line level and how many cycles to hold it. The
//! machine is pure; the driver walks it inside a critical section.

use crate::timing::CycleTiming;
use amp::led::{BITS_PER_LED, LedFrame, NUM_LEDS};

/// Line level of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Driven high.
    High,
    /// Driven low.
    Low,
}

/// Position in the frame waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WirePhase {
    /// Leading line-low so the first bit is not appended to a previous frame.
    Reset,
    /// High part of bit `bit` of LED `led`.
    High {
        /// LED index.
        led: u8,
        /// Wire bit index, 0 = most significant.
        bit: u8,
    },
    /// Low part of bit `bit` of LED `led`.
    Low {
        /// LED index.
        led: u8,
        /// Wire bit index, 0 = most significant.
        bit: u8,
    },
    /// Trailing line-low that latches the frame.
    Latch,
    /// Frame complete.
    Done,
}

/// One step of the waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    /// Level to drive.
    pub level: Level,
    /// Cycles to hold it.
    pub cycles: u32,
}

impl WirePhase {
    /// Pulse for this phase and the phase that follows it, or `None` once
    /// the frame is complete.
    pub fn step(self, frame: &LedFrame, timing: &CycleTiming) -> Option<(Pulse, WirePhase)> {
        let (level, cycles, next) = match self {
            WirePhase::Reset => (Level::Low, timing.reset, WirePhase::High { led: 0, bit: 0 }),
            WirePhase::High { led, bit } => {
                let cycles = if frame[led as usize].wire_bit(bit as usize) {
                    timing.one_high
                } else {
                    timing.zero_high
                };
                (Level::High, cycles, WirePhase::Low { led, bit })
            }
            WirePhase::Low { led, bit } => {
                let cycles = if frame[led as usize].wire_bit(bit as usize) {
                    timing.one_low
                } else {
                    timing.zero_low
                };
                let next = if (bit as usize) + 1 < BITS_PER_LED {
                    WirePhase::High { led, bit: bit + 1 }
                } else if (led as usize) + 1 < NUM_LEDS {
                    WirePhase::High { led: led + 1, bit: 0 }
                } else {
                    WirePhase::Latch
                };
                (Level::Low, cycles, next)
            }
            WirePhase::Latch => (Level::Low, timing.reset, WirePhase::Done),
            WirePhase::Done => return None,
        };
        Some((Pulse { level, cycles }, next))
    }
}

/// Iterator over the pulses of one frame.
#[derive(Debug, Clone)]
pub struct Pulses<'a> {
    frame: &'a LedFrame,
    timing: &'a CycleTiming,
    phase: WirePhase,
}

impl<'a> Pulses<'a> {
    /// Pulses of `frame`, starting with the leading reset.
    pub fn new(frame: &'a LedFrame, timing: &'a CycleTiming) -> Self {
        Self {
            frame,
            timing,
            phase: WirePhase::Reset,
        }
    }
}

impl Iterator for Pulses<'_> {
    type Item = Pulse;

    fn next(&mut self) -> Option<Pulse> {
        let (pulse, next) = self.phase.step(self.frame, self.timing)?;
        self.phase = next;
        Some(pulse)
    }
}
