//! Frame refresh loop.
//!
//! Each refresh latches the eight color words from the shared region, emits
//! the whole frame with interrupts masked, then waits the host-provided frame
//! delay. Until the host raises the handshake flag the string is kept dark.

use crate::frame::{Level, Pulses};
use crate::timing::{CycleCounter, CycleTiming, Deadline, NeoTiming};
use amp::led::{ColorWord, LedFrame, NUM_LEDS};
use amp::shm::consts::{HAL_INITIALIZED, MAX_FRAME_DELAY_MS};
use amp::shm::region::SharedRegion;
use embedded_hal::digital::OutputPin;
use tracing::{debug, info, warn};

/// Bit-banging driver for the LED string.
pub struct NeopixelDriver<P, C> {
    pin: P,
    counter: C,
    region: SharedRegion,
    timing: CycleTiming,
    frames: u32,
    announced: bool,
}

impl<P: OutputPin, C: CycleCounter> NeopixelDriver<P, C> {
    /// Driver with the reference board's timing.
    pub fn new(pin: P, counter: C, region: SharedRegion) -> Self {
        Self::with_timing(pin, counter, region, &NeoTiming::RGBW)
    }

    /// Driver with explicit wire timing.
    pub fn with_timing(pin: P, counter: C, region: SharedRegion, timing: &NeoTiming) -> Self {
        let timing = CycleTiming::new(timing, counter.frequency_hz());
        info!(
            hz = counter.frequency_hz(),
            one_high = timing.one_high,
            zero_high = timing.zero_high,
            reset = timing.reset,
            "neopixel driver ready"
        );
        Self {
            pin,
            counter,
            region,
            timing,
            frames: 0,
            announced: false,
        }
    }

    /// Cycle counts in use.
    pub fn timing(&self) -> &CycleTiming {
        &self.timing
    }

    /// Frames emitted so far, wrapping.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Give back the pin and counter.
    pub fn release(self) -> (P, C) {
        (self.pin, self.counter)
    }

    /// Colors to show now: the region's words once the host is ready,
    /// otherwise all off.
    pub fn latch_frame(&mut self) -> LedFrame {
        if self.region.init_flag() != HAL_INITIALIZED {
            if self.announced {
                debug!("host handshake dropped, blanking string");
                self.announced = false;
            }
            return [ColorWord::OFF; NUM_LEDS];
        }
        if !self.announced {
            debug!("host handshake seen, mirroring region");
            self.announced = true;
        }
        self.region.colors()
    }

    /// Emit `frame` with interrupts masked.
    ///
    /// The pin is left low. Pin errors abort the frame; the LEDs then see a
    /// short frame and keep their previous colors after the next latch.
    pub fn emit_frame(&mut self, frame: &LedFrame) -> Result<(), P::Error> {
        let Self {
            pin,
            counter,
            timing,
            ..
        } = self;
        let result = critical_section::with(|_cs| {
            pin.set_low()?;
            let mut deadline = Deadline::now(counter);
            for pulse in Pulses::new(frame, timing) {
                match pulse.level {
                    Level::High => pin.set_high()?,
                    Level::Low => pin.set_low()?,
                }
                deadline = deadline.after(pulse.cycles);
                deadline.spin(counter);
            }
            Ok(())
        });
        if result.is_ok() {
            self.frames = self.frames.wrapping_add(1);
        }
        result
    }

    /// Latch and emit one frame.
    pub fn refresh(&mut self) -> Result<LedFrame, P::Error> {
        let frame = self.latch_frame();
        self.emit_frame(&frame)?;
        Ok(frame)
    }

    /// Host-requested pause between frames, capped.
    pub fn frame_delay_ms(&self) -> u32 {
        self.region.frame_delay_ms().min(MAX_FRAME_DELAY_MS)
    }

    /// Busy-wait the frame delay, one millisecond at a time.
    pub fn wait_frame_delay(&mut self) {
        let mut deadline = Deadline::now(&mut self.counter);
        for _ in 0..self.frame_delay_ms() {
            deadline = deadline.after(self.timing.millisecond);
            deadline.spin(&mut self.counter);
        }
    }

    /// Refresh forever.
    pub fn run(&mut self) -> ! {
        loop {
            if self.refresh().is_err() {
                warn!(frame = self.frames, "neopixel pin write failed");
            }
            self.wait_frame_delay();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TOLERANCE_NS;
    use amp::led::BITS_PER_LED;
    use core::cell::{Cell, RefCell};
    use core::convert::Infallible;
    use std::rc::Rc;

    const HZ: u32 = 100_000_000;
    const NS_PER_CYCLE: u32 = 1_000_000_000 / HZ;

    #[derive(Clone)]
    struct Clock(Rc<Cell<u32>>);

    struct StepCounter {
        clock: Clock,
        step: u32,
    }

    impl CycleCounter for StepCounter {
        fn now(&mut self) -> u32 {
            let next = self.clock.0.get().wrapping_add(self.step);
            self.clock.0.set(next);
            next
        }

        fn frequency_hz(&self) -> u32 {
            HZ
        }
    }

    struct RecordingPin {
        clock: Clock,
        edges: Rc<RefCell<Vec<(bool, u32)>>>,
    }

    impl embedded_hal::digital::ErrorType for RecordingPin {
        type Error = Infallible;
    }

    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.edges.borrow_mut().push((false, self.clock.0.get()));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.edges.borrow_mut().push((true, self.clock.0.get()));
            Ok(())
        }
    }

    #[repr(C, align(8))]
    struct Backing([u8; 128]);

    struct Rig {
        driver: NeopixelDriver<RecordingPin, StepCounter>,
        edges: Rc<RefCell<Vec<(bool, u32)>>>,
        region: SharedRegion,
    }

    fn rig(backing: &mut Backing, step: u32) -> Rig {
        let clock = Clock(Rc::new(Cell::new(0)));
        let edges = Rc::new(RefCell::new(Vec::new()));
        let (base, len) = (backing.0.as_mut_ptr(), backing.0.len());
        // The driver and the test play the two cores, each with its own view.
        let (coprocessor, host) = unsafe {
            (SharedRegion::from_raw(base, len), SharedRegion::from_raw(base, len))
        };
        let pin = RecordingPin {
            clock: clock.clone(),
            edges: edges.clone(),
        };
        let counter = StepCounter { clock, step };
        Rig {
            driver: NeopixelDriver::new(pin, counter, coprocessor),
            edges,
            region: host,
        }
    }

    /// Durations of each level run, in ns, from the recorded transitions.
    fn phases(edges: &[(bool, u32)], end: u32) -> Vec<(bool, u32)> {
        let mut out = Vec::new();
        for (i, &(level, at)) in edges.iter().enumerate() {
            let until = edges.get(i + 1).map_or(end, |e| e.1);
            out.push((level, until.wrapping_sub(at) * NS_PER_CYCLE));
        }
        out
    }

    #[test]
    fn test_dark_until_handshake() {
        let mut backing = Backing([0; 128]);
        let mut rig = rig(&mut backing, 1);
        rig.region.set_color(0, ColorWord::RED_BRIGHT);

        assert_eq!(rig.driver.refresh().unwrap(), [ColorWord::OFF; NUM_LEDS]);

        rig.region.set_init_flag(HAL_INITIALIZED);
        let frame = rig.driver.refresh().unwrap();
        assert_eq!(frame[0], ColorWord::RED_BRIGHT);
        assert_eq!(rig.driver.frames(), 2);
    }

    #[test]
    fn test_frame_waveform_within_tolerance() {
        let mut backing = Backing([0; 128]);
        let mut rig = rig(&mut backing, 1);
        rig.region.set_init_flag(HAL_INITIALIZED);
        rig.region.set_color(0, ColorWord(0xFFFF_FFFF));
        rig.region.set_color(5, ColorWord::GREEN_BRIGHT);

        let frame = rig.driver.refresh().unwrap();
        let end = rig.driver.counter.clock.0.get();
        let edges = rig.edges.borrow();
        let phases = phases(&edges[1..], end);
        let timing = NeoTiming::RGBW;

        // Leading reset, 256 bits of two phases each, latch.
        assert_eq!(phases.len(), 2 + 2 * NUM_LEDS * BITS_PER_LED);
        let within = |got: u32, want: u32| got.abs_diff(want) <= TOLERANCE_NS;
        assert!(within(phases[0].1, timing.reset_ns));

        let mut expected_total = 0u32;
        for (led, color) in frame.iter().enumerate() {
            for bit in 0..BITS_PER_LED {
                let at = 1 + 2 * (led * BITS_PER_LED + bit);
                let (high, low) = (phases[at], phases[at + 1]);
                assert!(high.0 && !low.0);
                let (want_high, want_low) = if color.wire_bit(bit) {
                    (timing.one_high_ns, timing.one_low_ns)
                } else {
                    (timing.zero_high_ns, timing.zero_low_ns)
                };
                assert!(within(high.1, want_high), "led {led} bit {bit} high {}", high.1);
                assert!(within(low.1, want_low), "led {led} bit {bit} low {}", low.1);
                expected_total += want_high + want_low;
            }
        }
        let latch = phases.last().unwrap();
        assert!(!latch.0 && latch.1 >= crate::timing::MIN_RESET_NS);

        let bits_total: u32 = phases[1..phases.len() - 1].iter().map(|p| p.1).sum();
        assert!(bits_total.abs_diff(expected_total) <= TOLERANCE_NS);
        assert!(!edges.last().unwrap().0, "line left high");
    }

    #[test]
    fn test_coarse_counter_stays_in_tolerance() {
        // 30 ns per poll of the counter; overshoot on one phase is paid back
        // by the next.
        let mut backing = Backing([0; 128]);
        let mut rig = rig(&mut backing, 3);
        rig.region.set_init_flag(HAL_INITIALIZED);
        rig.region.set_color(2, ColorWord(0xA5A5_A5A5));

        rig.driver.refresh().unwrap();
        let end = rig.driver.counter.clock.0.get();
        let edges = rig.edges.borrow();
        for (level, ns) in phases(&edges[1..], end) {
            if level {
                assert!(ns >= 350 - TOLERANCE_NS && ns <= 700 + TOLERANCE_NS, "high {ns}");
            } else {
                assert!(ns >= 600 - TOLERANCE_NS, "low {ns}");
            }
        }
    }

    #[test]
    fn test_frame_delay_capped() {
        let mut backing = Backing([0; 128]);
        let mut rig = rig(&mut backing, 1_000);
        rig.region.set_frame_delay_ms(5_000);
        assert_eq!(rig.driver.frame_delay_ms(), MAX_FRAME_DELAY_MS);

        rig.region.set_frame_delay_ms(3);
        let start = rig.driver.counter.clock.0.get();
        rig.driver.wait_frame_delay();
        let waited = rig.driver.counter.clock.0.get().wrapping_sub(start);
        let ms = rig.driver.timing().millisecond;
        assert!(waited >= 3 * ms && waited < 3 * ms + 2_000, "{waited}");
    }
}
