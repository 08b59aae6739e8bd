//! Quadrature rotary encoder.
//!
//! Four states over lines A and B. A detent is only committed when the
//! sequence returns to rest in the direction latched when it left rest, so
//! partial or reversed rotations produce no count change.
//!
//! | Detent | Edge order                           | Effect      |
//! |--------|--------------------------------------|-------------|
//! | CW     | A falls, B falls, A rises, B rises   | `+increment`|
//! | CCW    | B falls, A falls, B rises, A rises   | `-decrement`|

use crate::engine::{ActionHandler, EdgeEngine, Row, StateIndex, Transition};
use amp::hal::config::RotaryEncoderConfig;
use amp::hal::edge::EdgeEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::debug;

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadState {
    /// Both lines high.
    Rest,
    /// A led the way out of rest, or B led the way back.
    Ccw,
    /// Both lines low.
    Undetermined,
    /// B led the way out of rest, or A led the way back.
    Cw,
}

impl StateIndex for QuadState {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        self as usize
    }
}

/// Decoder action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadAction {
    /// Forget the latched direction.
    ClearDirection,
    /// Rotation started clockwise.
    LatchCw,
    /// Rotation started counter-clockwise.
    LatchCcw,
    /// Back at rest after a clockwise-looking finish.
    Increment,
    /// Back at rest after a counter-clockwise-looking finish.
    Decrement,
}

use QuadAction as Act;
use QuadState as Q;

/// Slot 0 is line A, slot 1 is line B; each pair is `[rising, falling]`.
pub static QUADRATURE_TABLE: [Row<QuadState, QuadAction, 2>; QuadState::COUNT] = [
    // Rest
    [
        [Transition::with(Q::Rest, Act::ClearDirection), Transition::with(Q::Ccw, Act::LatchCw)],
        [Transition::with(Q::Rest, Act::ClearDirection), Transition::with(Q::Cw, Act::LatchCcw)],
    ],
    // Ccw
    [
        [Transition::with(Q::Rest, Act::Decrement), Transition::to(Q::Ccw)],
        [Transition::to(Q::Ccw), Transition::to(Q::Undetermined)],
    ],
    // Undetermined
    [
        [Transition::to(Q::Cw), Transition::to(Q::Undetermined)],
        [Transition::to(Q::Ccw), Transition::to(Q::Undetermined)],
    ],
    // Cw
    [
        [Transition::to(Q::Cw), Transition::to(Q::Undetermined)],
        [Transition::with(Q::Rest, Act::Increment), Transition::to(Q::Cw)],
    ],
];

#[derive(Debug)]
struct Bounds {
    value: AtomicI32,
    min: AtomicI32,
    max: AtomicI32,
    increment: AtomicI32,
    decrement: AtomicI32,
}

/// Shared handle to a decoder's count and bounds.
///
/// Clones observe and configure the same decoder. Reads are lock-free from
/// any thread; only the decoder thread changes the count through rotation.
#[derive(Debug, Clone)]
pub struct RotaryEncoder {
    inner: Arc<Bounds>,
}

impl Default for RotaryEncoder {
    fn default() -> Self {
        Self::from_config(&RotaryEncoderConfig::default())
    }
}

impl RotaryEncoder {
    /// Build from a validated configuration.
    pub fn from_config(config: &RotaryEncoderConfig) -> Self {
        Self {
            inner: Arc::new(Bounds {
                value: AtomicI32::new(config.default),
                min: AtomicI32::new(config.min),
                max: AtomicI32::new(config.max),
                increment: AtomicI32::new(config.increment),
                decrement: AtomicI32::new(config.decrement),
            }),
        }
    }

    /// Current count.
    pub fn get_value(&self) -> i32 {
        self.inner.value.load(Ordering::Acquire)
    }

    /// Lower bound.
    pub fn min_value(&self) -> i32 {
        self.inner.min.load(Ordering::Acquire)
    }

    /// Upper bound.
    pub fn max_value(&self) -> i32 {
        self.inner.max.load(Ordering::Acquire)
    }

    /// Step added per clockwise detent.
    pub fn increment_value(&self) -> i32 {
        self.inner.increment.load(Ordering::Acquire)
    }

    /// Step subtracted per counter-clockwise detent.
    pub fn decrement_value(&self) -> i32 {
        self.inner.decrement.load(Ordering::Acquire)
    }

    /// Overwrite the count.
    ///
    /// # Panics
    /// Panics if `value` is negative or outside `[min, max]`.
    pub fn set_default_value(&self, value: i32) {
        assert!(value >= 0, "rotary default {value} is negative");
        let (min, max) = (self.min_value(), self.max_value());
        assert!(
            (min..=max).contains(&value),
            "rotary default {value} outside [{min}, {max}]"
        );
        self.inner.value.store(value, Ordering::Release);
    }

    /// Change the lower bound, raising the count into range.
    ///
    /// # Panics
    /// Panics if `value` is negative or above the upper bound.
    pub fn set_min_value(&self, value: i32) {
        assert!(value >= 0, "rotary min {value} is negative");
        let max = self.max_value();
        assert!(value <= max, "rotary min {value} above max {max}");
        self.inner.min.store(value, Ordering::Release);
        let _ = self
            .inner
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (v < value).then_some(value)
            });
    }

    /// Change the upper bound, lowering the count into range.
    ///
    /// # Panics
    /// Panics if `value` is negative or below the lower bound.
    pub fn set_max_value(&self, value: i32) {
        assert!(value >= 0, "rotary max {value} is negative");
        let min = self.min_value();
        assert!(value >= min, "rotary max {value} below min {min}");
        self.inner.max.store(value, Ordering::Release);
        let _ = self
            .inner
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (v > value).then_some(value)
            });
    }

    /// # Panics
    /// Panics if `value` is negative.
    pub fn set_increment_value(&self, value: i32) {
        assert!(value >= 0, "rotary increment {value} is negative");
        self.inner.increment.store(value, Ordering::Release);
    }

    /// # Panics
    /// Panics if `value` is negative.
    pub fn set_decrement_value(&self, value: i32) {
        assert!(value >= 0, "rotary decrement {value} is negative");
        self.inner.decrement.store(value, Ordering::Release);
    }

    /// Apply one clockwise detent. No-op at the upper bound.
    fn step_up(&self) -> i32 {
        let (max, step) = (self.max_value(), self.increment_value());
        match self
            .inner
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (v < max).then(|| v.saturating_add(step).min(max))
            }) {
            Ok(previous) => previous.saturating_add(step).min(max),
            Err(current) => current,
        }
    }

    /// Apply one counter-clockwise detent. No-op at the lower bound.
    fn step_down(&self) -> i32 {
        let (min, step) = (self.min_value(), self.decrement_value());
        match self
            .inner
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (v > min).then(|| v.saturating_sub(step).max(min))
            }) {
            Ok(previous) => previous.saturating_sub(step).max(min),
            Err(current) => current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    None,
    Cw,
    Ccw,
}

/// Action handler holding the direction latched on leaving rest.
#[derive(Debug)]
pub struct RotaryDecoder {
    encoder: RotaryEncoder,
    latched: Direction,
}

impl RotaryDecoder {
    /// Decoder driving `encoder`.
    pub fn new(encoder: RotaryEncoder) -> Self {
        Self {
            encoder,
            latched: Direction::None,
        }
    }

    /// Handle to the driven count.
    pub fn encoder(&self) -> &RotaryEncoder {
        &self.encoder
    }
}

impl ActionHandler<QuadAction> for RotaryDecoder {
    fn handle(&mut self, action: QuadAction, event: &EdgeEvent) {
        match action {
            QuadAction::ClearDirection => self.latched = Direction::None,
            QuadAction::LatchCw => self.latched = Direction::Cw,
            QuadAction::LatchCcw => self.latched = Direction::Ccw,
            QuadAction::Increment => {
                if self.latched == Direction::Cw {
                    let value = self.encoder.step_up();
                    debug!(value, ts = event.timestamp_ns, "rotary clockwise");
                }
                self.latched = Direction::None;
            }
            QuadAction::Decrement => {
                if self.latched == Direction::Ccw {
                    let value = self.encoder.step_down();
                    debug!(value, ts = event.timestamp_ns, "rotary counter-clockwise");
                }
                self.latched = Direction::None;
            }
        }
    }
}

/// Two-line engine running the quadrature table.
pub type RotaryEngine<Src> = EdgeEngine<Src, QuadState, QuadAction, RotaryDecoder, 2>;
