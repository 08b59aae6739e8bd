//! Debounced momentary push button.
//!
//! Buttons are active low: pressing pulls the line down. The counter
//! advances once per release and wraps from `end - 1` back to `start`.
//! Every physical button uses this same machine; instances differ only in
//! line and bounds.

use crate::engine::{ActionHandler, EdgeEngine, Row, StateIndex, Transition};
use amp::hal::config::ButtonConfig;
use amp::hal::edge::EdgeEvent;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    /// Line high.
    Released,
    /// Line low.
    Pressed,
}

impl StateIndex for ButtonState {
    const COUNT: usize = 2;

    fn index(self) -> usize {
        self as usize
    }
}

/// Button action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Pressed to released.
    Release,
}

/// One line; `[rising, falling]`.
pub static BUTTON_TABLE: [Row<ButtonState, ButtonAction, 1>; ButtonState::COUNT] = [
    // Released
    [[
        Transition::to(ButtonState::Released),
        Transition::to(ButtonState::Pressed),
    ]],
    // Pressed
    [[
        Transition::with(ButtonState::Released, ButtonAction::Release),
        Transition::to(ButtonState::Pressed),
    ]],
];

#[derive(Debug, Clone, Copy)]
struct Range {
    start: i32,
    end: i32,
}

#[derive(Debug)]
struct Counter {
    name: String,
    value: AtomicI32,
    // Bounds change together and rarely; the value stays lock-free.
    range: Mutex<Range>,
}

/// Shared handle to a button's wrapping counter.
#[derive(Debug, Clone)]
pub struct ButtonCounter {
    inner: Arc<Counter>,
}

impl ButtonCounter {
    /// Counter over `[start, end)` starting at `default`.
    ///
    /// # Panics
    /// Panics if `start >= end` or `default` is outside `[start, end)`.
    pub fn new(name: impl Into<String>, start: i32, end: i32, default: i32) -> Self {
        let name = name.into();
        assert!(start < end, "{name}: start {start} must be below end {end}");
        assert!(
            (start..end).contains(&default),
            "{name}: default {default} outside [{start}, {end})"
        );
        Self {
            inner: Arc::new(Counter {
                name,
                value: AtomicI32::new(default),
                range: Mutex::new(Range { start, end }),
            }),
        }
    }

    /// Build from a validated configuration.
    pub fn from_config(config: &ButtonConfig) -> Self {
        Self::new(config.name.clone(), config.start, config.end, config.default)
    }

    fn range(&self) -> std::sync::MutexGuard<'_, Range> {
        self.inner
            .range
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Button name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current count.
    pub fn get_value(&self) -> i32 {
        self.inner.value.load(Ordering::Acquire)
    }

    /// First value of the range.
    pub fn start_value(&self) -> i32 {
        self.range().start
    }

    /// One past the last value of the range.
    pub fn end_value(&self) -> i32 {
        self.range().end
    }

    /// Move the start of the range. A count that falls outside the new
    /// range restarts at `value`.
    ///
    /// # Panics
    /// Panics if `value >= end`; nothing is changed in that case.
    pub fn set_start_value(&self, value: i32) {
        let mut range = self.range();
        assert!(
            value < range.end,
            "{}: start {value} must be below end {}",
            self.inner.name,
            range.end
        );
        range.start = value;
        self.rehome(*range);
    }

    /// Move the end of the range. A count that falls outside the new
    /// range restarts at the start.
    ///
    /// # Panics
    /// Panics if `value <= start`; nothing is changed in that case.
    pub fn set_end_value(&self, value: i32) {
        let mut range = self.range();
        assert!(
            value > range.start,
            "{}: end {value} must be above start {}",
            self.inner.name,
            range.start
        );
        range.end = value;
        self.rehome(*range);
    }

    /// Overwrite the count.
    ///
    /// # Panics
    /// Panics if `value` is outside `[start, end)`.
    pub fn set_default_value(&self, value: i32) {
        let range = self.range();
        assert!(
            (range.start..range.end).contains(&value),
            "{}: default {value} outside [{}, {})",
            self.inner.name,
            range.start,
            range.end
        );
        self.inner.value.store(value, Ordering::Release);
    }

    fn rehome(&self, range: Range) {
        let _ = self
            .inner
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (!(range.start..range.end).contains(&v)).then_some(range.start)
            });
    }

    /// Count one release.
    fn advance(&self) -> i32 {
        let range = *self.range();
        let step = |v: i32| match v.checked_add(1) {
            Some(next) if next < range.end => next,
            _ => range.start,
        };
        match self
            .inner
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(step(v)))
        {
            Ok(previous) | Err(previous) => step(previous),
        }
    }
}

/// Action handler advancing a [`ButtonCounter`].
#[derive(Debug)]
pub struct ButtonHandler {
    counter: ButtonCounter,
}

impl ButtonHandler {
    /// Handler driving `counter`.
    pub fn new(counter: ButtonCounter) -> Self {
        Self { counter }
    }

    /// Handle to the driven count.
    pub fn counter(&self) -> &ButtonCounter {
        &self.counter
    }
}

impl ActionHandler<ButtonAction> for ButtonHandler {
    fn handle(&mut self, action: ButtonAction, event: &EdgeEvent) {
        match action {
            ButtonAction::Release => {
                let value = self.counter.advance();
                debug!(
                    button = self.counter.name(),
                    value,
                    ts = event.timestamp_ns,
                    "button released"
                );
            }
        }
    }
}

/// Single-line engine running the button table.
pub type ButtonEngine<Src> = EdgeEngine<Src, ButtonState, ButtonAction, ButtonHandler, 1>;
