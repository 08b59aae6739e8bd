//! Edge sources.
//!
//! An [`EdgeSource`] delivers line transitions to an engine. The engine's
//! thread blocks inside [`EdgeSource::wait_edges`]; that call is the only
//! suspension point of a peripheral thread, and [`Interrupt::interrupt`]
//! is the only way to wake it from another thread.
//!
//! | Source            | Backend                                  |
//! |-------------------|------------------------------------------|
//! | [`CdevLines`]     | Linux GPIO character device (v2 uAPI)    |
//! | [`SimulatedLines`]| In-process channel, driven by tests/CLI  |

use amp::hal::edge::{EdgeEvent, LineId};
use amp::hal::error::HalResult;
use std::sync::Arc;

pub mod cdev;
pub mod simulated;

pub use cdev::CdevLines;
pub use simulated::{SimulatedInjector, SimulatedLines};

/// Wakes a thread blocked in [`EdgeSource::wait_edges`].
pub trait Interrupt: Send + Sync {
    /// Make the pending (or next) wait return promptly.
    fn interrupt(&self);
}

/// Producer of edge events for a fixed set of lines.
pub trait EdgeSource: Send {
    /// Lines this source reports events for.
    fn lines(&self) -> &[LineId];

    /// Block until at least one event is available, then append every
    /// available event to `out` in arrival order.
    ///
    /// Returns the number of events appended. `Ok(0)` means the wait was
    /// interrupted.
    fn wait_edges(&mut self, out: &mut Vec<EdgeEvent>) -> HalResult<usize>;

    /// Handle that interrupts this source's wait from another thread.
    fn interrupter(&self) -> Arc<dyn Interrupt>;
}

impl<S: EdgeSource + ?Sized> EdgeSource for Box<S> {
    fn lines(&self) -> &[LineId] {
        (**self).lines()
    }

    fn wait_edges(&mut self, out: &mut Vec<EdgeEvent>) -> HalResult<usize> {
        (**self).wait_edges(out)
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        (**self).interrupter()
    }
}
