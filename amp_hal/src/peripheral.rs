//! One OS thread per input peripheral.

use crate::engine::{EngineStats, Peripheral, StopHandle};
use amp::hal::error::{HalError, HalResult};
use std::any::Any;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Handle to a peripheral engine running on its own named thread.
#[derive(Debug)]
pub struct PeripheralThread {
    name: String,
    stop: StopHandle,
    handle: Option<JoinHandle<HalResult<EngineStats>>>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl PeripheralThread {
    /// Start `peripheral.run()` on a thread named after the peripheral.
    pub fn spawn<P: Peripheral>(mut peripheral: P) -> HalResult<Self> {
        let name = peripheral.name().to_string();
        let stop = peripheral.stop_handle();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || peripheral.run())
            .map_err(|e| HalError::ThreadSpawn(format!("{name}: {e}")))?;
        debug!(peripheral = %name, "peripheral thread started");
        Ok(Self {
            name,
            stop,
            handle: Some(handle),
        })
    }

    /// Peripheral name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the engine to stop; does not wait.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether the thread has exited, by stop, error or panic.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the thread and return the engine's result.
    ///
    /// Call [`stop`](Self::stop) first unless the engine already exited.
    pub fn join(mut self) -> HalResult<EngineStats> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> HalResult<EngineStats> {
        let Some(handle) = self.handle.take() else {
            return Ok(EngineStats::default());
        };
        match handle.join() {
            Ok(result) => result,
            Err(payload) => Err(HalError::ThreadPanicked(format!(
                "{}: {}",
                self.name,
                panic_message(payload.as_ref())
            ))),
        }
    }
}

impl Drop for PeripheralThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
            if let Err(e) = self.join_inner() {
                warn!(peripheral = %self.name, error = %e, "peripheral exited with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::{BUTTON_TABLE, ButtonCounter, ButtonEngine, ButtonHandler, ButtonState};
    use crate::gpio::{SimulatedInjector, SimulatedLines};
    use amp::hal::edge::{Edge, LineId};
    use std::time::{Duration, Instant};

    const LINE: LineId = LineId(10);

    fn button() -> (ButtonEngine<SimulatedLines>, ButtonCounter, SimulatedInjector) {
        let (lines, inject) = SimulatedLines::new(&[LINE]);
        let counter = ButtonCounter::new("test_button", 0, 100, 0);
        let engine = ButtonEngine::configure(
            "test_button",
            lines,
            [LINE],
            ButtonState::Released,
            &BUTTON_TABLE,
            ButtonHandler::new(counter.clone()),
        );
        (engine, counter, inject)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_thread_named_and_joined() {
        let (engine, counter, inject) = button();
        let thread = PeripheralThread::spawn(engine).unwrap();
        assert_eq!(thread.name(), "test_button");

        inject.press_release(LINE).unwrap();
        inject.press_release(LINE).unwrap();
        wait_for(|| counter.get_value() == 2);

        thread.stop();
        let stats = thread.join().unwrap();
        assert_eq!(stats.dispatched, 4);
    }

    #[test]
    fn test_stop_unblocks_idle_thread() {
        let (engine, _counter, _inject) = button();
        let thread = PeripheralThread::spawn(engine).unwrap();
        thread::sleep(Duration::from_millis(10));
        assert!(!thread.is_finished());
        thread.stop();
        assert_eq!(thread.join().unwrap(), EngineStats::default());
    }

    #[test]
    fn test_panic_surfaces_on_join() {
        let (engine, _counter, inject) = button();
        let thread = PeripheralThread::spawn(engine).unwrap();
        inject.edge_at(LineId(99), Edge::Falling, 1).unwrap();
        wait_for(|| thread.is_finished());

        match thread.join() {
            Err(HalError::ThreadPanicked(msg)) => {
                assert!(msg.contains("unconfigured line"), "{msg}");
            }
            other => panic!("expected panic error, got {other:?}"),
        }
    }

    #[test]
    fn test_drop_stops_thread() {
        let (engine, counter, inject) = button();
        {
            let _thread = PeripheralThread::spawn(engine).unwrap();
        }
        // Source is gone once the engine thread has been joined.
        assert!(inject.edge_at(LINE, Edge::Falling, 0).is_err());
        assert_eq!(counter.get_value(), 0);
    }
}
