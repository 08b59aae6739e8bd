//! HAL Core struct and supervision loop.
//!
//! The `HalCore` struct is the main entry point for HAL operations.
//! It owns the LED writer, the value handles of every input peripheral and
//! the threads running their edge engines.

use crate::button::{BUTTON_TABLE, ButtonCounter, ButtonEngine, ButtonHandler, ButtonState};
use crate::gpio::{CdevLines, EdgeSource, SimulatedInjector, SimulatedLines};
use crate::peripheral::PeripheralThread;
use crate::rotary::{QUADRATURE_TABLE, QuadState, RotaryDecoder, RotaryEncoder, RotaryEngine};
use amp::hal::config::HalConfig;
use amp::hal::consts::GPIO_CONSUMER;
use amp::hal::edge::LineId;
use amp::hal::error::{HalError, HalResult};
use amp_shared_memory::{LedWriter, Scanner};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Peripheral name of the rotary encoder.
pub const ROTARY_ENCODER: &str = "rotary_encoder";

/// Interval of the supervision loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Start-up switches that do not belong in the configuration file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreOptions {
    /// Use in-process edge sources instead of GPIO character devices.
    pub simulate: bool,
    /// Animate the LED string from the supervision loop.
    pub scanner: bool,
}

/// Values of every input at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSnapshot {
    /// Rotary encoder count.
    pub rotary: i32,
    /// Button counts by name.
    pub buttons: BTreeMap<String, i32>,
}

impl InputSnapshot {
    /// Render as a single-line JSON document.
    pub fn to_json(&self) -> HalResult<String> {
        serde_json::to_string(self).map_err(|e| HalError::Serialization(e.to_string()))
    }
}

/// HAL Core manages peripherals and the LED transport.
pub struct HalCore {
    /// Validated configuration
    config: HalConfig,
    /// Rotary encoder value handle
    rotary: RotaryEncoder,
    /// Button value handles, in configuration order
    buttons: Vec<ButtonCounter>,
    /// One thread per peripheral
    threads: Vec<PeripheralThread>,
    /// Edge injectors, present in simulation mode only
    simulators: HashMap<String, SimulatedInjector>,
    /// LED writer; absent if the window could not be mapped in simulation
    leds: Option<LedWriter>,
    /// LED animation driven by the loop
    scanner: Option<Scanner>,
    /// Running flag for loop control
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for HalCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HalCore")
            .field("threads", &self.threads)
            .field("leds", &self.leds.is_some())
            .field("simulated", &!self.simulators.is_empty())
            .finish_non_exhaustive()
    }
}

impl HalCore {
    /// Validate `config`, open the LED transport and start every input
    /// peripheral on its own thread.
    ///
    /// # Errors
    /// Configuration errors, GPIO line open failures, thread spawn
    /// failures, and (outside simulation) shared memory mapping failures.
    pub fn from_config(config: HalConfig, options: CoreOptions) -> HalResult<Self> {
        config.validate()?;

        let leds = match LedWriter::open(&config.shared_memory) {
            Ok(writer) => {
                if let Ok(dump) = writer.dump() {
                    debug!("Shared region after init:\n{dump}");
                }
                Some(writer)
            }
            Err(e) if options.simulate => {
                warn!(
                    device = %config.shared_memory.device.display(),
                    error = %e,
                    "LED transport unavailable, continuing without LEDs"
                );
                None
            }
            Err(e) => return Err(HalError::SharedMemory(e.to_string())),
        };

        let mut core = Self {
            rotary: RotaryEncoder::from_config(&config.rotary_encoder),
            buttons: Vec::with_capacity(config.buttons.len()),
            threads: Vec::with_capacity(config.buttons.len() + 1),
            simulators: HashMap::new(),
            leds,
            scanner: options.scanner.then(Scanner::default),
            running: Arc::new(AtomicBool::new(true)),
            config,
        };

        let encoder = &core.config.rotary_encoder;
        let lines = [LineId(encoder.line_a), LineId(encoder.line_b)];
        let chip = encoder.chip.clone();
        let source = core.open_source(ROTARY_ENCODER, &chip, &lines, options.simulate)?;
        let engine = RotaryEngine::configure(
            ROTARY_ENCODER,
            source,
            lines,
            QuadState::Rest,
            &QUADRATURE_TABLE,
            RotaryDecoder::new(core.rotary.clone()),
        );
        core.threads.push(PeripheralThread::spawn(engine)?);

        for button in core.config.buttons.clone() {
            let counter = ButtonCounter::from_config(&button);
            let line = LineId(button.line);
            let source = core.open_source(&button.name, &button.chip, &[line], options.simulate)?;
            let engine = ButtonEngine::configure(
                button.name.clone(),
                source,
                [line],
                ButtonState::Released,
                &BUTTON_TABLE,
                ButtonHandler::new(counter.clone()),
            )
            .with_lockout(button.debounce());
            core.threads.push(PeripheralThread::spawn(engine)?);
            core.buttons.push(counter);
        }

        info!(
            peripherals = core.threads.len(),
            simulate = options.simulate,
            leds = core.leds.is_some(),
            "HalCore created"
        );
        Ok(core)
    }

    fn open_source(
        &mut self,
        name: &str,
        chip: &Path,
        lines: &[LineId],
        simulate: bool,
    ) -> HalResult<Box<dyn EdgeSource>> {
        if simulate {
            let (source, injector) = SimulatedLines::new(lines);
            self.simulators.insert(name.to_string(), injector);
            Ok(Box::new(source))
        } else {
            Ok(Box::new(CdevLines::open(chip, lines, GPIO_CONSUMER)?))
        }
    }

    /// Rotary encoder value handle.
    pub fn rotary(&self) -> &RotaryEncoder {
        &self.rotary
    }

    /// Button value handle by configured name.
    pub fn button(&self, name: &str) -> Option<&ButtonCounter> {
        self.buttons.iter().find(|b| b.name() == name)
    }

    /// LED writer, if the transport is open.
    pub fn leds(&self) -> Option<&LedWriter> {
        self.leds.as_ref()
    }

    /// Edge injector for a peripheral, in simulation mode.
    pub fn simulator(&self, name: &str) -> Option<&SimulatedInjector> {
        self.simulators.get(name)
    }

    /// Configuration the core was built from.
    pub fn config(&self) -> &HalConfig {
        &self.config
    }

    /// Get the running flag for external shutdown control.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Current value of every input.
    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            rotary: self.rotary.get_value(),
            buttons: self
                .buttons
                .iter()
                .map(|b| (b.name().to_string(), b.get_value()))
                .collect(),
        }
    }

    /// Supervise until the running flag is cleared.
    ///
    /// Logs input changes, advances the scanner animation and fails if a
    /// peripheral thread exits on its own.
    pub fn run(&mut self) -> HalResult<()> {
        info!(interval_ms = POLL_INTERVAL.as_millis() as u64, "Starting HalCore loop...");
        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        let mut last = self.snapshot();
        info!(rotary = last.rotary, buttons = ?last.buttons, "Initial input values");

        while self.running.load(Ordering::SeqCst) {
            std::thread::sleep(POLL_INTERVAL);

            if let Some(index) = self.threads.iter().position(PeripheralThread::is_finished) {
                let thread = self.threads.swap_remove(index);
                let name = thread.name().to_string();
                thread.join()?;
                return Err(HalError::Wait(format!("{name} stopped unexpectedly")));
            }

            let now = self.snapshot();
            if now != last {
                info!(rotary = now.rotary, buttons = ?now.buttons, "Input changed");
                trace!(snapshot = %now.to_json()?, "Input snapshot");
                last = now;
            }

            if let (Some(scanner), Some(leds)) = (self.scanner.as_mut(), self.leds.as_ref()) {
                if let Some(frame) = scanner.next() {
                    leds.set_leds(&frame)
                        .map_err(|e| HalError::SharedMemory(e.to_string()))?;
                }
            }
        }

        info!("HalCore loop stopped");
        Ok(())
    }

    /// Stop and join every peripheral thread, then close the LED writer.
    ///
    /// Every thread is joined even if an earlier one failed; the first
    /// error is returned.
    pub fn shutdown(&mut self) -> HalResult<()> {
        info!("Shutting down HalCore...");
        self.running.store(false, Ordering::SeqCst);

        for thread in &self.threads {
            thread.stop();
        }
        let mut first_error = None;
        for thread in self.threads.drain(..) {
            let name = thread.name().to_string();
            match thread.join() {
                Ok(stats) => debug!(
                    peripheral = %name,
                    dispatched = stats.dispatched,
                    discarded = stats.discarded,
                    "Peripheral joined"
                ),
                Err(e) => {
                    warn!(peripheral = %name, error = %e, "Peripheral failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        self.simulators.clear();

        if let Some(leds) = self.leds.take() {
            if let Err(e) = leds.close() {
                first_error.get_or_insert(HalError::SharedMemory(e.to_string()));
            }
        }

        info!("HalCore shutdown complete");
        first_error.map_or(Ok(()), Err)
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: queries the calling thread's own policy.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp::hal::config::ButtonConfig;

    fn offline_config() -> HalConfig {
        let mut config = HalConfig::default();
        config.shared_memory.device = "/nonexistent/mem".into();
        config
    }

    #[test]
    fn test_simulated_core_without_leds() {
        let mut core = HalCore::from_config(
            offline_config(),
            CoreOptions {
                simulate: true,
                scanner: true,
            },
        )
        .unwrap();
        assert!(core.leds().is_none());
        assert!(core.simulator(ROTARY_ENCODER).is_some());
        assert!(core.simulator("encoder_push").is_some());
        assert!(core.simulator("joystick_push").is_some());
        assert_eq!(core.snapshot().buttons.len(), 2);
        assert_eq!(
            core.snapshot().to_json().unwrap(),
            r#"{"rotary":0,"buttons":{"encoder_push":0,"joystick_push":0}}"#
        );
        core.shutdown().unwrap();
    }

    #[test]
    fn test_hardware_mode_requires_leds() {
        let err = HalCore::from_config(offline_config(), CoreOptions::default()).unwrap_err();
        assert!(matches!(err, HalError::SharedMemory(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = offline_config();
        config.buttons.push(ButtonConfig::encoder_push());
        let err = HalCore::from_config(
            config,
            CoreOptions {
                simulate: true,
                scanner: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, HalError::Config(_)));
    }

    #[test]
    fn test_run_returns_when_flag_cleared() {
        let mut core = HalCore::from_config(
            offline_config(),
            CoreOptions {
                simulate: true,
                scanner: false,
            },
        )
        .unwrap();
        core.running_flag().store(false, Ordering::SeqCst);
        core.run().unwrap();
        core.shutdown().unwrap();
    }
}
