//! # AMP NeoPixel (coprocessor side)
//!
//! Regenerates the host's LED commands as the single-wire waveform RGBW
//! LEDs decode, with no timer peripheral: every phase is a spin on the
//! core's cycle counter.
//!
//! ```text
//! SharedRegion ──latch──► LedFrame ──Pulses──► OutputPin
//!  (init_flag,             8 × u32             High/Low + cycles,
//!   color0..7,                                 critical section
//!   frame delay)
//! ```
//!
//! The firmware supplies an [`embedded_hal::digital::OutputPin`], a
//! [`timing::CycleCounter`] and the region from
//! [`SharedRegion::coprocessor`](amp::shm::region::SharedRegion::coprocessor),
//! then calls [`NeopixelDriver::run`].

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod driver;
pub mod frame;
pub mod timing;

pub use driver::NeopixelDriver;
pub use frame::{Level, Pulse, Pulses, WirePhase};
pub use timing::{CycleCounter, CycleTiming, Deadline, NeoTiming};
