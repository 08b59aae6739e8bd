//! # AMP HAL Library
//!
//! Input side of the application core: edge-triggered state machines that
//! turn bouncy GPIO lines into clean counts, plus the supervision core that
//! ties them to the LED transport.
//!
//! # Module Structure
//!
//! - [`engine`] - Table-driven edge state machine engine
//! - [`gpio`] - Edge sources (GPIO character device, simulated)
//! - [`rotary`] - Quadrature rotary encoder
//! - [`button`] - Debounced wrapping button counter
//! - [`peripheral`] - One thread per peripheral
//! - [`core`] - HalCore struct, supervision loop
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     amp_hal (single crate)                       │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ EdgeSource   │──►│ EdgeEngine   │──►│ RotaryEncoder /      │  │
//! │  │ (cdev / sim) │   │ (own thread) │   │ ButtonCounter atomics│  │
//! │  └──────────────┘   └──────────────┘   └──────────┬───────────┘  │
//! │                                                   │ get_value()  │
//! │  ┌──────────────┐   ┌──────────────┐              ▼              │
//! │  │ LedWriter    │◄──│   HalCore    │◄──── consumers / loop       │
//! │  │ (/dev/mem)   │   │              │                             │
//! │  └──────────────┘   └──────────────┘                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod button;
pub mod core;
pub mod engine;
pub mod gpio;
pub mod peripheral;
pub mod rotary;

// Re-export key types for convenience
pub use crate::button::{ButtonCounter, ButtonEngine};
pub use crate::core::{CoreOptions, HalCore, InputSnapshot};
pub use crate::engine::{EdgeEngine, EngineStats, Peripheral, StopHandle};
pub use crate::peripheral::PeripheralThread;
pub use crate::rotary::{RotaryEncoder, RotaryEngine};
