//! Prelude module for common re-exports.
//!
//! `use amp_common::prelude::*;` brings in the types most host code needs
//! without listing individual paths.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::hal::config::{ButtonConfig, HalConfig, RotaryEncoderConfig, SharedMemoryConfig};

// ─── Edge Events ────────────────────────────────────────────────────
pub use crate::hal::edge::{Edge, EdgeEvent, LineId};
pub use crate::hal::error::{HalError, HalResult};

// ─── Shared Region ──────────────────────────────────────────────────
pub use crate::led::{ColorWord, LedFrame, NUM_LEDS};
pub use crate::shm::consts::{HAL_INITIALIZED, HAL_UNINITIALIZED};
pub use crate::shm::region::SharedRegion;
