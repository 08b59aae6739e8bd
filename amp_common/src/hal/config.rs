//! HAL configuration types.
//!
//! This module contains the schema of `amp.toml`:
//! - `HalConfig` - Main configuration, one section per peripheral
//! - `SharedMemoryConfig` - Physical window of the LED transport
//! - `RotaryEncoderConfig` - Quadrature decoder wiring and bounds
//! - `ButtonConfig` - One debounced momentary switch
//!
//! Every section has defaults matching the reference board, so an empty file
//! (or no file at all) yields a working configuration.

use crate::config::{ConfigError, SharedConfig};
use crate::hal::consts::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_ROTARY_DECREMENT, DEFAULT_ROTARY_INCREMENT, DEFAULT_ROTARY_MAX,
    DEFAULT_ROTARY_MIN, DEFAULT_ROTARY_VALUE, ENCODER_BUTTON_LINE, ENCODER_LINE_A, ENCODER_LINE_B,
    GPIO_CHIP_0, GPIO_CHIP_2, JOYSTICK_BUTTON_LINE,
};
use crate::led::ColorWord;
use crate::shm::consts::{
    BTCM_PHYS_ADDR, DEFAULT_FRAME_DELAY_MS, DEFAULT_MEM_DEVICE, PAGE_SIZE, REGION_OFFSET,
    WINDOW_LEN,
};
use crate::shm::layout::REGION_END;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_buttons() -> Vec<ButtonConfig> {
    vec![ButtonConfig::encoder_push(), ButtonConfig::joystick_push()]
}

/// Main configuration loaded from `amp.toml`.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
///
/// [shared_memory]
/// device = "/dev/mem"
/// frame_delay_ms = 50
/// initial_color = 0x0000ff00
///
/// [rotary_encoder]
/// min = 40
/// max = 300
/// increment = 5
/// decrement = 5
/// default = 120
///
/// [[buttons]]
/// name = "encoder_push"
/// chip = "/dev/gpiochip0"
/// line = 10
/// start = 0
/// end = 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HalConfig {
    /// Logging and service identity.
    #[serde(default)]
    pub shared: SharedConfig,

    /// LED transport window.
    #[serde(default)]
    pub shared_memory: SharedMemoryConfig,

    /// Quadrature decoder.
    #[serde(default)]
    pub rotary_encoder: RotaryEncoderConfig,

    /// Debounced push buttons. Omitting the key keeps the board defaults;
    /// an explicit empty list disables all buttons.
    #[serde(default = "default_buttons")]
    pub buttons: Vec<ButtonConfig>,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            shared_memory: SharedMemoryConfig::default(),
            rotary_encoder: RotaryEncoderConfig::default(),
            buttons: default_buttons(),
        }
    }
}

impl HalConfig {
    /// Validate the whole configuration.
    ///
    /// # Validation Rules
    /// 1. `shared.service_name` not empty
    /// 2. shared memory window page aligned and large enough for the layout
    /// 3. rotary encoder: distinct lines, `min <= max`, non-negative values,
    ///    `default` within `[min, max]`
    /// 4. buttons: unique non-empty names, `start < end`, `default` within
    ///    `[start, end)`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.shared_memory.validate()?;
        self.rotary_encoder.validate()?;

        let mut names = HashSet::new();
        for button in &self.buttons {
            button.validate()?;
            if !names.insert(button.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate button name: {}",
                    button.name
                )));
            }
        }

        Ok(())
    }

    /// Look a button up by name.
    pub fn button(&self, name: &str) -> Option<&ButtonConfig> {
        self.buttons.iter().find(|b| b.name == name)
    }
}

/// Physical window holding the shared region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SharedMemoryConfig {
    /// Physical memory device mapped by the host.
    pub device: PathBuf,

    /// Physical base address of the window.
    pub phys_addr: u64,

    /// Window length in bytes.
    pub window_len: usize,

    /// Offset of the shared region inside the window.
    pub region_offset: usize,

    /// Frame delay written at start-up, in milliseconds.
    pub frame_delay_ms: u32,

    /// Color written to every LED at start-up.
    pub initial_color: ColorWord,
}

impl Default for SharedMemoryConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_MEM_DEVICE),
            phys_addr: BTCM_PHYS_ADDR,
            window_len: WINDOW_LEN,
            region_offset: REGION_OFFSET,
            frame_delay_ms: DEFAULT_FRAME_DELAY_MS,
            initial_color: ColorWord::BLUE_BRIGHT,
        }
    }
}

impl SharedMemoryConfig {
    /// Validate the window geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "shared_memory.device cannot be empty".to_string(),
            ));
        }
        if self.phys_addr % PAGE_SIZE as u64 != 0 {
            return Err(ConfigError::ValidationError(format!(
                "shared_memory.phys_addr {:#x} is not page aligned",
                self.phys_addr
            )));
        }
        if self.window_len == 0 || self.window_len % PAGE_SIZE != 0 {
            return Err(ConfigError::ValidationError(format!(
                "shared_memory.window_len {:#x} must be a non-zero multiple of {PAGE_SIZE:#x}",
                self.window_len
            )));
        }
        if self.region_offset % 4 != 0 {
            return Err(ConfigError::ValidationError(format!(
                "shared_memory.region_offset {:#x} is not word aligned",
                self.region_offset
            )));
        }
        if self.region_offset + REGION_END > self.window_len {
            return Err(ConfigError::ValidationError(format!(
                "shared region ({:#x} + {REGION_END}) does not fit in window of {:#x} bytes",
                self.region_offset, self.window_len
            )));
        }
        Ok(())
    }
}

/// Quadrature rotary encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotaryEncoderConfig {
    /// GPIO chip device.
    pub chip: PathBuf,

    /// Phase A line offset.
    pub line_a: u32,

    /// Phase B line offset.
    pub line_b: u32,

    /// Lower bound of the count.
    pub min: i32,

    /// Upper bound of the count.
    pub max: i32,

    /// Step applied per clockwise detent.
    pub increment: i32,

    /// Step applied per counter-clockwise detent.
    pub decrement: i32,

    /// Initial count.
    pub default: i32,
}

impl Default for RotaryEncoderConfig {
    fn default() -> Self {
        Self {
            chip: PathBuf::from(GPIO_CHIP_2),
            line_a: ENCODER_LINE_A,
            line_b: ENCODER_LINE_B,
            min: DEFAULT_ROTARY_MIN,
            max: DEFAULT_ROTARY_MAX,
            increment: DEFAULT_ROTARY_INCREMENT,
            decrement: DEFAULT_ROTARY_DECREMENT,
            default: DEFAULT_ROTARY_VALUE,
        }
    }
}

impl RotaryEncoderConfig {
    /// Validate lines and bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.line_a == self.line_b {
            return Err(ConfigError::ValidationError(format!(
                "rotary_encoder: line_a and line_b are both {}",
                self.line_a
            )));
        }
        for (name, value) in [
            ("min", self.min),
            ("max", self.max),
            ("increment", self.increment),
            ("decrement", self.decrement),
            ("default", self.default),
        ] {
            if value < 0 {
                return Err(ConfigError::ValidationError(format!(
                    "rotary_encoder.{name} must be >= 0 (got {value})"
                )));
            }
        }
        if self.min > self.max {
            return Err(ConfigError::ValidationError(format!(
                "rotary_encoder: min {} > max {}",
                self.min, self.max
            )));
        }
        if !(self.min..=self.max).contains(&self.default) {
            return Err(ConfigError::ValidationError(format!(
                "rotary_encoder.default {} outside [{}, {}]",
                self.default, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// One debounced momentary switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ButtonConfig {
    /// Unique button name, used for the thread name and in logs.
    pub name: String,

    /// GPIO chip device.
    pub chip: PathBuf,

    /// Line offset.
    pub line: u32,

    /// First counter value.
    #[serde(default)]
    pub start: i32,

    /// One past the last counter value.
    #[serde(default = "ButtonConfig::unbounded_end")]
    pub end: i32,

    /// Initial counter value.
    #[serde(default)]
    pub default: i32,

    /// Lockout window after an accepted edge.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl ButtonConfig {
    fn unbounded_end() -> i32 {
        i32::MAX
    }

    /// Rotary encoder push switch: toggles between 0 and 1.
    pub fn encoder_push() -> Self {
        Self {
            name: "encoder_push".to_string(),
            chip: PathBuf::from(GPIO_CHIP_0),
            line: ENCODER_BUTTON_LINE,
            start: 0,
            end: 2,
            default: 0,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Joystick push switch: counts releases.
    pub fn joystick_push() -> Self {
        Self {
            name: "joystick_push".to_string(),
            chip: PathBuf::from(GPIO_CHIP_2),
            line: JOYSTICK_BUTTON_LINE,
            start: 0,
            end: Self::unbounded_end(),
            default: 0,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Debounce window as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Validate name and bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "button name cannot be empty".to_string(),
            ));
        }
        if self.start >= self.end {
            return Err(ConfigError::ValidationError(format!(
                "button '{}': start {} must be < end {}",
                self.name, self.start, self.end
            )));
        }
        if !(self.start..self.end).contains(&self.default) {
            return Err(ConfigError::ValidationError(format!(
                "button '{}': default {} outside [{}, {})",
                self.name, self.default, self.start, self.end
            )));
        }
        Ok(())
    }
}
