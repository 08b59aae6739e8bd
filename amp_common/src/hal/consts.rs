//! HAL constants.
//!
//! Wiring defaults reproduce the reference board: the rotary encoder on
//! `gpiochip2` lines 7/8, its push switch on `gpiochip0` line 10 and the
//! joystick push switch on `gpiochip2` line 15.

/// Canonical HAL service name (used for logging and thread names).
pub const HAL_SERVICE_NAME: &str = "amp-hal";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/amp/amp.toml";

/// Consumer label attached to requested GPIO lines.
pub const GPIO_CONSUMER: &str = "amp-hal";

/// GPIO chip carrying the encoder and the joystick switch.
pub const GPIO_CHIP_2: &str = "/dev/gpiochip2";

/// GPIO chip carrying the encoder push switch.
pub const GPIO_CHIP_0: &str = "/dev/gpiochip0";

/// Rotary encoder phase A line.
pub const ENCODER_LINE_A: u32 = 7;

/// Rotary encoder phase B line.
pub const ENCODER_LINE_B: u32 = 8;

/// Rotary encoder push switch line (on [`GPIO_CHIP_0`]).
pub const ENCODER_BUTTON_LINE: u32 = 10;

/// Joystick push switch line (on [`GPIO_CHIP_2`]).
pub const JOYSTICK_BUTTON_LINE: u32 = 15;

/// Initial decoder count.
pub const DEFAULT_ROTARY_VALUE: i32 = 0;

/// Lower decoder bound.
pub const DEFAULT_ROTARY_MIN: i32 = 0;

/// Upper decoder bound.
pub const DEFAULT_ROTARY_MAX: i32 = 500;

/// Decoder step per clockwise detent.
pub const DEFAULT_ROTARY_INCREMENT: i32 = 1;

/// Decoder step per counter-clockwise detent.
pub const DEFAULT_ROTARY_DECREMENT: i32 = 1;

/// Button lockout window after a counted release, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
