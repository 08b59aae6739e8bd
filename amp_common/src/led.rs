//! LED string constants and color words.
//!
//! The string holds [`NUM_LEDS`] RGBW LEDs. Each LED is driven by one 32-bit
//! word `0xGGRRBBWW`, sent most significant bit first: green, red, blue,
//! then white. Element 0 is the first (bottom) LED on the strip.

/// Number of LEDs in the string.
pub const NUM_LEDS: usize = 8;

/// Bits per LED on the wire.
pub const BITS_PER_LED: usize = 32;

/// One packed LED color, `0xGGRRBBWW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(transparent))]
#[repr(transparent)]
pub struct ColorWord(pub u32);

impl ColorWord {
    /// All channels off.
    pub const OFF: Self = Self(0x0000_0000);
    /// Dim green.
    pub const GREEN: Self = Self(0x0f00_0000);
    /// Full green.
    pub const GREEN_BRIGHT: Self = Self(0xff00_0000);
    /// Dim red.
    pub const RED: Self = Self(0x000f_0000);
    /// Full red.
    pub const RED_BRIGHT: Self = Self(0x00ff_0000);
    /// Dim blue.
    pub const BLUE: Self = Self(0x0000_0f00);
    /// Full blue.
    pub const BLUE_BRIGHT: Self = Self(0x0000_ff00);
    /// Full white channel.
    pub const WHITE: Self = Self(0x0000_00ff);

    /// Pack individual channels.
    #[inline]
    pub const fn from_grbw(green: u8, red: u8, blue: u8, white: u8) -> Self {
        Self(
            (green as u32) << 24 | (red as u32) << 16 | (blue as u32) << 8 | white as u32,
        )
    }

    /// Green channel.
    #[inline]
    pub const fn green(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Red channel.
    #[inline]
    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Blue channel.
    #[inline]
    pub const fn blue(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// White channel.
    #[inline]
    pub const fn white(self) -> u8 {
        self.0 as u8
    }

    /// Wire bit `n` counted from the first bit sent (0 = bit 31).
    #[inline]
    pub const fn wire_bit(self, n: usize) -> bool {
        (self.0 >> (BITS_PER_LED - 1 - n)) & 1 == 1
    }
}

impl From<u32> for ColorWord {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ColorWord> for u32 {
    fn from(value: ColorWord) -> Self {
        value.0
    }
}

/// Full string state for one refresh.
pub type LedFrame = [ColorWord; NUM_LEDS];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_packing() {
        let c = ColorWord::from_grbw(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c.0, 0x1234_5678);
        assert_eq!(c.green(), 0x12);
        assert_eq!(c.red(), 0x34);
        assert_eq!(c.blue(), 0x56);
        assert_eq!(c.white(), 0x78);
    }

    #[test]
    fn named_colors_hit_their_channel() {
        assert_eq!(ColorWord::GREEN_BRIGHT.green(), 0xff);
        assert_eq!(ColorWord::RED_BRIGHT.red(), 0xff);
        assert_eq!(ColorWord::BLUE_BRIGHT.blue(), 0xff);
        assert_eq!(ColorWord::WHITE.white(), 0xff);
        assert_eq!(ColorWord::OFF.0, 0);
    }

    #[test]
    fn wire_order_is_msb_first() {
        let c = ColorWord(0x8000_0001);
        assert!(c.wire_bit(0));
        assert!(!c.wire_bit(1));
        assert!(c.wire_bit(31));
    }
}
