//! Bouncing "scanner" LED pattern.
//!
//! A bright head with a dim LED on each side sweeps up the string, enters
//! and leaves it at both ends, then sweeps back. Used to check the transport
//! end to end without any input peripheral.

use amp::led::{ColorWord, LedFrame, NUM_LEDS};

/// Infinite iterator of scanner frames.
#[derive(Debug, Clone)]
pub struct Scanner {
    position: isize,
    reverse: bool,
    head: ColorWord,
    tail: ColorWord,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ColorWord::GREEN_BRIGHT, ColorWord::GREEN)
    }
}

impl Scanner {
    /// Scanner with the given head and neighbour colors, starting just
    /// below the first LED.
    pub fn new(head: ColorWord, tail: ColorWord) -> Self {
        Self {
            position: -1,
            reverse: false,
            head,
            tail,
        }
    }

    /// Current head position; may be one step outside the string.
    pub fn position(&self) -> isize {
        self.position
    }

    fn put(frame: &mut LedFrame, index: isize, color: ColorWord) {
        if let Ok(i) = usize::try_from(index) {
            if i < NUM_LEDS {
                frame[i] = color;
            }
        }
    }
}

impl Iterator for Scanner {
    type Item = LedFrame;

    fn next(&mut self) -> Option<LedFrame> {
        let mut frame = [ColorWord::OFF; NUM_LEDS];
        Self::put(&mut frame, self.position - 1, self.tail);
        Self::put(&mut frame, self.position + 1, self.tail);
        Self::put(&mut frame, self.position, self.head);

        if self.position < 0 {
            self.reverse = false;
        } else if self.position >= NUM_LEDS as isize {
            self.reverse = true;
        }
        self.position += if self.reverse { -1 } else { 1 };

        Some(frame)
    }
}
