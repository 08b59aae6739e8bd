//! Diagnostic reader for the shared region

use crate::error::ShmResult;
use amp::led::NUM_LEDS;
use amp::shm::consts::HAL_INITIALIZED;
use amp::shm::layout::{LAYOUT, MSG_SIZE, REGION_END};
use amp::shm::region::SharedRegion;
use serde::Serialize;
use std::fmt::Write as _;

/// Point-in-time copy of every field in the region.
///
/// Fields are read one by one; a concurrent writer may change some of them
/// between reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSnapshot {
    /// Message slot up to the first NUL, lossily decoded.
    pub message: String,
    /// Frame delay in milliseconds.
    pub led_frame_delay_ms: u32,
    /// Raw handshake flag.
    pub init_flag: u32,
    /// Color words, LED 0 first.
    pub colors: [u32; NUM_LEDS],
}

impl RegionSnapshot {
    /// Whether the host finished its start-up sequence.
    pub fn is_initialized(&self) -> bool {
        self.init_flag == HAL_INITIALIZED
    }

    /// Render as a JSON document.
    pub fn to_json(&self) -> ShmResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read-only view used for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct RegionReader<'a> {
    region: &'a SharedRegion,
}

impl<'a> RegionReader<'a> {
    /// Wrap a region view.
    pub fn new(region: &'a SharedRegion) -> Self {
        Self { region }
    }

    /// Copy every field.
    pub fn snapshot(&self) -> RegionSnapshot {
        let mut buf = [0u8; MSG_SIZE];
        let message = String::from_utf8_lossy(self.region.read_message(&mut buf)).into_owned();
        let mut colors = [0u32; NUM_LEDS];
        for (index, slot) in colors.iter_mut().enumerate() {
            *slot = self.region.color(index).0;
        }
        RegionSnapshot {
            message,
            led_frame_delay_ms: self.region.frame_delay_ms(),
            init_flag: self.region.init_flag(),
            colors,
        }
    }

    /// Byte-by-byte dump of the region, one line per byte, with the name of
    /// the field each byte belongs to.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for field in LAYOUT.fields() {
            for offset in field.offset..field.end() {
                let value = self.region.read_u8(offset);
                let shown = if value.is_ascii_graphic() || value == b' ' {
                    value as char
                } else {
                    '.'
                };
                let _ = writeln!(
                    out,
                    "Offset {offset:3} = {value:3} (char '{shown}')  {}",
                    field.name
                );
            }
        }
        debug_assert_eq!(out.lines().count(), REGION_END);
        out
    }

    /// Multi-line summary of the word fields.
    pub fn summary(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        let _ = writeln!(out, "    {:>18}: \"{}\"", "message", snapshot.message);
        let _ = writeln!(out, "    {:>18}: {:#06x}", "led_frame_delay_ms", snapshot.led_frame_delay_ms);
        let _ = writeln!(out, "    {:>18}: {:#06x}", "init_flag", snapshot.init_flag);
        for (index, color) in snapshot.colors.iter().enumerate() {
            let _ = writeln!(out, "    {:>18}: {color:#010x}", format!("color{index}"));
        }
        out
    }
}
