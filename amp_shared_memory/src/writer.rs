//! Host-side LED writer
//!
//! `LedWriter` owns the physical mapping and is the only host code that
//! stores into the shared region. Each store is one aligned 32-bit write, so
//! the coprocessor sees either the old or the new color of an LED, never a
//! mixture. There is no batching: a frame scanned while `set_leds` is in
//! progress may show part of the old and part of the new colors.

use crate::error::{ShmError, ShmResult};
use crate::mapping::PhysicalMapping;
use crate::reader::{RegionReader, RegionSnapshot};
use amp::hal::config::SharedMemoryConfig;
use amp::led::{ColorWord, LedFrame, NUM_LEDS};
use amp::shm::consts::{HAL_INITIALIZED, HAL_UNINITIALIZED};
use amp::shm::region::SharedRegion;
use tracing::{debug, info, warn};

/// Diagnostic text left in the message slot at start-up.
pub const STARTUP_MESSAGE: &str = "amp-hal: host ready";

/// Writer for the LED part of the shared region.
#[derive(Debug)]
pub struct LedWriter {
    mapping: Option<PhysicalMapping>,
}

impl LedWriter {
    /// Map the window and run the start-up sequence.
    ///
    /// The handshake flag is cleared first so the coprocessor keeps the
    /// string dark while the frame delay, message and initial colors are
    /// written; it is raised only once the frame is complete.
    pub fn open(config: &SharedMemoryConfig) -> ShmResult<Self> {
        let mapping = PhysicalMapping::open(config)?;
        Ok(Self::initialize(
            mapping,
            config.frame_delay_ms,
            config.initial_color,
        ))
    }

    /// Run the start-up sequence over an existing mapping.
    pub fn initialize(mapping: PhysicalMapping, frame_delay_ms: u32, color: ColorWord) -> Self {
        let region = mapping.region();
        region.set_init_flag(HAL_UNINITIALIZED);
        region.set_frame_delay_ms(frame_delay_ms);
        region.write_message(STARTUP_MESSAGE.as_bytes());
        for index in 0..NUM_LEDS {
            region.set_color(index, color);
        }
        region.set_init_flag(HAL_INITIALIZED);

        info!(frame_delay_ms, color = format_args!("{:#010x}", color.0), "LED writer initialized");
        Self {
            mapping: Some(mapping),
        }
    }

    fn region(&self) -> ShmResult<&SharedRegion> {
        self.mapping
            .as_ref()
            .map(PhysicalMapping::region)
            .ok_or(ShmError::Closed)
    }

    /// Set the color of one LED.
    ///
    /// # Panics
    /// Panics if `index >= NUM_LEDS`.
    pub fn set_led(&self, index: usize, color: ColorWord) -> ShmResult<()> {
        assert!(index < NUM_LEDS, "LED index {index} out of range");
        self.region()?.set_color(index, color);
        Ok(())
    }

    /// Store every LED in order, one word at a time.
    pub fn set_leds(&self, frame: &LedFrame) -> ShmResult<()> {
        let region = self.region()?;
        for (index, color) in frame.iter().enumerate() {
            region.set_color(index, *color);
        }
        Ok(())
    }

    /// Current color words as seen in the region.
    pub fn leds(&self) -> ShmResult<LedFrame> {
        Ok(self.region()?.colors())
    }

    /// Turn every LED off.
    pub fn reset_leds(&self) -> ShmResult<()> {
        self.set_leds(&[ColorWord::OFF; NUM_LEDS])
    }

    /// Change the delay the coprocessor waits between frames.
    pub fn set_frame_delay_ms(&self, delay_ms: u32) -> ShmResult<()> {
        self.region()?.set_frame_delay_ms(delay_ms);
        debug!(delay_ms, "LED frame delay updated");
        Ok(())
    }

    /// Replace the diagnostic message. Returns the number of bytes stored.
    pub fn write_message(&self, text: &str) -> ShmResult<usize> {
        let stored = self.region()?.write_message(text.as_bytes());
        if stored < text.len() {
            warn!(len = text.len(), stored, "Diagnostic message truncated");
        }
        Ok(stored)
    }

    /// Copy of every field, as the coprocessor would read it now.
    pub fn snapshot(&self) -> ShmResult<RegionSnapshot> {
        Ok(RegionReader::new(self.region()?).snapshot())
    }

    /// Byte-by-byte dump of the region.
    pub fn dump(&self) -> ShmResult<String> {
        Ok(RegionReader::new(self.region()?).dump())
    }

    /// Whether the writer still holds its mapping.
    pub fn is_open(&self) -> bool {
        self.mapping.is_some()
    }

    /// Turn the string off, clear the handshake flag and release the mapping.
    ///
    /// Only call this once the coprocessor no longer needs the region.
    pub fn close(mut self) -> ShmResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> ShmResult<()> {
        let Some(mapping) = self.mapping.take() else {
            return Ok(());
        };
        let region = mapping.region();
        for index in 0..NUM_LEDS {
            region.set_color(index, ColorWord::OFF);
        }
        region.set_init_flag(HAL_UNINITIALIZED);
        mapping.close()?;
        info!("LED writer closed");
        Ok(())
    }
}

impl Drop for LedWriter {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "LED writer shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::NamedTempFile;

    fn writer(file: &NamedTempFile) -> LedWriter {
        file.as_file().set_len(0x2000).unwrap();
        let mapping = PhysicalMapping::open_at(file.path(), 0, 0x2000, 0x1000).unwrap();
        LedWriter::initialize(mapping, 50, ColorWord::BLUE_BRIGHT)
    }

    fn peek(path: &Path) -> PhysicalMapping {
        PhysicalMapping::open_at(path, 0, 0x2000, 0x1000).unwrap()
    }

    #[test]
    fn test_initialize_sequence() {
        let file = NamedTempFile::new().unwrap();
        let writer = writer(&file);
        let mapping = peek(file.path());
        let region = mapping.region();

        assert_eq!(region.init_flag(), HAL_INITIALIZED);
        assert_eq!(region.frame_delay_ms(), 50);
        assert_eq!(region.colors(), [ColorWord::BLUE_BRIGHT; NUM_LEDS]);
        let mut buf = [0u8; 32];
        assert_eq!(region.read_message(&mut buf), STARTUP_MESSAGE.as_bytes());
        drop(writer);
    }

    #[test]
    fn test_set_led_only_touches_one_word() {
        let file = NamedTempFile::new().unwrap();
        let writer = writer(&file);

        writer.set_led(3, ColorWord(0xFF00_FF00)).unwrap();
        let leds = writer.leds().unwrap();
        assert_eq!(leds[3], ColorWord(0xFF00_FF00));
        assert_eq!(leds[2], ColorWord::BLUE_BRIGHT);
        assert_eq!(leds[4], ColorWord::BLUE_BRIGHT);
    }

    #[test]
    fn test_reset_leds() {
        let file = NamedTempFile::new().unwrap();
        let writer = writer(&file);
        writer.reset_leds().unwrap();
        assert_eq!(writer.leds().unwrap(), [ColorWord::OFF; NUM_LEDS]);
    }

    #[test]
    fn test_close_turns_off_and_clears_flag() {
        let file = NamedTempFile::new().unwrap();
        let writer = writer(&file);
        writer.set_led(0, ColorWord::RED).unwrap();
        writer.close().unwrap();

        let mapping = peek(file.path());
        let region = mapping.region();
        assert_eq!(region.init_flag(), HAL_UNINITIALIZED);
        assert_eq!(region.colors(), [ColorWord::OFF; NUM_LEDS]);
    }

    #[test]
    fn test_long_message_is_truncated() {
        let file = NamedTempFile::new().unwrap();
        let writer = writer(&file);
        let stored = writer.write_message(&"x".repeat(64)).unwrap();
        assert_eq!(stored, 31);
    }

    #[test]
    fn test_snapshot_reflects_writes() {
        let file = NamedTempFile::new().unwrap();
        let writer = writer(&file);
        writer.set_frame_delay_ms(20).unwrap();
        writer.set_led(7, ColorWord::WHITE).unwrap();

        let snapshot = writer.snapshot().unwrap();
        assert!(snapshot.is_initialized());
        assert_eq!(snapshot.led_frame_delay_ms, 20);
        assert_eq!(snapshot.message, STARTUP_MESSAGE);
        assert_eq!(snapshot.colors[7], ColorWord::WHITE.0);
        assert!(writer.dump().unwrap().starts_with("Offset   0 =  97 (char 'a')"));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_led_index_out_of_range() {
        let file = NamedTempFile::new().unwrap();
        let writer = writer(&file);
        let _ = writer.set_led(NUM_LEDS, ColorWord::WHITE);
    }
}
