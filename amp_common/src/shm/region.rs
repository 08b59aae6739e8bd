//! Volatile accessors over the shared region.
//!
//! There is no lock between the two cores. The only guarantee is that an
//! aligned 32-bit load or store is a single bus transaction, so a reader sees
//! either the old or the new word, never a mixture. Every word accessor here
//! checks alignment and bounds before touching memory.

use crate::led::{ColorWord, NUM_LEDS};
use crate::shm::consts::{COPROCESSOR_BTCM_BASE, REGION_OFFSET, WINDOW_LEN};
use crate::shm::layout::{
    color_field, Field, FieldKind, INIT_FLAG, LED_FRAME_DELAY_MS, MESSAGE, MSG_SIZE, REGION_END,
    WORD_SIZE,
};
use core::ptr::NonNull;
use static_assertions::{assert_not_impl_any, const_assert};

/// Address of the shared region in the coprocessor's own address space.
pub const COPROCESSOR_REGION_ADDR: usize = COPROCESSOR_BTCM_BASE + REGION_OFFSET;

/// Bytes from the shared region to the end of the TCM window.
pub const COPROCESSOR_REGION_LEN: usize = WINDOW_LEN - REGION_OFFSET;

const_assert!(REGION_END <= COPROCESSOR_REGION_LEN);
const_assert!(COPROCESSOR_REGION_ADDR % WORD_SIZE == 0);

/// View of the shared region.
///
/// A `SharedRegion` is a raw pointer plus a length; it does not own the
/// memory. The host only ever lends out `&SharedRegion` borrowed from its
/// physical mapping, so no view can outlive the unmap. The coprocessor
/// builds its own with [`SharedRegion::coprocessor`].
#[derive(Debug)]
pub struct SharedRegion {
    base: NonNull<u8>,
    len: usize,
}

assert_not_impl_any!(SharedRegion: Clone, Copy);

// SAFETY: the region is plain memory accessed only through volatile
// single-width loads/stores; concurrent access is the protocol itself.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Wrap a raw pointer to the start of the shared region.
    ///
    /// # Safety
    /// `base` must be valid for reads and writes of `len` bytes for as long
    /// as the returned value is used, and must be 4-byte aligned.
    ///
    /// # Panics
    /// Panics if `base` is null or misaligned, or if `len` is smaller than
    /// the canonical layout.
    pub unsafe fn from_raw(base: *mut u8, len: usize) -> Self {
        let base = NonNull::new(base).expect("shared region base is null");
        assert!(
            (base.as_ptr() as usize) % WORD_SIZE == 0,
            "shared region base {:p} is not word aligned",
            base.as_ptr()
        );
        assert!(len >= REGION_END, "shared region too small: {len} < {REGION_END}");
        Self { base, len }
    }

    /// The region at its fixed coprocessor-side address, running to the end
    /// of the TCM window. No memory is touched.
    ///
    /// # Safety
    /// Only sound on the coprocessor, where the BTCM is mapped at
    /// [`COPROCESSOR_BTCM_BASE`] and the region is not used for anything else.
    pub unsafe fn coprocessor() -> Self {
        // SAFETY: forwarded to the caller; address and length are checked above.
        unsafe { Self::from_raw(COPROCESSOR_REGION_ADDR as *mut u8, COPROCESSOR_REGION_LEN) }
    }

    /// Length of the accessible region in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always false; a region shorter than the layout cannot be built.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base pointer of the region.
    #[inline]
    pub const fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    #[inline]
    fn check(&self, offset: usize, width: usize) {
        assert!(
            offset.checked_add(width).is_some_and(|end| end <= self.len),
            "shared region access at {offset}+{width} beyond {}",
            self.len
        );
        assert!(
            offset % width == 0,
            "shared region access at {offset} not aligned to {width}"
        );
    }

    /// Read one byte.
    ///
    /// # Panics
    /// Panics if `offset` is out of bounds.
    #[inline]
    pub fn read_u8(&self, offset: usize) -> u8 {
        self.check(offset, 1);
        // SAFETY: bounds checked; validity guaranteed by `from_raw`.
        unsafe { core::ptr::read_volatile(self.base.as_ptr().add(offset)) }
    }

    /// Write one byte.
    ///
    /// # Panics
    /// Panics if `offset` is out of bounds.
    #[inline]
    pub fn write_u8(&self, offset: usize, value: u8) {
        self.check(offset, 1);
        // SAFETY: bounds checked; validity guaranteed by `from_raw`.
        unsafe { core::ptr::write_volatile(self.base.as_ptr().add(offset), value) }
    }

    /// Read one 32-bit word with a single aligned load.
    ///
    /// # Panics
    /// Panics if `offset` is out of bounds or not 4-byte aligned.
    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        self.check(offset, WORD_SIZE);
        // SAFETY: bounds and alignment checked; validity guaranteed by `from_raw`.
        unsafe { core::ptr::read_volatile(self.base.as_ptr().add(offset) as *const u32) }
    }

    /// Write one 32-bit word with a single aligned store.
    ///
    /// # Panics
    /// Panics if `offset` is out of bounds or not 4-byte aligned.
    #[inline]
    pub fn write_u32(&self, offset: usize, value: u32) {
        self.check(offset, WORD_SIZE);
        // SAFETY: bounds and alignment checked; validity guaranteed by `from_raw`.
        unsafe { core::ptr::write_volatile(self.base.as_ptr().add(offset) as *mut u32, value) }
    }

    /// Read a word field.
    ///
    /// # Panics
    /// Panics if `field` is not a word field.
    #[inline]
    pub fn read_word(&self, field: Field) -> u32 {
        assert!(field.kind == FieldKind::Word, "field {} is not a word", field.name);
        self.read_u32(field.offset)
    }

    /// Write a word field.
    ///
    /// # Panics
    /// Panics if `field` is not a word field.
    #[inline]
    pub fn write_word(&self, field: Field, value: u32) {
        assert!(field.kind == FieldKind::Word, "field {} is not a word", field.name);
        self.write_u32(field.offset, value)
    }

    /// Color word of LED `index`.
    ///
    /// # Panics
    /// Panics if `index >= NUM_LEDS`.
    #[inline]
    pub fn color(&self, index: usize) -> ColorWord {
        ColorWord(self.read_word(color_field(index)))
    }

    /// Set the color word of LED `index`.
    ///
    /// # Panics
    /// Panics if `index >= NUM_LEDS`.
    #[inline]
    pub fn set_color(&self, index: usize, color: ColorWord) {
        self.write_word(color_field(index), color.0)
    }

    /// Snapshot of all color words, one load each.
    pub fn colors(&self) -> [ColorWord; NUM_LEDS] {
        let mut out = [ColorWord::OFF; NUM_LEDS];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.color(i);
        }
        out
    }

    /// Frame delay requested by the host.
    #[inline]
    pub fn frame_delay_ms(&self) -> u32 {
        self.read_word(LED_FRAME_DELAY_MS)
    }

    /// Set the frame delay.
    #[inline]
    pub fn set_frame_delay_ms(&self, delay_ms: u32) {
        self.write_word(LED_FRAME_DELAY_MS, delay_ms)
    }

    /// Current handshake flag.
    #[inline]
    pub fn init_flag(&self) -> u32 {
        self.read_word(INIT_FLAG)
    }

    /// Set the handshake flag.
    #[inline]
    pub fn set_init_flag(&self, value: u32) {
        self.write_word(INIT_FLAG, value)
    }

    /// Copy the message slot into `out`, returning the bytes before the first NUL.
    pub fn read_message<'a>(&self, out: &'a mut [u8; MSG_SIZE]) -> &'a [u8] {
        let mut len = MESSAGE.size;
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.read_u8(MESSAGE.offset + i);
            if *byte == 0 && len == MESSAGE.size {
                len = i;
            }
        }
        &out[..len]
    }

    /// Write `text` into the message slot, truncated and zero padded.
    ///
    /// Returns the number of bytes stored. One byte is always kept for the
    /// terminating NUL.
    pub fn write_message(&self, text: &[u8]) -> usize {
        let stored = text.len().min(MESSAGE.size - 1);
        for i in 0..MESSAGE.size {
            let byte = if i < stored { text[i] } else { 0 };
            self.write_u8(MESSAGE.offset + i, byte);
        }
        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, align(8))]
    struct Backing([u8; 128]);

    fn region(backing: &mut Backing) -> SharedRegion {
        unsafe { SharedRegion::from_raw(backing.0.as_mut_ptr(), backing.0.len()) }
    }

    #[test]
    fn color_roundtrip_leaves_neighbours() {
        let mut backing = Backing([0; 128]);
        let region = region(&mut backing);

        region.set_color(2, ColorWord(0x1111_1111));
        region.set_color(4, ColorWord(0x4444_4444));
        region.set_color(3, ColorWord(0xFF00_FF00));

        assert_eq!(region.color(3), ColorWord(0xFF00_FF00));
        assert_eq!(region.color(2), ColorWord(0x1111_1111));
        assert_eq!(region.color(4), ColorWord(0x4444_4444));
    }

    #[test]
    fn word_bytes_land_at_layout_offsets() {
        let mut backing = Backing([0; 128]);
        let region = region(&mut backing);
        region.set_frame_delay_ms(0x0102_0304);
        let bytes = u32::from_ne_bytes([
            region.read_u8(32),
            region.read_u8(33),
            region.read_u8(34),
            region.read_u8(35),
        ]);
        assert_eq!(bytes, 0x0102_0304);
    }

    #[test]
    fn message_is_truncated_and_terminated() {
        let mut backing = Backing([0xAA; 128]);
        let region = region(&mut backing);
        let long = [b'x'; 40];
        assert_eq!(region.write_message(&long), MESSAGE.size - 1);

        let mut buf = [0u8; MESSAGE.size];
        assert_eq!(region.read_message(&mut buf).len(), MESSAGE.size - 1);

        region.write_message(b"hello");
        assert_eq!(region.read_message(&mut buf), b"hello");
    }

    #[test]
    #[should_panic(expected = "not aligned")]
    fn misaligned_word_access_panics() {
        let mut backing = Backing([0; 128]);
        region(&mut backing).read_u32(41);
    }

    #[test]
    #[should_panic(expected = "beyond")]
    fn out_of_bounds_access_panics() {
        let mut backing = Backing([0; 128]);
        region(&mut backing).write_u8(128, 1);
    }

    #[test]
    #[should_panic(expected = "beyond")]
    fn word_offset_near_usize_max_panics() {
        let mut backing = Backing([0; 128]);
        region(&mut backing).read_u32(usize::MAX - 3);
    }

    #[test]
    #[should_panic(expected = "beyond")]
    fn byte_offset_at_usize_max_panics() {
        let mut backing = Backing([0; 128]);
        region(&mut backing).write_u8(usize::MAX, 1);
    }

    #[test]
    fn coprocessor_region_sits_at_btcm_offset() {
        assert_eq!(COPROCESSOR_REGION_ADDR, 0x7000);
        let region = unsafe { SharedRegion::coprocessor() };
        assert_eq!(region.as_ptr() as usize, COPROCESSOR_BTCM_BASE + REGION_OFFSET);
        assert_eq!(region.len(), 0x1000);
        assert!(region.len() >= REGION_END);
    }

    #[test]
    #[should_panic(expected = "too small")]
    fn short_region_rejected() {
        let mut backing = Backing([0; 128]);
        let _ = unsafe { SharedRegion::from_raw(backing.0.as_mut_ptr(), 16) };
    }
}
