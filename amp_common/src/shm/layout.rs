//! Declarative layout of the shared region.
//!
//! The region is described once, as an ordered list of `(name, size)` field
//! specifications. Offsets are the running sum of the preceding sizes and are
//! computed in `const` context, so the host and the coprocessor both embed
//! the same numbers at build time and no offset is ever written by hand.
//!
//! ## Canonical layout (host-writable / coprocessor-readable)
//!
//! | Field                | Offset | Size | Writer |
//! |----------------------|--------|------|--------|
//! | `message`            | 0      | 32   | host   |
//! | `led_frame_delay_ms` | 32     | 4    | host   |
//! | `init_flag`          | 36     | 4    | host   |
//! | `color0..color7`     | 40..68 | 4    | host   |
//! | end                  | 72     | -    | -      |
//!
//! Every 32-bit word sits on a 4-byte boundary; `RegionLayout::from_specs`
//! refuses to build a layout that breaks this, which turns a misaligned field
//! into a compile error instead of a torn read on the bus.

use crate::led::NUM_LEDS;
use static_assertions::const_assert_eq;

/// Size of the diagnostic message buffer in bytes.
pub const MSG_SIZE: usize = 32;

/// Size of a 32-bit word field in bytes.
pub const WORD_SIZE: usize = core::mem::size_of::<u32>();

/// Kind of data stored in a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Raw byte buffer, accessed one byte at a time.
    Bytes,
    /// Single 32-bit word, accessed with one aligned bus transaction.
    Word,
}

/// One entry of the declarative field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: &'static str,
    /// Size in bytes.
    pub size: usize,
    /// Access kind.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// A raw byte buffer of `size` bytes.
    pub const fn bytes(name: &'static str, size: usize) -> Self {
        Self {
            name,
            size,
            kind: FieldKind::Bytes,
        }
    }

    /// A 32-bit word.
    pub const fn word(name: &'static str) -> Self {
        Self {
            name,
            size: WORD_SIZE,
            kind: FieldKind::Word,
        }
    }
}

/// A field with its resolved offset inside the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name.
    pub name: &'static str,
    /// Byte offset from the start of the region.
    pub offset: usize,
    /// Size in bytes.
    pub size: usize,
    /// Access kind.
    pub kind: FieldKind,
}

impl Field {
    const EMPTY: Field = Field {
        name: "",
        offset: 0,
        size: 0,
        kind: FieldKind::Bytes,
    };

    /// Offset one past the last byte of this field.
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Resolved layout: every field with its offset, plus the total length.
#[derive(Debug, Clone, Copy)]
pub struct RegionLayout<const N: usize> {
    fields: [Field; N],
    end: usize,
}

impl<const N: usize> RegionLayout<N> {
    /// Resolve offsets from an ordered list of field specifications.
    ///
    /// # Panics
    /// Panics (at compile time when used in a `const`) if a word field is not
    /// exactly 4 bytes or does not start on a 4-byte boundary, or if a field
    /// is empty.
    pub const fn from_specs(specs: [FieldSpec; N]) -> Self {
        let mut fields = [Field::EMPTY; N];
        let mut offset = 0;
        let mut i = 0;
        while i < N {
            let spec = specs[i];
            assert!(spec.size > 0, "shared region field has zero size");
            if matches!(spec.kind, FieldKind::Word) {
                assert!(spec.size == WORD_SIZE, "word field must be 4 bytes");
                assert!(offset % WORD_SIZE == 0, "word field is not 4-byte aligned");
            }
            fields[i] = Field {
                name: spec.name,
                offset,
                size: spec.size,
                kind: spec.kind,
            };
            offset += spec.size;
            i += 1;
        }
        Self {
            fields,
            end: offset,
        }
    }

    /// Field at position `index` in declaration order.
    #[inline]
    pub const fn field(&self, index: usize) -> Field {
        self.fields[index]
    }

    /// Total length of the region in bytes.
    #[inline]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look a field up by name.
    pub fn find(&self, name: &str) -> Option<Field> {
        self.fields.iter().copied().find(|f| f.name == name)
    }
}

/// Position of the first color word in [`FIELD_SPECS`].
pub const COLOR_FIELD_BASE: usize = 3;

/// Number of fields in the canonical layout.
pub const FIELD_COUNT: usize = COLOR_FIELD_BASE + NUM_LEDS;

/// The canonical field list. Both cores are built from this array.
pub const FIELD_SPECS: [FieldSpec; FIELD_COUNT] = [
    FieldSpec::bytes("message", MSG_SIZE),
    FieldSpec::word("led_frame_delay_ms"),
    FieldSpec::word("init_flag"),
    FieldSpec::word("color0"),
    FieldSpec::word("color1"),
    FieldSpec::word("color2"),
    FieldSpec::word("color3"),
    FieldSpec::word("color4"),
    FieldSpec::word("color5"),
    FieldSpec::word("color6"),
    FieldSpec::word("color7"),
];

/// The resolved canonical layout.
pub const LAYOUT: RegionLayout<FIELD_COUNT> = RegionLayout::from_specs(FIELD_SPECS);

/// Diagnostic text slot (host writes, zero padded).
pub const MESSAGE: Field = LAYOUT.field(0);

/// Delay between LED frames requested by the host, in milliseconds.
pub const LED_FRAME_DELAY_MS: Field = LAYOUT.field(1);

/// Initialisation handshake flag (host writes).
pub const INIT_FLAG: Field = LAYOUT.field(2);

/// Total length of the shared region.
pub const REGION_END: usize = LAYOUT.end();

/// Color word field for LED `index`.
///
/// # Panics
/// Panics if `index >= NUM_LEDS`.
#[inline]
pub const fn color_field(index: usize) -> Field {
    assert!(index < NUM_LEDS, "LED index out of range");
    LAYOUT.field(COLOR_FIELD_BASE + index)
}

const_assert_eq!(MESSAGE.offset, 0);
const_assert_eq!(LED_FRAME_DELAY_MS.offset, 32);
const_assert_eq!(INIT_FLAG.offset, 36);
const_assert_eq!(color_field(0).offset, 40);
const_assert_eq!(color_field(NUM_LEDS - 1).offset, 68);
const_assert_eq!(REGION_END, 72);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_running_sums() {
        let mut expected = 0;
        for field in LAYOUT.fields() {
            assert_eq!(field.offset, expected, "field {}", field.name);
            expected += field.size;
        }
        assert_eq!(expected, REGION_END);
    }

    #[test]
    fn color_words_are_consecutive() {
        for i in 0..NUM_LEDS {
            let field = color_field(i);
            assert_eq!(field.offset, 40 + i * WORD_SIZE);
            assert_eq!(field.kind, FieldKind::Word);
        }
    }

    #[test]
    fn every_word_is_aligned() {
        for field in LAYOUT.fields().iter().filter(|f| f.kind == FieldKind::Word) {
            assert_eq!(field.offset % WORD_SIZE, 0, "field {}", field.name);
        }
    }

    #[test]
    fn find_by_name() {
        assert_eq!(LAYOUT.find("init_flag"), Some(INIT_FLAG));
        assert_eq!(LAYOUT.find("color3"), Some(color_field(3)));
        assert!(LAYOUT.find("btn_count").is_none());
    }

    #[test]
    fn custom_layout_offsets() {
        const CUSTOM: RegionLayout<3> = RegionLayout::from_specs([
            FieldSpec::bytes("tag", 8),
            FieldSpec::word("a"),
            FieldSpec::word("b"),
        ]);
        assert_eq!(CUSTOM.field(1).offset, 8);
        assert_eq!(CUSTOM.field(2).offset, 12);
        assert_eq!(CUSTOM.end(), 16);
    }

    #[test]
    #[should_panic(expected = "not 4-byte aligned")]
    fn misaligned_word_is_rejected() {
        let _ = RegionLayout::from_specs([FieldSpec::bytes("odd", 3), FieldSpec::word("w")]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn color_field_out_of_range() {
        let _ = color_field(NUM_LEDS);
    }
}
