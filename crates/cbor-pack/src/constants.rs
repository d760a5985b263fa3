//! Wire-level constants of the CBOR header grammar.

pub const MAJOR_UNSIGNED: u8 = 0;
pub const MAJOR_NEGATIVE: u8 = 1;
pub const MAJOR_BYTES: u8 = 2;
pub const MAJOR_TEXT: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_MAP: u8 = 5;
pub const MAJOR_TAG: u8 = 6;
pub const MAJOR_SIMPLE: u8 = 7;

/// Largest argument that fits directly in the additional-info field.
pub const MAX_INLINE: u64 = 23;

pub const INFO_U8: u8 = 24;
pub const INFO_U16: u8 = 25;
pub const INFO_U32: u8 = 26;
pub const INFO_U64: u8 = 27;

/// Indefinite-length marker. Streaming items are not decoded by this crate;
/// a decoder extension would read chunks/items until [`BREAK`] here.
pub const INFO_INDEFINITE: u8 = 31;
pub const BREAK: u8 = 0xff;

pub const SIMPLE_FALSE: u8 = 20;
pub const SIMPLE_TRUE: u8 = 21;
pub const SIMPLE_NULL: u8 = 22;
pub const SIMPLE_UNDEFINED: u8 = 23;

pub const FLOAT16: u8 = 25;
pub const FLOAT32: u8 = 26;
pub const FLOAT64: u8 = 27;

pub const MASK_INFO: u8 = 0b0001_1111;

/// Packs a major type and additional info into an initial byte.
#[inline]
pub const fn initial_byte(major: u8, info: u8) -> u8 {
    (major << 5) | (info & MASK_INFO)
}

/// Returns `true` when `value` survives a round trip through `f32`.
pub fn is_f32_roundtrip(value: f64) -> bool {
    value.is_nan() || (value as f32) as f64 == value
}
