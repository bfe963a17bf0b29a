//! SMILE token bytes, and the two context-dependent classifiers that map a
//! raw byte onto its meaning. The same byte means different things depending
//! on whether the decoder expects a value or an object key, so there is one
//! lookup per context.

// Document header: ":)\n" followed by the version/feature byte.
pub const HEADER_BYTE_1: u8 = 0x3A;
pub const HEADER_BYTE_2: u8 = 0x29;
pub const HEADER_BYTE_3: u8 = 0x0A;

// Low three bits of the header's fourth byte; the high nibble is the format
// version (0 for this crate).
pub const HEADER_BIT_SHARED_NAMES: u8 = 0x01;
pub const HEADER_BIT_SHARED_VALUES: u8 = 0x02;
pub const HEADER_BIT_RAW_BINARY: u8 = 0x04;

// Value-context literals.
pub const TOKEN_EMPTY_STRING: u8 = 0x20;
pub const TOKEN_NULL: u8 = 0x21;
pub const TOKEN_FALSE: u8 = 0x22;
pub const TOKEN_TRUE: u8 = 0x23;

// Value-context numbers.
pub const TOKEN_INT_32: u8 = 0x24;
pub const TOKEN_INT_64: u8 = 0x25;
pub const TOKEN_BIG_INTEGER: u8 = 0x26;
pub const TOKEN_FLOAT_32: u8 = 0x28;
pub const TOKEN_FLOAT_64: u8 = 0x29;
pub const TOKEN_BIG_DECIMAL: u8 = 0x2A;

// Value-context string prefixes; the low 5 bits carry a biased length.
pub const PREFIX_TINY_ASCII: u8 = 0x40;
pub const PREFIX_SMALL_ASCII: u8 = 0x60;
pub const PREFIX_TINY_UNICODE: u8 = 0x80;
pub const PREFIX_SHORT_UNICODE: u8 = 0xA0;

// Small integers carry a 5-bit zigzag value in the token byte itself.
pub const PREFIX_SMALL_INT: u8 = 0xC0;

// Variable-length values, terminated by `BYTE_END_OF_STRING`.
pub const TOKEN_LONG_ASCII: u8 = 0xE0;
pub const TOKEN_LONG_UNICODE: u8 = 0xE4;
pub const TOKEN_BINARY_7BIT: u8 = 0xE8;
pub const PREFIX_SHARED_STRING_LONG: u8 = 0xEC;

// Structure and framing markers.
pub const TOKEN_START_ARRAY: u8 = 0xF8;
pub const TOKEN_END_ARRAY: u8 = 0xF9;
pub const TOKEN_START_OBJECT: u8 = 0xFA;
pub const TOKEN_END_OBJECT: u8 = 0xFB;
pub const BYTE_END_OF_STRING: u8 = 0xFC;
pub const TOKEN_BINARY_RAW: u8 = 0xFD;
pub const BYTE_END_OF_CONTENT: u8 = 0xFF;

// Key-context tokens. These share byte values with value-context tokens but
// are only ever read while an object expects a field name.
pub const KEY_EMPTY_STRING: u8 = 0x20;
pub const PREFIX_KEY_SHARED_LONG: u8 = 0x30;
pub const KEY_LONG_NAME: u8 = 0x34;
pub const PREFIX_KEY_SHARED_SHORT: u8 = 0x40;
pub const PREFIX_KEY_ASCII: u8 = 0x80;
pub const PREFIX_KEY_UNICODE: u8 = 0xC0;

/// Value-context token classes. For internal use only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ValueToken {
    /// 0x00; skipped wherever it appears in value context.
    Padding,
    /// One-byte shared string reference, index 0..=30.
    SharedStringShort(u8),
    EmptyString,
    Null,
    False,
    True,
    Int32,
    Int64,
    BigInteger,
    Float32,
    Float64,
    BigDecimal,
    /// ASCII string, length 1..=32.
    TinyAscii(u8),
    /// ASCII string, length 33..=64.
    SmallAscii(u8),
    /// Non-ASCII string, length 2..=33.
    TinyUnicode(u8),
    /// Non-ASCII string, length 34..=65.
    ShortUnicode(u8),
    /// 5-bit zigzag payload, still encoded.
    SmallInt(u8),
    LongAscii,
    LongUnicode,
    Binary7Bit,
    /// Two-byte shared string reference; holds the high 2 bits of the index.
    SharedStringLong(u8),
    StartArray,
    EndArray,
    StartObject,
    EndObject,
    BinaryRaw,
    EndOfContent,
    Reserved,
}

impl ValueToken {
    /// Classify a token byte read while expecting a value.
    pub fn from_u8(b: u8) -> ValueToken {
        match b {
            0x00 => ValueToken::Padding,
            0x01..=0x1F => ValueToken::SharedStringShort(b - 1),
            0x20 => ValueToken::EmptyString,
            0x21 => ValueToken::Null,
            0x22 => ValueToken::False,
            0x23 => ValueToken::True,
            0x24 => ValueToken::Int32,
            0x25 => ValueToken::Int64,
            TOKEN_BIG_INTEGER => ValueToken::BigInteger,
            0x27 => ValueToken::Reserved,
            0x28 => ValueToken::Float32,
            0x29 => ValueToken::Float64,
            TOKEN_BIG_DECIMAL => ValueToken::BigDecimal,
            0x2B..=0x3F => ValueToken::Reserved,
            0x40..=0x5F => ValueToken::TinyAscii((b & 0x1F) + 1),
            0x60..=0x7F => ValueToken::SmallAscii((b & 0x1F) + 33),
            0x80..=0x9F => ValueToken::TinyUnicode((b & 0x1F) + 2),
            0xA0..=0xBF => ValueToken::ShortUnicode((b & 0x1F) + 34),
            0xC0..=0xDF => ValueToken::SmallInt(b & 0x1F),
            0xE0..=0xE3 => ValueToken::LongAscii,
            0xE4..=0xE7 => ValueToken::LongUnicode,
            0xE8..=0xEB => ValueToken::Binary7Bit,
            0xEC..=0xEF => ValueToken::SharedStringLong(b & 0x03),
            0xF0..=0xF7 => ValueToken::Reserved,
            0xF8 => ValueToken::StartArray,
            0xF9 => ValueToken::EndArray,
            0xFA => ValueToken::StartObject,
            0xFB => ValueToken::EndObject,
            0xFC => ValueToken::Reserved,
            0xFD => ValueToken::BinaryRaw,
            0xFE => ValueToken::Reserved,
            0xFF => ValueToken::EndOfContent,
        }
    }
}

/// Key-context token classes. For internal use only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyToken {
    EmptyString,
    /// Two-byte shared name reference; holds the high 2 bits of the index.
    SharedNameLong(u8),
    LongName,
    /// One-byte shared name reference, index 0..=63.
    SharedNameShort(u8),
    /// ASCII name, length 1..=64.
    ShortAscii(u8),
    /// Non-ASCII name, length 2..=57.
    ShortUnicode(u8),
    EndObject,
    EndOfContent,
    Reserved,
}

impl KeyToken {
    /// Classify a token byte read while expecting an object key.
    pub fn from_u8(b: u8) -> KeyToken {
        match b {
            0x20 => KeyToken::EmptyString,
            0x30..=0x33 => KeyToken::SharedNameLong(b & 0x03),
            0x34 => KeyToken::LongName,
            0x40..=0x7F => KeyToken::SharedNameShort(b - PREFIX_KEY_SHARED_SHORT),
            0x80..=0xBF => KeyToken::ShortAscii((b & 0x3F) + 1),
            0xC0..=0xF7 => KeyToken::ShortUnicode((b - PREFIX_KEY_UNICODE) + 2),
            0xFB => KeyToken::EndObject,
            0xFF => KeyToken::EndOfContent,
            _ => KeyToken::Reserved,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn value_boundaries() {
        assert_eq!(ValueToken::from_u8(0x00), ValueToken::Padding);
        assert_eq!(ValueToken::from_u8(0x01), ValueToken::SharedStringShort(0));
        assert_eq!(ValueToken::from_u8(0x1F), ValueToken::SharedStringShort(30));
        assert_eq!(ValueToken::from_u8(0x40), ValueToken::TinyAscii(1));
        assert_eq!(ValueToken::from_u8(0x5F), ValueToken::TinyAscii(32));
        assert_eq!(ValueToken::from_u8(0x60), ValueToken::SmallAscii(33));
        assert_eq!(ValueToken::from_u8(0x7F), ValueToken::SmallAscii(64));
        assert_eq!(ValueToken::from_u8(0x80), ValueToken::TinyUnicode(2));
        assert_eq!(ValueToken::from_u8(0x9F), ValueToken::TinyUnicode(33));
        assert_eq!(ValueToken::from_u8(0xA0), ValueToken::ShortUnicode(34));
        assert_eq!(ValueToken::from_u8(0xC0), ValueToken::SmallInt(0));
        assert_eq!(ValueToken::from_u8(0xDF), ValueToken::SmallInt(31));
        assert_eq!(ValueToken::from_u8(0xEC), ValueToken::SharedStringLong(0));
        assert_eq!(ValueToken::from_u8(0xEF), ValueToken::SharedStringLong(3));
    }

    #[test]
    fn value_reserved_ranges() {
        for b in [0x27, 0x2B, 0x2C, 0x3F, 0xF0, 0xF7, 0xFC, 0xFE] {
            assert_eq!(
                ValueToken::from_u8(b),
                ValueToken::Reserved,
                "0x{:02X} should be reserved in value context",
                b
            );
        }
    }

    #[test]
    fn key_boundaries() {
        assert_eq!(KeyToken::from_u8(0x20), KeyToken::EmptyString);
        assert_eq!(KeyToken::from_u8(0x30), KeyToken::SharedNameLong(0));
        assert_eq!(KeyToken::from_u8(0x33), KeyToken::SharedNameLong(3));
        assert_eq!(KeyToken::from_u8(0x34), KeyToken::LongName);
        assert_eq!(KeyToken::from_u8(0x40), KeyToken::SharedNameShort(0));
        assert_eq!(KeyToken::from_u8(0x7F), KeyToken::SharedNameShort(63));
        assert_eq!(KeyToken::from_u8(0x80), KeyToken::ShortAscii(1));
        assert_eq!(KeyToken::from_u8(0xBF), KeyToken::ShortAscii(64));
        assert_eq!(KeyToken::from_u8(0xC0), KeyToken::ShortUnicode(2));
        assert_eq!(KeyToken::from_u8(0xF7), KeyToken::ShortUnicode(57));
        assert_eq!(KeyToken::from_u8(0xFB), KeyToken::EndObject);
        assert_eq!(KeyToken::from_u8(0xFF), KeyToken::EndOfContent);
    }

    #[test]
    fn key_reserved_ranges() {
        for b in [0x00, 0x1F, 0x21, 0x2F, 0x35, 0x3F, 0xF8, 0xFA, 0xFC, 0xFE] {
            assert_eq!(
                KeyToken::from_u8(b),
                KeyToken::Reserved,
                "0x{:02X} should be reserved in key context",
                b
            );
        }
    }
}
