//! The pull-parser and the value-tree decoder built on top of it.

use std::collections::BTreeMap;

use byteorder::ReadBytesExt;

use crate::bits;
use crate::error::{DecodeError, Error, Result};
use crate::shared::{self, RefTable};
use crate::token::*;
use crate::value::Value;
use crate::varint;
use crate::MAX_NESTING_DEPTH;

/// Feature flags parsed from a document header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Format version from the header's high nibble. Always 0 today.
    pub version: u8,
    /// Shared field-name back-references may appear.
    pub shared_names: bool,
    /// Shared string-value back-references may appear.
    pub shared_values: bool,
    /// Raw (non-7-bit) binary values may appear.
    pub raw_binary: bool,
}

impl Header {
    /// What a decoder must assume when a stream carries no header.
    fn headerless() -> Header {
        Header {
            version: 0,
            shared_names: true,
            shared_values: false,
            raw_binary: false,
        }
    }
}

/// One parse event. Containers arrive as start/end pairs with their contents
/// in between; object entries arrive as a `Key` followed by the value.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Null,
    Boolean(bool),
    Int(i64),
    F32(f32),
    F64(f64),
    String(String),
    Binary(Vec<u8>),
    StartArray,
    EndArray,
    StartObject,
    EndObject,
    Key(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Head,
    Value,
    Key,
    Done,
    Bad,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Frame {
    Array,
    Object,
}

/// A streaming SMILE parser.
///
/// Yields [`Element`]s one at a time, either through [`Parser::next_element`]
/// or the `Iterator` impl. The parser owns the reader-side shared-string
/// tables and the container stack; it checks structure as it goes, so a
/// `StartObject` is always eventually matched by an `EndObject` in the
/// element stream unless an error cuts it short.
///
/// Several documents may follow each other in one buffer when separated by
/// the 0xFF end-of-content marker; each new header resets the tables.
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    data: &'a [u8],
    header: Header,
    state: State,
    frames: Vec<Frame>,
    names: RefTable,
    values: RefTable,
}

impl<'a> Parser<'a> {
    /// Parser for a stream that begins with the 4-byte header.
    pub fn new(data: &'a [u8]) -> Parser<'a> {
        Parser {
            data,
            header: Header::headerless(),
            state: State::Head,
            frames: Vec::new(),
            names: RefTable::new(),
            values: RefTable::new(),
        }
    }

    /// Parser for a headerless stream. Such a stream must be decoded as if
    /// its header had declared shared names on, shared values off, and raw
    /// binary off.
    pub fn new_headerless(data: &'a [u8]) -> Parser<'a> {
        Parser {
            data,
            header: Header::headerless(),
            state: State::Value,
            frames: Vec::new(),
            names: RefTable::new(),
            values: RefTable::new(),
        }
    }

    /// The feature flags in force, once the header has been read.
    pub fn header(&self) -> Header {
        self.header
    }

    /// Pull the next element. `Ok(None)` signals a cleanly ended stream.
    /// After an error, every further call fails.
    pub fn next_element(&mut self) -> Result<Option<Element>> {
        match self.step() {
            Ok(elem) => Ok(elem),
            Err(err) => {
                self.state = State::Bad;
                Err(err)
            }
        }
    }

    fn step(&mut self) -> Result<Option<Element>> {
        loop {
            match self.state {
                State::Head => {
                    self.read_header()?;
                    self.names.clear();
                    self.values.clear();
                    self.state = State::Value;
                }
                State::Value => {
                    if self.frames.is_empty() && self.data.is_empty() {
                        self.state = State::Done;
                        continue;
                    }
                    if let Some(elem) = self.value_token()? {
                        return Ok(Some(elem));
                    }
                }
                State::Key => {
                    if let Some(elem) = self.key_token()? {
                        return Ok(Some(elem));
                    }
                }
                State::Done => {
                    if self.data.is_empty() {
                        return Ok(None);
                    }
                    if self.data[0] == HEADER_BYTE_1 {
                        self.state = State::Head;
                        continue;
                    }
                    return Err(Error::BadDecode(format!(
                        "trailing byte 0x{:02X} after end of content",
                        self.data[0]
                    )));
                }
                State::Bad => {
                    return Err(Error::BadDecode(
                        "parser previously hit an error".to_string(),
                    ))
                }
            }
        }
    }

    fn read_header(&mut self) -> Result<()> {
        if self.data.len() < 4 {
            return Err(Error::BadHeader(format!(
                "only {} byte(s) available",
                self.data.len()
            )));
        }
        let (head, rest) = self.data.split_at(4);
        if head[0] != HEADER_BYTE_1 || head[1] != HEADER_BYTE_2 || head[2] != HEADER_BYTE_3 {
            return Err(Error::BadHeader(format!(
                "bad magic {:02X} {:02X} {:02X}",
                head[0], head[1], head[2]
            )));
        }
        let features = head[3];
        let version = features >> 4;
        if version != 0 {
            return Err(Error::BadHeader(format!(
                "unsupported format version {}",
                version
            )));
        }
        self.data = rest;
        self.header = Header {
            version,
            shared_names: features & HEADER_BIT_SHARED_NAMES != 0,
            shared_values: features & HEADER_BIT_SHARED_VALUES != 0,
            raw_binary: features & HEADER_BIT_RAW_BINARY != 0,
        };
        Ok(())
    }

    /// Handle one byte in value context. Returns `None` for bytes that don't
    /// produce an element (padding, end-of-content).
    fn value_token(&mut self) -> Result<Option<Element>> {
        let byte = self.read_u8("value token")?;
        let elem = match ValueToken::from_u8(byte) {
            ValueToken::Padding => return Ok(None),
            ValueToken::SharedStringShort(ix) => {
                Element::String(self.shared_value(usize::from(ix))?)
            }
            ValueToken::SharedStringLong(high) => {
                let low = self.read_u8("shared value reference")?;
                Element::String(self.shared_value(usize::from(high) << 8 | usize::from(low))?)
            }
            ValueToken::EmptyString => Element::String(String::new()),
            ValueToken::Null => Element::Null,
            ValueToken::False => Element::Boolean(false),
            ValueToken::True => Element::Boolean(true),
            ValueToken::Int32 => Element::Int(varint::read_signed(&mut self.data, "32-bit int")?),
            ValueToken::Int64 => Element::Int(varint::read_signed(&mut self.data, "64-bit int")?),
            ValueToken::BigInteger => return Err(Error::Unsupported("BigInteger")),
            ValueToken::BigDecimal => return Err(Error::Unsupported("BigDecimal")),
            ValueToken::Float32 => {
                let raw = self.take(5, "32-bit float")?;
                self.require_7bit(raw, "32-bit float")?;
                Element::F32(bits::get_f32(raw))
            }
            ValueToken::Float64 => {
                let raw = self.take(10, "64-bit float")?;
                self.require_7bit(raw, "64-bit float")?;
                Element::F64(bits::get_f64(raw))
            }
            ValueToken::TinyAscii(len) | ValueToken::SmallAscii(len) => {
                let text = self.read_str(usize::from(len), true, "short ASCII value")?;
                if self.header.shared_values && shared::eligible(&text) {
                    self.values.insert(&text);
                }
                Element::String(text)
            }
            ValueToken::TinyUnicode(len) | ValueToken::ShortUnicode(len) => {
                let text = self.read_str(usize::from(len), false, "short Unicode value")?;
                if self.header.shared_values && shared::eligible(&text) {
                    self.values.insert(&text);
                }
                Element::String(text)
            }
            ValueToken::SmallInt(zigzag) => Element::Int(bits::zigzag_decode(u64::from(zigzag))),
            ValueToken::LongAscii => {
                let text = self.read_terminated_str("long ASCII value")?;
                if !text.is_ascii() {
                    return Err(Error::BadDecode(
                        "non-ASCII byte in long ASCII value".to_string(),
                    ));
                }
                Element::String(text)
            }
            ValueToken::LongUnicode => Element::String(self.read_terminated_str("long Unicode value")?),
            ValueToken::Binary7Bit => Element::Binary(self.read_7bit_binary()?),
            ValueToken::BinaryRaw => {
                if !self.header.raw_binary {
                    return Err(Error::MissingFeature("raw binary"));
                }
                let len = self.read_len("raw binary length")?;
                Element::Binary(self.take(len, "raw binary payload")?.to_vec())
            }
            ValueToken::StartArray => {
                self.push_frame(Frame::Array)?;
                return Ok(Some(Element::StartArray));
            }
            ValueToken::StartObject => {
                self.push_frame(Frame::Object)?;
                self.state = State::Key;
                return Ok(Some(Element::StartObject));
            }
            ValueToken::EndArray => {
                if self.frames.pop() != Some(Frame::Array) {
                    return Err(Error::BadDecode(
                        "end of array with no array open".to_string(),
                    ));
                }
                self.after_value();
                return Ok(Some(Element::EndArray));
            }
            ValueToken::EndObject => {
                return Err(Error::BadDecode(
                    "end of object in place of a value".to_string(),
                ))
            }
            ValueToken::EndOfContent => {
                if !self.frames.is_empty() {
                    return Err(Error::BadDecode(
                        "end-of-content marker inside an open container".to_string(),
                    ));
                }
                self.state = State::Done;
                return Ok(None);
            }
            ValueToken::Reserved => {
                return Err(Error::ReservedToken {
                    context: "value",
                    byte,
                })
            }
        };
        self.after_value();
        Ok(Some(elem))
    }

    /// Handle one byte in key context.
    fn key_token(&mut self) -> Result<Option<Element>> {
        let byte = self.read_u8("key token")?;
        let key = match KeyToken::from_u8(byte) {
            KeyToken::EmptyString => String::new(),
            KeyToken::SharedNameShort(ix) => self.shared_name(usize::from(ix))?,
            KeyToken::SharedNameLong(high) => {
                let low = self.read_u8("shared name reference")?;
                self.shared_name(usize::from(high) << 8 | usize::from(low))?
            }
            KeyToken::ShortAscii(len) => {
                let name = self.read_str(usize::from(len), true, "short ASCII name")?;
                if self.header.shared_names && shared::eligible(&name) {
                    self.names.insert(&name);
                }
                name
            }
            KeyToken::ShortUnicode(len) => {
                let name = self.read_str(usize::from(len), false, "short Unicode name")?;
                if self.header.shared_names && shared::eligible(&name) {
                    self.names.insert(&name);
                }
                name
            }
            KeyToken::LongName => {
                let name = self.read_terminated_str("long name")?;
                if self.header.shared_names && shared::eligible(&name) {
                    self.names.insert(&name);
                }
                name
            }
            KeyToken::EndObject => {
                if self.frames.pop() != Some(Frame::Object) {
                    return Err(Error::BadDecode(
                        "end of object with no object open".to_string(),
                    ));
                }
                self.after_value();
                return Ok(Some(Element::EndObject));
            }
            KeyToken::EndOfContent => {
                return Err(Error::BadDecode(
                    "end-of-content marker inside an open object".to_string(),
                ))
            }
            KeyToken::Reserved => {
                return Err(Error::ReservedToken {
                    context: "key",
                    byte,
                })
            }
        };
        self.state = State::Value;
        Ok(Some(Element::Key(key)))
    }

    /// After a complete value, an object expects the next key; arrays and the
    /// root expect another value.
    fn after_value(&mut self) {
        self.state = match self.frames.last() {
            Some(Frame::Object) => State::Key,
            _ => State::Value,
        };
    }

    fn push_frame(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() >= MAX_NESTING_DEPTH {
            return Err(Error::ParseLimit(format!(
                "more than {} nested containers",
                MAX_NESTING_DEPTH
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn shared_value(&self, ix: usize) -> Result<String> {
        if !self.header.shared_values {
            return Err(Error::MissingFeature("shared string values"));
        }
        self.values
            .get(ix)
            .map(str::to_string)
            .ok_or(Error::BadBackRef {
                table: "values",
                index: ix,
                len: self.values.len(),
            })
    }

    fn shared_name(&self, ix: usize) -> Result<String> {
        if !self.header.shared_names {
            return Err(Error::MissingFeature("shared field names"));
        }
        self.names
            .get(ix)
            .map(str::to_string)
            .ok_or(Error::BadBackRef {
                table: "names",
                index: ix,
                len: self.names.len(),
            })
    }

    fn read_u8(&mut self, step: &'static str) -> Result<u8> {
        self.data.read_u8().map_err(|_| Error::LengthTooShort {
            step,
            actual: 0,
            expected: 1,
        })
    }

    fn take(&mut self, n: usize, step: &'static str) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(Error::LengthTooShort {
                step,
                actual: self.data.len(),
                expected: n,
            });
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Ok(head)
    }

    fn read_len(&mut self, step: &'static str) -> Result<usize> {
        let len = varint::read_unsigned(&mut self.data, step)?;
        if len > self.data.len() as u64 {
            return Err(Error::LengthTooShort {
                step,
                actual: self.data.len(),
                expected: len as usize,
            });
        }
        Ok(len as usize)
    }

    fn read_str(&mut self, len: usize, ascii: bool, step: &'static str) -> Result<String> {
        let raw = self.take(len, step)?;
        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::BadDecode(format!("invalid UTF-8 in {}: {}", step, e)))?;
        if ascii && !text.is_ascii() {
            return Err(Error::BadDecode(format!("non-ASCII byte in {}", step)));
        }
        Ok(text.to_string())
    }

    /// Read UTF-8 up to the 0xFC end-of-string marker, consuming the marker.
    fn read_terminated_str(&mut self, step: &'static str) -> Result<String> {
        let end = self
            .data
            .iter()
            .position(|&b| b == BYTE_END_OF_STRING)
            .ok_or(Error::LengthTooShort {
                step,
                actual: 0,
                expected: 1,
            })?;
        let raw = &self.data[..end];
        self.data = &self.data[end + 1..];
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|e| Error::BadDecode(format!("invalid UTF-8 in {}: {}", step, e)))
    }

    fn read_7bit_binary(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len("7-bit binary length")?;
        let payload = self.take(bits::packed_len(len), "7-bit binary payload")?;
        self.require_7bit(payload, "7-bit binary payload")?;
        let mut out = Vec::with_capacity(len);
        bits::unpack_7bit(payload, len, &mut out);
        Ok(out)
    }

    fn require_7bit(&self, payload: &[u8], step: &'static str) -> Result<()> {
        if payload.iter().any(|b| b & 0x80 != 0) {
            return Err(Error::BadDecode(format!(
                "byte with high bit set in {}",
                step
            )));
        }
        Ok(())
    }
}

impl<'a> Iterator for Parser<'a> {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Bad {
            return None;
        }
        match self.next_element() {
            Ok(Some(elem)) => Some(Ok(elem)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Partially built containers, kept so a failure can still report the value
/// prefix assembled so far.
enum PartBuilt {
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>, Option<String>),
}

fn collapse(stack: Vec<PartBuilt>) -> Option<Value> {
    let mut current: Option<Value> = None;
    for part in stack.into_iter().rev() {
        let v = match part {
            PartBuilt::Array(mut items) => {
                if let Some(c) = current {
                    items.push(c);
                }
                Value::Array(items)
            }
            PartBuilt::Object(mut map, pending) => {
                if let (Some(k), Some(c)) = (pending, current) {
                    map.insert(k, c);
                }
                Value::Object(map)
            }
        };
        current = Some(v);
    }
    current
}

/// Fold parser elements into the next root value. `Ok(None)` means the
/// stream ended cleanly before another value began.
fn next_value(parser: &mut Parser) -> std::result::Result<Option<Value>, DecodeError> {
    let mut stack: Vec<PartBuilt> = Vec::new();

    macro_rules! fail {
        ($err:expr) => {
            return Err(DecodeError::new($err, collapse(stack)))
        };
    }

    loop {
        let elem = match parser.next_element() {
            Ok(Some(elem)) => elem,
            Ok(None) => {
                if stack.is_empty() {
                    return Ok(None);
                }
                fail!(Error::BadDecode(
                    "input ended inside an open container".to_string()
                ));
            }
            Err(err) => fail!(err),
        };
        let finished = match elem {
            Element::StartArray => {
                stack.push(PartBuilt::Array(Vec::new()));
                continue;
            }
            Element::StartObject => {
                stack.push(PartBuilt::Object(BTreeMap::new(), None));
                continue;
            }
            Element::Key(key) => {
                match stack.last_mut() {
                    Some(PartBuilt::Object(_, pending)) => *pending = Some(key),
                    _ => fail!(Error::BadDecode("key outside of an object".to_string())),
                }
                continue;
            }
            Element::EndArray => match stack.pop() {
                Some(PartBuilt::Array(items)) => Value::Array(items),
                _ => fail!(Error::BadDecode("mismatched end of array".to_string())),
            },
            Element::EndObject => match stack.pop() {
                Some(PartBuilt::Object(map, _)) => Value::Object(map),
                _ => fail!(Error::BadDecode("mismatched end of object".to_string())),
            },
            Element::Null => Value::Null,
            Element::Boolean(v) => Value::Boolean(v),
            Element::Int(v) => Value::Int(v),
            Element::F32(v) => Value::F32(v),
            Element::F64(v) => Value::F64(v),
            Element::String(v) => Value::String(v),
            Element::Binary(v) => Value::Binary(v),
        };
        match stack.last_mut() {
            None => return Ok(Some(finished)),
            Some(PartBuilt::Array(items)) => items.push(finished),
            Some(PartBuilt::Object(map, pending)) => match pending.take() {
                Some(key) => {
                    map.insert(key, finished);
                }
                None => fail!(Error::BadDecode("value with no preceding key".to_string())),
            },
        }
    }
}

/// Decode a single document, which must start with the 4-byte header.
///
/// Trailing content after the document (beyond an optional end-of-content
/// marker) is an error; use [`decode_all`] for multi-document streams.
pub fn decode(buf: &[u8]) -> std::result::Result<Value, DecodeError> {
    let mut parser = Parser::new(buf);
    decode_single(&mut parser)
}

/// Decode a single headerless document, assuming shared names on, shared
/// values off, and raw binary off.
pub fn decode_headerless(buf: &[u8]) -> std::result::Result<Value, DecodeError> {
    let mut parser = Parser::new_headerless(buf);
    decode_single(&mut parser)
}

fn decode_single(parser: &mut Parser) -> std::result::Result<Value, DecodeError> {
    let value = next_value(parser)?
        .ok_or_else(|| DecodeError::from(Error::BadDecode("no value in input".to_string())))?;
    match next_value(parser) {
        Ok(None) => Ok(value),
        Ok(Some(_)) => Err(DecodeError::new(
            Error::BadDecode("more than one root value; use decode_all".to_string()),
            Some(value),
        )),
        Err(mut err) => {
            err.partial = Some(value);
            Err(err)
        }
    }
}

/// Decode every root value in the buffer, across any number of
/// end-of-content-separated documents. Each new header resets the
/// shared-string tables.
pub fn decode_all(buf: &[u8]) -> std::result::Result<Vec<Value>, DecodeError> {
    let mut parser = Parser::new(buf);
    let mut values = Vec::new();
    while let Some(value) = next_value(&mut parser)? {
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::{encode, encode_with_options, SmileOptions};

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    fn object(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn reference_vectors() {
        let scenario5 = object(&[
            ("a", Value::from("1")),
            ("b", int(2)),
            ("c", Value::Array(vec![int(3)])),
            ("d", int(-1)),
            ("e", Value::F32(4.2)),
        ]);
        let cases: Vec<(&str, Value)> = vec![
            ("3A290A03F8C2F9", Value::Array(vec![int(1)])),
            ("3A290A03F8C2C4F9", Value::Array(vec![int(1), int(2)])),
            (
                "3A290A03F8C2C4FA8063C6FBF9",
                Value::Array(vec![int(1), int(2), object(&[("c", int(3))])]),
            ),
            ("3A290A03FA8061C2FB", object(&[("a", int(1))])),
            (
                "3A290A03FA806140318063F8C6F98062C4806528664C1904048064C1FB",
                scenario5,
            ),
            (
                "3A290A03FA8061FA8062FA8063FA8064F84065F9FBFBFBFB",
                object(&[(
                    "a",
                    object(&[(
                        "b",
                        object(&[("c", object(&[("d", Value::Array(vec!["e".into()]))]))]),
                    )]),
                )]),
            ),
        ];
        for (hex_bytes, want) in cases {
            let bytes = hex::decode(hex_bytes).unwrap();
            let got = decode(&bytes).unwrap();
            assert_eq!(got, want, "decoding {}", hex_bytes);
        }
    }

    #[test]
    fn roundtrip_scalars() {
        let cases = vec![
            Value::Null,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::from(""),
            Value::from("short"),
            Value::from("a".repeat(64)),
            Value::from("a".repeat(65)),
            Value::from("é".repeat(40)),
            int(0),
            int(15),
            int(-16),
            int(16),
            int(-17),
            int(i32::MAX as i64),
            int(i32::MIN as i64),
            int(i32::MAX as i64 + 1),
            int(i32::MIN as i64 - 1),
            int(i64::MAX),
            int(i64::MIN),
            Value::F32(4.2),
            Value::F64(4.2),
            Value::F64(-0.0),
            Value::F64(f64::INFINITY),
            Value::F64(f64::NEG_INFINITY),
            Value::Binary(vec![]),
            Value::Binary((0..=255).collect()),
        ];
        for value in cases {
            let enc = encode(&value).unwrap();
            assert_eq!(decode(&enc).unwrap(), value, "roundtrip of {:?}", value);
        }
    }

    #[test]
    fn roundtrip_nan() {
        let enc = encode(&Value::F64(f64::NAN)).unwrap();
        match decode(&enc).unwrap() {
            Value::F64(v) => assert!(v.is_nan()),
            other => panic!("expected F64, got {:?}", other),
        }
    }

    #[test]
    fn roundtrip_structures() {
        let doc = object(&[
            ("empty_array", Value::Array(vec![])),
            ("empty_object", object(&[])),
            (
                "mixed",
                Value::Array(vec![
                    Value::Null,
                    int(42),
                    Value::from("text"),
                    Value::Binary(vec![1, 2, 3]),
                    object(&[("nested", Value::Boolean(false))]),
                ]),
            ),
            ("", Value::from("empty key above")),
        ]);
        for opts in [
            SmileOptions::default(),
            SmileOptions {
                shared_names: false,
                shared_values: false,
                ..Default::default()
            },
            SmileOptions {
                encode_as_7bit: false,
                ..Default::default()
            },
            SmileOptions {
                write_end_marker: true,
                ..Default::default()
            },
        ] {
            let enc = encode_with_options(&doc, opts).unwrap();
            assert_eq!(decode(&enc).unwrap(), doc, "options {:?}", opts);
        }
    }

    #[test]
    fn roundtrip_headerless() {
        let doc = object(&[("k", Value::from("v"))]);
        let opts = SmileOptions {
            write_header: false,
            shared_values: false,
            ..Default::default()
        };
        let enc = encode_with_options(&doc, opts).unwrap();
        assert_eq!(decode_headerless(&enc).unwrap(), doc);
        // The same bytes are not a valid headered document.
        assert!(decode(&enc).is_err());
    }

    #[test]
    fn shared_value_references() {
        // Enough distinct values to push a repeat past the one-byte range.
        let mut items: Vec<Value> = (0..40).map(|i| Value::from(format!("v{:02}", i))).collect();
        items.push(Value::from("v00")); // index 0, one-byte form
        items.push(Value::from("v35")); // index 35, two-byte form
        let doc = Value::Array(items);
        let enc = encode(&doc).unwrap();
        // One-byte reference to slot 0 and a two-byte 0xEC-prefixed reference
        // must both appear.
        assert!(enc.contains(&0x01));
        assert!(enc.windows(2).any(|w| w == [0xEC, 35]));
        assert_eq!(decode(&enc).unwrap(), doc);
    }

    #[test]
    fn shared_name_references() {
        // 70 distinct keys, then the whole object again: the second pass uses
        // one-byte references for early names and two-byte ones past 63.
        let keys: Vec<String> = (0..70).map(|i| format!("key{:02}", i)).collect();
        let mut w = crate::SmileWriter::new(SmileOptions::default());
        w.write_header();
        w.write_start_array().unwrap();
        for _ in 0..2 {
            w.write_start_object().unwrap();
            for key in &keys {
                w.write_field_name(key);
                w.write_null();
            }
            w.write_end_object().unwrap();
        }
        w.write_end_array().unwrap();
        let enc = w.finish().unwrap();
        assert!(enc.windows(2).any(|w| w == [0x30, 64]));

        let entries: Vec<(String, Value)> =
            keys.iter().map(|k| (k.clone(), Value::Null)).collect();
        let want = Value::Object(entries.into_iter().collect());
        let got = decode(&enc).unwrap();
        assert_eq!(got, Value::Array(vec![want.clone(), want]));
    }

    #[test]
    fn table_reset_at_capacity() {
        // 1024 names fill the table; the next insert resets it on both
        // sides, after which references start over from index 0.
        let mut w = crate::SmileWriter::new(SmileOptions::default());
        w.write_header();
        w.write_start_object().unwrap();
        for i in 0..crate::MAX_SHARED_ENTRIES {
            w.write_field_name(&format!("name{:04}", i));
            w.write_null();
        }
        w.write_field_name("overflow");
        w.write_null();
        // "overflow" landed at index 0 of the freshly reset table.
        w.write_field_name("overflow");
        w.write_null();
        w.write_end_object().unwrap();
        let enc = w.finish().unwrap();
        // The repeat of "overflow" is a reference to slot 0 of the new table.
        assert_eq!(&enc[enc.len() - 3..], &[0x40, 0x21, 0xFB]);

        let decoded = decode(&enc).unwrap();
        let map = decoded.as_object().unwrap();
        assert_eq!(map.len(), crate::MAX_SHARED_ENTRIES + 1);
        assert!(map.contains_key("overflow"));
    }

    #[test]
    fn value_table_reset_at_capacity() {
        let mut items: Vec<Value> = (0..crate::MAX_SHARED_ENTRIES + 1)
            .map(|i| Value::from(format!("value{:04}", i)))
            .collect();
        items.push(Value::from("value0000"));
        items.push(Value::from(format!("value{:04}", crate::MAX_SHARED_ENTRIES)));
        let doc = Value::Array(items);
        let enc = encode(&doc).unwrap();
        assert_eq!(decode(&enc).unwrap(), doc);
    }

    #[test]
    fn multiple_documents() {
        let first = object(&[("doc", int(1))]);
        let second = object(&[("doc", int(2))]);
        let opts = SmileOptions {
            write_end_marker: true,
            ..Default::default()
        };
        let mut buf = encode_with_options(&first, opts).unwrap();
        buf.extend(encode_with_options(&second, opts).unwrap());
        let values = decode_all(&buf).unwrap();
        assert_eq!(values, vec![first.clone(), second]);

        // decode() insists on a single document.
        assert!(decode(&buf).is_err());
        assert_eq!(decode(&buf).unwrap_err().partial, Some(first));
    }

    #[test]
    fn root_value_sequence() {
        let mut w = crate::SmileWriter::new(SmileOptions::default());
        w.write_header();
        w.write_int(1);
        w.write_int(2);
        let enc = w.finish().unwrap();
        assert_eq!(decode_all(&enc).unwrap(), vec![int(1), int(2)]);
    }

    #[test]
    fn padding_is_skipped() {
        let bytes = [0x3A, 0x29, 0x0A, 0x03, 0x00, 0x00, 0xC2];
        assert_eq!(decode(&bytes).unwrap(), int(1));
    }

    mod failures {
        use super::*;

        fn decode_err(bytes: &[u8]) -> Error {
            decode(bytes).unwrap_err().error
        }

        #[test]
        fn bad_headers() {
            assert!(matches!(decode_err(b""), Error::BadHeader(_)));
            assert!(matches!(decode_err(b":)"), Error::BadHeader(_)));
            assert!(matches!(decode_err(b"x)\n\x03"), Error::BadHeader(_)));
            // Version nibble must be zero.
            assert!(matches!(
                decode_err(&[0x3A, 0x29, 0x0A, 0x13, 0x21]),
                Error::BadHeader(_)
            ));
        }

        #[test]
        fn reserved_tokens() {
            for b in [0x27u8, 0x2B, 0x2C, 0x3F, 0xF0, 0xF7, 0xFE] {
                let bytes = [0x3A, 0x29, 0x0A, 0x03, b];
                assert!(
                    matches!(decode_err(&bytes), Error::ReservedToken { .. }),
                    "byte 0x{:02X}",
                    b
                );
            }
        }

        #[test]
        fn reserved_key_tokens() {
            for b in [0x01u8, 0x21, 0x35, 0x3A, 0xF8, 0xFA] {
                let bytes = [0x3A, 0x29, 0x0A, 0x03, 0xFA, b];
                assert!(
                    matches!(decode_err(&bytes), Error::ReservedToken { .. }),
                    "key byte 0x{:02X}",
                    b
                );
            }
        }

        #[test]
        fn big_number_tokens_are_recognized() {
            assert_eq!(
                decode_err(&[0x3A, 0x29, 0x0A, 0x03, 0x26]),
                Error::Unsupported("BigInteger")
            );
            assert_eq!(
                decode_err(&[0x3A, 0x29, 0x0A, 0x03, 0x2A]),
                Error::Unsupported("BigDecimal")
            );
        }

        #[test]
        fn back_reference_out_of_range() {
            // A reference before anything was inserted.
            let bytes = [0x3A, 0x29, 0x0A, 0x03, 0x01];
            assert!(matches!(decode_err(&bytes), Error::BadBackRef { .. }));

            let bytes = [0x3A, 0x29, 0x0A, 0x03, 0xFA, 0x40];
            assert!(matches!(decode_err(&bytes), Error::BadBackRef { .. }));
        }

        #[test]
        fn shared_refs_require_feature_bits() {
            // Feature byte 0x00: no sharing at all.
            let bytes = [0x3A, 0x29, 0x0A, 0x00, 0x01];
            assert!(matches!(decode_err(&bytes), Error::MissingFeature(_)));

            let bytes = [0x3A, 0x29, 0x0A, 0x00, 0xFA, 0x40];
            assert!(matches!(decode_err(&bytes), Error::MissingFeature(_)));
        }

        #[test]
        fn raw_binary_requires_feature_bit() {
            let bytes = [0x3A, 0x29, 0x0A, 0x03, 0xFD, 0x81, 0x00];
            assert!(matches!(decode_err(&bytes), Error::MissingFeature(_)));
        }

        #[test]
        fn truncation_everywhere() {
            let doc = object(&[
                ("text", Value::from("some value here")),
                ("num", Value::F64(3.5)),
                ("bin", Value::Binary(vec![9, 8, 7])),
            ]);
            let enc = encode(&doc).unwrap();
            for cut in 4..enc.len() {
                assert!(
                    decode(&enc[..cut]).is_err(),
                    "prefix of {} bytes decoded",
                    cut
                );
            }
        }

        #[test]
        fn unterminated_long_string() {
            let mut bytes = vec![0x3A, 0x29, 0x0A, 0x03, 0xE0];
            bytes.extend(b"a".repeat(80));
            assert!(matches!(
                decode_err(&bytes),
                Error::LengthTooShort { .. }
            ));
        }

        #[test]
        fn end_marker_inside_container() {
            let bytes = [0x3A, 0x29, 0x0A, 0x03, 0xF8, 0xC2, 0xFF];
            assert!(matches!(decode_err(&bytes), Error::BadDecode(_)));
        }

        #[test]
        fn mismatched_containers() {
            let bytes = [0x3A, 0x29, 0x0A, 0x03, 0xF9];
            assert!(matches!(decode_err(&bytes), Error::BadDecode(_)));

            // Object closed with an array end.
            let bytes = [0x3A, 0x29, 0x0A, 0x03, 0xFA, 0x80, b'a', 0xF9];
            assert!(decode(&bytes).is_err());
        }

        #[test]
        fn depth_limit() {
            let mut bytes = vec![0x3A, 0x29, 0x0A, 0x03];
            bytes.extend(std::iter::repeat(0xF8).take(crate::MAX_NESTING_DEPTH + 1));
            assert!(matches!(decode_err(&bytes), Error::ParseLimit(_)));
        }

        #[test]
        fn partial_prefix_reported() {
            // Array of two ints, then garbage.
            let bytes = [0x3A, 0x29, 0x0A, 0x03, 0xF8, 0xC2, 0xC4, 0x27];
            let err = decode(&bytes).unwrap_err();
            assert_eq!(err.partial, Some(Value::Array(vec![int(1), int(2)])));

            let bytes = [0x3A, 0x29, 0x0A, 0x03, 0xFA, 0x80, b'a', 0xC2, 0x27];
            let err = decode(&bytes).unwrap_err();
            assert_eq!(err.partial, Some(object(&[("a", int(1))])));
        }

        #[test]
        fn parser_stays_failed() {
            let bytes = [0x3A, 0x29, 0x0A, 0x03, 0x27, 0xC2];
            let mut parser = Parser::new(&bytes);
            assert!(parser.next_element().is_err());
            assert!(parser.next_element().is_err());
        }
    }

    mod corruption {
        use super::*;

        // Every single-byte corruption of a reference document must either
        // produce a typed error or decode to some value; it must never panic.
        fn sweep(hex_bytes: &str) {
            let reference = hex::decode(hex_bytes).unwrap();
            for pos in 0..reference.len() {
                for replacement in 0..=255u8 {
                    if reference[pos] == replacement {
                        continue;
                    }
                    let mut corrupt = reference.clone();
                    corrupt[pos] = replacement;
                    let _ = decode(&corrupt);
                }
            }
        }

        #[test]
        fn scenario5_sweep() {
            sweep("3A290A03FA806140318063F8C6F98062C4806528664C1904048064C1FB");
        }

        #[test]
        fn scenario6_sweep() {
            sweep("3A290A03FA8061FA8062FA8063FA8064F84065F9FBFBFBFB");
        }

        #[test]
        fn truncation_sweep() {
            let reference =
                hex::decode("3A290A03FA806140318063F8C6F98062C4806528664C1904048064C1FB")
                    .unwrap();
            for cut in 0..reference.len() {
                assert!(decode(&reference[..cut]).is_err());
            }
        }
    }

    mod random {
        use super::*;
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        fn random_value(rng: &mut StdRng, depth: usize) -> Value {
            match rng.gen_range(0..if depth < 3 { 9 } else { 7 }) {
                0 => Value::Null,
                1 => Value::Boolean(rng.gen()),
                2 => Value::Int(rng.gen()),
                3 => Value::F64(rng.gen::<f64>()),
                4 => Value::F32(2.5),
                5 => {
                    let len = rng.gen_range(0..80);
                    Value::String(
                        std::iter::repeat_with(|| rng.gen_range(b'a'..=b'z') as char)
                            .take(len)
                            .collect(),
                    )
                }
                6 => {
                    let len = rng.gen_range(0..40);
                    Value::Binary(std::iter::repeat_with(|| rng.gen()).take(len).collect())
                }
                7 => {
                    let len = rng.gen_range(0..5);
                    Value::Array((0..len).map(|_| random_value(rng, depth + 1)).collect())
                }
                _ => {
                    let len = rng.gen_range(0..5);
                    Value::Object(
                        (0..len)
                            .map(|i| (format!("k{}", i), random_value(rng, depth + 1)))
                            .collect(),
                    )
                }
            }
        }

        #[test]
        fn randomized_roundtrips() {
            let mut rng = StdRng::seed_from_u64(0x511e);
            for _ in 0..200 {
                let value = random_value(&mut rng, 0);
                let enc = encode(&value).unwrap();
                assert_eq!(decode(&enc).unwrap(), value, "roundtrip of {:?}", value);
            }
        }
    }
}
