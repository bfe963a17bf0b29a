//! The token writer and the value-tree encoder built on top of it.

use crate::bits;
use crate::error::{Error, Result};
use crate::shared::{self, SeenTable};
use crate::token::*;
use crate::value::Value;
use crate::varint;
use crate::{MAX_NESTING_DEPTH, MAX_SHAREABLE_BYTES};

/// Encoder configuration. The three feature options map onto the low bits of
/// the header's fourth byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmileOptions {
    /// Emit the 4-byte `:)\n` header. Without it, a decoder has to be told
    /// the stream is headerless.
    pub write_header: bool,
    /// Append the 0xFF end-of-content marker after the document.
    pub write_end_marker: bool,
    /// Allow back-references to repeated field names.
    pub shared_names: bool,
    /// Allow back-references to repeated short string values.
    pub shared_values: bool,
    /// Write binary payloads in the 7-bits-per-byte transport rather than
    /// raw. Raw binary sets the header bit that warns decoders that framing
    /// bytes may appear inside values.
    pub encode_as_7bit: bool,
}

impl Default for SmileOptions {
    fn default() -> Self {
        Self {
            write_header: true,
            write_end_marker: false,
            shared_names: true,
            shared_values: true,
            encode_as_7bit: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Frame {
    Array,
    Object,
}

/// Emits SMILE tokens into a growing byte vector, one method per token.
///
/// The writer keeps the two shared-string tables and just enough container
/// state to reject unbalanced `end` calls; the caller is responsible for the
/// order of keys and values within an object.
#[derive(Clone, Debug)]
pub struct SmileWriter {
    buf: Vec<u8>,
    opts: SmileOptions,
    names: SeenTable,
    values: SeenTable,
    frames: Vec<Frame>,
}

impl SmileWriter {
    /// Create a writer. No bytes are emitted until a `write_*` call; callers
    /// that want the header write it explicitly.
    pub fn new(opts: SmileOptions) -> SmileWriter {
        SmileWriter {
            buf: Vec::new(),
            opts,
            names: SeenTable::new(),
            values: SeenTable::new(),
            frames: Vec::new(),
        }
    }

    /// Write the 4-byte document header carrying this writer's feature flags.
    pub fn write_header(&mut self) {
        let mut flags = 0;
        if self.opts.shared_names {
            flags |= HEADER_BIT_SHARED_NAMES;
        }
        if self.opts.shared_values {
            flags |= HEADER_BIT_SHARED_VALUES;
        }
        if !self.opts.encode_as_7bit {
            flags |= HEADER_BIT_RAW_BINARY;
        }
        self.buf
            .extend_from_slice(&[HEADER_BYTE_1, HEADER_BYTE_2, HEADER_BYTE_3, flags]);
    }

    /// Write the optional 0xFF end-of-content marker.
    pub fn write_end_marker(&mut self) {
        self.buf.push(BYTE_END_OF_CONTENT);
    }

    pub fn write_null(&mut self) {
        self.buf.push(TOKEN_NULL);
    }

    pub fn write_boolean(&mut self, v: bool) {
        self.buf.push(if v { TOKEN_TRUE } else { TOKEN_FALSE });
    }

    /// Write an integer in its smallest form: a single token byte when the
    /// zigzag value fits in 5 bits, otherwise the 32-bit token when the value
    /// fits an i32, otherwise the 64-bit token.
    pub fn write_int(&mut self, v: i64) {
        let zigzag = bits::zigzag_encode(v);
        if zigzag < 32 {
            self.buf.push(PREFIX_SMALL_INT | zigzag as u8);
            return;
        }
        self.buf.push(if i32::try_from(v).is_ok() {
            TOKEN_INT_32
        } else {
            TOKEN_INT_64
        });
        varint::write_signed(&mut self.buf, v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.push(TOKEN_FLOAT_32);
        bits::put_f32(&mut self.buf, v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.push(TOKEN_FLOAT_64);
        bits::put_f64(&mut self.buf, v);
    }

    /// Write a string value, using a back-reference when the value sharing
    /// option is on and the string has been written before.
    pub fn write_string(&mut self, text: &str) {
        if text.is_empty() {
            self.buf.push(TOKEN_EMPTY_STRING);
            return;
        }
        let len = text.len();
        if len > MAX_SHAREABLE_BYTES {
            self.write_long_string(text);
            return;
        }
        if self.opts.shared_values {
            if let Some(ix) = self.values.find(text) {
                self.write_shared_value_ref(ix);
                return;
            }
            self.values.insert(text);
        }
        if text.is_ascii() {
            if len <= 32 {
                self.buf.push(PREFIX_TINY_ASCII | (len - 1) as u8);
            } else {
                self.buf.push(PREFIX_SMALL_ASCII | (len - 33) as u8);
            }
        } else if len <= 33 {
            self.buf.push(PREFIX_TINY_UNICODE | (len - 2) as u8);
        } else {
            self.buf.push(PREFIX_SHORT_UNICODE | (len - 34) as u8);
        }
        self.buf.extend_from_slice(text.as_bytes());
    }

    fn write_long_string(&mut self, text: &str) {
        self.buf.push(if text.is_ascii() {
            TOKEN_LONG_ASCII
        } else {
            TOKEN_LONG_UNICODE
        });
        self.buf.extend_from_slice(text.as_bytes());
        self.buf.push(BYTE_END_OF_STRING);
    }

    fn write_shared_value_ref(&mut self, ix: usize) {
        if ix < 31 {
            self.buf.push(0x01 + ix as u8);
        } else {
            self.buf.push(PREFIX_SHARED_STRING_LONG | (ix >> 8) as u8);
            self.buf.push(ix as u8);
        }
    }

    /// Write an object field name, using a back-reference when the name
    /// sharing option is on and the name has been written before.
    pub fn write_field_name(&mut self, name: &str) {
        if name.is_empty() {
            self.buf.push(KEY_EMPTY_STRING);
            return;
        }
        if self.opts.shared_names {
            if let Some(ix) = self.names.find(name) {
                self.write_shared_name_ref(ix);
                return;
            }
            if shared::eligible(name) {
                self.names.insert(name);
            }
        }
        let len = name.len();
        if name.is_ascii() && len <= 64 {
            self.buf.push(PREFIX_KEY_ASCII | (len - 1) as u8);
            self.buf.extend_from_slice(name.as_bytes());
        } else if !name.is_ascii() && (2..=57).contains(&len) {
            self.buf.push(PREFIX_KEY_UNICODE + (len - 2) as u8);
            self.buf.extend_from_slice(name.as_bytes());
        } else {
            self.buf.push(KEY_LONG_NAME);
            self.buf.extend_from_slice(name.as_bytes());
            self.buf.push(BYTE_END_OF_STRING);
        }
    }

    fn write_shared_name_ref(&mut self, ix: usize) {
        if ix < 64 {
            self.buf.push(PREFIX_KEY_SHARED_SHORT + ix as u8);
        } else {
            self.buf.push(PREFIX_KEY_SHARED_LONG | (ix >> 8) as u8);
            self.buf.push(ix as u8);
        }
    }

    /// Write a binary value in whichever transport the options selected.
    pub fn write_binary(&mut self, data: &[u8]) {
        if self.opts.encode_as_7bit {
            self.buf.push(TOKEN_BINARY_7BIT);
            varint::write_unsigned(&mut self.buf, data.len() as u64);
            bits::pack_7bit(&mut self.buf, data);
        } else {
            self.buf.push(TOKEN_BINARY_RAW);
            varint::write_unsigned(&mut self.buf, data.len() as u64);
            self.buf.extend_from_slice(data);
        }
    }

    pub fn write_start_array(&mut self) -> Result<()> {
        self.push_frame(Frame::Array)?;
        self.buf.push(TOKEN_START_ARRAY);
        Ok(())
    }

    pub fn write_end_array(&mut self) -> Result<()> {
        if self.frames.pop() != Some(Frame::Array) {
            return Err(Error::BadEncode(
                "end of array without matching start".to_string(),
            ));
        }
        self.buf.push(TOKEN_END_ARRAY);
        Ok(())
    }

    pub fn write_start_object(&mut self) -> Result<()> {
        self.push_frame(Frame::Object)?;
        self.buf.push(TOKEN_START_OBJECT);
        Ok(())
    }

    pub fn write_end_object(&mut self) -> Result<()> {
        if self.frames.pop() != Some(Frame::Object) {
            return Err(Error::BadEncode(
                "end of object without matching start".to_string(),
            ));
        }
        self.buf.push(TOKEN_END_OBJECT);
        Ok(())
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

    /// Finish the document and hand back the bytes. Fails if any container
    /// is still open.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if !self.frames.is_empty() {
            return Err(Error::BadEncode(format!(
                "{} container(s) left open",
                self.frames.len()
            )));
        }
        if self.opts.write_end_marker {
            self.buf.push(BYTE_END_OF_CONTENT);
        }
        Ok(self.buf)
    }
}

/// Encode a value tree with default options.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    encode_with_options(value, SmileOptions::default())
}

/// Encode a value tree with explicit options.
pub fn encode_with_options(value: &Value, opts: SmileOptions) -> Result<Vec<u8>> {
    let mut writer = SmileWriter::new(opts);
    if opts.write_header {
        writer.write_header();
    }
    write_value(&mut writer, value)?;
    writer.finish()
}

fn write_value(writer: &mut SmileWriter, value: &Value) -> Result<()> {
    match value {
        Value::Null => writer.write_null(),
        Value::Boolean(v) => writer.write_boolean(*v),
        Value::Int(v) => writer.write_int(*v),
        Value::F32(v) => writer.write_f32(*v),
        Value::F64(v) => writer.write_f64(*v),
        Value::String(v) => writer.write_string(v),
        Value::Binary(v) => writer.write_binary(v),
        Value::Array(items) => {
            writer.write_start_array()?;
            for item in items {
                write_value(writer, item)?;
            }
            writer.write_end_array()?;
        }
        Value::Object(map) => {
            writer.write_start_object()?;
            for (key, item) in map {
                writer.write_field_name(key);
                write_value(writer, item)?;
            }
            writer.write_end_object()?;
        }
    }
    Ok(())
}
