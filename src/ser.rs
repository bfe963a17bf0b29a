//! Serialization of arbitrary Rust data structures into SMILE bytes.
//!
//! Enum variants are mapped the way most self-describing binary formats do
//! it:
//! - Unit - just the variant name as a string
//! - Newtype - object with one entry, variant name to content
//! - Tuple - object with one entry, variant name to the tuple as an array
//! - Struct - object with one entry, variant name to the struct

use serde::ser::*;

use crate::encode::{SmileOptions, SmileWriter};
use crate::error::{Error, Result};

/// Serialize `value` as a SMILE document with default options.
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    to_vec_with_options(value, SmileOptions::default())
}

/// Serialize `value` as a SMILE document with explicit options.
pub fn to_vec_with_options<T>(value: &T, opts: SmileOptions) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut ser = SmileSerializer {
        writer: SmileWriter::new(opts),
    };
    if opts.write_header {
        ser.writer.write_header();
    }
    value.serialize(&mut ser)?;
    ser.writer.finish()
}

struct SmileSerializer {
    writer: SmileWriter,
}

impl<'a> Serializer for &'a mut SmileSerializer {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Compound<'a>;
    type SerializeTuple = Compound<'a>;
    type SerializeTupleStruct = Compound<'a>;
    type SerializeTupleVariant = Compound<'a>;
    type SerializeMap = Compound<'a>;
    type SerializeStruct = Compound<'a>;
    type SerializeStructVariant = Compound<'a>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.writer.write_boolean(v);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.writer.write_int(v);
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        let v = i64::try_from(v)
            .map_err(|_| Error::BadEncode(format!("integer {} out of range", v)))?;
        self.serialize_i64(v)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.writer.write_f32(v);
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.writer.write_f64(v);
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.writer.write_string(v.encode_utf8(&mut [0u8; 4]));
        Ok(())
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.writer.write_string(v);
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.writer.write_binary(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.writer.write_null();
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.writer.write_start_object()?;
        self.writer.write_field_name(variant);
        value.serialize(&mut *self)?;
        self.writer.write_end_object()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.writer.write_start_array()?;
        Ok(Compound {
            ser: self,
            wrapped: false,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.writer.write_start_object()?;
        self.writer.write_field_name(variant);
        self.writer.write_start_array()?;
        Ok(Compound {
            ser: self,
            wrapped: true,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        self.writer.write_start_object()?;
        Ok(Compound {
            ser: self,
            wrapped: false,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.writer.write_start_object()?;
        self.writer.write_field_name(variant);
        self.writer.write_start_object()?;
        Ok(Compound {
            ser: self,
            wrapped: true,
        })
    }
}

/// In-progress container. `wrapped` containers close the single-entry object
/// an enum variant opened around them.
struct Compound<'a> {
    ser: &'a mut SmileSerializer,
    wrapped: bool,
}

impl Compound<'_> {
    fn end_array(self) -> Result<()> {
        self.ser.writer.write_end_array()?;
        if self.wrapped {
            self.ser.writer.write_end_object()?;
        }
        Ok(())
    }

    fn end_object(self) -> Result<()> {
        self.ser.writer.write_end_object()?;
        if self.wrapped {
            self.ser.writer.write_end_object()?;
        }
        Ok(())
    }
}

impl SerializeSeq for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.end_array()
    }
}

impl SerializeTuple for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.end_array()
    }
}

impl SerializeTupleStruct for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.end_array()
    }
}

impl SerializeTupleVariant for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.end_array()
    }
}

impl SerializeMap for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        key.serialize(KeySerializer {
            ser: &mut *self.ser,
        })
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.end_object()
    }
}

impl SerializeStruct for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.ser.writer.write_field_name(key);
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.end_object()
    }
}

impl SerializeStructVariant for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.ser.writer.write_field_name(key);
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.end_object()
    }
}

/// Writes a map key as a field name. Keys that aren't strings get the JSON
/// key treatment: booleans and null become their literal text, numbers their
/// decimal or float text, with non-finite floats spelled `NaN`, `Infinity`,
/// and `-Infinity`. Anything structured is an error.
struct KeySerializer<'a> {
    ser: &'a mut SmileSerializer,
}

impl KeySerializer<'_> {
    fn field(self, name: &str) -> Result<()> {
        self.ser.writer.write_field_name(name);
        Ok(())
    }
}

fn float_key_text(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "Infinity".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{}", v)
    }
}

impl<'a> Serializer for KeySerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Impossible<(), Error>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.field(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.field(v.encode_utf8(&mut [0u8; 4]))
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.field(if v { "true" } else { "false" })
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.field(&v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.field(&v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.field(&v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.field(&v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.field(&v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.field(&v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.field(&v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.field(&v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.field(&float_key_text(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.field(&float_key_text(v))
    }

    fn serialize_unit(self) -> Result<()> {
        self.field("null")
    }

    fn serialize_none(self) -> Result<()> {
        self.field("null")
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.field(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<()> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::BadEncode("map key is not stringifiable".to_string()))
    }
}
