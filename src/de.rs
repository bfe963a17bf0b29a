//! Deserialization of SMILE bytes into arbitrary Rust data structures.

use serde::de::*;

use crate::decode::{Element, Parser};
use crate::error::{Error, Result};

/// Deserialize a `T` from a SMILE document that starts with the 4-byte
/// header. Strings pass through an owned buffer, so `T` must not borrow
/// from the input.
pub fn from_slice<T>(buf: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    from_parser(Parser::new(buf))
}

/// Deserialize a `T` from a headerless SMILE stream, assuming shared names
/// on, shared values off, and raw binary off.
pub fn from_slice_headerless<T>(buf: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    from_parser(Parser::new_headerless(buf))
}

fn from_parser<T>(parser: Parser) -> Result<T>
where
    T: DeserializeOwned,
{
    let mut de = SmileDeserializer {
        parser,
        peeked: None,
    };
    let value = T::deserialize(&mut de)?;
    match de.next_opt()? {
        None => Ok(value),
        Some(_) => Err(Error::SerdeFail(
            "trailing content after document".to_string(),
        )),
    }
}

struct SmileDeserializer<'de> {
    parser: Parser<'de>,
    peeked: Option<Element>,
}

impl SmileDeserializer<'_> {
    fn next_opt(&mut self) -> Result<Option<Element>> {
        if let Some(elem) = self.peeked.take() {
            return Ok(Some(elem));
        }
        self.parser.next_element()
    }

    fn next_elem(&mut self) -> Result<Element> {
        self.next_opt()?
            .ok_or_else(|| Error::SerdeFail("unexpected end of input".to_string()))
    }

    fn peek_elem(&mut self) -> Result<&Element> {
        if self.peeked.is_none() {
            self.peeked = Some(
                self.parser
                    .next_element()?
                    .ok_or_else(|| Error::SerdeFail("unexpected end of input".to_string()))?,
            );
        }
        match self.peeked.as_ref() {
            Some(elem) => Ok(elem),
            None => Err(Error::SerdeFail("peek failed".to_string())),
        }
    }

    /// Consume the end-of-array element a sequence must stop on.
    fn end_seq(&mut self) -> Result<()> {
        match self.next_elem()? {
            Element::EndArray => Ok(()),
            _ => Err(Error::SerdeFail(
                "array has more elements than expected".to_string(),
            )),
        }
    }

    /// Consume the end-of-object element a map must stop on.
    fn end_map(&mut self) -> Result<()> {
        match self.next_elem()? {
            Element::EndObject => Ok(()),
            _ => Err(Error::SerdeFail(
                "object has more entries than expected".to_string(),
            )),
        }
    }
}

impl<'de, 'a> serde::Deserializer<'de> for &'a mut SmileDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.next_elem()? {
            Element::Null => visitor.visit_unit(),
            Element::Boolean(v) => visitor.visit_bool(v),
            Element::Int(v) => visitor.visit_i64(v),
            Element::F32(v) => visitor.visit_f32(v),
            Element::F64(v) => visitor.visit_f64(v),
            Element::String(v) => visitor.visit_string(v),
            Element::Binary(v) => visitor.visit_byte_buf(v),
            Element::StartArray => {
                let value = visitor.visit_seq(SeqAccess { de: &mut *self })?;
                self.end_seq()?;
                Ok(value)
            }
            Element::StartObject => {
                let value = visitor.visit_map(MapAccess { de: &mut *self })?;
                self.end_map()?;
                Ok(value)
            }
            elem => Err(Error::SerdeFail(format!(
                "unexpected {:?} in place of a value",
                elem
            ))),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if *self.peek_elem()? == Element::Null {
            self.next_elem()?;
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.peek_elem()? {
            Element::StartObject => {
                self.next_elem()?;
                let variant = match self.next_elem()? {
                    Element::Key(key) => key,
                    elem => {
                        return Err(Error::SerdeFail(format!(
                            "expected a variant name, got {:?}",
                            elem
                        )))
                    }
                };
                visitor.visit_enum(EnumAccess {
                    de: self,
                    variant,
                    has_value: true,
                })
            }
            Element::String(_) => {
                let variant = match self.next_elem()? {
                    Element::String(s) => s,
                    _ => return Err(Error::SerdeFail("expected a variant name".to_string())),
                };
                visitor.visit_enum(EnumAccess {
                    de: self,
                    variant,
                    has_value: false,
                })
            }
            elem => Err(Error::SerdeFail(format!(
                "expected an enum, got {:?}",
                elem
            ))),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str
        string bytes byte_buf unit unit_struct
        seq tuple tuple_struct map struct identifier ignored_any
    }
}

struct SeqAccess<'a, 'de> {
    de: &'a mut SmileDeserializer<'de>,
}

impl<'de> serde::de::SeqAccess<'de> for SeqAccess<'_, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        // The end-of-array element stays put for end_seq to consume.
        if *self.de.peek_elem()? == Element::EndArray {
            return Ok(None);
        }
        seed.deserialize(&mut *self.de).map(Some)
    }
}

struct MapAccess<'a, 'de> {
    de: &'a mut SmileDeserializer<'de>,
}

impl<'de> serde::de::MapAccess<'de> for MapAccess<'_, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        match self.de.peek_elem()? {
            Element::EndObject => Ok(None),
            Element::Key(_) => {
                let key = match self.de.next_elem()? {
                    Element::Key(key) => key,
                    _ => return Err(Error::SerdeFail("expected a key".to_string())),
                };
                seed.deserialize(key.into_deserializer()).map(Some)
            }
            elem => Err(Error::SerdeFail(format!(
                "expected a key, got {:?}",
                elem
            ))),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }
}

struct EnumAccess<'a, 'de> {
    de: &'a mut SmileDeserializer<'de>,
    variant: String,
    has_value: bool,
}

impl<'de> serde::de::EnumAccess<'de> for EnumAccess<'_, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = self.variant.clone();
        let value = seed.deserialize(variant.into_deserializer())?;
        Ok((value, self))
    }
}

impl<'de> serde::de::VariantAccess<'de> for EnumAccess<'_, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        if self.has_value {
            Err(Error::SerdeFail(
                "invalid type: non-unit variant, expected unit variant".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        if !self.has_value {
            return Err(Error::SerdeFail(
                "invalid type: unit variant, expected newtype variant".to_string(),
            ));
        }
        let value = seed.deserialize(&mut *self.de)?;
        self.de.end_map()?;
        Ok(value)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if !self.has_value {
            return Err(Error::SerdeFail(
                "invalid type: unit variant, expected tuple variant".to_string(),
            ));
        }
        let value = self.de.deserialize_any(visitor)?;
        self.de.end_map()?;
        Ok(value)
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if !self.has_value {
            return Err(Error::SerdeFail(
                "invalid type: unit variant, expected struct variant".to_string(),
            ));
        }
        let value = self.de.deserialize_any(visitor)?;
        self.de.end_map()?;
        Ok(value)
    }
}
