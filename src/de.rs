//! Deserialization from the pack format.

use serde::de::value::BytesDeserializer;
use serde::de::Error as DeError;
use serde::de::*;

use crate::config::MAX_DEPTH;
use crate::element::*;
use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::timestamp::TIMESTAMP_TOKEN;

/// Deserialize a `T` from one complete pack encoding. Trailing bytes are an error.
pub fn from_slice<'de, T: Deserialize<'de>>(buf: &'de [u8]) -> Result<T> {
    from_slice_with_depth(buf, MAX_DEPTH)
}

pub fn from_slice_with_depth<'de, T: Deserialize<'de>>(
    buf: &'de [u8],
    max_depth: usize,
) -> Result<T> {
    let mut de = PackDeserializer::new(buf, max_depth);
    let value = T::deserialize(&mut de)?;
    if de.parser.remaining() > 0 {
        return Err(Error::Pack(format!(
            "{} trailing bytes after value",
            de.parser.remaining()
        )));
    }
    Ok(value)
}

struct PackDeserializer<'a> {
    parser: Parser<'a>,
}

impl<'a> PackDeserializer<'a> {
    fn new(buf: &'a [u8], max_depth: usize) -> Self {
        Self {
            parser: Parser::new(buf, max_depth),
        }
    }

    fn next_elem(&mut self) -> Result<Element<'a>> {
        self.parser
            .next()
            .ok_or_else(|| Error::Pack("missing next value".to_string()))?
    }

    fn peek_marker(&self) -> Result<Marker> {
        self.parser
            .peek_marker()
            .ok_or_else(|| Error::Pack("missing next value".to_string()))
    }
}

impl<'de, 'a> serde::Deserializer<'de> for &'a mut PackDeserializer<'de> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let elem = self.next_elem()?;
        match elem {
            Element::Null => visitor.visit_unit(),
            Element::Bool(v) => visitor.visit_bool(v),
            Element::UInt(v) => visitor.visit_u64(v),
            Element::NegInt(v) => visitor.visit_i64(v),
            Element::Str(v) => visitor.visit_borrowed_str(v),
            Element::F32(v) => visitor.visit_f32(v),
            Element::F64(v) => visitor.visit_f64(v),
            Element::Bin(v) => visitor.visit_borrowed_bytes(v),
            Element::Array(len) => visitor.visit_seq(SeqAccess::new(self, len)),
            Element::Map(len) => visitor.visit_map(MapAccess::new(self, len)),
            Element::Timestamp(v) => visitor.visit_byte_buf(v.as_vec()),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.peek_marker()? == Marker::Null {
            self.next_elem()?;
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if name == TIMESTAMP_TOKEN {
            let elem = self.next_elem()?;
            match elem {
                Element::Timestamp(v) => {
                    let enc = v.as_vec();
                    visitor.visit_newtype_struct(BytesDeserializer::<Error>::new(&enc))
                }
                _ => Err(Error::invalid_type(elem.unexpected(), &"timestamp")),
            }
        } else {
            visitor.visit_newtype_struct(self)
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(EnumAccess::new(self))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str
        string bytes byte_buf unit unit_struct
        seq tuple tuple_struct map struct identifier ignored_any
    }
}

struct EnumAccess<'a, 'de> {
    de: &'a mut PackDeserializer<'de>,
    has_value: bool,
}

impl<'a, 'de> EnumAccess<'a, 'de> {
    fn new(de: &'a mut PackDeserializer<'de>) -> Self {
        Self {
            de,
            has_value: false,
        }
    }
}

impl<'a, 'de> serde::de::EnumAccess<'de> for EnumAccess<'a, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(mut self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let val = match self.de.peek_marker()? {
            Marker::FixMap(1) => {
                self.de.next_elem()?;
                self.has_value = true;
                seed.deserialize(&mut *self.de)?
            }
            Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
                self.has_value = false;
                seed.deserialize(&mut *self.de)?
            }
            _ => {
                return Err(Error::Pack(
                    "expected a size-1 map or a string".to_string(),
                ))
            }
        };
        Ok((val, self))
    }
}

impl<'a, 'de> serde::de::VariantAccess<'de> for EnumAccess<'a, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        if self.has_value {
            Err(Error::Pack(
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
        if self.has_value {
            seed.deserialize(&mut *self.de)
        } else {
            Err(Error::Pack(
                "invalid type: unit variant, expected newtype variant".to_string(),
            ))
        }
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.has_value {
            serde::Deserializer::deserialize_map(self.de, visitor)
        } else {
            Err(Error::Pack(
                "invalid type: unit variant, expected struct variant".to_string(),
            ))
        }
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.has_value {
            serde::Deserializer::deserialize_tuple(self.de, len, visitor)
        } else {
            Err(Error::Pack(
                "invalid type: unit variant, expected tuple variant".to_string(),
            ))
        }
    }
}

struct SeqAccess<'a, 'de> {
    de: &'a mut PackDeserializer<'de>,
    size_left: usize,
}

impl<'a, 'de> SeqAccess<'a, 'de> {
    fn new(de: &'a mut PackDeserializer<'de>, len: usize) -> Self {
        Self { de, size_left: len }
    }
}

impl<'a, 'de> serde::de::SeqAccess<'de> for SeqAccess<'a, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.size_left > 0 {
            self.size_left -= 1;
            let val = seed.deserialize(&mut *self.de)?;
            Ok(Some(val))
        } else {
            Ok(None)
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.size_left)
    }
}

struct MapAccess<'a, 'de> {
    de: &'a mut PackDeserializer<'de>,
    size_left: usize,
}

impl<'a, 'de> MapAccess<'a, 'de> {
    fn new(de: &'a mut PackDeserializer<'de>, len: usize) -> Self {
        Self { de, size_left: len }
    }
}

impl<'a, 'de> serde::de::MapAccess<'de> for MapAccess<'a, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        if self.size_left > 0 {
            self.size_left -= 1;
            Ok(Some(seed.deserialize(&mut *self.de)?))
        } else {
            Ok(None)
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.size_left)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ser::to_vec;
    use crate::timestamp::Timestamp;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use uuid::Uuid;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    enum Shape {
        Empty,
        Circle(u8),
        Rect(u8, u8),
        Named { w: u8, label: Option<String> },
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Record<'a> {
        id: Uuid,
        name: &'a str,
        #[serde(with = "serde_bytes")]
        blob: Vec<u8>,
        seen: Option<Timestamp>,
        shapes: Vec<Shape>,
        counts: HashMap<i64, u16>,
        ratio: f32,
        initial: char,
    }

    #[test]
    fn record_roundtrip() {
        let mut counts = HashMap::new();
        counts.insert(-40, 2);
        counts.insert(1 << 40, 65535);
        let record = Record {
            id: Uuid::from_u128(77),
            name: "borrowed",
            blob: vec![0, 1, 2, 255],
            seen: Some(Timestamp::from_utc(-1, 500).unwrap()),
            shapes: vec![
                Shape::Empty,
                Shape::Circle(4),
                Shape::Rect(2, 3),
                Shape::Named {
                    w: 1,
                    label: None,
                },
            ],
            counts,
            ratio: 0.5,
            initial: 'ß',
        };
        let enc = to_vec(&record).unwrap();
        let dec: Record = from_slice(&enc).unwrap();
        assert_eq!(dec, record);
    }

    #[test]
    fn trailing_bytes() {
        let mut enc = to_vec(&5u8).unwrap();
        enc.push(0xc0);
        assert!(matches!(from_slice::<u8>(&enc), Err(Error::Pack(_))));
    }

    #[test]
    fn missing_value() {
        let enc = [0x92u8, 0x01];
        assert!(from_slice::<(u8, u8)>(&enc).is_err());
    }

    #[test]
    fn type_mismatch() {
        let enc = to_vec("text").unwrap();
        assert!(from_slice::<u32>(&enc).is_err());
        let enc = to_vec(&300u32).unwrap();
        assert!(from_slice::<u8>(&enc).is_err());
    }

    #[test]
    fn depth_limit() {
        let enc = to_vec(&vec![vec![vec![0u8]]]).unwrap();
        assert!(from_slice_with_depth::<Vec<Vec<Vec<u8>>>>(&enc, 3).is_ok());
        assert!(matches!(
            from_slice_with_depth::<Vec<Vec<Vec<u8>>>>(&enc, 2),
            Err(Error::DepthLimit(2))
        ));
    }
}
