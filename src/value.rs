//! In-memory form of an object graph.
//!
//! Scalars, strings and other direct values live inline in [`Value`]. Lists, dictionaries,
//! object arrays and records live in a [`Graph`](crate::Graph) arena and are referred to by
//! [`Value::Ref`]; only those nodes can be shared or take part in cycles.

use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::graph::NodeId;
use crate::timestamp::Timestamp;
use crate::type_key::{builtin, TypeKey};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    Array(PrimitiveArray),
    Timestamp(Timestamp),
    Uuid(Uuid),
    Pair(Box<(Value, Value)>),
    Enum(EnumValue),
    Object(ObjectValue),
    Ref(NodeId),
}

impl Value {
    pub fn pair(key: impl Into<Value>, value: impl Into<Value>) -> Value {
        Value::Pair(Box::new((key.into(), value.into())))
    }

    /// Descriptor the encoder looks the value up by. `Null` has no type, and a `Ref` takes its
    /// type from the node it points at.
    pub fn type_key(&self) -> Option<TypeKey> {
        use self::Value::*;
        Some(match self {
            Null | Ref(_) => return None,
            Bool(_) => builtin::BOOL,
            I8(_) => builtin::I8,
            U8(_) => builtin::U8,
            I16(_) => builtin::I16,
            U16(_) => builtin::U16,
            I32(_) => builtin::I32,
            U32(_) => builtin::U32,
            I64(_) => builtin::I64,
            U64(_) => builtin::U64,
            F32(_) => builtin::F32,
            F64(_) => builtin::F64,
            Char(_) => builtin::CHAR,
            Str(_) => builtin::STRING,
            Bytes(_) => builtin::BYTES,
            Array(a) => a.type_key(),
            Timestamp(_) => builtin::TIMESTAMP,
            Uuid(_) => builtin::UUID,
            Pair(_) => builtin::PAIR,
            Enum(e) => e.key.clone(),
            Object(o) => o.key.clone(),
        })
    }

    pub fn name(&self) -> &'static str {
        use self::Value::*;
        match self {
            Null => "Null",
            Bool(_) => "Bool",
            I8(_) | U8(_) | I16(_) | U16(_) | I32(_) | U32(_) | I64(_) | U64(_) => "Int",
            F32(_) | F64(_) => "Float",
            Char(_) => "Char",
            Str(_) => "Str",
            Bytes(_) => "Bytes",
            Array(_) => "Array",
            Timestamp(_) => "Timestamp",
            Uuid(_) => "Uuid",
            Pair(_) => "Pair",
            Enum(_) => "Enum",
            Object(_) => "Object",
            Ref(_) => "Ref",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => Str,
    Vec<u8> => Bytes,
    PrimitiveArray => Array,
    Timestamp => Timestamp,
    Uuid => Uuid,
    EnumValue => Enum,
    ObjectValue => Object,
    NodeId => Ref,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Homogeneous array of a primitive type, encoded as a count followed by packed elements.
#[derive(Clone, Debug, PartialEq)]
pub enum PrimitiveArray {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Char(Vec<char>),
}

impl PrimitiveArray {
    pub fn type_key(&self) -> TypeKey {
        use self::PrimitiveArray::*;
        match self {
            Bool(_) => builtin::BOOL_ARRAY,
            I8(_) => builtin::I8_ARRAY,
            I16(_) => builtin::I16_ARRAY,
            U16(_) => builtin::U16_ARRAY,
            I32(_) => builtin::I32_ARRAY,
            U32(_) => builtin::U32_ARRAY,
            I64(_) => builtin::I64_ARRAY,
            U64(_) => builtin::U64_ARRAY,
            F32(_) => builtin::F32_ARRAY,
            F64(_) => builtin::F64_ARRAY,
            Char(_) => builtin::CHAR_ARRAY,
        }
    }

    pub fn len(&self) -> usize {
        use self::PrimitiveArray::*;
        match self {
            Bool(v) => v.len(),
            I8(v) => v.len(),
            I16(v) => v.len(),
            U16(v) => v.len(),
            I32(v) => v.len(),
            U32(v) => v.len(),
            I64(v) => v.len(),
            U64(v) => v.len(),
            F32(v) => v.len(),
            F64(v) => v.len(),
            Char(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage width of an enumeration's underlying integer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl IntWidth {
    /// Key of the primitive surrogate that carries this width.
    pub fn type_key(self) -> TypeKey {
        match self {
            IntWidth::I8 => builtin::I8,
            IntWidth::U8 => builtin::U8,
            IntWidth::I16 => builtin::I16,
            IntWidth::U16 => builtin::U16,
            IntWidth::I32 => builtin::I32,
            IntWidth::U32 => builtin::U32,
            IntWidth::I64 => builtin::I64,
            IntWidth::U64 => builtin::U64,
        }
    }
}

/// An enumeration's discriminant, tagged with the width it's stored at.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Discriminant {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
}

impl Discriminant {
    pub fn width(&self) -> IntWidth {
        match self {
            Discriminant::I8(_) => IntWidth::I8,
            Discriminant::U8(_) => IntWidth::U8,
            Discriminant::I16(_) => IntWidth::I16,
            Discriminant::U16(_) => IntWidth::U16,
            Discriminant::I32(_) => IntWidth::I32,
            Discriminant::U32(_) => IntWidth::U32,
            Discriminant::I64(_) => IntWidth::I64,
            Discriminant::U64(_) => IntWidth::U64,
        }
    }

    /// Widened value, lossless for every width.
    pub fn get(&self) -> i128 {
        match *self {
            Discriminant::I8(v) => v.into(),
            Discriminant::U8(v) => v.into(),
            Discriminant::I16(v) => v.into(),
            Discriminant::U16(v) => v.into(),
            Discriminant::I32(v) => v.into(),
            Discriminant::U32(v) => v.into(),
            Discriminant::I64(v) => v.into(),
            Discriminant::U64(v) => v.into(),
        }
    }

    /// Re-store the discriminant at `width`. `None` if the value doesn't fit.
    pub fn convert(self, width: IntWidth) -> Option<Discriminant> {
        let v = self.get();
        Some(match width {
            IntWidth::I8 => Discriminant::I8(i8::try_from(v).ok()?),
            IntWidth::U8 => Discriminant::U8(u8::try_from(v).ok()?),
            IntWidth::I16 => Discriminant::I16(i16::try_from(v).ok()?),
            IntWidth::U16 => Discriminant::U16(u16::try_from(v).ok()?),
            IntWidth::I32 => Discriminant::I32(i32::try_from(v).ok()?),
            IntWidth::U32 => Discriminant::U32(u32::try_from(v).ok()?),
            IntWidth::I64 => Discriminant::I64(i64::try_from(v).ok()?),
            IntWidth::U64 => Discriminant::U64(u64::try_from(v).ok()?),
        })
    }

    pub fn from_value(value: &Value) -> Option<Discriminant> {
        Some(match *value {
            Value::I8(v) => Discriminant::I8(v),
            Value::U8(v) => Discriminant::U8(v),
            Value::I16(v) => Discriminant::I16(v),
            Value::U16(v) => Discriminant::U16(v),
            Value::I32(v) => Discriminant::I32(v),
            Value::U32(v) => Discriminant::U32(v),
            Value::I64(v) => Discriminant::I64(v),
            Value::U64(v) => Discriminant::U64(v),
            _ => return None,
        })
    }

    pub fn into_value(self) -> Value {
        match self {
            Discriminant::I8(v) => Value::I8(v),
            Discriminant::U8(v) => Value::U8(v),
            Discriminant::I16(v) => Value::I16(v),
            Discriminant::U16(v) => Value::U16(v),
            Discriminant::I32(v) => Value::I32(v),
            Discriminant::U32(v) => Value::U32(v),
            Discriminant::I64(v) => Value::I64(v),
            Discriminant::U64(v) => Value::U64(v),
        }
    }
}

impl fmt::Display for Discriminant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// A value of a registered enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub key: TypeKey,
    pub value: Discriminant,
}

impl EnumValue {
    pub fn new(key: impl Into<TypeKey>, value: Discriminant) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// An object with no dedicated surrogate, held as its fallback (pack) encoding.
///
/// ```
/// use graph_pack::ObjectValue;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, PartialEq, Debug)]
/// struct Point { x: i32, y: i32 }
///
/// let obj = ObjectValue::new("point", &Point { x: 1, y: -2 }).unwrap();
/// let back: Point = obj.deserialize().unwrap();
/// assert_eq!(back, Point { x: 1, y: -2 });
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectValue {
    pub key: TypeKey,
    bytes: Vec<u8>,
}

impl ObjectValue {
    pub fn new<T: Serialize + ?Sized>(key: impl Into<TypeKey>, value: &T) -> Result<Self> {
        Ok(Self {
            key: key.into(),
            bytes: crate::ser::to_vec(value)?,
        })
    }

    /// Wrap bytes already known to hold exactly one pack element tree.
    pub(crate) fn from_raw(key: TypeKey, bytes: Vec<u8>) -> Self {
        Self { key, bytes }
    }

    /// Deserialize with the default nesting limit, [`MAX_DEPTH`](crate::MAX_DEPTH). A decoder
    /// running a tighter [`CodecConfig`](crate::CodecConfig) should pass its `max_depth` to
    /// [`deserialize_with_depth`](Self::deserialize_with_depth) instead.
    pub fn deserialize<'de, T: Deserialize<'de>>(&'de self) -> Result<T> {
        crate::de::from_slice(&self.bytes)
    }

    pub fn deserialize_with_depth<'de, T: Deserialize<'de>>(
        &'de self,
        max_depth: usize,
    ) -> Result<T> {
        crate::de::from_slice_with_depth(&self.bytes, max_depth)
    }

    /// The pack encoding of the object.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    mod discriminant {
        use super::*;

        #[test]
        fn widen_and_narrow() {
            let d = Discriminant::U8(200);
            assert_eq!(d.convert(IntWidth::I32), Some(Discriminant::I32(200)));
            assert_eq!(d.convert(IntWidth::I8), None);
            assert_eq!(Discriminant::I64(-1).convert(IntWidth::U64), None);
            assert_eq!(
                Discriminant::U64(u64::MAX).convert(IntWidth::U64),
                Some(Discriminant::U64(u64::MAX))
            );
        }

        #[test]
        fn value_bridge() {
            let d = Discriminant::I16(-300);
            assert_eq!(Discriminant::from_value(&d.into_value()), Some(d));
            assert_eq!(Discriminant::from_value(&Value::F32(1.0)), None);
            assert_eq!(d.width(), IntWidth::I16);
            assert_eq!(d.width().type_key(), builtin::I16);
        }
    }

    mod value {
        use super::*;

        #[test]
        fn type_keys() {
            assert_eq!(Value::from(3i32).type_key(), Some(builtin::I32));
            assert_eq!(Value::from("x").type_key(), Some(builtin::STRING));
            assert_eq!(
                Value::Array(PrimitiveArray::Char(vec!['a'])).type_key(),
                Some(builtin::CHAR_ARRAY)
            );
            assert_eq!(Value::pair(1u8, "a").type_key(), Some(builtin::PAIR));
            let e = EnumValue::new("color", Discriminant::U8(1));
            assert_eq!(Value::Enum(e).type_key(), Some(TypeKey::from("color")));
            assert_eq!(Value::Null.type_key(), None);
        }

        #[test]
        fn option_into_value() {
            assert_eq!(Value::from(None::<String>), Value::Null);
            assert_eq!(Value::from(Some(5u16)), Value::U16(5));
        }
    }

    mod object {
        use super::*;
        use std::collections::BTreeMap;

        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Reading {
            sensor: String,
            at: Timestamp,
            samples: Vec<f64>,
            tags: BTreeMap<u32, Option<String>>,
        }

        #[test]
        fn serde_bridge() {
            let mut tags = BTreeMap::new();
            tags.insert(1, Some("calibrated".to_string()));
            tags.insert(7, None);
            let reading = Reading {
                sensor: "north".into(),
                at: Timestamp::from_utc(1_600_000_000, 5).unwrap(),
                samples: vec![0.5, -1.25],
                tags,
            };
            let obj = ObjectValue::new("reading", &reading).unwrap();
            assert_eq!(obj.key, TypeKey::from("reading"));
            let back: Reading = obj.deserialize().unwrap();
            assert_eq!(back, reading);
        }

        #[test]
        fn depth_limit() {
            let nested = vec![vec![vec![1u8]]];
            let obj = ObjectValue::new("nested", &nested).unwrap();
            assert!(matches!(
                obj.deserialize_with_depth::<Vec<Vec<Vec<u8>>>>(2),
                Err(crate::Error::DepthLimit(2))
            ));
            assert_eq!(
                obj.deserialize_with_depth::<Vec<Vec<Vec<u8>>>>(3).unwrap(),
                nested
            );
        }
    }
}
