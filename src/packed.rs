//! Statically typed encoding.
//!
//! A [`Packed`] type knows its own wire form, so the typed entry points on
//! [`Encoder`](crate::Encoder) and [`Decoder`](crate::Decoder) write it with no type handle.
//! The built-in direct surrogates for primitives, strings, byte sequences, primitive arrays,
//! timestamps and UUIDs are all [`PackedSurrogate`](crate::surrogate::PackedSurrogate)s over
//! these impls.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::reader::{reserve, Reader};
use crate::timestamp::Timestamp;
use crate::type_key::{builtin, TypeKey};
use crate::value::{PrimitiveArray, Value};
use crate::writer::{Writer, NULL_LENGTH};

pub trait Packed: Sized {
    /// Key of the surrogate that carries this type in the generic dispatcher.
    const KEY: TypeKey;

    fn pack(&self, w: &mut Writer) -> Result<()>;

    fn unpack(r: &mut Reader) -> Result<Self>;

    /// Consume exactly what [`unpack`](Self::unpack) would, without materializing it.
    fn skip(r: &mut Reader) -> Result<()>;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self>;

    /// Write a generic value in this type's form.
    fn pack_value(value: &Value, w: &mut Writer) -> Result<()>;
}

macro_rules! packed_primitive {
    ($($t:ty, $variant:ident, $key:ident, $write:ident, $read:ident, $skip:ident;)*) => {
        $(
            impl Packed for $t {
                const KEY: TypeKey = builtin::$key;

                fn pack(&self, w: &mut Writer) -> Result<()> {
                    w.$write(*self)
                }

                fn unpack(r: &mut Reader) -> Result<Self> {
                    r.$read()
                }

                fn skip(r: &mut Reader) -> Result<()> {
                    r.$skip()
                }

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(Error::mismatch(stringify!($t), other.name())),
                    }
                }

                fn pack_value(value: &Value, w: &mut Writer) -> Result<()> {
                    match value {
                        Value::$variant(v) => w.$write(*v),
                        other => Err(Error::mismatch(stringify!($t), other.name())),
                    }
                }
            }
        )*
    };
}

packed_primitive! {
    bool, Bool, BOOL, write_bool, read_bool, skip_bool;
    i8, I8, I8, write_i8, read_i8, skip_i8;
    u8, U8, U8, write_u8, read_u8, skip_u8;
    i16, I16, I16, write_i16, read_i16, skip_i16;
    u16, U16, U16, write_u16, read_u16, skip_u16;
    i32, I32, I32, write_i32, read_i32, skip_i32;
    u32, U32, U32, write_u32, read_u32, skip_u32;
    i64, I64, I64, write_i64, read_i64, skip_i64;
    u64, U64, U64, write_u64, read_u64, skip_u64;
    f32, F32, F32, write_f32, read_f32, skip_f32;
    f64, F64, F64, write_f64, read_f64, skip_f64;
    char, Char, CHAR, write_char, read_char, skip_char;
}

impl Packed for Timestamp {
    const KEY: TypeKey = builtin::TIMESTAMP;

    fn pack(&self, w: &mut Writer) -> Result<()> {
        w.write_timestamp(self)
    }

    fn unpack(r: &mut Reader) -> Result<Self> {
        r.read_timestamp()
    }

    fn skip(r: &mut Reader) -> Result<()> {
        r.skip_timestamp()
    }

    fn into_value(self) -> Value {
        Value::Timestamp(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(Error::mismatch("timestamp", other.name())),
        }
    }

    fn pack_value(value: &Value, w: &mut Writer) -> Result<()> {
        match value {
            Value::Timestamp(v) => w.write_timestamp(v),
            other => Err(Error::mismatch("timestamp", other.name())),
        }
    }
}

impl Packed for Uuid {
    const KEY: TypeKey = builtin::UUID;

    fn pack(&self, w: &mut Writer) -> Result<()> {
        w.write_uuid(self)
    }

    fn unpack(r: &mut Reader) -> Result<Self> {
        r.read_uuid()
    }

    fn skip(r: &mut Reader) -> Result<()> {
        r.skip_uuid()
    }

    fn into_value(self) -> Value {
        Value::Uuid(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(v) => Ok(v),
            other => Err(Error::mismatch("uuid", other.name())),
        }
    }

    fn pack_value(value: &Value, w: &mut Writer) -> Result<()> {
        match value {
            Value::Uuid(v) => w.write_uuid(v),
            other => Err(Error::mismatch("uuid", other.name())),
        }
    }
}

impl Packed for Option<String> {
    const KEY: TypeKey = builtin::STRING;

    fn pack(&self, w: &mut Writer) -> Result<()> {
        w.write_opt_str(self.as_deref())
    }

    fn unpack(r: &mut Reader) -> Result<Self> {
        r.read_str()
    }

    fn skip(r: &mut Reader) -> Result<()> {
        r.skip_str()
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, Value::Str)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(v) => Ok(Some(v)),
            Value::Null => Ok(None),
            other => Err(Error::mismatch("string", other.name())),
        }
    }

    fn pack_value(value: &Value, w: &mut Writer) -> Result<()> {
        match value {
            Value::Str(v) => w.write_str(v),
            Value::Null => w.write_opt_str(None),
            other => Err(Error::mismatch("string", other.name())),
        }
    }
}

impl Packed for String {
    const KEY: TypeKey = builtin::STRING;

    fn pack(&self, w: &mut Writer) -> Result<()> {
        w.write_str(self)
    }

    fn unpack(r: &mut Reader) -> Result<Self> {
        r.read_str()?.ok_or(Error::NullValue)
    }

    fn skip(r: &mut Reader) -> Result<()> {
        r.skip_str()
    }

    fn into_value(self) -> Value {
        Value::Str(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        <Option<String>>::from_value(value)?.ok_or(Error::NullValue)
    }

    fn pack_value(value: &Value, w: &mut Writer) -> Result<()> {
        match value {
            Value::Str(v) => w.write_str(v),
            other => Err(Error::mismatch("string", other.name())),
        }
    }
}

impl Packed for Option<Vec<u8>> {
    const KEY: TypeKey = builtin::BYTES;

    fn pack(&self, w: &mut Writer) -> Result<()> {
        w.write_opt_bytes(self.as_deref())
    }

    fn unpack(r: &mut Reader) -> Result<Self> {
        r.read_bytes()
    }

    fn skip(r: &mut Reader) -> Result<()> {
        r.skip_bytes()
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, Value::Bytes)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(v) => Ok(Some(v)),
            Value::Null => Ok(None),
            other => Err(Error::mismatch("bytes", other.name())),
        }
    }

    fn pack_value(value: &Value, w: &mut Writer) -> Result<()> {
        match value {
            Value::Bytes(v) => w.write_bytes(v),
            Value::Null => w.write_opt_bytes(None),
            other => Err(Error::mismatch("bytes", other.name())),
        }
    }
}

impl Packed for Vec<u8> {
    const KEY: TypeKey = builtin::BYTES;

    fn pack(&self, w: &mut Writer) -> Result<()> {
        w.write_bytes(self)
    }

    fn unpack(r: &mut Reader) -> Result<Self> {
        r.read_bytes()?.ok_or(Error::NullValue)
    }

    fn skip(r: &mut Reader) -> Result<()> {
        r.skip_bytes()
    }

    fn into_value(self) -> Value {
        Value::Bytes(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        <Option<Vec<u8>>>::from_value(value)?.ok_or(Error::NullValue)
    }

    fn pack_value(value: &Value, w: &mut Writer) -> Result<()> {
        match value {
            Value::Bytes(v) => w.write_bytes(v),
            other => Err(Error::mismatch("bytes", other.name())),
        }
    }
}

fn read_elems<T, F>(r: &mut Reader, len: usize, mut read: F) -> Result<Vec<T>>
where
    F: FnMut(&mut Reader) -> Result<T>,
{
    let mut out = reserve(len)?;
    for _ in 0..len {
        out.push(read(r)?);
    }
    Ok(out)
}

fn skip_elems(r: &mut Reader, width: u64) -> Result<()> {
    match r.read_len()? {
        Some(len) => r.skip_raw(len as u64 * width),
        None => Ok(()),
    }
}

macro_rules! packed_array {
    ($($t:ty, $variant:ident, $key:ident, $write:ident, $read:ident, $width:expr;)*) => {
        $(
            impl Packed for Option<Vec<$t>> {
                const KEY: TypeKey = builtin::$key;

                fn pack(&self, w: &mut Writer) -> Result<()> {
                    match self {
                        Some(v) => v.pack(w),
                        None => w.write_i32(NULL_LENGTH),
                    }
                }

                fn unpack(r: &mut Reader) -> Result<Self> {
                    match r.read_len()? {
                        Some(len) => Ok(Some(read_elems(r, len, |r| r.$read())?)),
                        None => Ok(None),
                    }
                }

                fn skip(r: &mut Reader) -> Result<()> {
                    skip_elems(r, $width)
                }

                fn into_value(self) -> Value {
                    self.map_or(Value::Null, |v| Value::Array(PrimitiveArray::$variant(v)))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Array(PrimitiveArray::$variant(v)) => Ok(Some(v)),
                        Value::Null => Ok(None),
                        other => Err(Error::mismatch(stringify!([$t]), other.name())),
                    }
                }

                fn pack_value(value: &Value, w: &mut Writer) -> Result<()> {
                    match value {
                        Value::Array(PrimitiveArray::$variant(v)) => v.pack(w),
                        Value::Null => w.write_i32(NULL_LENGTH),
                        other => Err(Error::mismatch(stringify!([$t]), other.name())),
                    }
                }
            }

            impl Packed for Vec<$t> {
                const KEY: TypeKey = builtin::$key;

                fn pack(&self, w: &mut Writer) -> Result<()> {
                    w.write_len(self.len())?;
                    for v in self {
                        w.$write(*v)?;
                    }
                    Ok(())
                }

                fn unpack(r: &mut Reader) -> Result<Self> {
                    <Option<Vec<$t>>>::unpack(r)?.ok_or(Error::NullValue)
                }

                fn skip(r: &mut Reader) -> Result<()> {
                    skip_elems(r, $width)
                }

                fn into_value(self) -> Value {
                    Value::Array(PrimitiveArray::$variant(self))
                }

                fn from_value(value: Value) -> Result<Self> {
                    <Option<Vec<$t>>>::from_value(value)?.ok_or(Error::NullValue)
                }

                fn pack_value(value: &Value, w: &mut Writer) -> Result<()> {
                    match value {
                        Value::Array(PrimitiveArray::$variant(v)) => v.pack(w),
                        other => Err(Error::mismatch(stringify!([$t]), other.name())),
                    }
                }
            }
        )*
    };
}

packed_array! {
    bool, Bool, BOOL_ARRAY, write_bool, read_bool, 1;
    i8, I8, I8_ARRAY, write_i8, read_i8, 1;
    i16, I16, I16_ARRAY, write_i16, read_i16, 2;
    u16, U16, U16_ARRAY, write_u16, read_u16, 2;
    i32, I32, I32_ARRAY, write_i32, read_i32, 4;
    u32, U32, U32_ARRAY, write_u32, read_u32, 4;
    i64, I64, I64_ARRAY, write_i64, read_i64, 8;
    u64, U64, U64_ARRAY, write_u64, read_u64, 8;
    f32, F32, F32_ARRAY, write_f32, read_f32, 4;
    f64, F64, F64_ARRAY, write_f64, read_f64, 8;
    char, Char, CHAR_ARRAY, write_char, read_char, 4;
}

#[cfg(test)]
mod test {
    use super::*;

    /// Pack `value`, then check unpack returns it and skip consumes the same bytes.
    fn check<T: Packed + PartialEq + std::fmt::Debug + Clone>(value: T) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf);
        value.pack(&mut w).unwrap();
        let written = w.position();

        let mut src = &buf[..];
        let mut r = Reader::new(&mut src);
        assert_eq!(T::unpack(&mut r).unwrap(), value);
        assert_eq!(r.position(), written);

        let mut src = &buf[..];
        let mut r = Reader::new(&mut src);
        T::skip(&mut r).unwrap();
        assert_eq!(r.position(), written);

        let mut generic = Vec::new();
        let mut w = Writer::new(&mut generic);
        T::pack_value(&value.clone().into_value(), &mut w).unwrap();
        assert_eq!(generic, buf, "generic and typed forms must match");
        assert_eq!(T::from_value(value.clone().into_value()).unwrap(), value);
        buf
    }

    mod primitive {
        use super::*;

        #[test]
        fn every_width() {
            check(true);
            check(-5i8);
            check(250u8);
            check(i16::MIN);
            check(u16::MAX);
            check(-70000i32);
            check(u32::MAX);
            check(i64::MIN);
            check(u64::MAX);
            check(3.5f32);
            check(-1e300f64);
            check('🦀');
            assert_eq!(check(0x01020304i32), [4, 3, 2, 1]);
        }

        #[test]
        fn mismatch() {
            assert!(matches!(
                i32::from_value(Value::U32(1)),
                Err(Error::TypeMismatch { expected: "i32", .. })
            ));
        }
    }

    mod string {
        use super::*;

        #[test]
        fn values() {
            check(String::new());
            check("snowman ☃".to_string());
            check(Some("x".to_string()));
            assert_eq!(check(None::<String>), [0xff; 4]);
            assert_eq!(check(String::new()), [0; 4]);
        }

        #[test]
        fn null_into_non_nullable() {
            let raw = NULL_LENGTH.to_le_bytes();
            let mut src = &raw[..];
            let mut r = Reader::new(&mut src);
            assert!(matches!(String::unpack(&mut r), Err(Error::NullValue)));
            assert!(matches!(String::from_value(Value::Null), Err(Error::NullValue)));
        }
    }

    mod bytes {
        use super::*;

        #[test]
        fn values() {
            assert_eq!(check(Vec::<u8>::new()), [0; 4]);
            check(vec![0u8, 255, 7]);
            check(None::<Vec<u8>>);
            check(Some(vec![9u8; 300]));
        }
    }

    mod array {
        use super::*;

        #[test]
        fn every_element_type() {
            check(vec![true, false, true]);
            check(vec![-1i8, 2]);
            check(vec![i16::MAX, 0]);
            check(vec![1u16, 2, 3]);
            check(Vec::<i32>::new());
            check(vec![u32::MAX]);
            check(vec![i64::MIN, 5]);
            check(vec![u64::MAX, 0]);
            check(vec![0.25f32, -0.0]);
            check(vec![f64::MAX]);
            check(vec!['a', 'é', '漢']);
            check(None::<Vec<i32>>);
            check(Some(vec![1i64, 2]));
        }

        #[test]
        fn layout() {
            let enc = check(vec![1i16, -1]);
            assert_eq!(enc, [2, 0, 0, 0, 1, 0, 0xff, 0xff]);
        }

        #[test]
        fn invalid_element() {
            let raw = [1u8, 0, 0, 0, 7];
            let mut src = &raw[..];
            let mut r = Reader::new(&mut src);
            assert!(matches!(
                <Vec<bool>>::unpack(&mut r),
                Err(Error::InvalidBool(7))
            ));
        }
    }

    mod scalar {
        use super::*;

        #[test]
        fn timestamp_and_uuid() {
            assert_eq!(
                check(Timestamp::from_utc(1_700_000_000, 123).unwrap()).len(),
                12
            );
            assert_eq!(check(Uuid::from_u128(0xdead_beef)).len(), 16);
        }
    }
}
