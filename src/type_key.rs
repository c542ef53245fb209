use std::borrow::{Borrow, Cow};
use std::fmt;

/// Type descriptor the surrogate registry is keyed by.
///
/// Built-in types use the names in [`builtin`]. Enumerations and fallback objects use
/// whatever name they were registered under; both sides of a stream must agree on it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Cow<'static, str>);

impl TypeKey {
    pub const fn from_static(name: &'static str) -> Self {
        TypeKey(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        TypeKey(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeKey {
    fn from(name: &'static str) -> Self {
        TypeKey::from_static(name)
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        TypeKey::new(name)
    }
}

impl Borrow<str> for TypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Names of the built-in catalog.
pub mod builtin {
    use super::TypeKey;

    pub const BOOL: TypeKey = TypeKey::from_static("bool");
    pub const I8: TypeKey = TypeKey::from_static("i8");
    pub const U8: TypeKey = TypeKey::from_static("u8");
    pub const I16: TypeKey = TypeKey::from_static("i16");
    pub const U16: TypeKey = TypeKey::from_static("u16");
    pub const I32: TypeKey = TypeKey::from_static("i32");
    pub const U32: TypeKey = TypeKey::from_static("u32");
    pub const I64: TypeKey = TypeKey::from_static("i64");
    pub const U64: TypeKey = TypeKey::from_static("u64");
    pub const F32: TypeKey = TypeKey::from_static("f32");
    pub const F64: TypeKey = TypeKey::from_static("f64");
    pub const CHAR: TypeKey = TypeKey::from_static("char");

    pub const BOOL_ARRAY: TypeKey = TypeKey::from_static("bool[]");
    pub const I8_ARRAY: TypeKey = TypeKey::from_static("i8[]");
    pub const I16_ARRAY: TypeKey = TypeKey::from_static("i16[]");
    pub const U16_ARRAY: TypeKey = TypeKey::from_static("u16[]");
    pub const I32_ARRAY: TypeKey = TypeKey::from_static("i32[]");
    pub const U32_ARRAY: TypeKey = TypeKey::from_static("u32[]");
    pub const I64_ARRAY: TypeKey = TypeKey::from_static("i64[]");
    pub const U64_ARRAY: TypeKey = TypeKey::from_static("u64[]");
    pub const F32_ARRAY: TypeKey = TypeKey::from_static("f32[]");
    pub const F64_ARRAY: TypeKey = TypeKey::from_static("f64[]");
    pub const CHAR_ARRAY: TypeKey = TypeKey::from_static("char[]");

    pub const BYTES: TypeKey = TypeKey::from_static("bytes");
    pub const STRING: TypeKey = TypeKey::from_static("string");
    pub const TIMESTAMP: TypeKey = TypeKey::from_static("timestamp");
    pub const UUID: TypeKey = TypeKey::from_static("uuid");
    pub const PAIR: TypeKey = TypeKey::from_static("pair");

    pub const LIST: TypeKey = TypeKey::from_static("list");
    pub const DICT: TypeKey = TypeKey::from_static("dict");
    pub const OBJECT_ARRAY: TypeKey = TypeKey::from_static("object[]");

    /// Catch-all fallback for objects whose own type isn't registered.
    pub const OBJECT: TypeKey = TypeKey::from_static("object");
}
