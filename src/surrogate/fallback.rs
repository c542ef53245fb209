use tracing::trace;

use crate::decoder::Decoder;
use crate::element::capture_elem;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::type_key::TypeKey;
use crate::value::{ObjectValue, Value};

use super::DirectSurrogate;

/// Carries [`ObjectValue`]s, the serde escape hatch for types with no dedicated surrogate.
///
/// The payload is a single self-delimiting pack element tree. The catch-all form, registered
/// under `"object"`, prefixes it with the object's type name so any unregistered type can pass
/// through. Skipping has to walk and copy the element tree: this is the one surrogate that
/// allocates on skip.
#[derive(Clone, Debug)]
pub struct FallbackSurrogate {
    bound: Option<TypeKey>,
}

impl FallbackSurrogate {
    /// Fallback for one named type. The name isn't written.
    pub fn bound(key: impl Into<TypeKey>) -> Self {
        Self {
            bound: Some(key.into()),
        }
    }

    /// Fallback for any type, writing the type name ahead of the payload.
    pub fn catch_all() -> Self {
        Self { bound: None }
    }

    fn read_key(&self, dec: &mut Decoder) -> Result<TypeKey> {
        match &self.bound {
            Some(key) => Ok(key.clone()),
            None => Ok(TypeKey::new(
                dec.reader().read_str()?.ok_or(Error::NullValue)?,
            )),
        }
    }

    fn capture(dec: &mut Decoder) -> Result<Vec<u8>> {
        let max_depth = dec.config().max_depth;
        let mut out = Vec::new();
        capture_elem(dec.reader(), &mut out, max_depth)?;
        Ok(out)
    }
}

impl DirectSurrogate for FallbackSurrogate {
    fn write(&self, enc: &mut Encoder, value: &Value) -> Result<()> {
        let object = match value {
            Value::Object(object) => object,
            other => return Err(Error::mismatch("object", other.name())),
        };
        if self.bound.is_none() {
            enc.writer().write_str(object.key.as_str())?;
        }
        enc.writer().write_raw(object.as_bytes())
    }

    fn read(&self, dec: &mut Decoder) -> Result<Value> {
        let key = self.read_key(dec)?;
        let bytes = Self::capture(dec)?;
        Ok(Value::Object(ObjectValue::from_raw(key, bytes)))
    }

    fn skip(&self, dec: &mut Decoder) -> Result<()> {
        if self.bound.is_none() {
            dec.reader().skip_str()?;
        }
        let discarded = Self::capture(dec)?;
        trace!(bytes = discarded.len(), "materialized fallback object to skip it");
        Ok(())
    }
}
