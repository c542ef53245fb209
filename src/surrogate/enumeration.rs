use std::fmt;

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::handle::TypeHandle;
use crate::type_key::TypeKey;
use crate::value::{Discriminant, EnumValue, IntWidth, Value};

use super::DirectSurrogate;

/// Enumeration over an integer primitive.
///
/// The payload is the primitive surrogate's own type handle followed by that surrogate's
/// encoding of the discriminant. A reader can therefore decode any enumeration without
/// knowing its width ahead of time; the declared width is only applied afterwards.
#[derive(Clone, Debug)]
pub struct EnumSurrogate {
    key: TypeKey,
    handle: TypeHandle,
    width: IntWidth,
}

impl EnumSurrogate {
    pub fn new(key: impl Into<TypeKey>, handle: TypeHandle, width: IntWidth) -> Self {
        Self {
            key: key.into(),
            handle,
            width,
        }
    }

    pub fn width(&self) -> IntWidth {
        self.width
    }

    fn out_of_range(&self, value: impl fmt::Display) -> Error {
        Error::EnumRange {
            key: self.key.clone(),
            value: value.to_string(),
        }
    }

    /// Find the primitive surrogate named by an embedded handle: by type handle first, then
    /// through the (enum handle, subtype) table.
    fn resolve<'d>(
        &self,
        dec: &Decoder<'d>,
        handle: TypeHandle,
    ) -> Result<&'d dyn DirectSurrogate> {
        let registry = dec.context().registry();
        let reg = registry
            .get_surrogate_for_type_handle(handle)
            .or_else(|| registry.get_surrogate_for_subtype_handle(self.handle, handle.into()))
            .ok_or_else(|| dec.unknown_handle(handle))?;
        reg.surrogate
            .as_direct()
            .ok_or_else(|| Error::mismatch("integer surrogate", &reg.key))
    }
}

impl DirectSurrogate for EnumSurrogate {
    fn write(&self, enc: &mut Encoder, value: &Value) -> Result<()> {
        let disc = match value {
            Value::Enum(e) => e.value,
            other => return Err(Error::mismatch("enum", other.name())),
        };
        let disc = disc
            .convert(self.width)
            .ok_or_else(|| self.out_of_range(disc))?;
        let primitive = self.width.type_key();
        let reg = enc
            .context()
            .registry()
            .get_surrogate_for_type(&primitive)
            .ok_or(Error::Unregistered(primitive))?;
        let direct = reg
            .surrogate
            .as_direct()
            .ok_or_else(|| Error::mismatch("integer surrogate", &reg.key))?;
        enc.writer().write_handle(reg.handle)?;
        direct.write(enc, &disc.into_value())
    }

    fn read(&self, dec: &mut Decoder) -> Result<Value> {
        let handle = dec.reader().read_handle()?;
        let direct = self.resolve(dec, handle)?;
        let raw = direct.read(dec)?;
        let disc = Discriminant::from_value(&raw)
            .ok_or_else(|| Error::mismatch("integer discriminant", raw.name()))?;
        let disc = disc
            .convert(self.width)
            .ok_or_else(|| self.out_of_range(disc))?;
        Ok(Value::Enum(EnumValue::new(self.key.clone(), disc)))
    }

    fn skip(&self, dec: &mut Decoder) -> Result<()> {
        let handle = dec.reader().read_handle()?;
        self.resolve(dec, handle)?.skip(dec)
    }
}
