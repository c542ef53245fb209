use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::value::Value;

use super::DirectSurrogate;

/// Key/value pair. Both halves go through the generic dispatcher, so either may be a node
/// reference.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairSurrogate;

impl DirectSurrogate for PairSurrogate {
    fn write(&self, enc: &mut Encoder, value: &Value) -> Result<()> {
        match value {
            Value::Pair(pair) => {
                enc.write_object(&pair.0)?;
                enc.write_object(&pair.1)
            }
            other => Err(Error::mismatch("pair", other.name())),
        }
    }

    fn read(&self, dec: &mut Decoder) -> Result<Value> {
        let key = dec.read_object()?;
        let value = dec.read_object()?;
        Ok(Value::pair(key, value))
    }

    fn skip(&self, dec: &mut Decoder) -> Result<()> {
        dec.skip_object()?;
        dec.skip_object()
    }
}
