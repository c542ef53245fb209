//! Per-type codec units.
//!
//! A [`DirectSurrogate`] encodes a value that can't take part in a cycle, start to finish. A
//! [`ContextSurrogate`] encodes a graph node and reads it in two phases: `instantiate` consumes
//! the header and reserves the node's slot, the dispatcher records the slot for
//! back-references, and only then does `read_direct` decode the contents. A reference back to
//! the node met while its contents are still being read resolves to the reserved slot.
//!
//! Every `skip` must consume exactly the bytes `read` would. The stream has no
//! resynchronization point, so a skip that's off by one byte corrupts every later field.

use std::fmt;
use std::marker::PhantomData;

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::graph::NodeId;
use crate::packed::Packed;
use crate::value::Value;

mod collection;
mod enumeration;
mod fallback;
mod pair;

pub use self::collection::{DictSurrogate, ListSurrogate, ObjectArraySurrogate, RecordSurrogate};
pub use self::enumeration::EnumSurrogate;
pub use self::fallback::FallbackSurrogate;
pub use self::pair::PairSurrogate;

pub trait DirectSurrogate: Send + Sync {
    fn write(&self, enc: &mut Encoder, value: &Value) -> Result<()>;

    fn read(&self, dec: &mut Decoder) -> Result<Value>;

    fn skip(&self, dec: &mut Decoder) -> Result<()>;
}

pub trait ContextSurrogate: Send + Sync {
    /// Read the structural header and reserve an empty node of the right shape.
    fn instantiate(&self, dec: &mut Decoder) -> Result<Shell>;

    /// Fill in a node reserved by [`instantiate`](Self::instantiate).
    fn read_direct(&self, dec: &mut Decoder, shell: Shell) -> Result<()>;

    fn write_direct(&self, enc: &mut Encoder, node: NodeId) -> Result<()>;

    fn skip_direct(&self, dec: &mut Decoder) -> Result<()>;
}

/// A reserved but not yet populated node, along with the element count its header declared.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Shell {
    pub node: NodeId,
    pub len: usize,
}

/// Direct surrogate for any [`Packed`] type. Generic and typed encodings of the same value are
/// byte-identical apart from the leading handle.
pub struct PackedSurrogate<T>(PhantomData<fn() -> T>);

impl<T> PackedSurrogate<T> {
    pub fn new() -> Self {
        PackedSurrogate(PhantomData)
    }
}

impl<T> Default for PackedSurrogate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PackedSurrogate<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PackedSurrogate<{}>", std::any::type_name::<T>())
    }
}

impl<T: Packed> DirectSurrogate for PackedSurrogate<T> {
    fn write(&self, enc: &mut Encoder, value: &Value) -> Result<()> {
        T::pack_value(value, enc.writer())
    }

    fn read(&self, dec: &mut Decoder) -> Result<Value> {
        Ok(T::unpack(dec.reader())?.into_value())
    }

    fn skip(&self, dec: &mut Decoder) -> Result<()> {
        T::skip(dec.reader())
    }
}
