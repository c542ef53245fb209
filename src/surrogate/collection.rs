//! Context-sensitive surrogates for the node kinds of a [`Graph`](crate::Graph).
//!
//! All four share one wire shape: an i32 element count, then each element through the
//! generic dispatcher. Dictionaries dispatch a key and then a value per entry.

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::graph::{Node, NodeId};
use crate::reader::reserve;
use crate::type_key::TypeKey;
use crate::value::Value;

use super::{ContextSurrogate, Shell};

fn unexpected(expected: &'static str, node: Option<&Node>) -> Error {
    Error::mismatch(expected, node.map_or("missing node", Node::name))
}

fn node_mut<'d>(dec: &'d mut Decoder, node: NodeId) -> Result<&'d mut Node> {
    dec.graph_mut()
        .get_mut(node)
        .ok_or_else(|| Error::mismatch("reserved node", node))
}

fn write_items(enc: &mut Encoder, items: &[Value]) -> Result<()> {
    enc.writer().write_len(items.len())?;
    for item in items {
        enc.write_object(item)?;
    }
    Ok(())
}

fn skip_items(dec: &mut Decoder, per_item: usize) -> Result<()> {
    let len = dec.reader().read_count()?;
    for _ in 0..len {
        for _ in 0..per_item {
            dec.skip_object()?;
        }
    }
    Ok(())
}

/// Growable list of objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListSurrogate;

impl ContextSurrogate for ListSurrogate {
    fn instantiate(&self, dec: &mut Decoder) -> Result<Shell> {
        let len = dec.reader().read_count()?;
        let node = dec.graph_mut().insert(Node::List(reserve(len)?));
        Ok(Shell { node, len })
    }

    fn read_direct(&self, dec: &mut Decoder, shell: Shell) -> Result<()> {
        for _ in 0..shell.len {
            let item = dec.read_object()?;
            match node_mut(dec, shell.node)? {
                Node::List(items) => items.push(item),
                other => return Err(unexpected("list", Some(&*other))),
            }
        }
        Ok(())
    }

    fn write_direct(&self, enc: &mut Encoder, node: NodeId) -> Result<()> {
        match enc.graph().get(node) {
            Some(Node::List(items)) => write_items(enc, items),
            other => Err(unexpected("list", other)),
        }
    }

    fn skip_direct(&self, dec: &mut Decoder) -> Result<()> {
        skip_items(dec, 1)
    }
}

/// Dictionary with entries kept in insertion order.
#[derive(Clone, Copy, Debug, Default)]
pub struct DictSurrogate;

impl ContextSurrogate for DictSurrogate {
    fn instantiate(&self, dec: &mut Decoder) -> Result<Shell> {
        let len = dec.reader().read_count()?;
        let node = dec.graph_mut().insert(Node::Dict(reserve(len)?));
        Ok(Shell { node, len })
    }

    fn read_direct(&self, dec: &mut Decoder, shell: Shell) -> Result<()> {
        for _ in 0..shell.len {
            let key = dec.read_object()?;
            let value = dec.read_object()?;
            match node_mut(dec, shell.node)? {
                Node::Dict(entries) => entries.push((key, value)),
                other => return Err(unexpected("dict", Some(&*other))),
            }
        }
        Ok(())
    }

    fn write_direct(&self, enc: &mut Encoder, node: NodeId) -> Result<()> {
        let entries = match enc.graph().get(node) {
            Some(Node::Dict(entries)) => entries,
            other => return Err(unexpected("dict", other)),
        };
        enc.writer().write_len(entries.len())?;
        for (key, value) in entries {
            enc.write_object(key)?;
            enc.write_object(value)?;
        }
        Ok(())
    }

    fn skip_direct(&self, dec: &mut Decoder) -> Result<()> {
        skip_items(dec, 2)
    }
}

/// Fixed-length array of objects. Slots are appended as they are read, so a back-reference met
/// mid-array sees only the elements before it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectArraySurrogate;

impl ContextSurrogate for ObjectArraySurrogate {
    fn instantiate(&self, dec: &mut Decoder) -> Result<Shell> {
        let len = dec.reader().read_count()?;
        let node = dec.graph_mut().insert(Node::Array(reserve(len)?));
        Ok(Shell { node, len })
    }

    fn read_direct(&self, dec: &mut Decoder, shell: Shell) -> Result<()> {
        for _ in 0..shell.len {
            let item = dec.read_object()?;
            match node_mut(dec, shell.node)? {
                Node::Array(items) => items.push(item),
                other => return Err(unexpected("object array", Some(&*other))),
            }
        }
        Ok(())
    }

    fn write_direct(&self, enc: &mut Encoder, node: NodeId) -> Result<()> {
        match enc.graph().get(node) {
            Some(Node::Array(items)) => write_items(enc, items),
            other => Err(unexpected("object array", other)),
        }
    }

    fn skip_direct(&self, dec: &mut Decoder) -> Result<()> {
        skip_items(dec, 1)
    }
}

/// A named user type stored as positional fields. Register one per record type with
/// [`RegistryBuilder::register_record`](crate::RegistryBuilder::register_record).
#[derive(Clone, Debug)]
pub struct RecordSurrogate {
    key: TypeKey,
}

impl RecordSurrogate {
    pub fn new(key: impl Into<TypeKey>) -> Self {
        Self { key: key.into() }
    }
}

impl ContextSurrogate for RecordSurrogate {
    fn instantiate(&self, dec: &mut Decoder) -> Result<Shell> {
        let len = dec.reader().read_count()?;
        let node = dec.graph_mut().insert(Node::Record {
            key: self.key.clone(),
            fields: reserve(len)?,
        });
        Ok(Shell { node, len })
    }

    fn read_direct(&self, dec: &mut Decoder, shell: Shell) -> Result<()> {
        for _ in 0..shell.len {
            let field = dec.read_object()?;
            match node_mut(dec, shell.node)? {
                Node::Record { fields, .. } => fields.push(field),
                other => return Err(unexpected("record", Some(&*other))),
            }
        }
        Ok(())
    }

    fn write_direct(&self, enc: &mut Encoder, node: NodeId) -> Result<()> {
        match enc.graph().get(node) {
            Some(Node::Record { key, fields }) if *key == self.key => write_items(enc, fields),
            other => Err(unexpected("record", other)),
        }
    }

    fn skip_direct(&self, dec: &mut Decoder) -> Result<()> {
        skip_items(dec, 1)
    }
}
