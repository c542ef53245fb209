//! Writing half of the generic dispatcher.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::io::Write;

use crate::config::CodecConfig;
use crate::context::CacheContext;
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::handle::TypeHandle;
use crate::packed::Packed;
use crate::registry::Registration;
use crate::type_key::builtin;
use crate::value::Value;
use crate::writer::Writer;

/// Encodes values from one [`Graph`] onto one stream.
///
/// Each graph node is written in full the first time it's reached and as a back-reference
/// after that, so shared nodes stay shared and cycles terminate. Encounter indices are
/// assigned before a node's contents are written.
pub struct Encoder<'a> {
    writer: Writer<'a>,
    context: &'a CacheContext,
    graph: &'a Graph,
    config: CodecConfig,
    encountered: HashMap<NodeId, i32>,
    depth: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(inner: &'a mut dyn Write, context: &'a CacheContext, graph: &'a Graph) -> Self {
        Self {
            writer: Writer::new(inner),
            context,
            graph,
            config: CodecConfig::default(),
            encountered: HashMap::new(),
            depth: 0,
        }
    }

    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn writer(&mut self) -> &mut Writer<'a> {
        &mut self.writer
    }

    pub fn context(&self) -> &'a CacheContext {
        self.context
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn position(&self) -> u64 {
        self.writer.position()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }

    /// Write a value with its type handle, choosing the surrogate by the value's runtime type.
    pub fn write_object(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.writer.write_handle(TypeHandle::NULL),
            Value::Ref(node) => self.write_node(*node),
            _ => {
                let reg = self.resolve(value)?;
                let direct = reg
                    .surrogate
                    .as_direct()
                    .ok_or_else(|| Error::mismatch("direct surrogate", &reg.key))?;
                self.writer.write_handle(reg.handle)?;
                self.enter()?;
                let result = direct.write(self, value);
                self.depth -= 1;
                result
            }
        }
    }

    /// Write a value with no type handle. The reader has to know the type.
    pub fn write_as<T: Packed>(&mut self, value: &T) -> Result<()> {
        value.pack(&mut self.writer)
    }

    fn resolve(&self, value: &Value) -> Result<&'a Registration> {
        let registry = self.context.registry();
        let key = match value.type_key() {
            Some(key) => key,
            None => return Err(Error::mismatch("typed value", value.name())),
        };
        if let Some(reg) = registry.get_surrogate_for_type(&key) {
            return Ok(reg);
        }
        match value {
            Value::Object(_) => registry
                .get_surrogate_for_type(&builtin::OBJECT)
                .ok_or(Error::Unregistered(key)),
            _ => Err(Error::Unregistered(key)),
        }
    }

    fn write_node(&mut self, node: NodeId) -> Result<()> {
        if let Some(&index) = self.encountered.get(&node) {
            self.writer.write_handle(TypeHandle::BACK_REFERENCE)?;
            return self.writer.write_i32(index);
        }
        let key = self
            .graph
            .get(node)
            .ok_or_else(|| Error::mismatch("graph node", node))?
            .type_key();
        let reg = self
            .context
            .registry()
            .get_surrogate_for_type(&key)
            .ok_or_else(|| Error::Unregistered(key.clone()))?;
        let surrogate = reg
            .surrogate
            .as_context()
            .ok_or_else(|| Error::mismatch("context surrogate", &reg.key))?;

        let count = self.encountered.len();
        let index = i32::try_from(count).map_err(|_| Error::InvalidLength(count as i64))?;
        self.encountered.insert(node, index);

        self.writer.write_handle(reg.handle)?;
        self.enter()?;
        let result = surrogate.write_direct(self, node);
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.config.max_depth {
            return Err(Error::DepthLimit(self.config.max_depth));
        }
        self.depth += 1;
        Ok(())
    }
}
