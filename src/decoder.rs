//! Reading half of the generic dispatcher.

use std::io::Read;

use tracing::debug;

use crate::config::CodecConfig;
use crate::context::CacheContext;
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::handle::TypeHandle;
use crate::packed::Packed;
use crate::reader::Reader;
use crate::registry::{Registration, Surrogate};
use crate::value::Value;

/// Decodes values from one stream into a fresh [`Graph`].
///
/// Every graph node is recorded in encounter order as soon as its header has been read, before
/// its contents. A back-reference met while a node is still being filled resolves to that
/// node. Skipped nodes hold their index with an empty slot; referring to one is an error.
pub struct Decoder<'a> {
    reader: Reader<'a>,
    context: &'a CacheContext,
    config: CodecConfig,
    graph: Graph,
    encountered: Vec<Option<NodeId>>,
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(inner: &'a mut dyn Read, context: &'a CacheContext) -> Self {
        Self {
            reader: Reader::new(inner),
            context,
            config: CodecConfig::default(),
            graph: Graph::new(),
            encountered: Vec::new(),
            depth: 0,
        }
    }

    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.reader = self.reader.with_max_length(config.max_length);
        self.config = config;
        self
    }

    pub fn reader(&mut self) -> &mut Reader<'a> {
        &mut self.reader
    }

    pub fn context(&self) -> &'a CacheContext {
        self.context
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Take the graph holding every node decoded so far.
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Read one value written by [`Encoder::write_object`](crate::Encoder::write_object).
    pub fn read_object(&mut self) -> Result<Value> {
        let handle = self.reader.read_handle()?;
        match handle {
            TypeHandle::NULL => Ok(Value::Null),
            TypeHandle::BACK_REFERENCE => self.back_reference(),
            _ => {
                let reg = self.resolve(handle)?;
                self.enter()?;
                let result = self.read_registered(reg);
                self.depth -= 1;
                result
            }
        }
    }

    /// Read a handle-prefixed value and convert it to `T`.
    pub fn read_object_as<T: Packed>(&mut self) -> Result<T> {
        T::from_value(self.read_object()?)
    }

    /// Read a value written by [`Encoder::write_as`](crate::Encoder::write_as).
    pub fn read_as<T: Packed>(&mut self) -> Result<T> {
        T::unpack(&mut self.reader)
    }

    pub fn skip_as<T: Packed>(&mut self) -> Result<()> {
        T::skip(&mut self.reader)
    }

    /// Advance past one value without building it. Nested collections are skipped element by
    /// element; only fallback objects are materialized along the way.
    pub fn skip_object(&mut self) -> Result<()> {
        let handle = self.reader.read_handle()?;
        match handle {
            TypeHandle::NULL => Ok(()),
            TypeHandle::BACK_REFERENCE => self.reader.skip_i32(),
            _ => {
                let reg = self.resolve(handle)?;
                self.enter()?;
                let result = match &reg.surrogate {
                    Surrogate::Direct(s) => s.skip(self),
                    Surrogate::Context(s) => {
                        self.encountered.push(None);
                        s.skip_direct(self)
                    }
                };
                self.depth -= 1;
                result
            }
        }
    }

    /// Look up a handle read from the stream. A miss is fatal: the stream was written against
    /// a different handle table.
    pub fn resolve(&self, handle: TypeHandle) -> Result<&'a Registration> {
        self.context
            .registry()
            .get_surrogate_for_type_handle(handle)
            .ok_or_else(|| self.unknown_handle(handle))
    }

    pub(crate) fn unknown_handle(&self, handle: TypeHandle) -> Error {
        debug!(
            %handle,
            context = self.context.name(),
            position = self.reader.position(),
            "unknown type handle"
        );
        Error::UnknownHandle {
            handle,
            context: self.context.name().to_string(),
        }
    }

    fn read_registered(&mut self, reg: &'a Registration) -> Result<Value> {
        match &reg.surrogate {
            Surrogate::Direct(s) => s.read(self),
            Surrogate::Context(s) => {
                let shell = s.instantiate(self)?;
                self.encountered.push(Some(shell.node));
                s.read_direct(self, shell)?;
                Ok(Value::Ref(shell.node))
            }
        }
    }

    fn back_reference(&mut self) -> Result<Value> {
        let index = self.reader.read_i32()?;
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| self.encountered.get(i));
        match slot {
            Some(Some(node)) => Ok(Value::Ref(*node)),
            Some(None) => Err(Error::SkippedReference(index)),
            None => Err(Error::InvalidBackReference(index)),
        }
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.config.max_depth {
            return Err(Error::DepthLimit(self.config.max_depth));
        }
        self.depth += 1;
        Ok(())
    }
}
