//! graph-pack encodes object graphs into a dense binary stream. Types are identified on the
//! wire by 16-bit handles instead of names, and shared or cyclic references survive a round
//! trip.
//!
//! The pieces:
//!
//! - A [`CacheContext`] holds the handle table. It's built once with a [`RegistryBuilder`]
//! 	and is immutable afterwards. Writer and reader must build theirs identically: the
//! 	stream carries no schema, only handles.
//! - Surrogates do the per-type work. A [`DirectSurrogate`](surrogate::DirectSurrogate)
//! 	codes a value that can't take part in a cycle. A
//! 	[`ContextSurrogate`](surrogate::ContextSurrogate) codes a [`Graph`] node in two phases,
//! 	so a reference back to a node whose contents are still being read resolves to it.
//! - The [`Encoder`] and [`Decoder`] dispatch each [`Value`] to its surrogate by runtime type
//! 	or by the handle read from the stream. Every read has a skip that consumes the same
//! 	bytes without building the value.
//! - Types with no dedicated surrogate can travel as an [`ObjectValue`], which wraps any
//! 	serde type in a self-describing msgpack-style encoding.
//!
//! Wire layout of one dispatched object:
//!
//! - `[i16 handle][payload]` for a registered type,
//! - `[-1]` for null,
//! - `[-2][i32 index]` for a graph node already written to this stream.
//!
//! All integers are little-endian. Byte sequences and strings have an i32 length prefix where
//! `-1` is null. Collections are an i32 count followed by that many dispatched objects.
//!
//! ```
//! use graph_pack::{from_slice, to_vec, Graph, Node, RegistryBuilder, Value};
//!
//! let context = RegistryBuilder::with_builtins().build("example");
//!
//! // A list that contains itself.
//! let mut graph = Graph::new();
//! let list = graph.list(vec![Value::from("head")]);
//! if let Some(Node::List(items)) = graph.get_mut(list.as_node().unwrap()) {
//!     items.push(list.clone());
//! }
//!
//! let bytes = to_vec(&context, &graph, &list).unwrap();
//! let decoded = from_slice(&context, &bytes).unwrap();
//! let root = decoded.root.as_node().unwrap();
//! match decoded.graph.get(root) {
//!     Some(Node::List(items)) => assert_eq!(items[1], Value::Ref(root)),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

mod config;
mod context;
mod de;
mod decoder;
mod depth_tracking;
mod element;
mod encoder;
mod error;
mod graph;
mod handle;
mod marker;
mod packed;
mod reader;
mod registry;
mod ser;
mod timestamp;
mod type_key;
mod value;
mod writer;

pub mod surrogate;

pub use self::config::{CodecConfig, MAX_DEPTH, MAX_LENGTH};
pub use self::context::CacheContext;
pub use self::decoder::Decoder;
pub use self::encoder::Encoder;
pub use self::error::{Error, Result};
pub use self::graph::{Graph, Node, NodeId};
pub use self::handle::{SubtypeHandle, TypeHandle};
pub use self::packed::Packed;
pub use self::reader::Reader;
pub use self::registry::{Registration, RegistryBuilder, Surrogate, SurrogateRegistry};
pub use self::timestamp::Timestamp;
pub use self::type_key::{builtin, TypeKey};
pub use self::value::{Discriminant, EnumValue, IntWidth, ObjectValue, PrimitiveArray, Value};
pub use self::writer::Writer;

/// Result of [`from_slice`]: the decoded root value and the graph its references point into.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
    pub graph: Graph,
    pub root: Value,
}

/// Encode `value`, plus every graph node reachable from it, as one dispatched object.
pub fn to_vec(context: &CacheContext, graph: &Graph, value: &Value) -> Result<Vec<u8>> {
    to_vec_with_config(context, graph, value, CodecConfig::default())
}

pub fn to_vec_with_config(
    context: &CacheContext,
    graph: &Graph,
    value: &Value,
    config: CodecConfig,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    Encoder::new(&mut buf, context, graph)
        .with_config(config)
        .write_object(value)?;
    Ok(buf)
}

/// Decode exactly one dispatched object. Bytes left over after it are an error.
pub fn from_slice(context: &CacheContext, bytes: &[u8]) -> Result<Decoded> {
    from_slice_with_config(context, bytes, CodecConfig::default())
}

pub fn from_slice_with_config(
    context: &CacheContext,
    bytes: &[u8],
    config: CodecConfig,
) -> Result<Decoded> {
    let mut src = bytes;
    let mut dec = Decoder::new(&mut src, context).with_config(config);
    let root = dec.read_object()?;
    let used = dec.position() as usize;
    if used < bytes.len() {
        return Err(Error::TrailingBytes(bytes.len() - used));
    }
    Ok(Decoded {
        graph: dec.into_graph(),
        root,
    })
}

/// Skip every dispatched object in `bytes`, returning how many there were. Fails on the first
/// object that can't be skipped.
pub fn skip_all(context: &CacheContext, bytes: &[u8]) -> Result<usize> {
    let mut src = bytes;
    let mut dec = Decoder::new(&mut src, context);
    let mut count = 0;
    while (dec.position() as usize) < bytes.len() {
        dec.skip_object()?;
        count += 1;
    }
    Ok(count)
}
