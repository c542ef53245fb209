use std::fmt;

use crate::type_key::{builtin, TypeKey};
use crate::value::Value;

/// Index of a node in a [`Graph`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A context-sensitive object. These are the only values with identity: two `Value::Ref`s to
/// the same node are the same object on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    List(Vec<Value>),
    /// Entries in insertion order. Keys aren't deduplicated.
    Dict(Vec<(Value, Value)>),
    /// Fixed-length array of objects.
    Array(Vec<Value>),
    /// A user type with positional fields, coded by a registered context surrogate.
    Record { key: TypeKey, fields: Vec<Value> },
}

impl Node {
    pub fn type_key(&self) -> TypeKey {
        match self {
            Node::List(_) => builtin::LIST,
            Node::Dict(_) => builtin::DICT,
            Node::Array(_) => builtin::OBJECT_ARRAY,
            Node::Record { key, .. } => key.clone(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Node::List(_) => "List",
            Node::Dict(_) => "Dict",
            Node::Array(_) => "Array",
            Node::Record { .. } => "Record",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Node::List(v) | Node::Array(v) => v.len(),
            Node::Dict(v) => v.len(),
            Node::Record { fields, .. } => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Arena holding every context-sensitive node of one object graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Insert a list and return a reference to it.
    pub fn list(&mut self, items: Vec<Value>) -> Value {
        Value::Ref(self.insert(Node::List(items)))
    }

    pub fn dict(&mut self, entries: Vec<(Value, Value)>) -> Value {
        Value::Ref(self.insert(Node::Dict(entries)))
    }

    pub fn array(&mut self, items: Vec<Value>) -> Value {
        Value::Ref(self.insert(Node::Array(items)))
    }
}
