//! Property tests for the skip invariant
//!
//! Skipping a dispatched object must consume exactly the bytes reading it would. These tests
//! generate arbitrary values and nested collections and compare the cursor positions.

use graph_pack::{
    from_slice_with_config, skip_all, to_vec, CacheContext, CodecConfig, Decoder, Discriminant,
    Encoder, EnumValue, Graph, IntWidth, Node, ObjectValue, PrimitiveArray, RegistryBuilder,
    Timestamp, Value,
};
use proptest::prelude::*;
use uuid::Uuid;

fn context() -> CacheContext {
    let mut builder = RegistryBuilder::with_builtins();
    builder.register_enum("Flag", IntWidth::U8).unwrap();
    builder.register_enum("Offset", IntWidth::I64).unwrap();
    builder.register_fallback("Sample").unwrap();
    builder.build("proptest")
}

fn integer() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i8>().prop_map(Value::I8),
        any::<u8>().prop_map(Value::U8),
        any::<i16>().prop_map(Value::I16),
        any::<u16>().prop_map(Value::U16),
        any::<i32>().prop_map(Value::I32),
        any::<u32>().prop_map(Value::U32),
        any::<i64>().prop_map(Value::I64),
        any::<u64>().prop_map(Value::U64),
    ]
}

fn array() -> impl Strategy<Value = Value> {
    use prop::collection::vec;
    prop_oneof![
        vec(any::<bool>(), 0..16).prop_map(PrimitiveArray::Bool),
        vec(any::<i8>(), 0..16).prop_map(PrimitiveArray::I8),
        vec(any::<i16>(), 0..16).prop_map(PrimitiveArray::I16),
        vec(any::<u16>(), 0..16).prop_map(PrimitiveArray::U16),
        vec(any::<i32>(), 0..16).prop_map(PrimitiveArray::I32),
        vec(any::<u32>(), 0..16).prop_map(PrimitiveArray::U32),
        vec(any::<i64>(), 0..16).prop_map(PrimitiveArray::I64),
        vec(any::<u64>(), 0..16).prop_map(PrimitiveArray::U64),
        vec(-1e6f32..1e6f32, 0..16).prop_map(PrimitiveArray::F32),
        vec(any::<char>(), 0..16).prop_map(PrimitiveArray::Char),
    ]
    .prop_map(Value::Array)
}

fn other() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1e6f32..1e6f32).prop_map(Value::F32),
        prop::collection::vec(-1e12f64..1e12f64, 0..8)
            .prop_map(|v| Value::Array(PrimitiveArray::F64(v))),
        any::<char>().prop_map(Value::Char),
        "\\PC{0,24}".prop_map(Value::Str),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
        (any::<i64>(), 0u32..1_000_000_000).prop_map(|(sec, nano)| {
            Value::Timestamp(Timestamp::from_utc(sec, nano).unwrap())
        }),
        any::<u128>().prop_map(|v| Value::Uuid(Uuid::from_u128(v))),
        any::<u8>().prop_map(|d| Value::Enum(EnumValue::new("Flag", Discriminant::U8(d)))),
        any::<i64>().prop_map(|d| Value::Enum(EnumValue::new("Offset", Discriminant::I64(d)))),
        (any::<i32>(), "\\PC{0,8}", any::<bool>()).prop_map(|(n, s, bound)| {
            let key = if bound { "Sample" } else { "Unregistered" };
            Value::Object(ObjectValue::new(key, &(n, s)).unwrap())
        }),
    ]
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![integer(), array(), other()].boxed()
}

fn direct() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => scalar(),
        1 => (scalar(), scalar()).prop_map(|(k, v)| Value::pair(k, v)),
    ]
}

/// A value before its collections have been placed in a graph.
#[derive(Clone, Debug)]
enum Tree {
    Leaf(Value),
    List(Vec<Tree>),
    Dict(Vec<(Value, Tree)>),
    Array(Vec<Tree>),
}

fn tree() -> impl Strategy<Value = Tree> {
    direct().prop_map(Tree::Leaf).prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Tree::List),
            prop::collection::vec((scalar(), inner.clone()), 0..6).prop_map(Tree::Dict),
            prop::collection::vec(inner, 0..6).prop_map(Tree::Array),
        ]
    })
}

fn build(graph: &mut Graph, tree: Tree) -> Value {
    match tree {
        Tree::Leaf(v) => v,
        Tree::List(items) => {
            let items = items.into_iter().map(|t| build(graph, t)).collect();
            graph.list(items)
        }
        Tree::Dict(entries) => {
            let entries = entries
                .into_iter()
                .map(|(k, t)| (k, build(graph, t)))
                .collect();
            graph.dict(entries)
        }
        Tree::Array(items) => {
            let items = items.into_iter().map(|t| build(graph, t)).collect();
            graph.array(items)
        }
    }
}

/// Structural equality across two graphs whose node ids differ.
fn same(ga: &Graph, a: &Value, gb: &Graph, b: &Value) -> bool {
    match (a, b) {
        (Value::Ref(x), Value::Ref(y)) => match (ga.get(*x), gb.get(*y)) {
            (Some(Node::List(xs)), Some(Node::List(ys)))
            | (Some(Node::Array(xs)), Some(Node::Array(ys))) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same(ga, x, gb, y))
            }
            (Some(Node::Dict(xs)), Some(Node::Dict(ys))) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys)
                        .all(|((xk, xv), (yk, yv))| same(ga, xk, gb, yk) && same(ga, xv, gb, yv))
            }
            _ => false,
        },
        (Value::Pair(x), Value::Pair(y)) => same(ga, &x.0, gb, &y.0) && same(ga, &x.1, gb, &y.1),
        _ => a == b,
    }
}

proptest! {
    #[test]
    fn prop_skip_matches_read(tree in tree()) {
        let context = context();
        let mut graph = Graph::new();
        let root = build(&mut graph, tree);
        let bytes = to_vec(&context, &graph, &root).unwrap();

        let mut src = &bytes[..];
        let mut dec = Decoder::new(&mut src, &context);
        let decoded = dec.read_object().unwrap();
        prop_assert_eq!(dec.position(), bytes.len() as u64);
        let decoded_graph = dec.into_graph();
        prop_assert!(same(&graph, &root, &decoded_graph, &decoded));

        let mut src = &bytes[..];
        let mut dec = Decoder::new(&mut src, &context);
        dec.skip_object().unwrap();
        prop_assert_eq!(dec.position(), bytes.len() as u64);
        prop_assert!(dec.graph().is_empty());
    }
}

proptest! {
    #[test]
    fn prop_stream_of_values(values in prop::collection::vec(direct(), 1..12)) {
        let context = context();
        let graph = Graph::new();
        let mut bytes = Vec::new();
        let mut ends = Vec::new();
        let mut enc = Encoder::new(&mut bytes, &context, &graph);
        for value in &values {
            enc.write_object(value).unwrap();
            ends.push(enc.position());
        }
        drop(enc);

        prop_assert_eq!(skip_all(&context, &bytes).unwrap(), values.len());

        // Skip every other value and read the rest
        let mut src = &bytes[..];
        let mut dec = Decoder::new(&mut src, &context);
        for (i, value) in values.iter().enumerate() {
            if i % 2 == 0 {
                dec.skip_object().unwrap();
            } else {
                prop_assert_eq!(&dec.read_object().unwrap(), value);
            }
            prop_assert_eq!(dec.position(), ends[i]);
        }
    }
}

proptest! {
    #[test]
    fn prop_garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let context = context();
        let config = CodecConfig { max_depth: 32, max_length: 1024 };
        let _ = from_slice_with_config(&context, &bytes, config);
        let _ = skip_all(&context, &bytes);
    }
}
