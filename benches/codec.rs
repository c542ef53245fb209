use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use graph_pack::{
    from_slice, skip_all, to_vec, CacheContext, Discriminant, EnumValue, Graph, IntWidth, Node,
    RegistryBuilder, Timestamp, Value,
};
use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};

fn context() -> CacheContext {
    let mut builder = RegistryBuilder::with_builtins();
    builder.register_enum("Level", IntWidth::U8).unwrap();
    builder.register_record("LogEntry").unwrap();
    builder.build("bench")
}

/// A list of log records, each sharing one tag list.
fn log_graph<R: Rng>(rng: &mut R, entries: usize) -> (Graph, Value) {
    let mut graph = Graph::new();
    let tags = graph.list(vec![Value::from("web"), Value::from("prod")]);
    let mut records = Vec::with_capacity(entries);
    for _ in 0..entries {
        let len = rng.gen_range(8..64);
        let message: String = (&mut *rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        let fields = vec![
            Value::Timestamp(Timestamp::from_sec(rng.gen_range(0..2_000_000_000))),
            Value::Enum(EnumValue::new("Level", Discriminant::U8(rng.gen_range(0..5)))),
            Value::Str(message),
            Value::Bytes(rng.gen::<[u8; 4]>().to_vec()),
            Value::U16(rng.gen()),
            tags.clone(),
        ];
        let id = graph.insert(Node::Record {
            key: "LogEntry".into(),
            fields,
        });
        records.push(Value::Ref(id));
    }
    let root = graph.list(records);
    (graph, root)
}

fn bench_logs(c: &mut Criterion) {
    let context = context();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    let mut group = c.benchmark_group("logs");

    for &entries in &[16usize, 256, 4096] {
        let (graph, root) = log_graph(&mut rng, entries);
        let bytes = to_vec(&context, &graph, &root).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_function(format!("encode_{entries}"), |b| {
            b.iter(|| to_vec(&context, &graph, &root).unwrap())
        });
        group.bench_function(format!("decode_{entries}"), |b| {
            b.iter(|| from_slice(&context, &bytes).unwrap())
        });
        group.bench_function(format!("skip_{entries}"), |b| {
            b.iter(|| skip_all(&context, &bytes).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_logs);
criterion_main!(benches);
