#![no_main]
use graph_pack::{from_slice, RegistryBuilder, Value};
use libfuzzer_sys::fuzz_target;
use serde::de::IgnoredAny;

// Arbitrary bytes behind a catch-all fallback header
fuzz_target!(|data: &[u8]| {
    let mut stream = vec![31u8, 0, 1, 0, 0, 0, b'x'];
    stream.extend_from_slice(data);
    let context = RegistryBuilder::with_builtins().build("fuzz");
    if let Ok(decoded) = from_slice(&context, &stream) {
        if let Value::Object(object) = decoded.root {
            let _ = object.deserialize::<IgnoredAny>();
        }
    }
});
