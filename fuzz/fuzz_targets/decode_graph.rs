#![no_main]
use graph_pack::{from_slice_with_config, skip_all, CodecConfig, IntWidth, RegistryBuilder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut builder = RegistryBuilder::with_builtins();
    builder.register_enum("Level", IntWidth::I32).unwrap();
    builder.register_record("Node").unwrap();
    builder.register_fallback("Blob").unwrap();
    let context = builder.build("fuzz");
    let config = CodecConfig {
        max_depth: 64,
        max_length: 1 << 16,
    };
    let _ = from_slice_with_config(&context, data, config);
    let _ = skip_all(&context, data);
});
