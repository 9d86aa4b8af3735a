#![no_main]
use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use oxirdiff::engine::RsyncEngine;
use oxirdiff::pipeline::{PipelineOptions, apply_patch};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the basis length, the rest is the delta.
    let split = (data[0] as usize).min(data.len() - 1);
    let (basis, delta) = data[1..].split_at(split);
    let opts = PipelineOptions {
        channel_capacity: 2,
        ..Default::default()
    };

    // Must terminate with an error or a verified output, never panic or hang.
    let mut out: Vec<u8> = Vec::new();
    let _ = apply_patch(&RsyncEngine::new(), Cursor::new(basis), delta, &mut out, &opts);
});
