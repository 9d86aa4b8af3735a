#![no_main]
use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use oxirdiff::engine::RsyncEngine;
use oxirdiff::framing::BlockSize;
use oxirdiff::pipeline::{PipelineOptions, apply_patch, generate_delta, generate_signature};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte is the block size, the payload splits into basis and new file.
    let block_size = BlockSize::new(u32::from(data[0]).max(1)).unwrap();
    let payload = &data[1..];
    let (basis, target) = payload.split_at(payload.len() / 2);
    let opts = PipelineOptions {
        block_size,
        ..Default::default()
    };
    let engine = RsyncEngine::new();

    let mut sig: Vec<u8> = Vec::new();
    generate_signature(&engine, basis, &mut sig, &opts).unwrap();
    let mut delta: Vec<u8> = Vec::new();
    generate_delta(&engine, sig.as_slice(), target, &mut delta, &opts).unwrap();
    let mut out: Vec<u8> = Vec::new();
    let stats = apply_patch(&engine, Cursor::new(basis), delta.as_slice(), &mut out, &opts).unwrap();

    assert!(stats.checksum_verified);
    assert_eq!(out, target);
});
