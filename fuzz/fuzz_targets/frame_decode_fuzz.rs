#![no_main]
use libfuzzer_sys::fuzz_target;
use oxirdiff::framing::FrameDecoder;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a delta stream: decoding must only ever return errors.
    let mut dec = FrameDecoder::new(data);
    if dec.read_block_size().is_ok() {
        while let Ok(Some(_)) = dec.read_operation() {}
    }

    // Same bytes as a signature stream.
    let _ = oxirdiff::pipeline::delta::read_signature(data);
});
