// Heap use of the engine must follow the bytes it reads, not the block size
// announced by a signature header.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use oxirdiff::engine::RsyncEngine;
use oxirdiff::framing::{BlockSize, FrameEncoder, Operation};
use oxirdiff::pipeline::{PipelineOptions, generate_delta, generate_signature};

struct PeakAlloc;

static CURRENT: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);

fn grew(bytes: usize) {
    let now = CURRENT.fetch_add(bytes, Ordering::SeqCst) + bytes;
    PEAK.fetch_max(now, Ordering::SeqCst);
}

unsafe impl GlobalAlloc for PeakAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            grew(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            grew(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        CURRENT.fetch_sub(layout.size(), Ordering::SeqCst);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new = unsafe { System.realloc(ptr, layout, new_size) };
        if !new.is_null() {
            if new_size >= layout.size() {
                grew(new_size - layout.size());
            } else {
                CURRENT.fetch_sub(layout.size() - new_size, Ordering::SeqCst);
            }
        }
        new
    }
}

#[global_allocator]
static ALLOC: PeakAlloc = PeakAlloc;

const LIMIT: usize = 16 * 1024 * 1024;

/// Peak heap growth over `baseline` while `f` runs.
fn peak_during(f: impl FnOnce()) -> usize {
    let baseline = CURRENT.load(Ordering::SeqCst);
    PEAK.store(baseline, Ordering::SeqCst);
    f();
    PEAK.load(Ordering::SeqCst).saturating_sub(baseline)
}

// Both cases share one test so the peak counter is not disturbed by another
// test running in parallel.
#[test]
fn huge_block_size_does_not_preallocate() {
    let huge = BlockSize::new(u32::MAX).unwrap();

    // Header-only signature: a handful of bytes announcing a 4 GiB block.
    let mut enc = FrameEncoder::new(Vec::new());
    enc.write_block_size(huge).unwrap();
    let sig = enc.into_inner();
    assert!(sig.len() <= 5, "signature is {} bytes", sig.len());

    let target = b"ten bytes!".to_vec();
    let mut delta: Vec<u8> = Vec::with_capacity(1024);
    let peak = peak_during(|| {
        let stats = generate_delta(
            &RsyncEngine::new(),
            sig.as_slice(),
            target.as_slice(),
            &mut delta,
            &PipelineOptions::default(),
        )
        .unwrap();
        assert_eq!(stats.literal_bytes, target.len() as u64);
    });
    assert!(peak < LIMIT, "delta peak {peak} bytes");

    let ops = {
        let mut dec = oxirdiff::framing::FrameDecoder::new(delta.as_slice());
        assert_eq!(dec.read_block_size().unwrap(), huge);
        let mut ops = Vec::new();
        while let Some(op) = dec.read_operation().unwrap() {
            ops.push(op);
        }
        ops
    };
    assert_eq!(ops[0], Operation::Insert(target.clone()));

    // Same for a signature built with an oversized block.
    let opts = PipelineOptions {
        block_size: huge,
        ..Default::default()
    };
    let mut out: Vec<u8> = Vec::with_capacity(1024);
    let peak = peak_during(|| {
        let stats =
            generate_signature(&RsyncEngine::new(), target.as_slice(), &mut out, &opts).unwrap();
        assert_eq!(stats.blocks, 1);
    });
    assert!(peak < LIMIT, "signature peak {peak} bytes");
}
