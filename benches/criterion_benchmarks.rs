use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oxirdiff::compare::{CompareOptions, compare_streams};
use oxirdiff::engine::RsyncEngine;
use oxirdiff::framing::BlockSize;
use oxirdiff::pipeline::{PipelineOptions, apply_patch, generate_delta, generate_signature};
use std::fs;
use std::io::Cursor;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

fn mutate(base: &[u8], stride: usize) -> Vec<u8> {
    let mut out = base.to_vec();
    for i in (0..out.len()).step_by(stride.max(1)) {
        out[i] = out[i].wrapping_add(1);
    }
    out
}

fn opts_kib(kib: u32) -> PipelineOptions {
    PipelineOptions::with_block_kib(kib).unwrap()
}

fn signature(basis: &[u8], opts: &PipelineOptions) -> Vec<u8> {
    let mut sig: Vec<u8> = Vec::new();
    generate_signature(&RsyncEngine::new(), basis, &mut sig, opts).unwrap();
    sig
}

fn delta(sig: &[u8], target: &[u8], opts: &PipelineOptions) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    generate_delta(&RsyncEngine::new(), sig, target, &mut out, opts).unwrap();
    out
}

fn write_ratio_snapshot() {
    let basis = gen_data(2 * 1024 * 1024, 123);
    let target = mutate(&basis, 64 * 1024);
    let mut csv = String::from("block_kib,signature_bytes,delta_bytes,target_bytes,ratio\n");
    for kib in [1u32, 2, 4, 6, 16, 64] {
        let opts = opts_kib(kib);
        let sig = signature(&basis, &opts);
        let d = delta(&sig, &target, &opts);
        let ratio = d.len() as f64 / target.len() as f64;
        csv.push_str(&format!(
            "{kib},{},{},{},{}\n",
            sig.len(),
            d.len(),
            target.len(),
            ratio
        ));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("ratio_snapshot.csv"), csv);
}

fn bench_signature_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("signature_speed_mb_s");
    let opts = PipelineOptions::default();
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let basis = gen_data(size, 1);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(signature(black_box(&basis), &opts)));
        });
    }
    g.finish();
}

fn bench_delta_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("delta_speed_mb_s");
    let opts = PipelineOptions::default();
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let basis = gen_data(size, 2);
        let target = mutate(&basis, 16 * 1024);
        let sig = signature(&basis, &opts);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(delta(black_box(&sig), black_box(&target), &opts)));
        });
    }
    g.finish();
}

fn bench_patch_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("patch_speed_vs_channel_capacity");
    let basis = gen_data(4 * 1024 * 1024, 3);
    let target = mutate(&basis, 4096);
    for capacity in [0usize, 1, 32, 256] {
        let opts = PipelineOptions {
            channel_capacity: capacity,
            ..PipelineOptions::default()
        };
        let d = delta(&signature(&basis, &opts), &target, &opts);
        g.throughput(Throughput::Bytes(target.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(capacity), &opts, |b, opts| {
            b.iter(|| {
                let mut out: Vec<u8> = Vec::with_capacity(target.len());
                apply_patch(
                    &RsyncEngine::new(),
                    Cursor::new(&basis),
                    d.as_slice(),
                    &mut out,
                    opts,
                )
                .unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_ratio_vs_block_size(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("delta_ratio_vs_block_size");
    let basis = gen_data(2 * 1024 * 1024, 4);
    let target = mutate(&basis, 64 * 1024);
    for kib in [1u32, 6, 64] {
        let opts = opts_kib(kib);
        let sig = signature(&basis, &opts);
        g.bench_with_input(BenchmarkId::from_parameter(kib), &kib, |b, _| {
            b.iter(|| {
                let d = delta(&sig, &target, &opts);
                black_box(d.len() as f64 / target.len() as f64);
            });
        });
    }
    g.finish();
}

fn bench_compare(c: &mut Criterion) {
    let mut g = c.benchmark_group("compare_speed_vs_buffer_size");
    let data = gen_data(8 * 1024 * 1024, 5);
    for buffer_size in [4 * 1024usize, 32 * 1024, 256 * 1024] {
        let opts = CompareOptions {
            buffer_size,
            ..CompareOptions::default()
        };
        g.throughput(Throughput::Bytes(data.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(buffer_size), &opts, |b, opts| {
            b.iter(|| black_box(compare_streams(data.as_slice(), data.as_slice(), opts).unwrap()));
        });
    }
    g.finish();
}

fn bench_real_world_scenarios(c: &mut Criterion) {
    let mut g = c.benchmark_group("real_world_scenarios");
    let scenarios = [
        ("software_update", 4 * 1024 * 1024usize, 8 * 1024usize),
        ("document_versioning", 512 * 1024usize, 64 * 1024usize),
        ("database_snapshot", 8 * 1024 * 1024usize, 128 * 1024usize),
        ("log_append", 2 * 1024 * 1024usize, usize::MAX),
    ];

    for (name, size, stride) in scenarios {
        let basis = gen_data(size, size as u64);
        let mut target = if stride == usize::MAX {
            basis.clone()
        } else {
            mutate(&basis, stride)
        };
        target.extend_from_slice(&gen_data(size / 64, 99));
        let opts = PipelineOptions {
            block_size: BlockSize::DEFAULT,
            ..PipelineOptions::default()
        };
        g.throughput(Throughput::Bytes(target.len() as u64));
        g.bench_function(name, |b| {
            b.iter(|| {
                let d = delta(&signature(&basis, &opts), &target, &opts);
                let mut out: Vec<u8> = Vec::new();
                apply_patch(&RsyncEngine::new(), Cursor::new(&basis), d.as_slice(), &mut out, &opts)
                    .unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_signature_speed,
    bench_delta_speed,
    bench_patch_speed,
    bench_ratio_vs_block_size,
    bench_compare,
    bench_real_world_scenarios
);
criterion_main!(benches);
