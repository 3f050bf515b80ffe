//! End-to-end buffer throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spillway_core::{BufferConfig, SpillBuffer};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const SEGMENT_SIZE: usize = 64 * 1024;
const TRANSFER: usize = 16 * 1024 * 1024;

fn config(dir: &TempDir) -> BufferConfig {
    BufferConfig::new()
        .buffer_dir(dir.path())
        .segment_size(SEGMENT_SIZE)
        .segment_count(1024)
        .window_size(4)
        .maintenance_period(Duration::from_millis(10))
        .file_size(4 * 1024 * 1024)
}

fn write_all(buffer: &SpillBuffer, mut data: &[u8]) {
    while !data.is_empty() {
        let n = buffer.write(data).unwrap();
        data = &data[n..];
    }
}

fn read_to_end(buffer: &SpillBuffer, chunk: usize) -> usize {
    let mut scratch = vec![0u8; chunk];
    let mut total = 0;
    loop {
        match buffer.read(&mut scratch) {
            Ok(0) => return total,
            Ok(n) => total += n,
            Err(_) => {}
        }
    }
}

/// Producer and consumer running at the same time.
fn bench_concurrent_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_transfer");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(TRANSFER as u64));

    for chunk in [4096, 65536].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), chunk, |b, &chunk| {
            let data = vec![7u8; chunk];
            b.iter(|| {
                let dir = TempDir::new().unwrap();
                let buffer = SpillBuffer::new(config(&dir)).unwrap();
                let received = thread::scope(|scope| {
                    let reader = scope.spawn(|| read_to_end(&buffer, chunk));
                    for _ in 0..TRANSFER / chunk {
                        write_all(&buffer, &data);
                    }
                    buffer.finish();
                    reader.join().unwrap()
                });
                black_box(received);
            });
        });
    }

    group.finish();
}

/// Producer finishes before the consumer starts, so most segments spill.
fn bench_spill_then_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("spill_then_drain");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(TRANSFER as u64));

    for use_files in [false, true].iter() {
        let label = if *use_files { "disk" } else { "memory" };
        group.bench_with_input(BenchmarkId::from_parameter(label), use_files, |b, &use_files| {
            let data = vec![3u8; SEGMENT_SIZE];
            b.iter(|| {
                let dir = TempDir::new().unwrap();
                let buffer = SpillBuffer::new(config(&dir).use_files(use_files)).unwrap();
                for _ in 0..TRANSFER / SEGMENT_SIZE {
                    write_all(&buffer, &data);
                }
                buffer.finish();
                black_box(read_to_end(&buffer, SEGMENT_SIZE));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_concurrent_transfer, bench_spill_then_drain);
criterion_main!(benches);
