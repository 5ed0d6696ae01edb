//! Recording hot-path benchmark
//!
//! Measures what a completed call costs the process that made it:
//!
//! 1. `RingBuffer::append` on a full buffer (append + evict)
//! 2. `ObservabilityHub::record` with no observers (append under the lock)
//! 3. `ObservabilityHub::record` with observers (append + serialize + fan-out)
//! 4. `BodyCapture::push` on bodies past the limit
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench ring_buffer_overhead
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http_observe::body_capture::BodyCapture;
use http_observe::call_record::CallRecord;
use http_observe::hub::{HubConfig, ObservabilityHub};
use http_observe::ring_buffer::RingBuffer;
use std::sync::Arc;

fn bench_record(i: u64) -> CallRecord {
    CallRecord::builder("GET", format!("http://bench.local/items/{}", i))
        .status(200)
        .duration_ms(i % 250)
        .response_body("{\"items\":[1,2,3]}")
        .build()
}

/// Append into an always-full buffer, so every append also evicts
fn bench_append_full_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer_append_full");

    for capacity in [100, 1000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let mut buffer = RingBuffer::new(capacity);
            let record = Arc::new(bench_record(0));
            for _ in 0..capacity {
                buffer.append(Arc::clone(&record));
            }

            b.iter(|| buffer.append(black_box(Arc::clone(&record))));
        });
    }

    group.finish();
}

fn bench_hub_record(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("hub_record");

    for observers in [0usize, 1, 8] {
        group.bench_with_input(BenchmarkId::new("observers", observers), &observers, |b, &observers| {
            let _guard = runtime.enter();
            let hub = ObservabilityHub::new(HubConfig::default());
            // Streams are held but never read; their queues drop the oldest frames
            let _streams: Vec<_> = (0..observers).map(|_| hub.subscribe()).collect();

            let mut i = 0u64;
            b.iter(|| {
                hub.record(black_box(bench_record(i)));
                i += 1;
            });
        });
    }

    group.finish();
}

fn bench_body_capture_past_limit(c: &mut Criterion) {
    let chunk = vec![b'x'; 16 * 1024];

    c.bench_function("body_capture_1mib_limit_64k", |b| {
        b.iter(|| {
            let mut capture = BodyCapture::new(64 * 1024);
            for _ in 0..64 {
                capture.push(black_box(&chunk));
            }
            black_box(capture.render())
        });
    });
}

criterion_group!(
    benches,
    bench_append_full_buffer,
    bench_hub_record,
    bench_body_capture_past_limit
);
criterion_main!(benches);
