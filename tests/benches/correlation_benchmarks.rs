//! # Correlation Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | register + resolve | < 1µs per call |
//! | expire_due over a full heap | linear in expired calls |
//! | issue + complete through the correlator | < 2µs per call |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rpc_correlation::{
    CallCorrelator, CallId, CallOutcome, CorrelationConfig, PendingCall, PendingCallTable,
};
use std::time::Duration;
use tokio::time::Instant;

fn bench_register_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-call-table");
    let table = PendingCallTable::<u64>::new();
    let mut next = 0u64;

    group.bench_function("register_resolve", |b| {
        b.iter(|| {
            next += 1;
            let (call, handle) = PendingCall::new(CallId::new(next), Duration::from_secs(30));
            table.register(call).unwrap();
            black_box(table.resolve(CallId::new(next), CallOutcome::Completed(next)));
            drop(handle);
        })
    });

    group.finish();
}

fn bench_expire_due(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeout-sweep");

    for size in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("expire_due", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let table = PendingCallTable::<()>::new();
                    let handles: Vec<_> = (0..size)
                        .map(|i| {
                            let (call, handle) =
                                PendingCall::new(CallId::new(i), Duration::from_millis(1 + i % 50));
                            table.register(call).unwrap();
                            handle
                        })
                        .collect();
                    (table, handles)
                },
                |(table, handles)| {
                    let far = Instant::now() + Duration::from_secs(60);
                    black_box(table.expire_due(far));
                    drop(handles);
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_correlator(c: &mut Criterion) {
    let mut group = c.benchmark_group("call-correlator");
    let correlator = CallCorrelator::<u64>::new(CorrelationConfig::default()).unwrap();

    group.bench_function("issue_complete", |b| {
        b.iter(|| {
            let (id, handle) = correlator.issue_call().unwrap();
            black_box(correlator.complete_call(id, 1));
            drop(handle);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_register_resolve, bench_expire_due, bench_correlator);
criterion_main!(benches);
