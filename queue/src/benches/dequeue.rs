use super::{get_queue, random_records};
use criterion::{black_box, criterion_group, Criterion};
use std::time::{Duration, Instant};

/// Number of records to read per iteration.
const RECORDS: usize = 10_000;

/// Benchmark sequentially dequeuing records that fit in an arena and records that span arenas.
fn bench_dequeue(c: &mut Criterion) {
    for size in [32, 1_024, 10_000] {
        let records = random_records(RECORDS, size);
        c.bench_function(
            &format!("{}/records={} size={}", module_path!(), RECORDS, size),
            |b| {
                b.iter_custom(|iters| {
                    let mut duration = Duration::ZERO;
                    for _ in 0..iters {
                        let mut queue = get_queue();
                        for record in &records {
                            queue.enqueue(record).unwrap();
                        }

                        let start = Instant::now();
                        while let Ok(record) = queue.dequeue() {
                            black_box(record);
                        }
                        duration += start.elapsed();
                    }
                    duration
                });
            },
        );
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_dequeue
}
