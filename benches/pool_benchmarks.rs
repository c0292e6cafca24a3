use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use async_taskpool::{
    model::{DispatchOrder, Task},
    policy::NeverFail,
    pool::{Config as PoolConfig, WorkerPoolInner},
};
use std::hint::black_box;

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .enable_all()
        .build()
        .unwrap()
}

// Benchmark 1: submit -> process -> collect для задач нулевой длительности
fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");

    for size in [100u64, 1000, 10000] {
        group.throughput(Throughput::Elements(size));

        for (name, dispatch) in [("fifo", DispatchOrder::Fifo), ("priority", DispatchOrder::Priority)] {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &size| {
                let rt = create_runtime();

                b.to_async(&rt).iter(|| async move {
                    let config = PoolConfig {
                        dispatch,
                        ..PoolConfig::io_bound()
                    };
                    let pool = WorkerPoolInner::with_failure_policy(config, NeverFail).unwrap();
                    pool.start();

                    let results = pool.results();
                    let consumer = tokio::spawn(async move {
                        let mut received = 0u64;
                        while received < size {
                            match results.recv().await {
                                Some(result) => {
                                    black_box(result);
                                    received += 1;
                                }
                                None => break,
                            }
                        }
                        received
                    });

                    for id in 0..size {
                        pool.submit(Task::new(id, "bench").with_priority((id % 5) as u32))
                            .await
                            .unwrap();
                    }
                    black_box(consumer.await.unwrap());
                    pool.stop().await;
                });
            });
        }
    }

    group.finish();
}

// Benchmark 2: цена снимка статистики под мьютексом
fn bench_stats_snapshot(c: &mut Criterion) {
    let rt = create_runtime();
    let pool = rt.block_on(async {
        WorkerPoolInner::with_failure_policy(PoolConfig::default(), NeverFail).unwrap()
    });

    c.bench_function("stats_snapshot", |b| {
        b.iter(|| black_box(pool.stats()));
    });
}

criterion_group!(benches, bench_round_trip, bench_stats_snapshot);
criterion_main!(benches);
