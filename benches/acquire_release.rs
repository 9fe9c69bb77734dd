//! Acquire/release throughput, uncontended and under contention.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use esox_connpool::{Connection, ConnectionPool, PoolConfiguration};

struct NoopConnection {
    queries: u64,
}

impl Connection for NoopConnection {
    type Spec = ();
    type Error = std::io::Error;

    fn open(_: &()) -> Result<Self, Self::Error> {
        Ok(NoopConnection { queries: 0 })
    }

    fn close(self) {}
}

fn pool(capacity: usize) -> ConnectionPool<NoopConnection> {
    ConnectionPool::new(&(), PoolConfiguration::new().with_capacity(capacity))
        .expect("noop connections always open")
}

fn bench_uncontended(c: &mut Criterion) {
    let pool = pool(4);

    c.bench_function("acquire_release_uncontended", |b| {
        b.iter(|| {
            let mut conn = pool.acquire();
            conn.queries += 1;
            black_box(conn.id())
        })
    });

    c.bench_function("try_acquire_uncontended", |b| {
        b.iter(|| black_box(pool.try_acquire().map(|conn| conn.id())))
    });
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_release_contended");

    for threads in [2, 4, 8] {
        let pool = pool(2);

        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                crossbeam::thread::scope(|scope| {
                    for _ in 0..threads {
                        scope.spawn(|_| {
                            for _ in 0..100 {
                                let mut conn = pool.acquire();
                                conn.queries += 1;
                            }
                        });
                    }
                })
                .expect("worker panicked")
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_contended);
criterion_main!(benches);
