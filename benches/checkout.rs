use criterion::{criterion_group, criterion_main, Criterion};
use pooled::{ConnectionFactory, ConnectionPool, FactoryError, PoolConfig};
use std::time::Duration;

struct UnitFactory;

impl ConnectionFactory for UnitFactory {
    type Connection = u64;

    fn connect(&self) -> Result<u64, FactoryError> {
        Ok(0)
    }

    fn disconnect(&self, _conn: &u64) {}
}

fn bench_checkout_checkin(c: &mut Criterion) {
    let pool = ConnectionPool::new(
        UnitFactory,
        PoolConfig::new()
            .with_max_size(8)
            .with_acquire_timeout(Duration::from_secs(1)),
    );

    c.bench_function("checkout_checkin", |b| {
        b.iter(|| {
            let conn = pool.checkout().unwrap();
            pool.checkin(&conn);
        })
    });
}

fn bench_contended_checkout(c: &mut Criterion) {
    let pool = ConnectionPool::new(
        UnitFactory,
        PoolConfig::new()
            .with_max_size(2)
            .with_acquire_timeout(Duration::from_secs(1)),
    );
    // Hold one of the two connections so every iteration contends.
    let held = pool.checkout().unwrap();

    c.bench_function("contended_checkout", |b| {
        b.iter(|| {
            let conn = pool.checkout().unwrap();
            pool.checkin(&conn);
        })
    });

    pool.checkin(&held);
}

criterion_group!(benches, bench_checkout_checkin, bench_contended_checkout);
criterion_main!(benches);
