//! Basic pool usage: checkout, checkin, preparation, caller affinity

use pooled::{
    CallerScope, ConnectionFactory, ConnectionPool, FactoryError, PoolConfig,
};
use std::time::Duration;

#[derive(Debug)]
struct CacheClient {
    server: String,
}

struct CacheFactory {
    server: String,
}

impl ConnectionFactory for CacheFactory {
    type Connection = CacheClient;

    fn connect(&self) -> Result<CacheClient, FactoryError> {
        Ok(CacheClient {
            server: self.server.clone(),
        })
    }

    fn disconnect(&self, client: &CacheClient) {
        println!("   closing client for {}", client.server);
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    println!("=== pooled - Basic Usage ===\n");

    let pool = ConnectionPool::new(
        CacheFactory {
            server: String::from("cache-1:6379"),
        },
        PoolConfig::new()
            .with_max_size(2)
            .with_acquire_timeout(Duration::from_secs(1)),
    );

    // Setup calls recorded now run once against each new connection.
    pool.record_preparation("announce", |client: &CacheClient| {
        println!("   preparing new client for {}", client.server);
        Ok(())
    })
    .expect("pool has no connections yet");

    // 1. Plain checkout / checkin
    println!("1. Checkout and checkin:");
    let conn = pool.checkout().expect("checkout");
    println!("   got {:?}", *conn);
    pool.checkin(&conn);
    println!("   idle: {}\n", pool.idle_count());

    // 2. Caller affinity: the same caller keeps getting the same connection
    println!("2. Caller affinity:");
    let scope = CallerScope::new();
    let caller = scope.id();
    let first = pool.acquire_for_caller(&caller).expect("acquire");
    let again = pool.acquire_for_caller(&caller).expect("acquire");
    println!("   same connection twice: {}", first == again);
    pool.release_for_caller(&caller);

    // 3. Scoped use releases automatically
    println!("3. Scoped:");
    pool.scoped(&caller, |conn| {
        println!("   using {:?}", **conn);
    })
    .expect("scoped");
    println!("   reservation left behind: {}\n", pool.has_reservation(&caller));

    pool.disconnect_all();
}
