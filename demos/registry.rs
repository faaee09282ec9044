//! Registry usage: multiple named pools, bulk release at request end

use pooled::{
    CallerScope, ConnectionFactory, ConnectionPool, FactoryError, PoolConfig, PoolRegistry,
};
use std::sync::Arc;

struct LabelFactory {
    label: &'static str,
}

impl ConnectionFactory for LabelFactory {
    type Connection = String;

    fn connect(&self) -> Result<String, FactoryError> {
        Ok(format!("{}-client", self.label))
    }

    fn disconnect(&self, _conn: &String) {}
}

fn main() {
    tracing_subscriber::fmt::init();

    println!("=== pooled - Registry ===\n");

    let registry = Arc::new(PoolRegistry::new());
    let db = Arc::new(ConnectionPool::new(
        LabelFactory { label: "db" },
        PoolConfig::default(),
    ));
    let cache = Arc::new(ConnectionPool::new(
        LabelFactory { label: "cache" },
        PoolConfig::default(),
    ));

    registry.register(db.clone(), Some("db")).expect("register db");
    registry
        .register(cache.clone(), Some("cache"))
        .expect("register cache");

    // A unit of work borrows from both pools under one caller identity.
    let scope = CallerScope::new();
    let caller = scope.id();
    let db_conn = db.acquire_for_caller(&caller).expect("db acquire");
    let cache_conn = cache.acquire_for_caller(&caller).expect("cache acquire");
    println!("borrowed: {} and {}", *db_conn, *cache_conn);

    // End-of-request hook: return everything this caller holds, everywhere.
    registry.release_all_for_caller(&caller);
    println!("db checked out: {}", db.checked_out_count());
    println!("cache checked out: {}", cache.checked_out_count());

    // Shutdown.
    registry.disconnect_all_pools();
    println!("db connected: {}", registry.is_connected("db"));
}
