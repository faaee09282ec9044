//! Process-wide directory of named connection pools
//!
//! Request-lifecycle glue (end-of-request hooks, shutdown paths) operates on
//! the registry rather than on individual pools: it returns everything one
//! caller borrowed across all pools, drains every pool at shutdown, or forces
//! revalidation everywhere. The registry is created explicitly at startup and
//! shared by `Arc`; there is no ambient global.

use crate::caller::CallerId;
use crate::errors::{PoolError, PoolResult};
use crate::factory::ConnectionFactory;
use crate::pool::ConnectionPool;

use dashmap::DashMap;
use std::sync::Arc;

/// The pool operations the registry needs, independent of the connection
/// type. Every [`ConnectionPool`] implements this.
pub trait ManagedPool: Send + Sync {
    /// Release the connection reserved for `caller`, if any.
    fn release_for_caller(&self, caller: &CallerId);

    /// Tear down every connection and empty the pool.
    fn disconnect_all(&self);

    /// Force backend revalidation of every tracked connection.
    fn verify_active(&self);

    /// True once the pool holds at least one connection.
    fn is_connected(&self) -> bool;
}

impl<F: ConnectionFactory> ManagedPool for ConnectionPool<F> {
    fn release_for_caller(&self, caller: &CallerId) {
        ConnectionPool::release_for_caller(self, caller);
    }

    fn disconnect_all(&self) {
        ConnectionPool::disconnect_all(self);
    }

    fn verify_active(&self) {
        ConnectionPool::verify_active(self);
    }

    fn is_connected(&self) -> bool {
        ConnectionPool::is_connected(self)
    }
}

/// Registry key: an explicit name, or the pool's own identity when
/// registered anonymously.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    Named(String),
    Anonymous(usize),
}

/// A directory of named [`ConnectionPool`]s with bulk release, disconnect,
/// and verify operations.
///
/// # Examples
///
/// ```
/// use pooled::{ConnectionPool, PoolConfig, PoolRegistry, ConnectionFactory, FactoryError};
/// use std::sync::Arc;
///
/// struct Ints;
/// impl ConnectionFactory for Ints {
///     type Connection = i32;
///     fn connect(&self) -> Result<i32, FactoryError> { Ok(1) }
///     fn disconnect(&self, _conn: &i32) {}
/// }
///
/// let registry = PoolRegistry::new();
/// let pool = Arc::new(ConnectionPool::new(Ints, PoolConfig::default()));
/// registry.register(pool.clone(), Some("main")).unwrap();
///
/// assert!(!registry.is_connected("main"));
/// let conn = pool.checkout().unwrap();
/// assert!(registry.is_connected("main"));
/// # pool.checkin(&conn);
/// ```
pub struct PoolRegistry {
    pools: DashMap<PoolKey, Arc<dyn ManagedPool>>,
}

impl PoolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Register a pool under `name`, or anonymously (keyed by pool identity)
    /// when `name` is `None`. Returns the key for later lookup/removal.
    ///
    /// # Errors
    ///
    /// [`PoolError::DuplicateName`] if the key is already taken.
    pub fn register(
        &self,
        pool: Arc<dyn ManagedPool>,
        name: Option<&str>,
    ) -> PoolResult<PoolKey> {
        let key = match name {
            Some(name) => PoolKey::Named(name.to_string()),
            None => PoolKey::Anonymous(Arc::as_ptr(&pool) as *const () as usize),
        };
        match self.pools.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(PoolError::DuplicateName(key)),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(pool);
                Ok(key)
            }
        }
    }

    /// Return every connection `caller` has reserved, in every pool.
    ///
    /// Pools where the caller holds nothing are untouched.
    pub fn release_all_for_caller(&self, caller: &CallerId) {
        for entry in self.pools.iter() {
            entry.value().release_for_caller(caller);
        }
    }

    /// Disconnect every registered pool.
    pub fn disconnect_all_pools(&self) {
        for entry in self.pools.iter() {
            entry.value().disconnect_all();
        }
    }

    /// Force revalidation in every registered pool.
    pub fn verify_all_pools(&self) {
        for entry in self.pools.iter() {
            entry.value().verify_active();
        }
    }

    /// True if a pool is registered under `name` and holds connections.
    /// False when the name is unknown.
    pub fn is_connected(&self, name: &str) -> bool {
        self.pools
            .get(&PoolKey::Named(name.to_string()))
            .is_some_and(|pool| pool.is_connected())
    }

    /// Look up a pool by key.
    pub fn get(&self, key: &PoolKey) -> Option<Arc<dyn ManagedPool>> {
        self.pools.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove and disconnect the pool under `key`, returning it if present.
    pub fn remove(&self, key: &PoolKey) -> Option<Arc<dyn ManagedPool>> {
        let (_, pool) = self.pools.remove(key)?;
        pool.disconnect_all();
        tracing::debug!(?key, "removed pool from registry");
        Some(pool)
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// True when no pools are registered.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.pools.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::CallerScope;
    use crate::config::PoolConfig;
    use crate::errors::FactoryError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct CountingFactory {
        disconnects: Arc<AtomicUsize>,
    }

    impl ConnectionFactory for CountingFactory {
        type Connection = u32;

        fn connect(&self) -> Result<u32, FactoryError> {
            Ok(0)
        }

        fn disconnect(&self, _conn: &u32) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_pool() -> Arc<ConnectionPool<CountingFactory>> {
        Arc::new(ConnectionPool::new(
            CountingFactory::default(),
            PoolConfig::new()
                .with_max_size(2)
                .with_acquire_timeout(Duration::from_millis(100)),
        ))
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = PoolRegistry::new();
        registry.register(test_pool(), Some("main")).unwrap();

        match registry.register(test_pool(), Some("main")) {
            Err(PoolError::DuplicateName(PoolKey::Named(name))) => assert_eq!(name, "main"),
            other => panic!("expected duplicate name error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn anonymous_pools_are_keyed_by_identity() {
        let registry = PoolRegistry::new();
        let a = registry.register(test_pool(), None).unwrap();
        let b = registry.register(test_pool(), None).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn release_all_returns_reservations_in_every_pool() {
        let registry = PoolRegistry::new();
        let cache = test_pool();
        let db = test_pool();
        registry.register(cache.clone(), Some("cache")).unwrap();
        registry.register(db.clone(), Some("db")).unwrap();

        let scope = CallerScope::new();
        let caller = scope.id();
        cache.acquire_for_caller(&caller).unwrap();
        db.acquire_for_caller(&caller).unwrap();
        assert_eq!(cache.checked_out_count(), 1);
        assert_eq!(db.checked_out_count(), 1);

        registry.release_all_for_caller(&caller);
        assert_eq!(cache.checked_out_count(), 0);
        assert_eq!(db.checked_out_count(), 0);

        // A second pass is a no-op everywhere.
        registry.release_all_for_caller(&caller);
        assert_eq!(cache.connection_count(), 1);
        assert_eq!(db.connection_count(), 1);
    }

    #[test]
    fn disconnect_all_pools_drains_everything() {
        let registry = PoolRegistry::new();
        let pool = test_pool();
        registry.register(pool.clone(), Some("main")).unwrap();
        let conn = pool.checkout().unwrap();
        pool.checkin(&conn);

        registry.disconnect_all_pools();
        assert!(!pool.is_connected());
        assert!(!registry.is_connected("main"));
    }

    #[test]
    fn is_connected_is_false_for_unknown_names() {
        let registry = PoolRegistry::new();
        assert!(!registry.is_connected("nope"));
    }

    #[test]
    fn remove_disconnects_and_returns_the_pool() {
        let registry = PoolRegistry::new();
        let disconnects = Arc::new(AtomicUsize::new(0));
        let factory = CountingFactory {
            disconnects: Arc::clone(&disconnects),
        };
        let pool = Arc::new(ConnectionPool::new(
            factory,
            PoolConfig::new().with_max_size(2),
        ));
        let key = registry.register(pool.clone(), Some("main")).unwrap();
        let conn = pool.checkout().unwrap();
        pool.checkin(&conn);

        let removed = registry.remove(&key);
        assert!(removed.is_some());
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
        assert!(registry.remove(&key).is_none());
    }

    #[test]
    fn verify_all_pools_probes_each_connection() {
        let registry = PoolRegistry::new();
        let pool = test_pool();
        registry.register(pool.clone(), Some("main")).unwrap();
        let conn = pool.checkout().unwrap();
        pool.checkin(&conn);

        registry.verify_all_pools();
        assert_eq!(pool.connection_count(), 1);
    }
}
