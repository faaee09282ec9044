//! Core connection pool implementation

use crate::caller::CallerId;
use crate::config::PoolConfig;
use crate::errors::{FactoryError, PoolError, PoolResult};
use crate::factory::{ConnectionFactory, PreparationStep};
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// A borrowed reference to a pooled connection.
///
/// Handles compare equal when they refer to the same pooled connection. The
/// pool owns the connection's lifecycle; a handle is returned with
/// [`ConnectionPool::checkin`] (or [`ConnectionPool::release_for_caller`] for
/// reserved handles) and must never be torn down by the borrower.
pub struct ConnectionHandle<C> {
    id: u64,
    conn: Arc<C>,
}

impl<C> ConnectionHandle<C> {
    /// Pool-local identity of the underlying connection.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<C> Deref for ConnectionHandle<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<C> PartialEq for ConnectionHandle<C> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<C> Eq for ConnectionHandle<C> {}

impl<C> std::fmt::Debug for ConnectionHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

struct Entry<C> {
    id: u64,
    conn: Arc<C>,
}

struct Reservation {
    conn_id: u64,
    alive: Weak<()>,
}

struct PoolInner<C> {
    connections: Vec<Entry<C>>,
    checked_out: HashSet<u64>,
    reserved: HashMap<u64, Reservation>,
    preparations: Vec<PreparationStep<C>>,
    sealed: bool,
    next_conn_id: u64,
}

/// Thread-safe pool of lazily created backend connections.
///
/// The pool synchronizes concurrent access to a bounded set of connections:
/// each caller checks one out, uses it, and checks it back in. When every
/// connection is checked out, [`checkout`](Self::checkout) blocks until one
/// is returned or the configured acquire timeout elapses. Callers that keep a
/// per-context reservation (via [`acquire_for_caller`](Self::acquire_for_caller))
/// and then disappear without releasing are reclaimed lazily when some other
/// caller exhausts the pool and times out.
///
/// All bookkeeping lives under one mutex per pool, so two pools never block
/// each other.
///
/// # Examples
///
/// ```
/// use pooled::{ConnectionPool, PoolConfig, ConnectionFactory, FactoryError};
///
/// struct Ints;
/// impl ConnectionFactory for Ints {
///     type Connection = i32;
///     fn connect(&self) -> Result<i32, FactoryError> { Ok(42) }
///     fn disconnect(&self, _conn: &i32) {}
/// }
///
/// let pool = ConnectionPool::new(Ints, PoolConfig::default());
/// let conn = pool.checkout().unwrap();
/// assert_eq!(*conn, 42);
/// pool.checkin(&conn);
/// ```
pub struct ConnectionPool<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    inner: Mutex<PoolInner<F::Connection>>,
    released: Condvar,
    metrics: MetricsTracker,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Create a pool. No connections are opened until the first checkout.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        let config = PoolConfig {
            max_size: config.max_size.max(1),
            ..config
        };
        Self {
            factory,
            config,
            inner: Mutex::new(PoolInner {
                connections: Vec::new(),
                checked_out: HashSet::new(),
                reserved: HashMap::new(),
                preparations: Vec::new(),
                sealed: false,
                next_conn_id: 1,
            }),
            released: Condvar::new(),
            metrics: MetricsTracker::new(),
        }
    }

    /// Record a named post-connect setup call.
    ///
    /// Steps are replayed in registration order against each newly created
    /// connection, exactly once per connection. Recording is only possible
    /// before the pool has created its first connection; afterwards this
    /// fails with [`PoolError::PreparationSealed`].
    ///
    /// # Errors
    ///
    /// [`PoolError::PreparationSealed`] if a connection already exists.
    pub fn record_preparation<S, Op>(&self, name: S, op: Op) -> PoolResult<()>
    where
        S: Into<String>,
        Op: Fn(&F::Connection) -> Result<(), FactoryError> + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return Err(PoolError::PreparationSealed);
        }
        inner.preparations.push(PreparationStep {
            name: name.into(),
            run: Box::new(op),
        });
        Ok(())
    }

    /// Check out a connection, blocking until one is available.
    ///
    /// An existing free connection is preferred; below `max_size` a new one
    /// is created and prepared; otherwise the call waits for a checkin,
    /// bounded by the configured acquire timeout. A wait that elapses with
    /// the pool still fully checked out first reclaims reservations held by
    /// dead callers and retries; only if nothing could be reclaimed does the
    /// call fail.
    ///
    /// # Errors
    ///
    /// [`PoolError::AcquisitionTimeout`] when the timeout elapses with no
    /// capacity, [`PoolError::Factory`] when opening a connection fails.
    pub fn checkout(&self) -> PoolResult<ConnectionHandle<F::Connection>> {
        let mut inner = self.inner.lock();
        self.checkout_with(&mut inner)
    }

    /// Check out a connection without blocking.
    ///
    /// Returns `Ok(None)` when the pool is fully checked out.
    ///
    /// # Errors
    ///
    /// [`PoolError::Factory`] when opening a connection fails.
    pub fn try_checkout(&self) -> PoolResult<Option<ConnectionHandle<F::Connection>>> {
        let mut inner = self.inner.lock();
        if let Some(handle) = self.take_idle(&mut inner) {
            return Ok(Some(handle));
        }
        if inner.connections.len() < self.config.max_size {
            return self.open_connection(&mut inner).map(Some);
        }
        Ok(None)
    }

    /// Check out a connection from async code.
    ///
    /// Polls [`try_checkout`](Self::try_checkout) under the configured
    /// acquire timeout so the task never blocks a runtime worker thread.
    /// Dead callers' reservations are reclaimed once before reporting a
    /// timeout, mirroring the blocking slow path.
    ///
    /// # Errors
    ///
    /// Same as [`checkout`](Self::checkout).
    pub async fn checkout_async(&self) -> PoolResult<ConnectionHandle<F::Connection>> {
        match self.config.acquire_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.poll_checkout()).await {
                Ok(result) => result,
                Err(_) => {
                    if self.reclaim_stale() > 0 {
                        if let Some(handle) = self.try_checkout()? {
                            return Ok(handle);
                        }
                    }
                    self.metrics.acquisition_timeouts.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        ?timeout,
                        max_size = self.config.max_size,
                        "connection checkout timed out"
                    );
                    Err(PoolError::AcquisitionTimeout {
                        timeout,
                        max_size: self.config.max_size,
                    })
                }
            },
            None => self.poll_checkout().await,
        }
    }

    async fn poll_checkout(&self) -> PoolResult<ConnectionHandle<F::Connection>> {
        loop {
            if let Some(handle) = self.try_checkout()? {
                return Ok(handle);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Return a checked-out connection to the pool and wake one waiter.
    ///
    /// Tolerant: checking in a handle that is not currently checked out is a
    /// no-op. Never blocks. A handle obtained through
    /// [`acquire_for_caller`](Self::acquire_for_caller) should instead be
    /// returned with [`release_for_caller`](Self::release_for_caller) so the
    /// reservation is cleared with it.
    pub fn checkin(&self, handle: &ConnectionHandle<F::Connection>) {
        let mut inner = self.inner.lock();
        self.checkin_locked(&mut inner, handle.id);
    }

    /// Return the connection reserved for `caller`, checking it out first if
    /// the caller holds none yet.
    ///
    /// Repeated calls from the same caller yield the same connection until
    /// [`release_for_caller`](Self::release_for_caller) is called.
    ///
    /// # Errors
    ///
    /// Same as [`checkout`](Self::checkout).
    pub fn acquire_for_caller(&self, caller: &CallerId) -> PoolResult<ConnectionHandle<F::Connection>> {
        let mut inner = self.inner.lock();
        let reserved_conn = inner.reserved.get(&caller.key()).map(|r| r.conn_id);
        if let Some(conn_id) = reserved_conn {
            if let Some(entry) = inner.connections.iter().find(|e| e.id == conn_id) {
                return Ok(ConnectionHandle {
                    id: entry.id,
                    conn: Arc::clone(&entry.conn),
                });
            }
            // The reserved connection is no longer tracked (pool was
            // disconnected since); discard the stale mapping.
            inner.reserved.remove(&caller.key());
        }
        let handle = self.checkout_with(&mut inner)?;
        inner.reserved.insert(
            caller.key(),
            Reservation {
                conn_id: handle.id,
                alive: caller.liveness(),
            },
        );
        Ok(handle)
    }

    /// Drop `caller`'s reservation and check its connection back in.
    ///
    /// Returns `false` when the caller held nothing.
    pub fn release_for_caller(&self, caller: &CallerId) -> bool {
        let mut inner = self.inner.lock();
        match inner.reserved.remove(&caller.key()) {
            Some(reservation) => {
                self.checkin_locked(&mut inner, reservation.conn_id);
                true
            }
            None => false,
        }
    }

    /// True if `caller` currently holds a reserved connection.
    pub fn has_reservation(&self, caller: &CallerId) -> bool {
        self.inner.lock().reserved.contains_key(&caller.key())
    }

    /// Run `body` with `caller`'s connection.
    ///
    /// If the reservation was created by this call it is released on every
    /// exit path, including a panic in `body`. A reservation that already
    /// existed is left open for the caller's subsequent calls.
    ///
    /// # Errors
    ///
    /// Same as [`checkout`](Self::checkout).
    pub fn scoped<R>(
        &self,
        caller: &CallerId,
        body: impl FnOnce(&ConnectionHandle<F::Connection>) -> R,
    ) -> PoolResult<R> {
        let fresh = !self.has_reservation(caller);
        let handle = self.acquire_for_caller(caller)?;
        let guard = ScopedRelease {
            pool: self,
            caller,
            armed: fresh,
        };
        let out = body(&handle);
        drop(guard);
        Ok(out)
    }

    /// Check in every reservation whose caller is no longer live.
    ///
    /// Returns the number of connections reclaimed. Safe to call while other
    /// threads are checking connections in and out; checkout also invokes
    /// this on its slow path after a timed-out wait.
    pub fn reclaim_stale(&self) -> usize {
        let mut inner = self.inner.lock();
        self.reclaim_stale_locked(&mut inner)
    }

    /// True once the pool holds at least one connection.
    pub fn is_connected(&self) -> bool {
        !self.inner.lock().connections.is_empty()
    }

    /// Tear down every connection and empty the pool.
    ///
    /// Reservations are cleared wholesale; subsequent checkouts create fresh
    /// connections.
    pub fn disconnect_all(&self) {
        let mut inner = self.inner.lock();
        inner.reserved.clear();
        let drained: Vec<Entry<F::Connection>> = inner.connections.drain(..).collect();
        for entry in &drained {
            inner.checked_out.remove(&entry.id);
            self.factory.disconnect(&entry.conn);
        }
        if !drained.is_empty() {
            self.metrics
                .connections_closed
                .fetch_add(drained.len(), Ordering::Relaxed);
            tracing::debug!(count = drained.len(), "disconnected all pooled connections");
        }
        self.released.notify_all();
    }

    /// Reclaim stale reservations, then invoke the factory's teardown hook on
    /// every tracked connection without removing it.
    ///
    /// What teardown means for a still-tracked connection is backend-defined;
    /// adapters use it to force revalidation on next use.
    pub fn verify_active(&self) {
        let mut inner = self.inner.lock();
        self.reclaim_stale_locked(&mut inner);
        for entry in &inner.connections {
            self.factory.disconnect(&entry.conn);
        }
    }

    /// Number of connections the pool currently tracks.
    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Number of connections currently checked out.
    pub fn checked_out_count(&self) -> usize {
        self.inner.lock().checked_out.len()
    }

    /// Number of free connections.
    pub fn idle_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.connections.len() - inner.checked_out.len()
    }

    /// Configured maximum pool size.
    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let inner = self.inner.lock();
        let tracked = inner.connections.len();
        let checked_out = inner.checked_out.len();
        drop(inner);
        self.metrics
            .get_metrics(checked_out, tracked - checked_out, tracked, self.config.max_size)
    }

    /// Export metrics as a HashMap
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    fn checkout_with(
        &self,
        inner: &mut MutexGuard<'_, PoolInner<F::Connection>>,
    ) -> PoolResult<ConnectionHandle<F::Connection>> {
        let mut deadline_hit = false;
        loop {
            if let Some(handle) = self.take_idle(&mut **inner) {
                return Ok(handle);
            }
            if inner.connections.len() < self.config.max_size {
                return self.open_connection(&mut **inner);
            }
            if deadline_hit {
                deadline_hit = false;
                // The wait elapsed with the pool still full. Reclaiming dead
                // callers' reservations is the one self-healing step before
                // giving up.
                if self.reclaim_stale_locked(&mut **inner) == 0 {
                    if let Some(timeout) = self.config.acquire_timeout {
                        self.metrics.acquisition_timeouts.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            ?timeout,
                            max_size = self.config.max_size,
                            "connection checkout timed out"
                        );
                        return Err(PoolError::AcquisitionTimeout {
                            timeout,
                            max_size: self.config.max_size,
                        });
                    }
                }
                continue;
            }
            match self.config.acquire_timeout {
                Some(timeout) => {
                    if self.released.wait_for(inner, timeout).timed_out() {
                        deadline_hit = true;
                    }
                }
                None => self.released.wait(inner),
            }
        }
    }

    fn take_idle(&self, inner: &mut PoolInner<F::Connection>) -> Option<ConnectionHandle<F::Connection>> {
        let found = inner
            .connections
            .iter()
            .find(|entry| !inner.checked_out.contains(&entry.id))
            .map(|entry| (entry.id, Arc::clone(&entry.conn)));
        let (id, conn) = found?;
        inner.checked_out.insert(id);
        self.metrics.total_checkouts.fetch_add(1, Ordering::Relaxed);
        Some(ConnectionHandle { id, conn })
    }

    fn open_connection(
        &self,
        inner: &mut PoolInner<F::Connection>,
    ) -> PoolResult<ConnectionHandle<F::Connection>> {
        let raw = self.factory.connect().map_err(PoolError::Factory)?;
        inner.sealed = true;
        self.metrics.connections_opened.fetch_add(1, Ordering::Relaxed);
        for step in &inner.preparations {
            if let Err(err) = (step.run)(&raw) {
                tracing::warn!(step = %step.name, "preparation step failed, closing connection");
                self.factory.disconnect(&raw);
                self.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::Factory(err));
            }
        }
        let id = inner.next_conn_id;
        inner.next_conn_id += 1;
        let conn = Arc::new(raw);
        inner.connections.push(Entry {
            id,
            conn: Arc::clone(&conn),
        });
        inner.checked_out.insert(id);
        self.metrics.total_checkouts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(conn_id = id, "opened new pooled connection");
        Ok(ConnectionHandle { id, conn })
    }

    fn checkin_locked(&self, inner: &mut PoolInner<F::Connection>, conn_id: u64) {
        if inner.checked_out.remove(&conn_id) {
            self.metrics.total_checkins.fetch_add(1, Ordering::Relaxed);
        }
        self.released.notify_one();
    }

    fn reclaim_stale_locked(&self, inner: &mut PoolInner<F::Connection>) -> usize {
        let dead: Vec<u64> = inner
            .reserved
            .iter()
            .filter(|(_, reservation)| reservation.alive.strong_count() == 0)
            .map(|(key, _)| *key)
            .collect();
        let mut freed = 0;
        for key in dead {
            if let Some(reservation) = inner.reserved.remove(&key) {
                self.checkin_locked(inner, reservation.conn_id);
                freed += 1;
            }
        }
        if freed > 0 {
            self.metrics.stale_reclaimed.fetch_add(freed, Ordering::Relaxed);
            tracing::debug!(freed, "reclaimed reservations from dead callers");
        }
        freed
    }
}

struct ScopedRelease<'a, F: ConnectionFactory> {
    pool: &'a ConnectionPool<F>,
    caller: &'a CallerId,
    armed: bool,
}

impl<F: ConnectionFactory> Drop for ScopedRelease<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.release_for_caller(self.caller);
        }
    }
}
