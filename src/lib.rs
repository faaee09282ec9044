//! # pooled
//!
//! Generic, thread-safe pool for expensive-to-create client connections
//! (database and cache clients), decoupled from any specific backend.
//!
//! ## Features
//!
//! - Bounded capacity with blocking, timeout-bound checkout
//! - Lazy connection creation through a backend [`ConnectionFactory`]
//! - One-time post-connect preparation pipeline per new connection
//! - Per-caller connection affinity via explicit identity tokens
//! - Lazy reclamation of connections held by dead callers
//! - Scoped acquisition that releases on every exit path
//! - Async checkout with timeout
//! - Process-wide registry of named pools with bulk release/disconnect
//! - Metrics with Prometheus exposition export
//!
//! ## Quick Start
//!
//! ```rust
//! use pooled::{ConnectionPool, PoolConfig, ConnectionFactory, FactoryError};
//!
//! struct ClientFactory;
//!
//! impl ConnectionFactory for ClientFactory {
//!     type Connection = String;
//!
//!     fn connect(&self) -> Result<String, FactoryError> {
//!         Ok(String::from("client"))
//!     }
//!
//!     fn disconnect(&self, _conn: &String) {}
//! }
//!
//! let pool = ConnectionPool::new(ClientFactory, PoolConfig::default());
//! let conn = pool.checkout().unwrap();
//! println!("Got: {}", *conn);
//! pool.checkin(&conn);
//! ```

mod caller;
mod config;
mod errors;
mod factory;
mod metrics;
mod pool;
mod registry;

pub use caller::{CallerId, CallerScope};
pub use config::PoolConfig;
pub use errors::{FactoryError, PoolError, PoolResult};
pub use factory::ConnectionFactory;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{ConnectionHandle, ConnectionPool};
pub use registry::{ManagedPool, PoolKey, PoolRegistry};
