//! Error types for the connection pool

use crate::registry::PoolKey;
use std::time::Duration;
use thiserror::Error;

/// Opaque error produced by a [`ConnectionFactory`](crate::ConnectionFactory).
///
/// The pool neither interprets nor retries factory errors; they pass through
/// to the caller unchanged inside [`PoolError::Factory`].
pub type FactoryError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool stayed fully checked out for the whole acquire timeout and
    /// no stale reservations could be reclaimed.
    #[error(
        "could not obtain a pooled connection within {timeout:?}; \
         the max pool size is currently {max_size}, consider increasing it"
    )]
    AcquisitionTimeout { timeout: Duration, max_size: usize },

    /// A pool with this key is already registered.
    #[error("a pool with key {0:?} is already registered")]
    DuplicateName(PoolKey),

    /// Preparation steps can only be recorded before the pool opens its
    /// first connection.
    #[error("preparation steps cannot be recorded once a connection has been created")]
    PreparationSealed,

    /// The connection factory failed; the source error is the backend's own.
    #[error("connection factory error")]
    Factory(#[source] FactoryError),
}

pub type PoolResult<T> = Result<T, PoolError>;
