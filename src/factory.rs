//! The factory capability that backend adapters implement

use crate::errors::FactoryError;

/// Creates and tears down raw backend connections on behalf of a pool.
///
/// The pool exclusively owns connection lifecycle: it calls [`connect`] when
/// it needs a new connection and [`disconnect`] when tearing one down.
/// Callers only borrow handles and must never destroy a connection
/// themselves.
///
/// Errors from [`connect`] propagate to the checkout caller unchanged; the
/// pool does not retry. [`disconnect`] is best-effort, so adapters swallow or
/// log their own teardown failures.
///
/// [`connect`]: ConnectionFactory::connect
/// [`disconnect`]: ConnectionFactory::disconnect
///
/// # Examples
///
/// ```
/// use pooled::{ConnectionFactory, FactoryError};
///
/// struct ClientFactory {
///     url: String,
/// }
///
/// impl ConnectionFactory for ClientFactory {
///     type Connection = String;
///
///     fn connect(&self) -> Result<String, FactoryError> {
///         Ok(format!("client for {}", self.url))
///     }
///
///     fn disconnect(&self, _conn: &String) {}
/// }
/// ```
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The raw connection type produced by this factory.
    type Connection: Send + Sync + 'static;

    /// Open a new backend connection.
    fn connect(&self) -> Result<Self::Connection, FactoryError>;

    /// Tear down a connection. Best-effort.
    fn disconnect(&self, conn: &Self::Connection);
}

pub(crate) type PrepareFn<C> = Box<dyn Fn(&C) -> Result<(), FactoryError> + Send + Sync>;

/// A recorded post-connect setup call, replayed once per new connection.
pub(crate) struct PreparationStep<C> {
    pub name: String,
    pub run: PrepareFn<C>,
}

impl<C> std::fmt::Debug for PreparationStep<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparationStep")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
