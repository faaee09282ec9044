//! Pool configuration options

use std::time::Duration;

/// Configuration for connection pool behavior
///
/// # Examples
///
/// ```
/// use pooled::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new()
///     .with_max_size(10)
///     .with_acquire_timeout(Duration::from_secs(30));
///
/// assert_eq!(config.max_size, 10);
/// assert_eq!(config.acquire_timeout, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections the pool may hold
    pub max_size: usize,

    /// How long `checkout` may block waiting for a free connection.
    /// `None` means wait forever.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 5,
            acquire_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum pool size (clamped to at least 1)
    ///
    /// # Examples
    ///
    /// ```
    /// use pooled::PoolConfig;
    ///
    /// let config = PoolConfig::new().with_max_size(0);
    /// assert_eq!(config.max_size, 1);
    /// ```
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size.max(1);
        self
    }

    /// Set the acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Block indefinitely on checkout instead of timing out
    pub fn wait_forever(mut self) -> Self {
        self.acquire_timeout = None;
        self
    }
}
