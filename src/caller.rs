//! Explicit caller-identity tokens for connection affinity
//!
//! A pool caches one connection per caller. Rather than reading ambient
//! thread identity, callers carry an explicit token: the execution context
//! (thread, task, request) owns a [`CallerScope`] for its lifetime and passes
//! [`CallerId`]s derived from it into the pool. When the scope is dropped the
//! identity is dead and any reservation held under it becomes reclaimable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_CALLER_KEY: AtomicU64 = AtomicU64::new(1);

/// Liveness anchor for one execution context.
///
/// Keep this alive for as long as the context may use pooled connections.
///
/// # Examples
///
/// ```
/// use pooled::CallerScope;
///
/// let scope = CallerScope::new();
/// let id = scope.id();
/// assert!(id.is_live());
///
/// drop(scope);
/// assert!(!id.is_live());
/// ```
#[derive(Debug)]
pub struct CallerScope {
    key: u64,
    anchor: Arc<()>,
}

impl CallerScope {
    /// Create a scope with a process-unique key.
    pub fn new() -> Self {
        Self {
            key: NEXT_CALLER_KEY.fetch_add(1, Ordering::Relaxed),
            anchor: Arc::new(()),
        }
    }

    /// A token identifying this scope, cheap to clone and pass around.
    pub fn id(&self) -> CallerId {
        CallerId {
            key: self.key,
            alive: Arc::downgrade(&self.anchor),
        }
    }
}

impl Default for CallerScope {
    fn default() -> Self {
        Self::new()
    }
}

/// A caller-identity token derived from a [`CallerScope`].
#[derive(Debug, Clone)]
pub struct CallerId {
    key: u64,
    alive: Weak<()>,
}

impl CallerId {
    /// True while the originating scope has not been dropped.
    pub fn is_live(&self) -> bool {
        self.alive.strong_count() > 0
    }

    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    pub(crate) fn liveness(&self) -> Weak<()> {
        self.alive.clone()
    }
}

impl PartialEq for CallerId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CallerId {}

impl std::hash::Hash for CallerId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_get_distinct_keys() {
        let a = CallerScope::new();
        let b = CallerScope::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn ids_from_one_scope_are_equal() {
        let scope = CallerScope::new();
        assert_eq!(scope.id(), scope.id());
    }

    #[test]
    fn dropping_the_scope_kills_the_id() {
        let scope = CallerScope::new();
        let id = scope.id();
        let clone = id.clone();
        assert!(id.is_live());
        drop(scope);
        assert!(!id.is_live());
        assert!(!clone.is_live());
    }
}
