//! Error types for pool operations.

use std::time::Duration;

/// Boxed error produced by a factory operation.
///
/// Factories are external collaborators; the pool never inspects their
/// failures beyond logging and routing, so a boxed error is all it needs.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// No object could be served within the caller's wait budget, or the
    /// pool was exhausted and configured not to block.
    #[error("pool exhausted (waited {waited:?})")]
    Exhausted {
        /// How long the borrower waited before giving up.
        waited: Duration,
    },

    /// The pool has been closed.
    #[error("pool is closed")]
    Closed,

    /// An operation was attempted against an object in an incompatible
    /// lifecycle state.
    #[error("illegal object state: {0}")]
    IllegalState(&'static str),

    /// A blocked borrower was woken by `interrupt_take_waiters` (close or
    /// explicit interruption) before an object became available.
    #[error("wait interrupted")]
    Interrupted,

    /// The factory failed to create an object. Only the borrower whose call
    /// triggered the creation observes this; other factory failures become
    /// internal destroys.
    #[error("factory failed to create object")]
    Factory(#[source] FactoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_wait_budget() {
        let err = PoolError::Exhausted {
            waited: Duration::from_millis(500),
        };
        assert!(err.to_string().contains("500ms"));
    }

    #[test]
    fn factory_error_keeps_source() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::Other, "backend down");
        let err = PoolError::Factory(Box::new(io));
        assert!(err.source().unwrap().to_string().contains("backend down"));
    }
}
