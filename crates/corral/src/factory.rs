//! The factory contract: how the pool creates, checks and disposes of the
//! objects it manages.

use crate::error::FactoryError;

/// Capability bundle the pool calls to manage object lifecycles.
///
/// The pool owns the *when*, the factory owns the *how*: `create` is invoked
/// when the pool needs a new object, `activate` immediately before an object
/// is handed to a borrower, `validate` wherever a `test_on_*` flag asks for
/// it, `passivate` when an object is returned to the idle set, and `destroy`
/// when an object leaves the pool for good.
///
/// All methods run outside every pool lock, so they may block. The pool does
/// not serialize factory calls; implementations must be thread-safe.
///
/// # Example
/// ```
/// use corral::{FactoryError, ObjectFactory};
///
/// struct ConnFactory {
///     dsn: String,
/// }
///
/// struct Conn {
///     #[allow(dead_code)]
///     dsn: String,
///     healthy: bool,
/// }
///
/// impl ObjectFactory<Conn> for ConnFactory {
///     fn create(&self) -> Result<Conn, FactoryError> {
///         Ok(Conn { dsn: self.dsn.clone(), healthy: true })
///     }
///
///     fn destroy(&self, conn: Conn) {
///         drop(conn);
///     }
///
///     fn validate(&self, conn: &mut Conn) -> bool {
///         conn.healthy
///     }
/// }
/// ```
pub trait ObjectFactory<T>: Send + Sync {
    /// Create a new object. Errors bubble to the borrower whose call
    /// triggered the creation.
    fn create(&self) -> Result<T, FactoryError>;

    /// Dispose of an object that is leaving the pool. Takes the object by
    /// value so implementations can tear it down completely.
    fn destroy(&self, object: T);

    /// Report whether the object is still fit for use. Called only when one
    /// of the `test_on_*` / `test_while_idle` flags requests it.
    fn validate(&self, object: &mut T) -> bool {
        let _ = object;
        true
    }

    /// Prepare an object for handing to a borrower.
    fn activate(&self, object: &mut T) -> Result<(), FactoryError> {
        let _ = object;
        Ok(())
    }

    /// Quiesce an object before it re-enters the idle set.
    fn passivate(&self, object: &mut T) -> Result<(), FactoryError> {
        let _ = object;
        Ok(())
    }
}

/// Plain constructor closures are factories with default lifecycle hooks:
/// infallible creation, drop-based destruction, always-valid objects.
impl<T, F> ObjectFactory<T> for F
where
    F: Fn() -> T + Send + Sync,
{
    fn create(&self) -> Result<T, FactoryError> {
        Ok(self())
    }

    fn destroy(&self, object: T) {
        drop(object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_factory_creates_and_drops() {
        let factory = || vec![0u8; 16];
        let buf = factory.create().unwrap();
        assert_eq!(buf.len(), 16);
        factory.destroy(buf);
    }

    #[test]
    fn default_hooks_are_permissive() {
        let factory = || 7_i32;
        let mut n = factory.create().unwrap();
        assert!(factory.validate(&mut n));
        assert!(factory.activate(&mut n).is_ok());
        assert!(factory.passivate(&mut n).is_ok());
    }
}
