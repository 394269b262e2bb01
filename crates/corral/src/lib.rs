//! # Corral
//!
//! A bounded, concurrent object pool for heavy-to-construct values:
//! database connections, session handles, expensive parsers, anything a
//! user-supplied [`ObjectFactory`] knows how to create, validate, activate,
//! passivate and destroy.
//!
//! The pool lends objects out as RAII [`Pooled`] guards, reclaims them on
//! drop, enforces total-population and idle-set bounds under contention, and
//! runs a shared background evictor that ages out stale idle objects and
//! keeps a configured idle floor topped up.
//!
//! ```
//! use corral::{Pool, PoolConfig};
//!
//! let pool = Pool::with_config(
//!     PoolConfig::default().with_max_total(Some(2)),
//!     || Vec::<u8>::with_capacity(4096),
//! );
//!
//! let mut buf = pool.borrow().unwrap();
//! buf.extend_from_slice(b"reused allocation");
//! drop(buf);
//!
//! assert_eq!(pool.num_idle(), 1);
//! pool.close();
//! ```
//!
//! The building blocks are exported too: [`BlockingDeque`] (the blocking
//! dual-ended queue backing the idle set), [`PooledObject`] (the per-object
//! state machine) and the [`EvictionPolicy`] trait with its name registry.

// The deque nodes and the wrapper payload live in interior cells whose
// access is serialized by the deque mutex and the wrapper state machine.
#![allow(unsafe_code)]

mod config;
mod deque;
mod error;
mod evictor;
mod factory;
mod metrics;
mod object;
mod policy;
mod pool;

pub use config::{NumTests, PoolConfig, SwallowedErrorListener};
pub use deque::{BlockingDeque, Cursor, Interrupted, Iter};
pub use error::{FactoryError, PoolError, PoolResult};
pub use factory::ObjectFactory;
pub use metrics::PoolMetricsSnapshot;
pub use object::{PooledObject, PooledState};
pub use policy::{
    DefaultEvictionPolicy, EvictionCandidate, EvictionConfig, EvictionPolicy,
    DEFAULT_POLICY_NAME, eviction_policy, register_eviction_policy,
};
pub use pool::{Pool, Pooled};
