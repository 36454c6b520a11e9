//! Tracer trait for observing registry activity.
//!
//! The registry always emits `tracing` events; a [`Tracer`] is for callers
//! that want structured hooks of their own (metrics, test assertions, access
//! logs). The default [`NoopTracer`] discards everything.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use laze::{Laze, ReadOutcome, Tracer};
//!
//! #[derive(Default)]
//! struct CountHits(AtomicUsize);
//!
//! impl Tracer for CountHits {
//!     fn on_read(&self, _name: &str, outcome: ReadOutcome) {
//!         if outcome == ReadOutcome::CacheHit {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//!
//! let tracer = Arc::new(CountHits::default());
//! let laze = Laze::builder().tracer(tracer.clone()).build();
//! laze.define("FOO", || 1);
//! laze.read::<i32>("FOO").unwrap();
//! laze.read::<i32>("FOO").unwrap();
//! assert_eq!(tracer.0.load(Ordering::Relaxed), 1);
//! ```

use std::sync::Arc;

/// What a call to `define` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefineOutcome {
    /// The name was not registered before.
    Inserted,
    /// The name was registered but unevaluated; its producer was swapped.
    Replaced,
    /// The name was already materialized; the call had no effect.
    Ignored,
}

/// How a call to `read` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Returned the cached value without running the producer.
    CacheHit,
    /// Ran the producer and cached its value.
    Materialized,
    /// A constraint rejected the candidate value.
    Rejected {
        /// Name of the rejecting constraint.
        constraint: String,
    },
    /// The producer returned an error.
    Failed,
    /// The name is not registered.
    Undefined,
    /// The read would have re-entered an evaluation in progress.
    Cycle,
}

/// Tracer trait for observing registry activity.
///
/// All methods have default empty implementations, so you only need to
/// override the events you're interested in.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` as the tracer may be called from
/// multiple threads concurrently. Tracers are called while the entry's
/// evaluation lock is held and must not read or define the entry they are
/// notified about.
pub trait Tracer: Send + Sync + 'static {
    /// Called after `define`.
    #[inline]
    fn on_define(&self, _name: &str, _outcome: DefineOutcome) {}

    /// Called after a constraint is appended, including those passed to
    /// [`LazeBuilder::constraint`](crate::LazeBuilder::constraint).
    #[inline]
    fn on_constraint_registered(&self, _constraint: &str) {}

    /// Called right before a producer is invoked.
    #[inline]
    fn on_materialize_start(&self, _name: &str) {}

    /// Called after each predicate runs against a candidate value.
    #[inline]
    fn on_constraint_check(&self, _constraint: &str, _name: &str, _passed: bool) {}

    /// Called when a `read` completes, successfully or not.
    #[inline]
    fn on_read(&self, _name: &str, _outcome: ReadOutcome) {}
}

impl<T: Tracer + ?Sized> Tracer for Arc<T> {
    fn on_define(&self, name: &str, outcome: DefineOutcome) {
        (**self).on_define(name, outcome)
    }

    fn on_constraint_registered(&self, constraint: &str) {
        (**self).on_constraint_registered(constraint)
    }

    fn on_materialize_start(&self, name: &str) {
        (**self).on_materialize_start(name)
    }

    fn on_constraint_check(&self, constraint: &str, name: &str, passed: bool) {
        (**self).on_constraint_check(constraint, name, passed)
    }

    fn on_read(&self, name: &str, outcome: ReadOutcome) {
        (**self).on_read(name, outcome)
    }
}

/// Zero-cost tracer that discards all events.
///
/// This is the default tracer for [`Laze`](crate::Laze).
pub struct NoopTracer;

impl Tracer for NoopTracer {}
