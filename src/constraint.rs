//! Constraints checked against every entry at materialization time.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&str, &dyn Any) -> bool + Send + Sync>;

/// A named predicate run against each candidate value before it is cached.
///
/// Constraints are not attached to entries. Every registered constraint sees
/// every entry that materializes after registration, keyed by the entry name
/// so a predicate can special-case by name. A predicate should return `true`
/// for keys and values it does not care about.
///
/// Clone is cheap as the predicate is wrapped by `Arc`.
///
/// # Example
///
/// ```
/// use laze::{Constraint, Laze};
///
/// let laze = Laze::new();
/// laze.add_constraint(Constraint::new("Must be a string", |_key, value| {
///     value.is::<String>()
/// }));
/// laze.define("QUUX", || 42);
///
/// let err = laze.read::<i32>("QUUX").unwrap_err();
/// assert!(err.is_constraint_violation());
/// assert!(!laze.evaluated("QUUX").unwrap());
/// ```
#[derive(Clone)]
pub struct Constraint {
    name: String,
    predicate: Predicate,
}

impl Constraint {
    /// Create a constraint from a predicate over the entry name and the
    /// type-erased candidate value.
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str, &dyn Any) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Create a constraint that only checks the entry called `key`.
    ///
    /// Other entries pass. For `key` itself, a value that is not a `T` fails.
    pub fn for_key<T, F>(name: impl Into<String>, key: impl Into<String>, predicate: F) -> Self
    where
        T: 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let key = key.into();
        Self::new(name, move |name, value| {
            if name != key {
                return true;
            }
            value.downcast_ref::<T>().is_some_and(&predicate)
        })
    }

    /// Create a constraint that checks every value of type `T`.
    ///
    /// Values of other types pass.
    pub fn of_type<T, F>(name: impl Into<String>, predicate: F) -> Self
    where
        T: 'static,
        F: Fn(&str, &T) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |name, value| match value.downcast_ref::<T>() {
            Some(value) => predicate(name, value),
            None => true,
        })
    }

    /// The human-readable name, reported in constraint violations.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the predicate against a candidate value.
    pub fn check(&self, key: &str, value: &dyn Any) -> bool {
        (self.predicate)(key, value)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
