//! Error types for registry operations.

use std::sync::Arc;

use thiserror::Error;

/// Errors returned by [`Laze`](crate::Laze) operations.
///
/// None of these errors leave partial state behind: an entry whose evaluation
/// failed stays unevaluated with its producer intact, so reading it again
/// re-runs the producer.
#[derive(Debug, Clone, Error)]
pub enum LazeError {
    /// The name was never passed to `define`.
    #[error("undefined lazy constant: {name}")]
    UndefinedKey {
        /// The name that was looked up.
        name: String,
    },

    /// A candidate value was rejected by a registered constraint.
    #[error("Constraint '{constraint}' failed for lazy constant: {name}")]
    ConstraintViolation {
        /// Name of the first constraint that rejected the value.
        constraint: String,
        /// Name of the entry being evaluated.
        name: String,
    },

    /// The entry holds a value of a different type than the one requested.
    ///
    /// This is a view error only; the entry itself is unaffected.
    #[error("lazy constant {name} has type {actual}, not {expected}")]
    TypeMismatch {
        /// Name of the entry.
        name: String,
        /// Type requested by the caller.
        expected: &'static str,
        /// Type actually stored.
        actual: &'static str,
    },

    /// A producer read, directly or transitively, the entry it is producing.
    #[error("cycle detected while evaluating lazy constants: {}", .path.join(" -> "))]
    Cycle {
        /// Entries on the evaluation stack, ending with the repeated name.
        path: Vec<String>,
    },

    /// A fallible producer returned an error.
    #[error("producer for lazy constant {name} failed: {error}")]
    Producer {
        /// Name of the entry being evaluated.
        name: String,
        /// The error returned by the producer.
        error: Arc<anyhow::Error>,
    },
}

impl LazeError {
    /// Returns `true` if this is an [`LazeError::UndefinedKey`].
    pub fn is_undefined(&self) -> bool {
        matches!(self, LazeError::UndefinedKey { .. })
    }

    /// Returns `true` if this is a [`LazeError::ConstraintViolation`].
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, LazeError::ConstraintViolation { .. })
    }

    /// Returns the producer error if this is a [`LazeError::Producer`].
    pub fn producer_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            LazeError::Producer { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Attempts to downcast a producer error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.producer_error().and_then(|e| e.downcast_ref::<E>())
    }

    pub(crate) fn undefined(name: &str) -> Self {
        LazeError::UndefinedKey {
            name: name.to_string(),
        }
    }
}
