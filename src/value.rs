//! Type-erased values held by the registry.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A materialized value, type-erased so one registry can hold constants of
/// any type.
///
/// Clone is cheap as the payload is wrapped by `Arc`.
#[derive(Clone)]
pub struct Value {
    data: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wrap a concrete value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            data: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Name of the concrete type stored in this value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if the stored value is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.data.is::<T>()
    }

    /// Get a shared handle to the stored value if it is a `T`.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.data.clone().downcast::<T>().ok()
    }

    /// Borrow the stored value if it is a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Borrow the stored value as `Any`.
    pub fn as_any(&self) -> &dyn Any {
        &*self.data
    }

    /// Returns true if both values share the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.type_name)
    }
}

/// Deferred computation bound to an entry.
///
/// This is `Fn` rather than `FnOnce`: a rejected candidate is discarded and
/// the producer runs again on the next read.
pub(crate) type Producer = Arc<dyn Fn() -> anyhow::Result<Value> + Send + Sync>;
