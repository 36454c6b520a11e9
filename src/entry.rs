use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::value::{Producer, Value};

/// State of a single entry.
///
/// `Materialized` is absorbing: nothing transitions out of it.
#[derive(Clone)]
pub(crate) enum EntryState {
    /// The producer has not run successfully yet.
    Pending(Producer),
    /// The producer ran and every constraint accepted its result.
    Materialized(Value),
}

impl std::fmt::Debug for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryState::Pending(_) => write!(f, "Pending"),
            EntryState::Materialized(value) => write!(f, "Materialized({:?})", value),
        }
    }
}

/// A named slot in the registry.
///
/// `state` is only write-locked for the two transitions (producer swap and
/// materialization), so readers of a materialized entry never wait on a
/// producer. `evaluation` serializes materialization and redefinition of the
/// same name.
pub(crate) struct Entry {
    state: RwLock<EntryState>,
    evaluation: Mutex<()>,
}

impl Entry {
    pub fn new(producer: Producer) -> Self {
        Self {
            state: RwLock::new(EntryState::Pending(producer)),
            evaluation: Mutex::new(()),
        }
    }

    /// The cached value, if materialized.
    pub fn value(&self) -> Option<Value> {
        match &*self.state.read() {
            EntryState::Materialized(value) => Some(value.clone()),
            EntryState::Pending(_) => None,
        }
    }

    pub fn is_materialized(&self) -> bool {
        matches!(&*self.state.read(), EntryState::Materialized(_))
    }

    pub fn state(&self) -> EntryState {
        self.state.read().clone()
    }

    /// Swap the pending producer. Returns false if the entry is already
    /// materialized, in which case nothing changes.
    pub fn replace_producer(&self, producer: Producer) -> bool {
        let mut state = self.state.write();
        match &mut *state {
            EntryState::Pending(current) => {
                *current = producer;
                true
            }
            EntryState::Materialized(_) => false,
        }
    }

    /// Commit a value. Returns the value that ends up cached, which is the
    /// earlier one if the entry was already materialized.
    pub fn materialize(&self, value: Value) -> Value {
        let mut state = self.state.write();
        if let EntryState::Materialized(existing) = &*state {
            return existing.clone();
        }
        *state = EntryState::Materialized(value.clone());
        value
    }

    pub fn lock_evaluation(&self) -> MutexGuard<'_, ()> {
        self.evaluation.lock()
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("state", &*self.state.read())
            .finish()
    }
}
