//! The registry and its builder.

use std::any::Any;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use papaya::HashMap;
use parking_lot::RwLock;

use crate::constraint::Constraint;
use crate::entry::{Entry, EntryState};
use crate::error::LazeError;
use crate::tracer::{DefineOutcome, NoopTracer, ReadOutcome, Tracer};
use crate::value::{Producer, Value};

/// Source of registry identities, so evaluation stacks of distinct registries
/// never mix.
static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

// Thread-local stack of entries being materialized, for cycle detection.
thread_local! {
    static EVALUATION_STACK: RefCell<Vec<(u64, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks `name` as being materialized on this thread until dropped.
///
/// Popping in `Drop` keeps the stack balanced when a producer or predicate
/// panics.
struct EvaluationFrame;

impl EvaluationFrame {
    fn push(registry: u64, name: &str) -> Self {
        EVALUATION_STACK.with(|stack| stack.borrow_mut().push((registry, name.to_string())));
        EvaluationFrame
    }
}

impl Drop for EvaluationFrame {
    fn drop(&mut self) {
        EVALUATION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn is_evaluating(registry: u64, name: &str) -> bool {
    EVALUATION_STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .any(|(id, evaluating)| *id == registry && evaluating == name)
    })
}

/// Names from the first evaluation of `name` up to the top of the stack,
/// followed by `name` again.
fn cycle_path(registry: u64, name: &str) -> Vec<String> {
    EVALUATION_STACK.with(|stack| {
        let stack = stack.borrow();
        let mut path: Vec<String> = stack
            .iter()
            .filter(|(id, _)| *id == registry)
            .map(|(_, evaluating)| evaluating.clone())
            .skip_while(|evaluating| evaluating != name)
            .collect();
        path.push(name.to_string());
        path
    })
}

/// How a successful read obtained its value.
enum Evaluation {
    /// Another thread materialized the entry while this one waited.
    Cached(Value),
    /// This call ran the producer and committed the value.
    Fresh(Value),
}

/// A registry of named, lazily evaluated, constraint-checked constants.
///
/// Each entry moves from *defined* to *evaluated* at most once: the producer
/// bound by [`define`](Self::define) runs on the first [`read`](Self::read),
/// its result is checked against every registered constraint, and only then
/// cached. Once cached, the value is immutable.
///
/// This is cheap to clone, and clones share the same entries and constraints.
///
/// # Example
///
/// ```
/// use laze::Laze;
///
/// let laze = Laze::new();
/// laze.define("FOO", || 42);
///
/// assert!(laze.defined("FOO"));
/// assert!(!laze.evaluated("FOO").unwrap());
/// assert_eq!(*laze.read::<i32>("FOO").unwrap(), 42);
/// assert!(laze.evaluated("FOO").unwrap());
/// ```
pub struct Laze {
    id: u64,
    entries: Arc<HashMap<String, Arc<Entry>, ahash::RandomState>>,
    constraints: Arc<RwLock<Vec<Constraint>>>,
    tracer: Arc<dyn Tracer>,
}

impl Default for Laze {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Laze {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            entries: self.entries.clone(),
            constraints: self.constraints.clone(),
            tracer: self.tracer.clone(),
        }
    }
}

impl std::fmt::Debug for Laze {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Laze")
            .field("entries", &self.names())
            .field("constraints", &self.constraint_names())
            .finish()
    }
}

impl Laze {
    /// Create an empty registry with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for customizing the registry.
    pub fn builder() -> LazeBuilder {
        LazeBuilder::new()
    }

    fn entry(&self, name: &str) -> Option<Arc<Entry>> {
        self.entries.pin().get(name).cloned()
    }

    /// Bind `name` to a deferred computation.
    ///
    /// If `name` is unknown, or known but not yet evaluated, the producer
    /// replaces any earlier one: the last definition before the first read
    /// wins. If `name` has already been evaluated this is a no-op.
    ///
    /// A definition racing with an in-flight evaluation of the same name
    /// waits for that evaluation to finish first.
    pub fn define<T, F>(&self, name: impl Into<String>, producer: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.define_producer(
            name.into(),
            Arc::new(move || Ok::<_, anyhow::Error>(Value::new(producer()))),
        );
    }

    /// Bind `name` to a fallible deferred computation.
    ///
    /// An error returned by the producer surfaces from [`read`](Self::read)
    /// as [`LazeError::Producer`] and leaves the entry unevaluated, so a later
    /// read runs the producer again.
    pub fn try_define<T, F>(&self, name: impl Into<String>, producer: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.define_producer(name.into(), Arc::new(move || producer().map(Value::new)));
    }

    fn define_producer(&self, name: String, producer: Producer) {
        let fresh = Arc::new(Entry::new(producer.clone()));
        let entry = self
            .entries
            .pin()
            .get_or_insert(name.clone(), fresh.clone())
            .clone();

        // Losing an insert race makes this call a redefinition.
        let outcome = if Arc::ptr_eq(&entry, &fresh) {
            DefineOutcome::Inserted
        } else {
            self.redefine(&name, &entry, producer)
        };

        match outcome {
            DefineOutcome::Ignored => tracing::debug!(
                name = name.as_str(),
                "ignoring redefinition of evaluated lazy constant"
            ),
            _ => tracing::debug!(name = name.as_str(), ?outcome, "defined lazy constant"),
        }
        self.tracer.on_define(&name, outcome);
    }

    fn redefine(&self, name: &str, entry: &Entry, producer: Producer) -> DefineOutcome {
        // A producer redefining its own entry already holds the evaluation
        // lock; waiting on it would deadlock.
        let _guard = if is_evaluating(self.id, name) {
            None
        } else {
            Some(entry.lock_evaluation())
        };

        if entry.replace_producer(producer) {
            DefineOutcome::Replaced
        } else {
            DefineOutcome::Ignored
        }
    }

    /// Returns true if `name` was ever defined, evaluated or not.
    ///
    /// This never runs a producer.
    pub fn defined(&self, name: &str) -> bool {
        self.entries.pin().contains_key(name)
    }

    /// Returns whether `name` has been materialized.
    ///
    /// Fails with [`LazeError::UndefinedKey`] if `name` was never defined.
    pub fn evaluated(&self, name: &str) -> Result<bool, LazeError> {
        self.entry(name)
            .map(|entry| entry.is_materialized())
            .ok_or_else(|| LazeError::undefined(name))
    }

    /// Read the value of `name` as a `T`, materializing it if needed.
    ///
    /// See [`read_value`](Self::read_value) for the evaluation rules. A value
    /// of another type fails with [`LazeError::TypeMismatch`] without
    /// affecting the entry.
    pub fn read<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, LazeError> {
        let value = self.read_value(name)?;
        value.downcast::<T>().ok_or_else(|| LazeError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
            actual: value.type_name(),
        })
    }

    /// Read the type-erased value of `name`, materializing it if needed.
    ///
    /// An evaluated entry returns its cached value without running anything.
    /// Otherwise the producer runs once and every constraint is checked in
    /// registration order; the first rejection fails with
    /// [`LazeError::ConstraintViolation`] and nothing is cached. Concurrent
    /// first reads of the same name run the producer once.
    ///
    /// A producer reading the entry its own thread is materializing fails
    /// with [`LazeError::Cycle`]. Cycles spanning threads are not detected:
    /// if thread 1 materializes `A`, whose producer reads `B`, while thread 2
    /// materializes `B`, whose producer reads `A`, both block forever.
    pub fn read_value(&self, name: &str) -> Result<Value, LazeError> {
        let Some(entry) = self.entry(name) else {
            self.tracer.on_read(name, ReadOutcome::Undefined);
            return Err(LazeError::undefined(name));
        };

        if let Some(value) = entry.value() {
            tracing::trace!(name, "lazy constant cache hit");
            self.tracer.on_read(name, ReadOutcome::CacheHit);
            return Ok(value);
        }

        if is_evaluating(self.id, name) {
            let path = cycle_path(self.id, name);
            tracing::warn!(?path, "cycle detected while evaluating lazy constant");
            self.tracer.on_read(name, ReadOutcome::Cycle);
            return Err(LazeError::Cycle { path });
        }

        let result = self.materialize(name, &entry);
        let outcome = match &result {
            Ok(Evaluation::Cached(_)) => ReadOutcome::CacheHit,
            Ok(Evaluation::Fresh(_)) => ReadOutcome::Materialized,
            Err(LazeError::ConstraintViolation { constraint, .. }) => ReadOutcome::Rejected {
                constraint: constraint.clone(),
            },
            Err(_) => ReadOutcome::Failed,
        };
        self.tracer.on_read(name, outcome);

        result.map(|evaluation| match evaluation {
            Evaluation::Cached(value) | Evaluation::Fresh(value) => value,
        })
    }

    fn materialize(&self, name: &str, entry: &Entry) -> Result<Evaluation, LazeError> {
        let _guard = entry.lock_evaluation();

        let producer = match entry.state() {
            EntryState::Materialized(value) => return Ok(Evaluation::Cached(value)),
            EntryState::Pending(producer) => producer,
        };

        let _frame = EvaluationFrame::push(self.id, name);
        self.tracer.on_materialize_start(name);
        tracing::debug!(name, "materializing lazy constant");

        let candidate = producer().map_err(|error| {
            tracing::warn!(name, %error, "lazy constant producer failed");
            LazeError::Producer {
                name: name.to_string(),
                error: Arc::new(error),
            }
        })?;

        // Snapshot so predicates may register constraints themselves.
        let constraints = self.constraints.read().clone();
        for constraint in &constraints {
            let passed = constraint.check(name, candidate.as_any());
            self.tracer.on_constraint_check(constraint.name(), name, passed);
            if !passed {
                tracing::warn!(
                    name,
                    constraint = constraint.name(),
                    "lazy constant rejected by constraint"
                );
                return Err(LazeError::ConstraintViolation {
                    constraint: constraint.name().to_string(),
                    name: name.to_string(),
                });
            }
        }

        Ok(Evaluation::Fresh(entry.materialize(candidate)))
    }

    /// Register a constraint from a name and a predicate over the entry name
    /// and the type-erased candidate value.
    ///
    /// Constraints run in registration order against every entry evaluated
    /// after this call. Entries already evaluated are never re-checked.
    pub fn constraint<F>(&self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&str, &dyn Any) -> bool + Send + Sync + 'static,
    {
        self.add_constraint(Constraint::new(name, predicate));
    }

    /// Register a prebuilt [`Constraint`].
    pub fn add_constraint(&self, constraint: Constraint) {
        tracing::debug!(constraint = constraint.name(), "registered lazy constant constraint");
        self.tracer.on_constraint_registered(constraint.name());
        self.constraints.write().push(constraint);
    }

    /// Names of all defined entries, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.pin().keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of all registered constraints, in evaluation order.
    pub fn constraint_names(&self) -> Vec<String> {
        self.constraints
            .read()
            .iter()
            .map(|constraint| constraint.name().to_string())
            .collect()
    }

    /// Number of defined entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry is defined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry and constraint.
    ///
    /// Intended for test teardown. Materialized values are otherwise
    /// permanent; an evaluation still in flight commits into an entry that is
    /// no longer reachable.
    pub fn clear(&self) {
        self.entries.pin().clear();
        self.constraints.write().clear();
        tracing::debug!("cleared lazy constant registry");
    }
}

#[test]
fn test_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<Laze>();
    assert_sync::<Laze>();
}

/// Builder for creating a [`Laze`] with custom settings.
///
/// # Example
///
/// ```
/// use laze::{Constraint, Laze, NoopTracer};
///
/// let laze = Laze::builder()
///     .tracer(NoopTracer)
///     .constraint(Constraint::of_type::<String, _>("no empty strings", |_, s| !s.is_empty()))
///     .build();
///
/// laze.define("EMPTY", String::new);
/// assert!(laze.read::<String>("EMPTY").is_err());
/// ```
pub struct LazeBuilder {
    tracer: Arc<dyn Tracer>,
    constraints: Vec<Constraint>,
}

impl Default for LazeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LazeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            tracer: Arc::new(NoopTracer),
            constraints: Vec::new(),
        }
    }

    /// Set the tracer notified of registry activity.
    ///
    /// Defaults to [`NoopTracer`].
    pub fn tracer(mut self, tracer: impl Tracer) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Register a constraint up front. Constraints keep the order in which
    /// they are added here, ahead of any registered later.
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Build the registry with the configured settings.
    pub fn build(self) -> Laze {
        for constraint in &self.constraints {
            tracing::debug!(constraint = constraint.name(), "registered lazy constant constraint");
            self.tracer.on_constraint_registered(constraint.name());
        }
        Laze {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            entries: Arc::new(HashMap::with_hasher(ahash::RandomState::new())),
            constraints: Arc::new(RwLock::new(self.constraints)),
            tracer: self.tracer,
        }
    }
}
