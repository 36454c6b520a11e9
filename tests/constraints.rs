//! Tests for constraint registration and checking.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use laze::{Constraint, DefineOutcome, Laze, LazeError, ReadOutcome, Tracer};

#[test]
fn test_constraint_enforcement() {
    let laze = Laze::new();
    laze.add_constraint(Constraint::for_key::<i32, _>(
        "QUX must be an integer",
        "QUX",
        |_| true,
    ));

    laze.define("FOO", || "HELLO");
    laze.define("QUX", || 42);

    assert!(laze.defined("QUX"));
    assert_eq!(*laze.read::<i32>("QUX").unwrap(), 42);
    assert_eq!(*laze.read::<&str>("FOO").unwrap(), "HELLO");
}

#[test]
fn test_constraint_failure() {
    let laze = Laze::new();
    laze.constraint("Must be a string", |_, value| value.is::<String>());

    laze.define("QUUX", || 42);

    let err = laze.read::<i32>("QUUX").unwrap_err();
    match &err {
        LazeError::ConstraintViolation { constraint, name } => {
            assert_eq!(constraint, "Must be a string");
            assert_eq!(name, "QUUX");
        }
        other => panic!("expected ConstraintViolation, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "Constraint 'Must be a string' failed for lazy constant: QUUX"
    );
    assert!(!laze.evaluated("QUUX").unwrap());
}

#[test]
fn test_rejected_value_is_not_cached() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let allow = Arc::new(AtomicUsize::new(0));

    let laze = Laze::new();
    let gate = allow.clone();
    laze.constraint("gate", move |_, _| gate.load(Ordering::SeqCst) == 1);

    let counter = attempts.clone();
    laze.define("GATED", move || counter.fetch_add(1, Ordering::SeqCst));

    assert!(laze.read::<usize>("GATED").unwrap_err().is_constraint_violation());
    assert!(laze.read::<usize>("GATED").unwrap_err().is_constraint_violation());
    assert!(!laze.evaluated("GATED").unwrap());

    allow.store(1, Ordering::SeqCst);
    // Third invocation of the producer, first one to be accepted.
    assert_eq!(*laze.read::<usize>("GATED").unwrap(), 2);
    assert_eq!(*laze.read::<usize>("GATED").unwrap(), 2);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn test_first_failing_constraint_is_reported_in_order() {
    let checked = Arc::new(Mutex::new(Vec::new()));
    let laze = Laze::new();

    for (name, passes) in [("first", true), ("second", false), ("third", false)] {
        let checked = checked.clone();
        laze.constraint(name, move |_, _| {
            checked.lock().unwrap().push(name);
            passes
        });
    }

    laze.define("X", || 0);
    match laze.read::<i32>("X") {
        Err(LazeError::ConstraintViolation { constraint, .. }) => {
            assert_eq!(constraint, "second")
        }
        other => panic!("expected ConstraintViolation, got {other:?}"),
    }
    assert_eq!(*checked.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(laze.constraint_names(), vec!["first", "second", "third"]);
}

#[test]
fn test_constraints_are_not_retroactive() {
    let laze = Laze::new();
    laze.define("EARLY", || -1i64);
    assert_eq!(*laze.read::<i64>("EARLY").unwrap(), -1);

    laze.add_constraint(Constraint::of_type::<i64, _>("non-negative", |_, n| *n >= 0));

    // Already materialized: never re-checked.
    assert_eq!(*laze.read::<i64>("EARLY").unwrap(), -1);

    // Evaluated after registration: checked.
    laze.define("LATE", || -1i64);
    assert!(laze.read::<i64>("LATE").unwrap_err().is_constraint_violation());
}

#[test]
fn test_constraint_can_special_case_by_name() {
    let laze = Laze::new();
    laze.add_constraint(Constraint::for_key::<u16, _>("PORT above 1024", "PORT", |p| *p > 1024));

    laze.define("PORT", || 80u16);
    laze.define("OTHER_PORT", || 80u16);

    assert!(laze.read::<u16>("PORT").is_err());
    assert_eq!(*laze.read::<u16>("OTHER_PORT").unwrap(), 80);
}

#[test]
fn test_for_key_rejects_wrong_type() {
    let laze = Laze::new();
    laze.add_constraint(Constraint::for_key::<i32, _>(
        "QUX must be an integer",
        "QUX",
        |_| true,
    ));
    laze.define("QUX", || "forty-two");

    assert!(laze.read::<&str>("QUX").unwrap_err().is_constraint_violation());
}

#[test]
fn test_builder_constraints_run_first() {
    let laze = Laze::builder()
        .constraint(Constraint::new("from builder", |key, _| key != "A"))
        .build();
    laze.constraint("registered later", |_, _| false);

    match laze.read::<i32>("A") {
        Err(LazeError::UndefinedKey { .. }) => {}
        other => panic!("expected UndefinedKey, got {other:?}"),
    }

    laze.define("A", || 1);
    match laze.read::<i32>("A") {
        Err(LazeError::ConstraintViolation { constraint, .. }) => {
            assert_eq!(constraint, "from builder")
        }
        other => panic!("expected ConstraintViolation, got {other:?}"),
    }
}

#[test]
fn test_predicate_may_register_constraints() {
    let laze = Laze::new();
    let inner = laze.clone();
    laze.constraint("registers another", move |_, _| {
        inner.constraint("added during check", |_, _| true);
        true
    });

    laze.define("A", || 1);
    assert_eq!(*laze.read::<i32>("A").unwrap(), 1);
    assert_eq!(
        laze.constraint_names(),
        vec!["registers another", "added during check"]
    );
}

#[test]
fn test_panicking_predicate_leaves_entry_pending() {
    let laze = Laze::new();
    let armed = Arc::new(AtomicUsize::new(1));
    let trigger = armed.clone();
    laze.constraint("explodes once", move |_, _| {
        if trigger.swap(0, Ordering::SeqCst) == 1 {
            panic!("predicate exploded");
        }
        true
    });
    laze.define("A", || 1);

    let reader = laze.clone();
    assert!(std::thread::spawn(move || reader.read::<i32>("A")).join().is_err());
    assert!(!laze.evaluated("A").unwrap());

    assert_eq!(*laze.read::<i32>("A").unwrap(), 1);
}

// =============================================================================
// Tracer events
// =============================================================================

#[derive(Default)]
struct RecordingTracer {
    defines: Mutex<Vec<(String, DefineOutcome)>>,
    checks: Mutex<Vec<(String, String, bool)>>,
    reads: Mutex<Vec<(String, ReadOutcome)>>,
}

impl Tracer for RecordingTracer {
    fn on_define(&self, name: &str, outcome: DefineOutcome) {
        self.defines.lock().unwrap().push((name.to_string(), outcome));
    }

    fn on_constraint_check(&self, constraint: &str, name: &str, passed: bool) {
        self.checks
            .lock()
            .unwrap()
            .push((constraint.to_string(), name.to_string(), passed));
    }

    fn on_read(&self, name: &str, outcome: ReadOutcome) {
        self.reads.lock().unwrap().push((name.to_string(), outcome));
    }
}

#[derive(Default)]
struct RegistrationTracer {
    registered: Mutex<Vec<String>>,
}

impl Tracer for RegistrationTracer {
    fn on_constraint_registered(&self, constraint: &str) {
        self.registered.lock().unwrap().push(constraint.to_string());
    }
}

#[test]
fn test_builder_constraints_are_reported_to_tracer() {
    let tracer = Arc::new(RegistrationTracer::default());
    let laze = Laze::builder()
        .tracer(tracer.clone())
        .constraint(Constraint::new("from builder", |_, _| true))
        .build();
    laze.constraint("registered later", |_, _| true);

    assert_eq!(
        *tracer.registered.lock().unwrap(),
        vec!["from builder", "registered later"]
    );
}

#[test]
fn test_tracer_observes_lifecycle() {
    let tracer = Arc::new(RecordingTracer::default());
    let laze = Laze::builder().tracer(tracer.clone()).build();
    let allow = Arc::new(AtomicUsize::new(0));
    let gate = allow.clone();
    laze.constraint("gate", move |_, _| gate.load(Ordering::SeqCst) == 1);

    laze.define("A", || 1);
    laze.define("A", || 2);
    let _ = laze.read::<i32>("A");
    allow.store(1, Ordering::SeqCst);
    laze.read::<i32>("A").unwrap();
    laze.read::<i32>("A").unwrap();
    laze.define("A", || 3);
    let _ = laze.read::<i32>("MISSING");

    assert_eq!(
        *tracer.defines.lock().unwrap(),
        vec![
            ("A".to_string(), DefineOutcome::Inserted),
            ("A".to_string(), DefineOutcome::Replaced),
            ("A".to_string(), DefineOutcome::Ignored),
        ]
    );
    assert_eq!(
        *tracer.checks.lock().unwrap(),
        vec![
            ("gate".to_string(), "A".to_string(), false),
            ("gate".to_string(), "A".to_string(), true),
        ]
    );
    assert_eq!(
        *tracer.reads.lock().unwrap(),
        vec![
            (
                "A".to_string(),
                ReadOutcome::Rejected {
                    constraint: "gate".to_string()
                }
            ),
            ("A".to_string(), ReadOutcome::Materialized),
            ("A".to_string(), ReadOutcome::CacheHit),
            ("MISSING".to_string(), ReadOutcome::Undefined),
        ]
    );
}
