#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod constraint;
mod entry;
mod error;
pub mod global;
mod registry;
pub mod tracer;
mod value;

pub use constraint::Constraint;
pub use error::LazeError;
pub use global::{constraint, define, defined, evaluated, read, try_define};
pub use registry::{Laze, LazeBuilder};
pub use tracer::{DefineOutcome, NoopTracer, ReadOutcome, Tracer};
pub use value::Value;

/// Version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of this library, as a semantic-version string.
pub fn version() -> &'static str {
    VERSION
}
