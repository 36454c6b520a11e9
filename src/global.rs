//! Process-wide default registry.
//!
//! The free functions here forward to a single [`Laze`] created on first use.
//! Code that can pass a registry around should prefer its own instance; this
//! module exists for bootstrap code that wants constants reachable from
//! anywhere.

use std::any::Any;
use std::sync::{Arc, OnceLock};

use crate::error::LazeError;
use crate::registry::Laze;

static GLOBAL: OnceLock<Laze> = OnceLock::new();

/// The process-wide registry, created with default settings on first use.
pub fn global() -> &'static Laze {
    GLOBAL.get_or_init(Laze::new)
}

/// Install `laze` as the process-wide registry.
///
/// Must run before anything touches the default instance; otherwise the
/// registry is handed back in `Err`.
pub fn install(laze: Laze) -> Result<(), Laze> {
    GLOBAL.set(laze)
}

/// [`Laze::define`] on the process-wide registry.
pub fn define<T, F>(name: impl Into<String>, producer: F)
where
    T: Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    global().define(name, producer)
}

/// [`Laze::try_define`] on the process-wide registry.
pub fn try_define<T, F>(name: impl Into<String>, producer: F)
where
    T: Send + Sync + 'static,
    F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
{
    global().try_define(name, producer)
}

/// [`Laze::defined`] on the process-wide registry.
pub fn defined(name: &str) -> bool {
    global().defined(name)
}

/// [`Laze::evaluated`] on the process-wide registry.
pub fn evaluated(name: &str) -> Result<bool, LazeError> {
    global().evaluated(name)
}

/// [`Laze::read`] on the process-wide registry.
pub fn read<T: Send + Sync + 'static>(name: &str) -> Result<Arc<T>, LazeError> {
    global().read(name)
}

/// [`Laze::constraint`] on the process-wide registry.
pub fn constraint<F>(name: impl Into<String>, predicate: F)
where
    F: Fn(&str, &dyn Any) -> bool + Send + Sync + 'static,
{
    global().constraint(name, predicate)
}
