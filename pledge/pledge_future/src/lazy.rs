//! Memoized zero-argument computations.

use std::fmt;
use std::ops::Deref;

use log::debug;
use once_cell::sync::Lazy as OnceLazy;

type Init<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// A value computed on first access and cached afterwards.
///
/// Concurrent first accesses block until the single evaluation finishes, so
/// the computation runs at most once.
pub struct Lazy<T> {
    cell: OnceLazy<T, Init<T>>,
}

impl<T> Lazy<T> {
    /// Defer `computation` until the value is first needed.
    pub fn new<F>(computation: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let init: Init<T> = Box::new(move || {
            debug!("Evaluating lazy value");
            computation()
        });
        Self {
            cell: OnceLazy::new(init),
        }
    }

    /// The value, evaluating it on the first call.
    pub fn get(&self) -> &T {
        &self.cell
    }

    /// Whether the computation has already run.
    pub fn is_evaluated(&self) -> bool {
        OnceLazy::get(&self.cell).is_some()
    }
}

impl<T> Deref for Lazy<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match OnceLazy::get(&self.cell) {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.write_str("Lazy(<unevaluated>)"),
        }
    }
}
