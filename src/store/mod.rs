//! Resolves view names to compiled fragments.

mod file;
mod memory;

use std::sync::Arc;

pub use crate::store::file::FileStore;
pub use crate::store::memory::MemoryStore;
use crate::Result;

/// A source of compiled views.
///
/// Implementations are responsible for running the directive compiler and
/// caching its output. The [`Environment`][crate::Environment] compiles the
/// returned fragment into a renderable program.
pub trait Store: Send + Sync {
    /// Returns whether a view with the given name exists.
    fn exists(&self, name: &str) -> bool;

    /// Returns the compiled fragment for the named view.
    ///
    /// Fails with [`ErrorKind::ViewNotFound`][crate::ErrorKind::ViewNotFound]
    /// if there is no such view.
    fn compiled(&self, name: &str) -> Result<Arc<str>>;
}
