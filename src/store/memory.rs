use std::collections::HashMap;
use std::sync::Arc;

use crate::store::Store;
use crate::{directive, Error, Result};

/// A store that holds view sources in memory.
///
/// Sources are compiled when they are inserted.
///
/// # Examples
///
/// ```
/// use sabre::{Environment, MemoryStore};
///
/// let store = MemoryStore::new().with("hello", "Hello {{ name }}!");
/// let env = Environment::new(store);
/// let out = env.make("hello").with("name", "World").get()?;
/// assert_eq!(out, "Hello World!");
/// # Ok::<(), sabre::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    views: HashMap<String, Arc<str>>,
}

impl MemoryStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and add a view, replacing any view with the same name.
    pub fn insert(&mut self, name: impl Into<String>, source: &str) {
        let compiled = directive::compile(source);
        self.views.insert(name.into(), Arc::from(compiled));
    }

    /// Compile and add a view, returning the store.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, source: &str) -> Self {
        self.insert(name, source);
        self
    }
}

impl Store for MemoryStore {
    fn exists(&self, name: &str) -> bool {
        self.views.contains_key(name)
    }

    fn compiled(&self, name: &str) -> Result<Arc<str>> {
        self.views
            .get(name)
            .cloned()
            .ok_or_else(|| Error::view_not_found(name))
    }
}
