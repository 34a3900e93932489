use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use crate::store::Store;
use crate::{directive, Error, Result};

/// The prefix for view names that are literal file paths.
const PATH_PREFIX: &str = "path: ";

/// The separator between a namespace and a view name.
const NAMESPACE_SEP: &str = "::";

/// A store that loads views from the file system and caches the compiled
/// fragments on disk.
///
/// View names are resolved as follows:
/// - `path: some/file.html` is used as a literal file path.
/// - `ns::users.show` is looked up in the directory registered for `ns` with
///   [`add_namespace`][FileStore::add_namespace].
/// - `users.show` is looked up in the views directory.
///
/// In the latter two cases dots are replaced with path separators and the
/// extension is appended, so `users.show` becomes `users/show.sabre.html`.
///
/// A view is recompiled when its cache file is missing or the source file
/// was modified at the same time as or after the cache file.
#[derive(Debug)]
pub struct FileStore {
    views_dir: PathBuf,
    cache_dir: PathBuf,
    extension: String,
    namespaces: HashMap<String, PathBuf>,
}

impl FileStore {
    /// Construct a new store with the given views and cache directories.
    pub fn new(views_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            views_dir: views_dir.into(),
            cache_dir: cache_dir.into(),
            extension: String::from(".sabre.html"),
            namespaces: HashMap::new(),
        }
    }

    /// Set the extension appended to view names, including any leading dot.
    ///
    /// Defaults to `.sabre.html`.
    #[must_use]
    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = ext.into();
        self
    }

    /// Register a directory for views named `name::view`.
    pub fn add_namespace(&mut self, name: impl Into<String>, dir: impl Into<PathBuf>) {
        self.namespaces.insert(name.into(), dir.into());
    }

    /// Returns the file path for a view name.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if let Some(path) = name.strip_prefix(PATH_PREFIX) {
            return Ok(PathBuf::from(path));
        }
        let (dir, view) = match name.split_once(NAMESPACE_SEP) {
            Some((ns, view)) => match self.namespaces.get(ns) {
                Some(dir) => (dir, view),
                None => return Err(Error::view_not_found(name)),
            },
            None => (&self.views_dir, name),
        };
        let mut file = view.replace('.', "/");
        file.push_str(&self.extension);
        Ok(dir.join(file))
    }

    /// Returns the cache file for a resolved view path.
    fn cache_path(&self, path: &Path) -> PathBuf {
        let digest = Sha256::digest(path.to_string_lossy().as_bytes());
        self.cache_dir.join(format!("{digest:x}"))
    }
}

impl Store for FileStore {
    fn exists(&self, name: &str) -> bool {
        self.resolve(name).map(|path| path.is_file()).unwrap_or(false)
    }

    fn compiled(&self, name: &str) -> Result<Arc<str>> {
        let path = self.resolve(name)?;
        let modified = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.modified()?,
            Ok(_) => return Err(Error::view_not_found(name)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::view_not_found(name));
            }
            Err(err) => return Err(err.into()),
        };

        let cache = self.cache_path(&path);
        if is_fresh(&cache, modified) {
            tracing::trace!(view = name, cache = %cache.display(), "using cached view");
            let compiled = fs::read_to_string(&cache)?;
            return Ok(Arc::from(compiled));
        }

        tracing::debug!(view = name, path = %path.display(), "compiling view");
        let source = fs::read_to_string(&path)?;
        let compiled = directive::compile(&source);
        fs::create_dir_all(&self.cache_dir)?;
        fs::write(&cache, &compiled)?;
        Ok(Arc::from(compiled))
    }
}

/// Returns whether the cache file exists and is newer than the source.
fn is_fresh(cache: &Path, source_modified: SystemTime) -> bool {
    match fs::metadata(cache).and_then(|meta| meta.modified()) {
        Ok(cache_modified) => source_modified < cache_modified,
        Err(_) => false,
    }
}
