//! A directive template engine with layout inheritance and sections.
//!
//! # Features
//!
//! ### Syntax
//!
//! - Echos: `{{ user.name }}`
//! - Comments: `{{-- not rendered --}}`
//! - Conditionals: `@if (user.admin) ... @elseif (x) ... @else ... @endif`,
//!   `@unless (user.admin) ... @endunless`
//! - Loops: `@foreach (users as user) ... @endforeach`, `@for (...)`,
//!   `@while (...)`
//! - Layouts: `@extends('layout')`, `@section('title') ... @stop`,
//!   `@yield('title')`, `@show`
//! - Nested views: `@include('header')`, `@each('row', rows, 'row')`
//!
//! ### Environment
//!
//! - Views are loaded from the file system with on-disk caching of the
//!   compiled fragments, or from memory
//! - Shared data, view composers and custom host functions
//! - Render using any [`serde`] serializable values
//! - Convenient macro for constructing view data:
//!   `sabre::value!{ name: "John", age: 42 }`
//!
//! # Getting started
//!
//! A view is compiled in two steps. First the directive compiler rewrites the
//! directives into a *fragment*, text interleaved with `<% ... %>` code tags.
//!
//! ```
//! let fragment = sabre::compile("Hello {{ user.name }}!");
//! assert_eq!(fragment, "Hello <% echo user.name; %>!");
//! ```
//!
//! Then the renderer executes the fragment. Your entry point for this is the
//! [`Environment`] struct, constructed with a [`Store`] that holds the views.
//!
//! ```
//! use sabre::{Environment, MemoryStore};
//!
//! let store = MemoryStore::new().with("hello", "Hello {{ user.name }}!");
//! let env = Environment::new(store);
//!
//! let result = env
//!     .make("hello")
//!     .with("user", sabre::value! { name: "John Smith" })
//!     .get()?;
//! assert_eq!(result, "Hello John Smith!");
//! # Ok::<(), sabre::Error>(())
//! ```
//!
//! # Examples
//!
//! ### Layouts
//!
//! A view that starts with `@extends` is rendered first, capturing its
//! sections, after which the parent view renders and yields them.
//!
//! ```
//! use sabre::{Environment, MemoryStore};
//!
//! let store = MemoryStore::new()
//!     .with("layout", "<title>@yield('title')</title>\n@yield('body')")
//!     .with("page", "@extends('layout')\n@section('title', 'Home')\n@section('body')Hi {{ name }}@stop\n");
//!
//! let result = Environment::new(store).render("page", sabre::value! { name: "John" })?;
//! assert_eq!(result, "\n\n<title>Home</title>\nHi John");
//! # Ok::<(), sabre::Error>(())
//! ```
//!
//! ### Render using structured data
//!
//! ```
//! #[derive(serde::Serialize)]
//! struct Context { user: User }
//!
//! #[derive(serde::Serialize)]
//! struct User { name: String }
//!
//! let ctx = Context { user: User { name: "John Smith".into() } };
//!
//! let store = sabre::MemoryStore::new().with("hello", "Hello {{ user.name }}");
//! let result = sabre::Environment::new(store).render("hello", &ctx)?;
//!
//! assert_eq!(result, "Hello John Smith");
//! # Ok::<(), sabre::Error>(())
//! ```
//!
//! ### Add a custom function
//!
//! ```
//! use sabre::{Environment, MemoryStore};
//!
//! let store = MemoryStore::new().with("hello", "Hello {{ shout(name) }}");
//! let mut env = Environment::new(store);
//! env.add_function("shout", |s: String| format!("{}!", s.to_uppercase()));
//!
//! let result = env.make("hello").with("name", "world").get()?;
//! assert_eq!(result, "Hello WORLD!");
//! # Ok::<(), sabre::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod directive;
mod error;
mod fragment;
mod functions;
mod macros;
mod render;
mod sections;
mod store;
mod types;
mod value;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

pub use crate::directive::{compile, Compiler, Pass};
pub use crate::error::{Error, ErrorKind};
pub use crate::functions::Function;
pub use crate::sections::Sections;
pub use crate::store::{FileStore, MemoryStore, Store};
#[cfg(feature = "serde")]
pub use crate::value::to_value;
pub use crate::value::{List, Map, Value};

use crate::functions::{FunctionArgs, FunctionFn, FunctionReturn};
use crate::types::program::Program;

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The prefix of an `empty` argument to `show_each` that is output verbatim.
const RAW_PREFIX: &str = "raw|";

/// A view composer, called with the view name and data before the view is
/// rendered.
type ComposerFn = dyn Fn(&str, &mut Map<String, Value>) + Send + Sync + 'static;

/// The view environment.
///
/// The environment holds the view store, data shared with every view, host
/// functions, view composers and the compiled programs. Generally, you only
/// need to construct one environment during the lifetime of a program. It is
/// configured through `&mut self` methods and can then be shared across
/// threads for concurrent renders.
pub struct Environment {
    store: Box<dyn Store>,
    shared: Map<String, Value>,
    functions: BTreeMap<String, Box<FunctionFn>>,
    composers: Vec<(String, Box<ComposerFn>)>,
    programs: Mutex<HashMap<String, Arc<Program>>>,
    max_include_depth: usize,
}

/// A view that is ready to be rendered.
///
/// This struct is created by [`Environment::make`].
#[must_use = "must call `.get()` on the view"]
pub struct View<'env> {
    env: &'env Environment,
    name: String,
    data: Result<Map<String, Value>>,
}

/// The data a view renders with: shared data merged under the view
/// parameters.
///
/// This struct is created by [`Environment::view_data`].
pub struct ViewData<'env> {
    /// The environment the view renders in. Within a fragment this is the
    /// `__env` receiver.
    pub env: &'env Environment,
    /// The variables in scope.
    pub data: Map<String, Value>,
}

impl Environment {
    /// Construct a new environment with the given store.
    ///
    /// When the `builtins` feature is enabled the builtin host functions are
    /// registered.
    pub fn new<S>(store: S) -> Self
    where
        S: Store + 'static,
    {
        #[allow(unused_mut)]
        let mut functions = BTreeMap::new();
        #[cfg(feature = "builtins")]
        functions::register_builtins(&mut functions);
        Self {
            store: Box::new(store),
            shared: Map::new(),
            functions,
            composers: Vec::new(),
            programs: Mutex::new(HashMap::new()),
            max_include_depth: 64,
        }
    }

    /// Add data that is available in every view.
    ///
    /// Parameters passed to a particular view take precedence.
    #[inline]
    pub fn share(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.shared.insert(key.into(), value.into());
    }

    /// Returns the data shared with every view.
    #[inline]
    pub fn shared(&self) -> &Map<String, Value> {
        &self.shared
    }

    /// Add a new host function to the environment.
    ///
    /// A function with the same name replaces the existing one, including any
    /// builtin function.
    #[inline]
    pub fn add_function<F, R, A>(&mut self, name: impl Into<String>, f: F)
    where
        F: Function<R, A> + Send + Sync + 'static,
        R: FunctionReturn,
        A: FunctionArgs,
    {
        self.functions.insert(name.into(), functions::new(f));
    }

    /// Add a view composer.
    ///
    /// The composer is called before a view named `pattern` is rendered, or
    /// before every view if the pattern is `*`. It receives the view name and
    /// can modify the view data.
    pub fn composer<F>(&mut self, pattern: impl Into<String>, f: F)
    where
        F: Fn(&str, &mut Map<String, Value>) + Send + Sync + 'static,
    {
        self.composers.push((pattern.into(), Box::new(f)));
    }

    /// Set the maximum number of nested views.
    ///
    /// This is the maximum number of nested `@include`, `@each` and
    /// `@extends` views that are allowed during rendering, as counted from
    /// the top-level view.
    ///
    /// Defaults to 64.
    #[inline]
    pub fn set_max_include_depth(&mut self, depth: usize) {
        self.max_include_depth = depth;
    }

    /// Returns whether the store has a view with the given name.
    #[inline]
    pub fn exists(&self, name: &str) -> bool {
        self.store.exists(name)
    }

    /// Returns a view that can be rendered.
    #[inline]
    pub fn make(&self, name: impl Into<String>) -> View<'_> {
        View {
            env: self,
            name: name.into(),
            data: Ok(Map::new()),
        }
    }

    /// Render a view to a string using the provided data.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[inline]
    pub fn render<S>(&self, name: &str, data: S) -> Result<String>
    where
        S: ::serde::Serialize,
    {
        self.make(name).with_data(data).get()
    }

    /// Returns the shared data merged under the given parameters.
    pub fn view_data(&self, params: Map<String, Value>) -> ViewData<'_> {
        let mut data = self.shared.clone();
        data.extend(params);
        ViewData { env: self, data }
    }

    /// Render a view once for every element of a list or map.
    ///
    /// Each render has the element bound to `iterator` and the element's
    /// index or map key bound to `key`. The outputs are concatenated.
    ///
    /// If the collection is empty or `None` then `empty` is rendered instead.
    /// When `empty` starts with `raw|` the rest of it is output verbatim,
    /// otherwise it is the name of a view to render. It defaults to `raw|`.
    pub fn show_each(
        &self,
        view: &str,
        data: Value,
        iterator: &str,
        empty: Option<&str>,
    ) -> Result<String> {
        let mut sections = Sections::new();
        self.show_each_in(
            &mut sections,
            0,
            view,
            data,
            iterator,
            empty.unwrap_or(RAW_PREFIX),
        )
    }

    pub(crate) fn show_each_in(
        &self,
        sections: &mut Sections,
        depth: usize,
        view: &str,
        data: Value,
        iterator: &str,
        empty: &str,
    ) -> Result<String> {
        let entries: Vec<(Value, Value)> = match data {
            Value::List(list) => list
                .into_iter()
                .enumerate()
                .map(|(i, value)| (Value::from(i), value))
                .collect(),
            Value::Map(map) => map
                .into_iter()
                .map(|(key, value)| (Value::String(key), value))
                .collect(),
            Value::None => Vec::new(),
            value => {
                return Err(Error::from(format!(
                    "expected iterable, found {}",
                    value.human()
                )));
            }
        };

        if entries.is_empty() {
            return match empty.strip_prefix(RAW_PREFIX) {
                Some(raw) => Ok(raw.to_owned()),
                None => self.render_view(empty, Map::new(), sections, depth),
            };
        }

        let mut out = String::new();
        for (key, value) in entries {
            let mut data = Map::new();
            data.insert(String::from("key"), key);
            data.insert(iterator.to_owned(), value);
            out.push_str(&self.render_view(view, data, sections, depth)?);
        }
        Ok(out)
    }

    /// Renders a view with the given section state.
    pub(crate) fn render_view(
        &self,
        name: &str,
        params: Map<String, Value>,
        sections: &mut Sections,
        depth: usize,
    ) -> Result<String> {
        if depth > self.max_include_depth {
            return Err(Error::max_include_depth(self.max_include_depth).with_view_name(name));
        }
        tracing::debug!(view = name, depth, "rendering view");

        let ViewData { mut data, .. } = self.view_data(params);
        for (pattern, composer) in &self.composers {
            if pattern == "*" || pattern == name {
                composer(name, &mut data);
            }
        }

        let program = self.program(name).map_err(|err| err.with_view_name(name))?;
        render::program(self, &program, data, sections, depth)
            .map_err(|err| err.with_view_name(name))
    }

    /// Returns the compiled program for a view.
    ///
    /// Programs are cached by view name and reused as long as the store
    /// returns the same fragment.
    fn program(&self, name: &str) -> Result<Arc<Program>> {
        let fragment = self.store.compiled(name)?;
        let mut programs = self
            .programs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(program) = programs.get(name) {
            if program.source == fragment {
                return Ok(program.clone());
            }
        }
        let program = Arc::new(fragment::compile(fragment)?);
        programs.insert(name.to_owned(), program.clone());
        Ok(program)
    }

    pub(crate) fn function(&self, name: &str) -> Option<&FunctionFn> {
        self.functions.get(name).map(Box::as_ref)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("shared", &self.shared)
            .field("functions", &self.functions.keys())
            .field("composers", &self.composers.len())
            .field("max_include_depth", &self.max_include_depth)
            .finish_non_exhaustive()
    }
}

impl<'env> View<'env> {
    /// Add a variable to the view data.
    #[inline]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Ok(data) = &mut self.data {
            data.insert(key.into(), value.into());
        }
        self
    }

    /// Add every field of a serializable struct or map to the view data.
    ///
    /// Fails when the view is rendered if the data does not serialize to a
    /// map.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    pub fn with_data<S>(mut self, data: S) -> Self
    where
        S: ::serde::Serialize,
    {
        let result = to_value(data).and_then(|value| match value {
            Value::Map(map) => Ok(map),
            Value::None => Ok(Map::new()),
            value => Err(Error::new(
                ErrorKind::Serialize,
                format!("expected map of view data, found {}", value.human()),
            )),
        });
        self.data = match (self.data, result) {
            (Ok(mut data), Ok(map)) => {
                data.extend(map);
                Ok(data)
            }
            (Err(err), _) | (_, Err(err)) => Err(err),
        };
        self
    }

    /// Returns the name of the view.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the view to a string.
    #[inline]
    pub fn get(self) -> Result<String> {
        let mut sections = Sections::new();
        self.get_with(&mut sections)
    }

    /// Render the view to a string using existing section state.
    ///
    /// This allows sections captured in one render to be yielded in another.
    pub fn get_with(self, sections: &mut Sections) -> Result<String> {
        let data = self.data?;
        self.env.render_view(&self.name, data, sections, 0)
    }
}

impl fmt::Debug for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ViewData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewData")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Environment>();
    }

    #[test]
    fn environment_caches_programs() {
        let env = Environment::new(MemoryStore::new().with("a", "{{ 1 + 1 }}"));
        let first = env.program("a").unwrap();
        let second = env.program("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn view_data_params_win() {
        let mut env = Environment::new(MemoryStore::new());
        env.share("a", 1);
        env.share("b", 2);
        let mut params = Map::new();
        params.insert("b".into(), Value::from(3));
        let data = env.view_data(params).data;
        assert_eq!(data.get("a"), Some(&Value::from(1)));
        assert_eq!(data.get("b"), Some(&Value::from(3)));
    }
}
