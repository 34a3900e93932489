use std::iter::Enumerate;

use crate::types::ast;
use crate::types::span::Span;
use crate::value::{List, Map};
use crate::{Error, Result, Value};

/// The state of a `foreach` loop over an owned list or map.
pub struct LoopState<'render> {
    pub vars: &'render ast::LoopVars,
    items: Items,
}

enum Items {
    List(Enumerate<<List<Value> as IntoIterator>::IntoIter>),
    Map(<Map<String, Value> as IntoIterator>::IntoIter),
}

impl<'render> LoopState<'render> {
    pub fn new(
        source: &str,
        vars: &'render ast::LoopVars,
        iterable: Value,
        span: Span,
    ) -> Result<Self> {
        let items = match iterable {
            Value::List(list) => Items::List(list.into_iter().enumerate()),
            Value::Map(map) => Items::Map(map.into_iter()),
            value => {
                return Err(Error::render(
                    format!(
                        "expected iterable, but expression evaluated to {}",
                        value.human()
                    ),
                    source,
                    span,
                ));
            }
        };
        Ok(Self { vars, items })
    }

    /// Advances the loop, returning the next key and value.
    ///
    /// List keys are the zero based index, map keys are the map key.
    pub fn iterate(&mut self) -> Option<(Value, Value)> {
        match &mut self.items {
            Items::List(iter) => {
                let (i, value) = iter.next()?;
                Some((Value::from(i), value))
            }
            Items::Map(iter) => {
                let (key, value) = iter.next()?;
                Some((Value::String(key), value))
            }
        }
    }
}
