//! Compile directive views into fragments.
//!
//! A view is written with directives like `@if (cond)`, `@section('name')`
//! and `{{ expr }}`. The directive compiler rewrites these into code tags,
//! e.g. `<% if (cond): %>`, producing a fragment that the renderer executes.
//! This process has three stages:
//! - The tokenizer splits the view into a flat stream of pieces.
//! - Each [`Pass`] lowers its pieces into fragment code.
//! - The pieces are concatenated, anything not lowered is emitted as written.
//!
//! The compiler never fails. Malformed directives are left as text or
//! produce fragment code that fails when rendered.

mod lex;
mod pass;

pub use crate::directive::pass::Pass;

/// Compile a view into a fragment using every pass.
///
/// # Examples
///
/// ```
/// let fragment = sabre::compile("@unless (user.admin) denied @endunless");
/// assert_eq!(fragment, "<% if (!(user.admin)): %> denied <% endif; %>");
/// ```
pub fn compile(source: &str) -> String {
    Compiler::new().compile(source)
}

/// The directive compiler.
///
/// By default every [`Pass`] is applied. A compiler with a subset of passes
/// can be constructed using [`with_passes`][Compiler::with_passes], which is
/// mostly useful to inspect the effect of a single pass.
#[derive(Debug, Clone)]
pub struct Compiler {
    passes: Vec<Pass>,
}

impl Default for Compiler {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Construct a compiler that applies every pass.
    #[inline]
    pub fn new() -> Self {
        Self {
            passes: Pass::ALL.to_vec(),
        }
    }

    /// Construct a compiler that applies only the given passes.
    ///
    /// The passes are still applied in their usual order, and at most once
    /// each, regardless of the order they are given in.
    pub fn with_passes<I>(passes: I) -> Self
    where
        I: IntoIterator<Item = Pass>,
    {
        let selected: Vec<_> = passes.into_iter().collect();
        Self {
            passes: Pass::ALL
                .into_iter()
                .filter(|pass| selected.contains(pass))
                .collect(),
        }
    }

    /// Returns the passes this compiler applies, in order.
    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Compile a view into a fragment.
    pub fn compile(&self, source: &str) -> String {
        let mut pieces = lex::tokenize(source);
        for pass in &self.passes {
            pass.apply(&mut pieces);
        }
        let mut out = String::with_capacity(source.len());
        for piece in &pieces {
            out.push_str(piece.raw());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_mixed() {
        let source = "<ul>\n@foreach (items as item)\n  <li>{{ item }}</li>\n@endforeach\n</ul>";
        assert_eq!(
            compile(source),
            "<ul>\n<% foreach (items as item): %>\n  <li><% echo item; %></li>\n<% endforeach; %>\n</ul>"
        );
    }

    #[test]
    fn compile_with_passes_keeps_order() {
        let compiler = Compiler::with_passes([Pass::SectionStop, Pass::Inheritance, Pass::Echos]);
        assert_eq!(
            compiler.passes(),
            [Pass::Inheritance, Pass::Echos, Pass::SectionStop]
        );
    }

    #[test]
    fn compile_with_no_passes_is_identity() {
        let source = "@section('a'){{ x }}@stop";
        assert_eq!(Compiler::with_passes([]).compile(source), source);
    }

    #[test]
    fn compile_extends_without_includes_pass() {
        let compiler = Compiler::with_passes([Pass::Inheritance]);
        assert_eq!(
            compiler.compile("@extends('a')\nbody"),
            "body\n@include('a')"
        );
    }
}
