//! Defines a compiled [`Program`] which is a sequence of [`Instr`] that can be
//! executed by the renderer.

use std::sync::Arc;

use crate::types::ast;
use crate::types::span::Span;

pub const FIXME: usize = !0;

pub struct Program {
    pub source: Arc<str>,
    pub instrs: Vec<Instr>,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub enum Instr {
    /// Jump to an instruction
    Jump(usize),

    /// Jump to the instruction if the expression is false
    JumpIfFalse(usize, ast::Expr),

    /// Emit raw fragment text
    EmitRaw(Span),

    /// Evaluate and emit the expression
    Emit(ast::Expr),

    /// Evaluate the expression and discard the result
    Eval(ast::Expr),

    /// Assign to a variable in the view scope
    Assign(ast::Assign),

    /// Start a loop over the expression
    LoopStart(ast::LoopVars, ast::Expr),

    /// Advance the innermost loop, or jump to the instruction when exhausted
    LoopNext(usize),
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<compiled>")
    }
}
