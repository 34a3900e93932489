//! Compile a fragment into a program that can be executed by the renderer.
//!
//! A fragment is the output of the directive compiler: raw text interleaved
//! with `<% ... %>` code tags. This process has three stages:
//! - The lexer chunks the fragment source into tokens.
//! - The parser constructs an AST from the token stream.
//! - The compiler takes the AST and constructs the program.

pub(crate) mod lex;
mod parse;

use std::sync::Arc;

use crate::types::ast;
use crate::types::program::{Instr, Program, FIXME};
use crate::Result;

/// Compile a fragment into a program.
pub fn compile(source: Arc<str>) -> Result<Program> {
    let ast = parse::Parser::new(&source).parse_template()?;
    Ok(Compiler::new().compile_template(source, ast))
}

/// A compiler that constructs a program from an AST.
struct Compiler {
    instrs: Vec<Instr>,
}

impl Compiler {
    fn new() -> Self {
        Self { instrs: Vec::new() }
    }

    fn compile_template(mut self, source: Arc<str>, template: ast::Template) -> Program {
        self.compile_scope(template.scope);
        Program {
            source,
            instrs: self.instrs,
        }
    }

    fn compile_scope(&mut self, scope: ast::Scope) {
        for stmt in scope.stmts {
            self.compile_stmt(stmt);
        }
    }

    fn compile_stmt(&mut self, stmt: ast::Stmt) {
        match stmt {
            ast::Stmt::Raw(raw) => {
                self.push(Instr::EmitRaw(raw));
            }

            ast::Stmt::Echo(expr) => {
                self.push(Instr::Emit(expr));
            }

            ast::Stmt::Eval(expr) => {
                self.push(Instr::Eval(expr));
            }

            ast::Stmt::Assign(assign) => {
                self.push(Instr::Assign(assign));
            }

            ast::Stmt::IfElse(ast::IfElse {
                cond,
                then_branch,
                else_branch,
            }) => {
                // then branch
                let j = self.push(Instr::JumpIfFalse(FIXME, cond));
                self.compile_scope(then_branch);

                match else_branch {
                    Some(else_branch) => {
                        // else branch
                        let j2 = self.push(Instr::Jump(FIXME));
                        self.update_jump(j);
                        self.compile_scope(else_branch);
                        self.update_jump(j2)
                    }
                    None => {
                        self.update_jump(j);
                    }
                }
            }

            ast::Stmt::ForEach(ast::ForEach {
                vars,
                iterable,
                body,
            }) => {
                self.push(Instr::LoopStart(vars, iterable));
                let j = self.push(Instr::LoopNext(FIXME));
                self.compile_scope(body);
                self.push(Instr::Jump(j));
                self.update_jump(j);
            }

            ast::Stmt::For(ast::For {
                init,
                cond,
                step,
                body,
            }) => {
                if let Some(init) = init {
                    self.push(Instr::Assign(init));
                }
                let top = self.instrs.len();
                let j = cond.map(|cond| self.push(Instr::JumpIfFalse(FIXME, cond)));
                self.compile_scope(body);
                if let Some(step) = step {
                    self.push(Instr::Assign(step));
                }
                self.push(Instr::Jump(top));
                if let Some(j) = j {
                    self.update_jump(j);
                }
            }

            ast::Stmt::While(ast::While { cond, body }) => {
                let top = self.instrs.len();
                let j = self.push(Instr::JumpIfFalse(FIXME, cond));
                self.compile_scope(body);
                self.push(Instr::Jump(top));
                self.update_jump(j);
            }
        }
    }

    fn update_jump(&mut self, i: usize) {
        let n = self.instrs.len();
        let j = match &mut self.instrs[i] {
            Instr::Jump(j) | Instr::JumpIfFalse(j, _) | Instr::LoopNext(j) => j,
            _ => panic!("not a jump instr"),
        };
        *j = n;
    }

    fn push(&mut self, instr: Instr) -> usize {
        let i = self.instrs.len();
        self.instrs.push(instr);
        i
    }
}
