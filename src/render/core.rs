use crate::render::fmt;
use crate::render::iter::LoopState;
use crate::render::value;
use crate::sections::Frame;
use crate::types::ast;
use crate::types::program::{Instr, Program};
use crate::value::Map;
use crate::{Environment, Error, Result, Sections, Value};

/// Interprets a compiled [`Program`] for a single view.
pub struct RendererImpl<'render> {
    pub(crate) env: &'render Environment,
    pub(crate) program: &'render Program,
    pub(crate) scope: Map<String, Value>,
    pub(crate) loops: Vec<LoopState<'render>>,
    pub(crate) depth: usize,
}

impl<'render> RendererImpl<'render> {
    pub(crate) fn render(mut self, sections: &mut Sections) -> Result<String> {
        let mut frame = Frame::begin(sections);
        let mut out = String::with_capacity(self.program.source.len());
        self.render_instrs(&mut out, &mut frame)?;
        frame.commit()?;
        Ok(out)
    }

    fn render_instrs(&mut self, out: &mut String, frame: &mut Frame<'_>) -> Result<()> {
        let program = self.program;
        let source = &*program.source;
        let mut pc = 0;

        while let Some(instr) = program.instrs.get(pc) {
            match instr {
                Instr::Jump(j) => {
                    pc = *j;
                    continue;
                }

                Instr::JumpIfFalse(j, cond) => {
                    if !self.eval(cond, frame)?.is_truthy() {
                        pc = *j;
                        continue;
                    }
                }

                Instr::EmitRaw(span) => {
                    frame.writer(out).push_str(&source[*span]);
                }

                Instr::Emit(expr) => {
                    let value = self.eval(expr, frame)?;
                    fmt::format(frame.writer(out), &value)
                        .map_err(|err| err.with_span(source, expr.span()))?;
                }

                Instr::Eval(expr) => {
                    self.eval(expr, frame)?;
                }

                Instr::Assign(assign) => {
                    self.assign(assign, frame)?;
                }

                Instr::LoopStart(vars, iterable) => {
                    let value = self.eval(iterable, frame)?;
                    let state = LoopState::new(source, vars, value, iterable.span())?;
                    self.loops.push(state);
                }

                Instr::LoopNext(j) => {
                    let Some(state) = self.loops.last_mut() else {
                        unreachable!("compiler bug: loop next without loop start");
                    };
                    match state.iterate() {
                        Some((key, value)) => match state.vars {
                            ast::LoopVars::Item(item) => {
                                self.scope.insert(source[item.span].to_owned(), value);
                            }
                            ast::LoopVars::KeyValue(kv) => {
                                self.scope.insert(source[kv.key.span].to_owned(), key);
                                self.scope.insert(source[kv.value.span].to_owned(), value);
                            }
                        },
                        None => {
                            self.loops.pop();
                            pc = *j;
                            continue;
                        }
                    }
                }
            }
            pc += 1;
        }

        assert!(pc == program.instrs.len());
        Ok(())
    }

    fn assign(&mut self, assign: &ast::Assign, frame: &mut Frame<'_>) -> Result<()> {
        let source = &*self.program.source;
        let name = &source[assign.name.span];
        let rhs = match &assign.value {
            Some(expr) => self.eval(expr, frame)?,
            None => Value::Integer(1),
        };
        let value = match assign.op {
            ast::AssignOp::Set => rhs,
            op => {
                let current = self.lookup_var(&assign.name)?.clone();
                let op = match op {
                    ast::AssignOp::Sub | ast::AssignOp::Decr => ast::BinaryOp::Sub,
                    _ => ast::BinaryOp::Add,
                };
                value::binary(op, current, rhs).map_err(|err| err.with_span(source, assign.span))?
            }
        };
        self.scope.insert(name.to_owned(), value);
        Ok(())
    }

    fn eval(&self, expr: &ast::Expr, frame: &mut Frame<'_>) -> Result<Value> {
        if let Some(result) = self.resolve_path(expr) {
            return result.cloned();
        }

        let source = &*self.program.source;
        match expr {
            ast::Expr::Literal(lit) => Ok(lit.value.clone()),

            ast::Expr::List(list) => list
                .items
                .iter()
                .map(|item| self.eval(item, frame))
                .collect::<Result<_>>()
                .map(Value::List),

            ast::Expr::Map(map) => {
                let mut entries = Map::new();
                for (k, v) in &map.entries {
                    let key = match self.eval(k, frame)? {
                        Value::String(s) => s,
                        Value::Integer(i) => i.to_string(),
                        key => {
                            return Err(Error::render(
                                format!("expected string key, found {}", key.human()),
                                source,
                                k.span(),
                            ));
                        }
                    };
                    entries.insert(key, self.eval(v, frame)?);
                }
                Ok(Value::Map(entries))
            }

            ast::Expr::Member(member) => {
                let target = self.eval(&member.target, frame)?;
                value::member(source, &target, &member.key)
                    .map(Value::clone)
                    .map_err(|err| err.with_span(source, member.key.span()))
            }

            ast::Expr::Index(index) => {
                let target = self.eval(&index.target, frame)?;
                let i = self.eval(&index.index, frame)?;
                value::index(&target, &i)
                    .map(Value::clone)
                    .map_err(|err| err.with_span(source, index.span))
            }

            ast::Expr::Call(call) => self.call_function(call, frame),

            ast::Expr::Method(call) => self.call_runtime(call, frame),

            ast::Expr::Unary(unary) => {
                let v = self.eval(&unary.expr, frame)?;
                value::unary(unary.op, v).map_err(|err| err.with_span(source, unary.span))
            }

            ast::Expr::Binary(binary) => match binary.op {
                ast::BinaryOp::And => {
                    if !self.eval(&binary.lhs, frame)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(self.eval(&binary.rhs, frame)?.is_truthy()))
                }
                ast::BinaryOp::Or => {
                    if self.eval(&binary.lhs, frame)?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(self.eval(&binary.rhs, frame)?.is_truthy()))
                }
                op => {
                    let lhs = self.eval(&binary.lhs, frame)?;
                    let rhs = self.eval(&binary.rhs, frame)?;
                    value::binary(op, lhs, rhs).map_err(|err| err.with_span(source, binary.span))
                }
            },

            ast::Expr::Var(_) => unreachable!("variables are resolved as paths"),
        }
    }

    /// Resolves variables and member access chains like `user.roles.0` by
    /// reference, so that only the final value is cloned. Returns `None` if
    /// the expression is not a path.
    fn resolve_path(&self, expr: &ast::Expr) -> Option<Result<&Value>> {
        match expr {
            ast::Expr::Var(ident) => Some(self.lookup_var(ident)),
            ast::Expr::Member(member) => {
                let source = &*self.program.source;
                let result = match self.resolve_path(&member.target)? {
                    Ok(target) => value::member(source, target, &member.key)
                        .map_err(|err| err.with_span(source, member.key.span())),
                    Err(err) => Err(err),
                };
                Some(result)
            }
            _ => None,
        }
    }

    fn lookup_var(&self, ident: &ast::Ident) -> Result<&Value> {
        let source = &*self.program.source;
        let name = &source[ident.span];
        self.scope
            .get(name)
            .ok_or_else(|| Error::render("not found in this scope", source, ident.span))
    }

    fn eval_args(&self, args: &[ast::Expr], frame: &mut Frame<'_>) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, frame)).collect()
    }

    /// Calls a host function, e.g. `lower(name)`.
    fn call_function(&self, call: &ast::Call, frame: &mut Frame<'_>) -> Result<Value> {
        let source = &*self.program.source;
        let name = &source[call.name.span];

        if name == "defined_vars" {
            if !call.args.is_empty() {
                return Err(Error::render(
                    "function expected 0 arguments",
                    source,
                    call.span,
                ));
            }
            return Ok(Value::Map(self.scope.clone()));
        }

        let Some(f) = self.env.function(name) else {
            return Err(Error::render("unknown function", source, call.name.span));
        };
        let args = self.eval_args(&call.args, frame)?;
        f(args).map_err(|err| err.with_span(source, call.span))
    }

    /// Calls a method on the view environment, e.g. `__env.yield('title')`.
    fn call_runtime(&self, call: &ast::Call, frame: &mut Frame<'_>) -> Result<Value> {
        let source = &*self.program.source;
        let name = &source[call.name.span];
        let args = self.eval_args(&call.args, frame)?;
        let err = |msg: String| Error::render(msg, source, call.span);

        match name {
            "make" => {
                let mut args = Args::new(args, 1, 3).map_err(err)?;
                let view = args.string("view name").map_err(err)?;
                // Earlier maps take precedence, so explicit parameters win over
                // the caller's variables.
                let mut data = Map::new();
                for value in args.rest().into_iter().rev() {
                    match value {
                        Value::Map(map) => data.extend(map),
                        Value::None => {}
                        value => {
                            return Err(err(format!(
                                "expected map of view data, found {}",
                                value.human()
                            )));
                        }
                    }
                }
                let out = self
                    .env
                    .render_view(&view, data, frame.sections(), self.depth + 1)?;
                Ok(Value::String(out))
            }

            "show_each" => {
                let mut args = Args::new(args, 3, 4).map_err(err)?;
                let view = args.string("view name").map_err(err)?;
                let data = args.value();
                let iterator = args.string("iterator name").map_err(err)?;
                let empty = args.optional_string("empty view").map_err(err)?;
                let out = self.env.show_each_in(
                    frame.sections(),
                    self.depth + 1,
                    &view,
                    data,
                    &iterator,
                    empty.as_deref().unwrap_or("raw|"),
                )?;
                Ok(Value::String(out))
            }

            "yield" => {
                let mut args = Args::new(args, 1, 1).map_err(err)?;
                let section = args.string("section name").map_err(err)?;
                Ok(Value::String(
                    frame.sections().yield_content(&section).to_owned(),
                ))
            }

            "yield_section" => {
                Args::new(args, 0, 0).map_err(err)?;
                let content = frame
                    .yield_section()
                    .map_err(|e| e.with_span(source, call.span))?;
                Ok(Value::String(content))
            }

            "start_section" => {
                let mut args = Args::new(args, 1, 2).map_err(err)?;
                let section = args.string("section name").map_err(err)?;
                // An empty string is the same as no inline content.
                match args.optional_value() {
                    Some(Value::String(s)) if s.is_empty() => frame.sections().start(section),
                    Some(content) => {
                        let mut buf = String::new();
                        fmt::format(&mut buf, &content)
                            .map_err(|e| e.with_span(source, call.span))?;
                        frame.sections().start_with(section, buf);
                    }
                    None => frame.sections().start(section),
                }
                Ok(Value::None)
            }

            "inject" => {
                let mut args = Args::new(args, 2, 2).map_err(err)?;
                let section = args.string("section name").map_err(err)?;
                let mut buf = String::new();
                fmt::format(&mut buf, &args.value())
                    .map_err(|e| e.with_span(source, call.span))?;
                frame.sections().inject(section, buf);
                Ok(Value::None)
            }

            "stop_section" => {
                Args::new(args, 0, 0).map_err(err)?;
                let section = frame
                    .stop()
                    .map_err(|e| e.with_span(source, call.span))?;
                Ok(Value::String(section))
            }

            "exists" => {
                let mut args = Args::new(args, 1, 1).map_err(err)?;
                let view = args.string("view name").map_err(err)?;
                Ok(Value::Bool(self.env.exists(&view)))
            }

            _ => Err(Error::render(
                "unknown environment method",
                source,
                call.name.span,
            )),
        }
    }
}

/// Positional arguments to an environment method.
struct Args {
    iter: std::vec::IntoIter<Value>,
}

impl Args {
    fn new(args: Vec<Value>, min: usize, max: usize) -> std::result::Result<Self, String> {
        let n = args.len();
        if n < min || n > max {
            let exp = match min == max {
                true => format!("{min}"),
                false => format!("{min} to {max}"),
            };
            return Err(format!("expected {exp} arguments, found {n}"));
        }
        Ok(Self {
            iter: args.into_iter(),
        })
    }

    fn value(&mut self) -> Value {
        self.iter.next().unwrap_or_default()
    }

    fn optional_value(&mut self) -> Option<Value> {
        self.iter.next()
    }

    fn string(&mut self, what: &str) -> std::result::Result<String, String> {
        match self.value() {
            Value::String(s) => Ok(s),
            value => Err(format!("expected string {what}, found {}", value.human())),
        }
    }

    fn optional_string(&mut self, what: &str) -> std::result::Result<Option<String>, String> {
        match self.optional_value() {
            None | Some(Value::None) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(value) => Err(format!("expected string {what}, found {}", value.human())),
        }
    }

    fn rest(self) -> Vec<Value> {
        self.iter.collect()
    }
}
