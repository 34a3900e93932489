use std::fmt::Display;

use crate::fragment::lex::{Lexer, Token};
use crate::types::ast;
use crate::types::span::Span;
use crate::{Error, Result, Value};

/// A parser that constructs an AST from a token stream.
///
/// Statements are parsed without recursion using a stack of open blocks and a
/// stack of scopes. Expressions are parsed by precedence climbing. The parser
/// sometimes needs to peek at the next token to know how to proceed and uses
/// the `peeked` buffer to do this.
pub struct Parser<'source> {
    /// A lexer that tokenizes the fragment source.
    tokens: Lexer<'source>,

    /// Remember a peeked value, even if it was `None`
    peeked: Option<Option<(Token, Span)>>,

    /// The number of expressions currently being parsed inside each other.
    depth: usize,
}

/// The maximum expression nesting, deeper input is rejected instead of
/// overflowing the stack.
const MAX_DEPTH: usize = 128;

/// Stores the state of a statement during parsing.
enum State {
    /// A partial `if` statement.
    If {
        /// Whether or not this `if` statement is an `elseif` clause.
        is_else_if: bool,
        /// The condition in the `if` block.
        cond: ast::Expr,
        /// The span of the `if` tag.
        span: Span,
        /// Whether or not this `if` statement has an `else` clause.
        has_else: bool,
    },

    /// A partial `foreach` statement.
    ForEach {
        vars: ast::LoopVars,
        iterable: ast::Expr,
        span: Span,
    },

    /// A partial `for` statement.
    For {
        init: Option<ast::Assign>,
        cond: Option<ast::Expr>,
        step: Option<ast::Assign>,
        span: Span,
    },

    /// A partial `while` statement.
    While { cond: ast::Expr, span: Span },
}

/// A parsed statement between code tags.
enum Block {
    Stmt(ast::Stmt),
    If(ast::Expr),
    ElseIf(ast::Expr),
    Else,
    EndIf,
    ForEach(ast::LoopVars, ast::Expr),
    EndForEach,
    For(Option<ast::Assign>, Option<ast::Expr>, Option<ast::Assign>),
    EndFor,
    While(ast::Expr),
    EndWhile,
}

/// A keyword in the fragment syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    If,
    ElseIf,
    Else,
    EndIf,
    ForEach,
    As,
    EndForEach,
    For,
    EndFor,
    While,
    EndWhile,
    Echo,
    True,
    False,
    Null,
    None,
}

impl<'source> Parser<'source> {
    /// Construct a new parser.
    pub fn new(source: &'source str) -> Self {
        Self {
            tokens: Lexer::new(source),
            peeked: None,
            depth: 0,
        }
    }

    /// Parses a fragment.
    ///
    /// This function works using two stacks:
    /// - A stack of blocks e.g. `<% if (cond): %> ... <% else: %>`.
    /// - A stack of scopes which collect each parsed statement.
    pub fn parse_template(mut self) -> Result<ast::Template> {
        let mut blocks = vec![];
        let mut scopes = vec![ast::Scope::new()];

        while let Some(next) = self.next()? {
            match next {
                // Simply raw text, emit a single statement for it.
                (Token::Raw, span) => {
                    push(&mut scopes, ast::Stmt::Raw(span));
                }

                // The start of code, e.g. `<% echo user.name; %>`. A single
                // pair of tags may hold any number of statements.
                (Token::BeginTag, _) => loop {
                    self.skip_comments()?;
                    let (tk, span) = self.peek_token()?;
                    match tk {
                        Token::EndTag => {
                            self.expect(Token::EndTag)?;
                            break;
                        }
                        Token::Semicolon => {
                            self.expect(Token::Semicolon)?;
                        }
                        _ => {
                            let block = self.parse_block()?;
                            self.apply(block, span, &mut blocks, &mut scopes)?;
                        }
                    }
                },

                (tk, span) => {
                    return Err(Error::syntax(
                        format!("unexpected {}", tk.human()),
                        self.source(),
                        span,
                    ));
                }
            }
        }

        if let Some(block) = blocks.first() {
            let (msg, span) = match block {
                State::If { span, .. } => ("unclosed `if` block", span),
                State::ForEach { span, .. } => ("unclosed `foreach` block", span),
                State::For { span, .. } => ("unclosed `for` block", span),
                State::While { span, .. } => ("unclosed `while` block", span),
            };
            return Err(Error::syntax(msg, self.source(), *span));
        }

        assert!(
            scopes.len() == 1,
            "parser bug: we should end with a single scope"
        );

        Ok(ast::Template {
            scope: scopes.remove(0),
        })
    }

    /// Applies a parsed block to the block and scope stacks.
    fn apply(
        &self,
        block: Block,
        span: Span,
        blocks: &mut Vec<State>,
        scopes: &mut Vec<ast::Scope>,
    ) -> Result<()> {
        let stmt = match block {
            Block::Stmt(stmt) => stmt,

            // The start of an `if` statement. We must push a block to the
            // block stack and a scope to the scope stack because an if
            // statement starts a new scope.
            Block::If(cond) => {
                blocks.push(State::If {
                    is_else_if: false,
                    cond,
                    span,
                    has_else: false,
                });
                scopes.push(ast::Scope::new());
                return Ok(());
            }

            // An `elseif` clause. We expect that the previous block was an
            // `if` block and update it accordingly. We must also push two
            // scopes to the scope stack, one for the `else` and one for the
            // `if`.
            Block::ElseIf(cond) => {
                let err = || Error::syntax("unexpected `elseif`", self.source(), span);
                match blocks.last_mut().ok_or_else(err)? {
                    State::If {
                        has_else: has_else @ false,
                        ..
                    } => {
                        *has_else = true;
                    }
                    _ => return Err(err()),
                }
                blocks.push(State::If {
                    is_else_if: true,
                    cond,
                    span,
                    has_else: false,
                });
                scopes.push(ast::Scope::new());
                scopes.push(ast::Scope::new());
                return Ok(());
            }

            Block::Else => {
                let err = || Error::syntax("unexpected `else`", self.source(), span);
                match blocks.last_mut().ok_or_else(err)? {
                    State::If {
                        has_else: has_else @ false,
                        ..
                    } => {
                        *has_else = true;
                    }
                    _ => return Err(err()),
                }
                scopes.push(ast::Scope::new());
                return Ok(());
            }

            // The end of an `if` statement. We have to make sure to pop back
            // the scopes until we get to the original `if`. Any `elseif`
            // blocks along the way are desugared into nested `if` statements.
            Block::EndIf => {
                let err = || Error::syntax("unexpected `endif`", self.source(), span);
                loop {
                    match blocks.pop().ok_or_else(err)? {
                        State::If {
                            is_else_if,
                            cond,
                            has_else,
                            ..
                        } => {
                            let else_branch = has_else.then(|| pop(scopes));
                            let then_branch = pop(scopes);
                            let stmt = ast::Stmt::IfElse(ast::IfElse {
                                cond,
                                then_branch,
                                else_branch,
                            });
                            if !is_else_if {
                                break stmt;
                            }
                            push(scopes, stmt);
                        }
                        _ => return Err(err()),
                    }
                }
            }

            Block::ForEach(vars, iterable) => {
                blocks.push(State::ForEach {
                    vars,
                    iterable,
                    span,
                });
                scopes.push(ast::Scope::new());
                return Ok(());
            }

            Block::EndForEach => {
                let err = || Error::syntax("unexpected `endforeach`", self.source(), span);
                match blocks.pop().ok_or_else(err)? {
                    State::ForEach { vars, iterable, .. } => {
                        let body = pop(scopes);
                        ast::Stmt::ForEach(ast::ForEach {
                            vars,
                            iterable,
                            body,
                        })
                    }
                    _ => return Err(err()),
                }
            }

            Block::For(init, cond, step) => {
                blocks.push(State::For {
                    init,
                    cond,
                    step,
                    span,
                });
                scopes.push(ast::Scope::new());
                return Ok(());
            }

            Block::EndFor => {
                let err = || Error::syntax("unexpected `endfor`", self.source(), span);
                match blocks.pop().ok_or_else(err)? {
                    State::For {
                        init, cond, step, ..
                    } => {
                        let body = pop(scopes);
                        ast::Stmt::For(ast::For {
                            init,
                            cond,
                            step,
                            body,
                        })
                    }
                    _ => return Err(err()),
                }
            }

            Block::While(cond) => {
                blocks.push(State::While { cond, span });
                scopes.push(ast::Scope::new());
                return Ok(());
            }

            Block::EndWhile => {
                let err = || Error::syntax("unexpected `endwhile`", self.source(), span);
                match blocks.pop().ok_or_else(err)? {
                    State::While { cond, .. } => {
                        let body = pop(scopes);
                        ast::Stmt::While(ast::While { cond, body })
                    }
                    _ => return Err(err()),
                }
            }
        };
        push(scopes, stmt);
        Ok(())
    }

    /// Parses a single statement. All of the following are valid.
    ///
    ///   echo user.name
    ///
    ///   if (user.is_enabled):
    ///
    ///   foreach (users as id => user):
    ///
    ///   for (i = 0; i < 3; i++):
    ///
    ///   count += 1
    ///
    ///   __env.start_section('title')
    ///
    fn parse_block(&mut self) -> Result<Block> {
        if let Some(kw) = self.peek_statement_keyword()? {
            let (_, span) = self.parse_keyword()?;
            return match kw {
                Keyword::Echo => Ok(Block::Stmt(ast::Stmt::Echo(self.parse_expr()?))),
                Keyword::If => Ok(Block::If(self.parse_cond()?)),
                Keyword::ElseIf => Ok(Block::ElseIf(self.parse_cond()?)),
                Keyword::Else => {
                    self.expect(Token::Colon)?;
                    Ok(Block::Else)
                }
                Keyword::EndIf => Ok(Block::EndIf),
                Keyword::ForEach => {
                    self.expect(Token::LParen)?;
                    let iterable = self.parse_expr()?;
                    self.expect_keyword(Keyword::As)?;
                    let vars = self.parse_loop_vars()?;
                    self.expect(Token::RParen)?;
                    self.expect(Token::Colon)?;
                    Ok(Block::ForEach(vars, iterable))
                }
                Keyword::EndForEach => Ok(Block::EndForEach),
                Keyword::For => {
                    self.expect(Token::LParen)?;
                    let init = match self.is_next(Token::Semicolon)? {
                        true => None,
                        false => Some(self.expect_assign()?),
                    };
                    self.expect(Token::Semicolon)?;
                    let cond = match self.is_next(Token::Semicolon)? {
                        true => None,
                        false => Some(self.parse_expr()?),
                    };
                    self.expect(Token::Semicolon)?;
                    let step = match self.is_next(Token::RParen)? {
                        true => None,
                        false => Some(self.expect_assign()?),
                    };
                    self.expect(Token::RParen)?;
                    self.expect(Token::Colon)?;
                    Ok(Block::For(init, cond, step))
                }
                Keyword::EndFor => Ok(Block::EndFor),
                Keyword::While => Ok(Block::While(self.parse_cond()?)),
                Keyword::EndWhile => Ok(Block::EndWhile),
                kw => Err(self.err_unexpected_keyword(kw.human(), span)),
            };
        }

        let expr = self.parse_expr()?;
        if let ast::Expr::Var(name) = &expr {
            if let Some(assign) = self.parse_assign(*name)? {
                return Ok(Block::Stmt(ast::Stmt::Assign(assign)));
            }
        }
        Ok(Block::Stmt(ast::Stmt::Eval(expr)))
    }

    /// Parses a parenthesized condition followed by a colon.
    ///
    ///   (user.is_enabled && !user.is_admin):
    ///
    fn parse_cond(&mut self) -> Result<ast::Expr> {
        self.expect(Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen)?;
        self.expect(Token::Colon)?;
        Ok(cond)
    }

    /// Parses loop variable(s).
    ///
    ///   item
    ///
    ///   key => value
    ///
    fn parse_loop_vars(&mut self) -> Result<ast::LoopVars> {
        let key = self.parse_ident()?;
        if !self.is_next(Token::FatArrow)? {
            return Ok(ast::LoopVars::Item(key));
        }
        self.expect(Token::FatArrow)?;
        let value = self.parse_ident()?;
        Ok(ast::LoopVars::KeyValue(ast::KeyValue { key, value }))
    }

    /// Parses an assignment that must be present.
    fn expect_assign(&mut self) -> Result<ast::Assign> {
        let name = self.parse_ident()?;
        match self.parse_assign(name)? {
            Some(assign) => Ok(assign),
            None => match self.peek()? {
                Some((tk, span)) => Err(self.err_unexpected_token("assignment", tk, span)),
                None => Err(self.err_unexpected_eof("assignment")),
            },
        }
    }

    /// Parses the rest of an assignment to `name`, if there is one.
    ///
    ///   = 1
    ///
    ///   += step
    ///
    ///   ++
    ///
    fn parse_assign(&mut self, name: ast::Ident) -> Result<Option<ast::Assign>> {
        let op = match self.peek()? {
            Some((Token::Assign, _)) => ast::AssignOp::Set,
            Some((Token::PlusAssign, _)) => ast::AssignOp::Add,
            Some((Token::MinusAssign, _)) => ast::AssignOp::Sub,
            Some((Token::PlusPlus, _)) => ast::AssignOp::Incr,
            Some((Token::MinusMinus, _)) => ast::AssignOp::Decr,
            _ => return Ok(None),
        };
        let (_, op_span) = self.parse()?;
        let (value, span) = match op {
            ast::AssignOp::Incr | ast::AssignOp::Decr => (None, name.span.to(op_span)),
            _ => {
                let value = self.parse_expr()?;
                let span = name.span.to(value.span());
                (Some(value), span)
            }
        };
        Ok(Some(ast::Assign {
            name,
            op,
            value,
            span,
        }))
    }

    /// Parses an expression.
    ///
    ///   user.age + 1 >= limit || is_admin(user)
    ///
    fn parse_expr(&mut self) -> Result<ast::Expr> {
        self.nested(|p| p.parse_binary(0))
    }

    /// Runs `f` one nesting level deeper, failing past [`MAX_DEPTH`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            let span = match self.peek()? {
                Some((_, span)) => span,
                None => {
                    let n = self.source().len();
                    Span::from(n..n)
                }
            };
            return Err(Error::syntax(
                "expression nested too deeply",
                self.source(),
                span,
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Parses binary operators that bind tighter than `min`. Operators of
    /// equal precedence are left associative.
    fn parse_binary(&mut self, min: u8) -> Result<ast::Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.peek_binary_op()? {
            let precedence = op.precedence();
            if precedence <= min {
                break;
            }
            self.parse()?;
            let rhs = self.parse_binary(precedence)?;
            let span = lhs.span().to(rhs.span());
            lhs = ast::Expr::Binary(Box::new(ast::Binary { op, lhs, rhs, span }));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ast::Expr> {
        let op = match self.peek()? {
            Some((Token::Bang, _)) => ast::UnaryOp::Not,
            Some((Token::Minus, _)) => ast::UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        let (_, op_span) = self.parse()?;
        let expr = self.nested(Self::parse_unary)?;
        let span = op_span.to(expr.span());
        Ok(ast::Expr::Unary(Box::new(ast::Unary { op, expr, span })))
    }

    /// Parses a primary expression followed by any number of member accesses,
    /// index operations or runtime calls.
    ///
    ///   users.0.name
    ///
    ///   users[id]['name']
    ///
    ///   __env.yield('title')
    ///
    fn parse_postfix(&mut self) -> Result<ast::Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek()? {
                Some((Token::Dot, _)) => {
                    self.expect(Token::Dot)?;
                    expr = match self.parse()? {
                        (Token::Ident, span) if self.is_next(Token::LParen)? => {
                            let name = ast::Ident { span };
                            if !self.is_runtime(&expr) {
                                return Err(Error::syntax(
                                    "methods can only be called on `__env`",
                                    self.source(),
                                    expr.span().to(span),
                                ));
                            }
                            let open = self.expect(Token::LParen)?;
                            let (args, close) = self.parse_call_args(open)?;
                            let span = expr.span().to(close);
                            ast::Expr::Method(ast::Call { name, args, span })
                        }
                        (Token::Ident, span) => {
                            let key = ast::Key::Ident(ast::Ident { span });
                            let span = expr.span().to(span);
                            ast::Expr::Member(Box::new(ast::Member {
                                target: expr,
                                key,
                                span,
                            }))
                        }
                        (Token::Number, span) => {
                            let index = self.parse_index(span)?;
                            let key = ast::Key::Index(index, span);
                            let span = expr.span().to(span);
                            ast::Expr::Member(Box::new(ast::Member {
                                target: expr,
                                key,
                                span,
                            }))
                        }
                        (tk, span) => {
                            return Err(self.err_unexpected_token("identifier or index", tk, span));
                        }
                    };
                }
                Some((Token::LBracket, _)) => {
                    self.expect(Token::LBracket)?;
                    let index = self.parse_expr()?;
                    let close = self.expect(Token::RBracket)?;
                    let span = expr.span().to(close);
                    expr = ast::Expr::Index(Box::new(ast::IndexExpr {
                        target: expr,
                        index,
                        span,
                    }));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Parses a variable, literal, function call or parenthesized expression.
    fn parse_primary(&mut self) -> Result<ast::Expr> {
        let expr = match self.parse()? {
            (Token::Keyword, span) => {
                let value = match Keyword::from_str(&self.source()[span]) {
                    Keyword::True => Value::Bool(true),
                    Keyword::False => Value::Bool(false),
                    Keyword::Null | Keyword::None => Value::None,
                    kw => return Err(self.err_unexpected_keyword(kw.human(), span)),
                };
                ast::Expr::Literal(ast::Literal { value, span })
            }

            (Token::Number, span) => {
                let value = self.parse_number(span)?;
                ast::Expr::Literal(ast::Literal { value, span })
            }

            (Token::String, span) => {
                let value = Value::String(self.parse_string(span)?);
                ast::Expr::Literal(ast::Literal { value, span })
            }

            (Token::Ident, span) => {
                let name = ast::Ident { span };
                if self.is_next(Token::LParen)? {
                    let open = self.expect(Token::LParen)?;
                    let (args, close) = self.parse_call_args(open)?;
                    let span = span.to(close);
                    ast::Expr::Call(ast::Call { name, args, span })
                } else {
                    ast::Expr::Var(name)
                }
            }

            (Token::LParen, _) => {
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                expr
            }

            (Token::LBracket, open) => self.parse_list_or_map(open)?,

            (tk, span) => {
                return Err(self.err_unexpected_token("expression", tk, span));
            }
        };
        Ok(expr)
    }

    /// Parses call arguments after the opening parenthesis, a trailing comma
    /// is allowed. Returns the arguments and the span of the closing
    /// parenthesis.
    fn parse_call_args(&mut self, open: Span) -> Result<(Vec<ast::Expr>, Span)> {
        let mut args = Vec::new();
        loop {
            if self.is_next(Token::RParen)? {
                break;
            }
            args.push(self.parse_expr()?);
            if !self.is_next(Token::Comma)? {
                break;
            }
            self.expect(Token::Comma)?;
        }
        let close = self.expect(Token::RParen)?;
        Ok((args, open.to(close)))
    }

    /// Parses a list or map literal after the opening bracket.
    ///
    ///   [1, 2, 3]
    ///
    ///   ['name' => 'John', 'age' => 42]
    ///
    fn parse_list_or_map(&mut self, open: Span) -> Result<ast::Expr> {
        if self.is_next(Token::RBracket)? {
            let close = self.expect(Token::RBracket)?;
            let span = open.to(close);
            return Ok(ast::Expr::List(ast::ListExpr {
                items: Vec::new(),
                span,
            }));
        }

        let first = self.parse_expr()?;

        if self.is_next(Token::FatArrow)? {
            self.expect(Token::FatArrow)?;
            let value = self.parse_expr()?;
            let mut entries = vec![(first, value)];
            while self.is_next(Token::Comma)? {
                self.expect(Token::Comma)?;
                if self.is_next(Token::RBracket)? {
                    break;
                }
                let key = self.parse_expr()?;
                self.expect(Token::FatArrow)?;
                let value = self.parse_expr()?;
                entries.push((key, value));
            }
            let close = self.expect(Token::RBracket)?;
            let span = open.to(close);
            return Ok(ast::Expr::Map(ast::MapExpr { entries, span }));
        }

        let mut items = vec![first];
        while self.is_next(Token::Comma)? {
            self.expect(Token::Comma)?;
            if self.is_next(Token::RBracket)? {
                break;
            }
            items.push(self.parse_expr()?);
        }
        let close = self.expect(Token::RBracket)?;
        let span = open.to(close);
        Ok(ast::Expr::List(ast::ListExpr { items, span }))
    }

    fn parse_index(&self, span: Span) -> Result<usize> {
        self.source()[span].replace('_', "").parse().map_err(|_| {
            Error::syntax(
                format!(
                    "base 10 literal out of range for unsigned {}-bit integer",
                    usize::BITS
                ),
                self.source(),
                span,
            )
        })
    }

    /// Parses an integer or a float.
    fn parse_number(&self, span: Span) -> Result<Value> {
        let raw = self.source()[span].replace('_', "");
        if raw.contains('.') {
            let float: f64 = raw
                .parse()
                .map_err(|_| Error::syntax("invalid float literal", self.source(), span))?;
            return Ok(Value::Float(float));
        }
        let int: i64 = raw.parse().map_err(|_| {
            Error::syntax(
                "base 10 literal out of range for 64-bit integer",
                self.source(),
                span,
            )
        })?;
        Ok(Value::Integer(int))
    }

    /// Parses a string and handles escape characters.
    fn parse_string(&self, span: Span) -> Result<String> {
        let raw = &self.source()[span];
        let inner = &raw[1..raw.len() - 1];
        if !inner.contains('\\') {
            return Ok(inner.to_owned());
        }

        let mut iter = inner.char_indices().map(|(i, c)| (span.start + 1 + i, c));
        let mut string = String::with_capacity(inner.len());
        while let Some((i, c)) = iter.next() {
            if c != '\\' {
                string.push(c);
                continue;
            }
            // The lexer guarantees a backslash is never the last character
            // before the closing quote.
            let Some((_, esc)) = iter.next() else {
                break;
            };
            let c = match esc {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                '0' => '\0',
                '\\' => '\\',
                '\'' => '\'',
                '"' => '"',
                _ => {
                    return Err(Error::syntax(
                        "unknown escape character",
                        self.source(),
                        i..i + 1 + esc.len_utf8(),
                    ));
                }
            };
            string.push(c);
        }
        Ok(string)
    }

    fn is_runtime(&self, expr: &ast::Expr) -> bool {
        matches!(expr, ast::Expr::Var(ident) if &self.source()[ident.span] == "__env")
    }

    fn peek_binary_op(&mut self) -> Result<Option<ast::BinaryOp>> {
        let op = match self.peek()? {
            Some((tk, _)) => match tk {
                Token::Or => ast::BinaryOp::Or,
                Token::And => ast::BinaryOp::And,
                Token::Eq => ast::BinaryOp::Eq,
                Token::NotEq => ast::BinaryOp::NotEq,
                Token::Lt => ast::BinaryOp::Lt,
                Token::Le => ast::BinaryOp::Le,
                Token::Gt => ast::BinaryOp::Gt,
                Token::Ge => ast::BinaryOp::Ge,
                Token::Plus => ast::BinaryOp::Add,
                Token::Minus => ast::BinaryOp::Sub,
                Token::Star => ast::BinaryOp::Mul,
                Token::Slash => ast::BinaryOp::Div,
                Token::Percent => ast::BinaryOp::Rem,
                _ => return Ok(None),
            },
            None => return Ok(None),
        };
        Ok(Some(op))
    }

    /// Returns the keyword if the next token starts a statement.
    fn peek_statement_keyword(&mut self) -> Result<Option<Keyword>> {
        match self.peek()? {
            Some((Token::Keyword, span)) => {
                let kw = Keyword::from_str(&self.source()[span]);
                match kw {
                    Keyword::True | Keyword::False | Keyword::Null | Keyword::None => Ok(None),
                    kw => Ok(Some(kw)),
                }
            }
            _ => Ok(None),
        }
    }

    fn skip_comments(&mut self) -> Result<()> {
        while self.is_next(Token::Comment)? {
            self.expect(Token::Comment)?;
        }
        Ok(())
    }

    /// Expects the given keyword.
    fn expect_keyword(&mut self, exp: Keyword) -> Result<Span> {
        let (kw, span) = self.parse_keyword()?;
        if kw != exp {
            let exp = exp.human();
            let kw = kw.human();
            return Err(Error::syntax(
                format!("expected keyword `{exp}`, found keyword `{kw}`"),
                self.source(),
                span,
            ));
        }
        Ok(span)
    }

    /// Parses a keyword.
    fn parse_keyword(&mut self) -> Result<(Keyword, Span)> {
        let span = self.expect(Token::Keyword)?;
        let kw = &self.source()[span];
        Ok((Keyword::from_str(kw), span))
    }

    /// Parses an identifier.
    fn parse_ident(&mut self) -> Result<ast::Ident> {
        let span = self.expect(Token::Ident)?;
        Ok(ast::Ident { span })
    }

    /// Parses any token.
    fn parse(&mut self) -> Result<(Token, Span)> {
        match self.next()? {
            Some((tk, sp)) => Ok((tk, sp)),
            None => Err(self.err_unexpected_eof("token")),
        }
    }

    /// Peeks any token, failing at the end of the fragment.
    fn peek_token(&mut self) -> Result<(Token, Span)> {
        match self.peek()? {
            Some((tk, sp)) => Ok((tk, sp)),
            None => Err(self.err_unexpected_eof("end tag")),
        }
    }

    /// Parses the specified token and returns its span.
    fn expect(&mut self, exp: Token) -> Result<Span> {
        match self.next()? {
            Some((tk, span)) if tk == exp => Ok(span),
            Some((tk, span)) => Err(self.err_unexpected_token(exp.human(), tk, span)),
            None => Err(self.err_unexpected_eof(exp.human())),
        }
    }

    /// Returns `true` if the next token is equal to the provided one.
    fn is_next(&mut self, token: Token) -> Result<bool> {
        Ok(self.peek()?.map(|(tk, _)| tk == token).unwrap_or(false))
    }

    /// Returns a copy of the next token without affecting the result of the
    /// following `.next()` call.
    fn peek(&mut self) -> Result<Option<(Token, Span)>> {
        match self.peeked {
            Some(peeked) => Ok(peeked),
            None => {
                let next = self.tokens.next()?;
                self.peeked = Some(next);
                Ok(next)
            }
        }
    }

    /// Returns the next token and span in the stream.
    fn next(&mut self) -> Result<Option<(Token, Span)>> {
        match self.peeked.take() {
            Some(v) => Ok(v),
            None => self.tokens.next(),
        }
    }

    fn source(&self) -> &str {
        self.tokens.source
    }

    fn err_unexpected_eof(&self, exp: impl Display) -> Error {
        let n = self.source().len();
        Error::syntax(format!("expected {exp}, found EOF"), self.source(), n..n)
    }

    fn err_unexpected_token(&self, exp: impl Display, got: Token, span: Span) -> Error {
        let got = got.human();
        Error::syntax(format!("expected {exp}, found {got}"), self.source(), span)
    }

    fn err_unexpected_keyword(&self, kw: impl Display, span: Span) -> Error {
        Error::syntax(format!("unexpected keyword `{kw}`"), self.source(), span)
    }
}

fn push(scopes: &mut [ast::Scope], stmt: ast::Stmt) {
    match scopes.last_mut() {
        Some(scope) => scope.stmts.push(stmt),
        None => unreachable!("parser bug: no scope to push to"),
    }
}

fn pop(scopes: &mut Vec<ast::Scope>) -> ast::Scope {
    match scopes.pop() {
        Some(scope) => scope,
        None => unreachable!("parser bug: no scope to pop"),
    }
}

impl Keyword {
    pub(crate) const fn all() -> &'static [&'static str] {
        &[
            "if",
            "elseif",
            "else",
            "endif",
            "foreach",
            "as",
            "endforeach",
            "for",
            "endfor",
            "while",
            "endwhile",
            "echo",
            "true",
            "false",
            "null",
            "none",
        ]
    }

    const fn human(&self) -> &'static str {
        match self {
            Self::If => "if",
            Self::ElseIf => "elseif",
            Self::Else => "else",
            Self::EndIf => "endif",
            Self::ForEach => "foreach",
            Self::As => "as",
            Self::EndForEach => "endforeach",
            Self::For => "for",
            Self::EndFor => "endfor",
            Self::While => "while",
            Self::EndWhile => "endwhile",
            Self::Echo => "echo",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::None => "none",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "if" => Self::If,
            "elseif" => Self::ElseIf,
            "else" => Self::Else,
            "endif" => Self::EndIf,
            "foreach" => Self::ForEach,
            "as" => Self::As,
            "endforeach" => Self::EndForEach,
            "for" => Self::For,
            "endfor" => Self::EndFor,
            "while" => Self::While,
            "endwhile" => Self::EndWhile,
            "echo" => Self::Echo,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "none" => Self::None,
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn parse_raw_only() {
        let template = parse("lorem ipsum").unwrap();
        assert!(matches!(template.scope.stmts[..], [ast::Stmt::Raw(_)]));
    }

    #[test]
    fn parse_multiple_statements_in_one_tag() {
        let template = parse("<% x = 1; x += 2; echo x; %>").unwrap();
        assert!(matches!(
            template.scope.stmts[..],
            [
                ast::Stmt::Assign(_),
                ast::Stmt::Assign(_),
                ast::Stmt::Echo(_)
            ]
        ));
    }

    #[test]
    fn parse_comments_are_dropped() {
        let template = parse("a<% /* note */ %>b<% // line %>c").unwrap();
        assert_eq!(template.scope.stmts.len(), 3);
    }

    #[test]
    fn parse_elseif_desugars() {
        let template =
            parse("<% if (a): %>1<% elseif (b): %>2<% else: %>3<% endif; %>").unwrap();
        match &template.scope.stmts[..] {
            [ast::Stmt::IfElse(outer)] => match &outer.else_branch {
                Some(scope) => {
                    assert!(matches!(scope.stmts[..], [ast::Stmt::IfElse(_)]));
                }
                None => panic!("expected else branch"),
            },
            _ => panic!("expected a single if statement"),
        }
    }

    #[test]
    fn parse_foreach_key_value() {
        let template = parse("<% foreach (items as k => v): %>x<% endforeach; %>").unwrap();
        match &template.scope.stmts[..] {
            [ast::Stmt::ForEach(ast::ForEach {
                vars: ast::LoopVars::KeyValue(_),
                ..
            })] => {}
            _ => panic!("expected a key value loop"),
        }
    }

    #[test]
    fn parse_for_loop() {
        let template = parse("<% for (i = 0; i < 3; i++): %><% endfor; %>").unwrap();
        match &template.scope.stmts[..] {
            [ast::Stmt::For(ast::For {
                init: Some(_),
                cond: Some(_),
                step: Some(ast::Assign {
                    op: ast::AssignOp::Incr,
                    ..
                }),
                ..
            })] => {}
            _ => panic!("expected a for loop"),
        }
    }

    #[test]
    fn parse_precedence() {
        let source = "<% echo 1 + 2 * 3 == 7 && !done; %>";
        let template = parse(source).unwrap();
        match &template.scope.stmts[..] {
            [ast::Stmt::Echo(ast::Expr::Binary(and))] => {
                assert_eq!(and.op, ast::BinaryOp::And);
                assert_eq!(&source[and.lhs.span()], "1 + 2 * 3 == 7");
                assert!(matches!(and.rhs, ast::Expr::Unary(_)));
            }
            _ => panic!("expected an and expression"),
        }
    }

    #[test]
    fn parse_runtime_call() {
        let template = parse("<% echo __env.make('a', defined_vars()); %>").unwrap();
        match &template.scope.stmts[..] {
            [ast::Stmt::Echo(ast::Expr::Method(call))] => assert_eq!(call.args.len(), 2),
            _ => panic!("expected a runtime call"),
        }
    }

    #[test]
    fn parse_method_on_variable_is_error() {
        let err = parse("<% user.name(); %>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn parse_unclosed_if() {
        let err = parse("<% if (a): %>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn parse_unexpected_endforeach() {
        let err = parse("<% if (a): %><% endforeach; %>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn parse_string_escapes() {
        let template = parse(r#"<% echo 'it\'s\n'; %>"#).unwrap();
        match &template.scope.stmts[..] {
            [ast::Stmt::Echo(ast::Expr::Literal(lit))] => {
                assert_eq!(lit.value, Value::from("it's\n"));
            }
            _ => panic!("expected a string literal"),
        }
    }

    #[test]
    fn parse_nested_too_deeply() {
        let source = format!("<% echo {}1{}; %>", "(".repeat(20_000), ")".repeat(20_000));
        let err = parse(&source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.to_string().starts_with("expression nested too deeply"));

        let source = format!("<% echo {}true; %>", "!".repeat(20_000));
        assert_eq!(parse(&source).unwrap_err().kind(), ErrorKind::Syntax);
    }

    #[test]
    fn parse_nested_within_limit() {
        let source = format!("<% echo {}1{}; %>", "[".repeat(100), "]".repeat(100));
        assert!(parse(&source).is_ok());
    }

    fn parse(source: &str) -> Result<ast::Template> {
        Parser::new(source).parse_template()
    }
}
