//! AST representing a compiled fragment.

use crate::types::span::Span;
use crate::Value;

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Template {
    pub scope: Scope,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Scope {
    pub stmts: Vec<Stmt>,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub enum Stmt {
    Raw(Span),
    Echo(Expr),
    Eval(Expr),
    Assign(Assign),
    IfElse(IfElse),
    ForEach(ForEach),
    For(For),
    While(While),
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Assign {
    pub name: Ident,
    pub op: AssignOp,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Incr,
    Decr,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct IfElse {
    pub cond: Expr,
    pub then_branch: Scope,
    pub else_branch: Option<Scope>,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct ForEach {
    pub vars: LoopVars,
    pub iterable: Expr,
    pub body: Scope,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub enum LoopVars {
    Item(Ident),
    KeyValue(KeyValue),
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct KeyValue {
    pub key: Ident,
    pub value: Ident,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct For {
    pub init: Option<Assign>,
    pub cond: Option<Expr>,
    pub step: Option<Assign>,
    pub body: Scope,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct While {
    pub cond: Expr,
    pub body: Scope,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub enum Expr {
    Literal(Literal),
    Var(Ident),
    List(ListExpr),
    Map(MapExpr),
    Member(Box<Member>),
    Index(Box<IndexExpr>),
    Call(Call),
    Method(Call),
    Unary(Box<Unary>),
    Binary(Box<Binary>),
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Literal {
    pub value: Value,
    pub span: Span,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct ListExpr {
    pub items: Vec<Expr>,
    pub span: Span,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct MapExpr {
    pub entries: Vec<(Expr, Expr)>,
    pub span: Span,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Member {
    pub target: Expr,
    pub key: Key,
    pub span: Span,
}

#[derive(Clone, Copy)]
#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub enum Key {
    Ident(Ident),
    Index(usize, Span),
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct IndexExpr {
    pub target: Expr,
    pub index: Expr,
    pub span: Span,
}

/// A function call `f(args)`, or a runtime call `__env.f(args)`.
#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Call {
    pub name: Ident,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub enum UnaryOp {
    Not,
    Neg,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Unary {
    pub op: UnaryOp,
    pub expr: Expr,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Binary {
    pub op: BinaryOp,
    pub lhs: Expr,
    pub rhs: Expr,
    pub span: Span,
}

#[derive(Clone, Copy)]
#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Ident {
    pub span: Span,
}

impl Scope {
    pub const fn new() -> Self {
        Self { stmts: Vec::new() }
    }
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Self::Literal(lit) => lit.span,
            Self::Var(ident) => ident.span,
            Self::List(list) => list.span,
            Self::Map(map) => map.span,
            Self::Member(member) => member.span,
            Self::Index(index) => index.span,
            Self::Call(call) | Self::Method(call) => call.span,
            Self::Unary(unary) => unary.span,
            Self::Binary(binary) => binary.span,
        }
    }
}

impl Key {
    pub const fn span(&self) -> Span {
        match self {
            Self::Ident(ident) => ident.span,
            Self::Index(_, span) => *span,
        }
    }
}

impl BinaryOp {
    /// Binding power, higher binds tighter.
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq => 3,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }
}
