//! Host functions callable from fragments, e.g. `<% echo lower(name); %>`.

mod args;
#[cfg(feature = "builtins")]
pub mod builtins;

use crate::{Error, Result, Value};

pub type FunctionFn = dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static;

pub fn new<F, R, A>(f: F) -> Box<FunctionFn>
where
    F: Function<R, A> + Send + Sync + 'static,
    R: FunctionReturn,
    A: FunctionArgs,
{
    Box::new(move |values: Vec<Value>| -> Result<Value> {
        let args = A::from_values(values)?;
        let result = Function::call(&f, args);
        FunctionReturn::to_value(result)
    })
}

/// Represents any host function.
///
/// This trait is used by the
/// [`Environment::add_function`][crate::Environment::add_function] method to
/// abstract over a variety of function and closure types. Functions can take
/// up to four arguments. The renderer checks the number of arguments and the
/// type of each argument when the function is called.
///
/// [`Function`] is implemented for functions that return any of the following
/// types.
///
/// - `R` where `R` implements `Into<Value>`, this includes `Option<R>`
/// - `Result<R>` where `R` implements `Into<Value>`
///
/// [`Function`] is implemented for functions that take any of the following
/// owned types as arguments.
/// - [`bool`]
/// - [`i64`]
/// - [`f64`]
/// - [`String`]
/// - [`Vec<Value>`]
/// - [`Map<String, Value>`][crate::Map]
/// - [`Value`]
///
/// ## Examples
///
/// ```rust
/// use sabre::{Environment, MemoryStore};
///
/// let mut env = Environment::new(MemoryStore::new());
/// env.add_function("repeat", repeat);
///
/// fn repeat(s: String, n: i64) -> String {
///     s.repeat(n.max(0) as usize)
/// }
/// ```
pub trait Function<R, A>
where
    A: FunctionArgs,
{
    #[doc(hidden)]
    fn call(&self, args: A) -> R;
}

pub trait FunctionArgs: Sized {
    #[doc(hidden)]
    fn from_values(values: Vec<Value>) -> Result<Self>;
}

pub trait FunctionArg: Sized {
    #[doc(hidden)]
    fn from_value(v: Value) -> args::Result<Self>;
}

pub trait FunctionReturn {
    #[doc(hidden)]
    fn to_value(self) -> Result<Value>;
}

////////////////////////////////////////////////////////////////////////////////
// Function
////////////////////////////////////////////////////////////////////////////////

impl<Func, R> Function<R, ()> for Func
where
    Func: Fn() -> R,
    R: FunctionReturn,
{
    #[doc(hidden)]
    fn call(&self, (): ()) -> R {
        self()
    }
}

impl<Func, R, A> Function<R, (A,)> for Func
where
    Func: Fn(A) -> R,
    R: FunctionReturn,
    A: FunctionArg,
{
    #[doc(hidden)]
    fn call(&self, (a,): (A,)) -> R {
        self(a)
    }
}

impl<Func, R, A, B> Function<R, (A, B)> for Func
where
    Func: Fn(A, B) -> R,
    R: FunctionReturn,
    A: FunctionArg,
    B: FunctionArg,
{
    #[doc(hidden)]
    fn call(&self, (a, b): (A, B)) -> R {
        self(a, b)
    }
}

impl<Func, R, A, B, C> Function<R, (A, B, C)> for Func
where
    Func: Fn(A, B, C) -> R,
    R: FunctionReturn,
    A: FunctionArg,
    B: FunctionArg,
    C: FunctionArg,
{
    #[doc(hidden)]
    fn call(&self, (a, b, c): (A, B, C)) -> R {
        self(a, b, c)
    }
}

impl<Func, R, A, B, C, D> Function<R, (A, B, C, D)> for Func
where
    Func: Fn(A, B, C, D) -> R,
    R: FunctionReturn,
    A: FunctionArg,
    B: FunctionArg,
    C: FunctionArg,
    D: FunctionArg,
{
    #[doc(hidden)]
    fn call(&self, (a, b, c, d): (A, B, C, D)) -> R {
        self(a, b, c, d)
    }
}

////////////////////////////////////////////////////////////////////////////////
// FunctionArgs
////////////////////////////////////////////////////////////////////////////////

impl FunctionArgs for () {
    fn from_values(values: Vec<Value>) -> Result<Self> {
        check_args(&values, 0)
    }
}

impl<A> FunctionArgs for (A,)
where
    A: FunctionArg,
{
    fn from_values(values: Vec<Value>) -> Result<Self> {
        check_args(&values, 1)?;
        let mut iter = values.into_iter().enumerate();
        Ok((next_arg(&mut iter)?,))
    }
}

impl<A, B> FunctionArgs for (A, B)
where
    A: FunctionArg,
    B: FunctionArg,
{
    fn from_values(values: Vec<Value>) -> Result<Self> {
        check_args(&values, 2)?;
        let mut iter = values.into_iter().enumerate();
        Ok((next_arg(&mut iter)?, next_arg(&mut iter)?))
    }
}

impl<A, B, C> FunctionArgs for (A, B, C)
where
    A: FunctionArg,
    B: FunctionArg,
    C: FunctionArg,
{
    fn from_values(values: Vec<Value>) -> Result<Self> {
        check_args(&values, 3)?;
        let mut iter = values.into_iter().enumerate();
        Ok((
            next_arg(&mut iter)?,
            next_arg(&mut iter)?,
            next_arg(&mut iter)?,
        ))
    }
}

impl<A, B, C, D> FunctionArgs for (A, B, C, D)
where
    A: FunctionArg,
    B: FunctionArg,
    C: FunctionArg,
    D: FunctionArg,
{
    fn from_values(values: Vec<Value>) -> Result<Self> {
        check_args(&values, 4)?;
        let mut iter = values.into_iter().enumerate();
        Ok((
            next_arg(&mut iter)?,
            next_arg(&mut iter)?,
            next_arg(&mut iter)?,
            next_arg(&mut iter)?,
        ))
    }
}

fn check_args(values: &[Value], exp: usize) -> Result<()> {
    if values.len() == exp {
        Ok(())
    } else {
        Err(Error::from(format!(
            "function expected {exp} arguments, found {}",
            values.len()
        )))
    }
}

fn next_arg<T, I>(iter: &mut I) -> Result<T>
where
    T: FunctionArg,
    I: Iterator<Item = (usize, Value)>,
{
    match iter.next() {
        Some((i, v)) => T::from_value(v).map_err(|e| err_expected_arg(e, i)),
        None => Err(Error::from("function expected more arguments")),
    }
}

fn err_expected_arg(err: args::Error, i: usize) -> Error {
    let n = i + 1;
    let msg = match err {
        args::Error::Type(exp, got) => {
            format!("function expected {exp} for argument {n}, found {got}")
        }
    };
    Error::from(msg)
}

////////////////////////////////////////////////////////////////////////////////
// FunctionReturn
////////////////////////////////////////////////////////////////////////////////

impl<T> FunctionReturn for T
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        Ok(self.into())
    }
}

impl<T> FunctionReturn for Result<T>
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        self.map(Into::into)
    }
}

/// Registers the builtin functions.
#[cfg(feature = "builtins")]
pub(crate) fn register_builtins(
    functions: &mut std::collections::BTreeMap<String, Box<FunctionFn>>,
) {
    let mut add = |name: &str, f: Box<FunctionFn>| {
        functions.insert(name.to_owned(), f);
    };
    add("len", new(builtins::len));
    add("count", new(builtins::len));
    add("lower", new(builtins::lower));
    add("upper", new(builtins::upper));
    add("trim", new(builtins::trim));
    add("join", new(builtins::join));
    add("keys", new(builtins::keys));
    add("values", new(builtins::values));
    add("e", new(builtins::e));
    add("range", new(builtins::range));
    add("default", new(builtins::default));
    add("time", new(builtins::time));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn function_zero_args() {
        let f = new(|| 7_i64);
        assert_eq!(f(vec![]).unwrap(), Value::Integer(7));
    }

    #[test]
    fn function_typed_args() {
        let f = new(|s: String, n: i64| s.repeat(n as usize));
        let v = f(vec![Value::from("ab"), Value::from(2)]).unwrap();
        assert_eq!(v, Value::from("abab"));
    }

    #[test]
    fn function_wrong_arity() {
        let f = new(|s: String| s);
        let err = f(vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
        assert!(err.to_string().contains("expected 1 arguments, found 0"));
    }

    #[test]
    fn function_wrong_type() {
        let f = new(|s: String| s);
        let err = f(vec![Value::Bool(true)]).unwrap_err();
        assert!(err
            .to_string()
            .contains("function expected string for argument 1, found bool"));
    }

    #[test]
    fn function_option_return() {
        let f = new(|list: Vec<Value>| list.into_iter().next());
        assert_eq!(f(vec![Value::List(vec![])]).unwrap(), Value::None);
    }
}
