/// Convenient macro for constructing a [`Value`][crate::Value] map.
///
/// Keys are identifiers, values are nested maps `{ ... }`, lists `[ ... ]`,
/// `None`, or any expression that implements `Into<Value>`.
///
/// # Examples
///
/// ```
/// let data = sabre::value! {
///     user: { name: "John Smith", age: 42 },
///     tags: ["admin", "staff"],
///     manager: None,
/// };
/// ```
#[macro_export]
macro_rules! value {
    ($($tt:tt)*) => {
        $crate::_value!({ $($tt)* })
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! _value {
    //////////////////////////////////////////////////////////////////////////
    // TT muncher for the inside of a list [...].
    //
    // Must be invoked as: _value!(@list [] $($tt)*)
    //////////////////////////////////////////////////////////////////////////

    // Done.
    (@list [$($elems:expr,)*]) => {
        ::std::vec![$($elems,)*]
    };

    // Next element is `None`.
    (@list [$($elems:expr,)*] None $(, $($rest:tt)*)?) => {
        $crate::_value!(@list [$($elems,)* $crate::Value::None,] $($($rest)*)?)
    };

    // Next element is a list.
    (@list [$($elems:expr,)*] [$($list:tt)*] $(, $($rest:tt)*)?) => {
        $crate::_value!(@list [$($elems,)* $crate::_value!([$($list)*]),] $($($rest)*)?)
    };

    // Next element is a map.
    (@list [$($elems:expr,)*] {$($map:tt)*} $(, $($rest:tt)*)?) => {
        $crate::_value!(@list [$($elems,)* $crate::_value!({$($map)*}),] $($($rest)*)?)
    };

    // Next element is an expression followed by a comma.
    (@list [$($elems:expr,)*] $next:expr, $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)* $crate::Value::from($next),] $($rest)*)
    };

    // Last element is an expression with no trailing comma.
    (@list [$($elems:expr,)*] $last:expr) => {
        $crate::_value!(@list [$($elems,)* $crate::Value::from($last),])
    };

    //////////////////////////////////////////////////////////////////////////
    // TT muncher for the inside of a map {...}. Each entry is inserted into
    // the given map variable.
    //
    // Must be invoked as: _value!(@map $map $($tt)*)
    //////////////////////////////////////////////////////////////////////////

    // Done.
    (@map $map:ident) => {};

    // Next value is `None`.
    (@map $map:ident $key:ident : None $(, $($rest:tt)*)?) => {
        let _ = $map.insert(::std::string::String::from(stringify!($key)), $crate::Value::None);
        $crate::_value!(@map $map $($($rest)*)?);
    };

    // Next value is a list.
    (@map $map:ident $key:ident : [$($list:tt)*] $(, $($rest:tt)*)?) => {
        let _ = $map.insert(
            ::std::string::String::from(stringify!($key)),
            $crate::_value!([$($list)*]),
        );
        $crate::_value!(@map $map $($($rest)*)?);
    };

    // Next value is a map.
    (@map $map:ident $key:ident : {$($inner:tt)*} $(, $($rest:tt)*)?) => {
        let _ = $map.insert(
            ::std::string::String::from(stringify!($key)),
            $crate::_value!({$($inner)*}),
        );
        $crate::_value!(@map $map $($($rest)*)?);
    };

    // Next value is an expression followed by a comma.
    (@map $map:ident $key:ident : $value:expr, $($rest:tt)*) => {
        let _ = $map.insert(
            ::std::string::String::from(stringify!($key)),
            $crate::Value::from($value),
        );
        $crate::_value!(@map $map $($rest)*);
    };

    // Last value is an expression with no trailing comma.
    (@map $map:ident $key:ident : $value:expr) => {
        let _ = $map.insert(
            ::std::string::String::from(stringify!($key)),
            $crate::Value::from($value),
        );
    };

    //////////////////////////////////////////////////////////////////////////
    // The main implementation.
    //////////////////////////////////////////////////////////////////////////

    ([ $($tt:tt)* ]) => {
        $crate::Value::List($crate::_value!(@list [] $($tt)*))
    };

    ({ $($tt:tt)* }) => {
        $crate::Value::Map({
            #[allow(unused_mut)]
            let mut map = $crate::Map::new();
            $crate::_value!(@map map $($tt)*);
            map
        })
    };
}

#[cfg(test)]
mod tests {
    use crate::{List, Map, Value};

    #[test]
    fn value_empty() {
        assert_eq!(value! {}, Value::Map(Map::new()));
    }

    #[test]
    fn value_scalars() {
        let v = value! { a: None, b: true, c: 1, d: -1.5, e: "x" };
        let exp = Value::from([
            ("a", Value::None),
            ("b", Value::Bool(true)),
            ("c", Value::Integer(1)),
            ("d", Value::Float(-1.5)),
            ("e", Value::from("x")),
        ]);
        assert_eq!(v, exp);
    }

    #[test]
    fn value_nested() {
        let v = value! {
            user: { name: "John", roles: ["a", None, {}] },
            empty: [],
        };
        let exp = Value::from([
            (
                "user",
                Value::from([
                    ("name", Value::from("John")),
                    (
                        "roles",
                        Value::List(vec![
                            Value::from("a"),
                            Value::None,
                            Value::Map(Map::new()),
                        ]),
                    ),
                ]),
            ),
            ("empty", Value::List(List::new())),
        ]);
        assert_eq!(v, exp);
    }
}
