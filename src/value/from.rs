//! Conversions from Rust types into template values.

use crate::value::Map;
use crate::Value;

macro_rules! from {
    ($($ty:ty => |$v:ident| $conv:expr;)+) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }
        )+
    };
}

from! {
    () => |_v| Value::None;
    bool => |v| Value::Bool(v);
    i8 => |v| Value::Integer(v.into());
    i16 => |v| Value::Integer(v.into());
    i32 => |v| Value::Integer(v.into());
    i64 => |v| Value::Integer(v);
    u8 => |v| Value::Integer(v.into());
    u16 => |v| Value::Integer(v.into());
    u32 => |v| Value::Integer(v.into());
    usize => |v| Value::Integer(i64::try_from(v).unwrap_or(i64::MAX));
    f32 => |v| Value::Float(v.into());
    f64 => |v| Value::Float(v);
    String => |v| Value::String(v);
    &str => |v| Value::String(v.to_owned());
    Map<String, Value> => |v| Value::Map(v);
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(v: Option<V>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(v: Vec<V>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Value {
    fn from(v: [V; N]) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Builds a map value from `(key, value)` pairs.
impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Value {
    fn from(v: [(K, V); N]) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<V: Into<Value>> FromIterator<V> for Value {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Value::List(iter.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
