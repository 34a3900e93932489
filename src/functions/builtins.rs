//! Builtin functions.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::render::fmt;
use crate::value::{List, Map};
use crate::{Error, Result, Value};

/// Returns the number of characters in a string or elements in a list or
/// map.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn len(value: Value) -> Result<i64> {
    let n = match value {
        Value::String(s) => s.chars().count(),
        Value::List(l) => l.len(),
        Value::Map(m) => m.len(),
        value => return Err(Error::from(format!("unsupported value `{}`", value.human()))),
    };
    Ok(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Returns the lowercase equivalent of this string.
///
/// See [`str::to_lowercase`].
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn lower(s: String) -> String {
    s.to_lowercase()
}

/// Returns the uppercase equivalent of this string.
///
/// See [`str::to_uppercase`].
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn upper(s: String) -> String {
    s.to_uppercase()
}

/// Returns the string with leading and trailing whitespace removed.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn trim(s: String) -> String {
    s.trim().to_owned()
}

/// Formats each element of the list and joins them with the separator.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn join(list: List<Value>, sep: String) -> Result<String> {
    let mut buf = String::new();
    for (i, value) in list.iter().enumerate() {
        if i > 0 {
            buf.push_str(&sep);
        }
        fmt::format(&mut buf, value)?;
    }
    Ok(buf)
}

/// Returns the map keys as a list.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn keys(map: Map<String, Value>) -> List<String> {
    map.into_keys().collect()
}

/// Returns the map values as a list.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn values(map: Map<String, Value>) -> List<Value> {
    map.into_values().collect()
}

/// Formats the value and escapes HTML special characters.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn e(value: Value) -> Result<String> {
    let mut raw = String::new();
    fmt::format(&mut raw, &value)?;
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            c => escaped.push(c),
        }
    }
    Ok(escaped)
}

/// Returns the integers from `start` to `end` inclusive.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn range(start: i64, end: i64) -> List<Value> {
    if start <= end {
        (start..=end).map(Value::Integer).collect()
    } else {
        (end..=start).rev().map(Value::Integer).collect()
    }
}

/// If the value is `None` returns the given default instead, otherwise returns
/// the value.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn default(value: Value, default: Value) -> Value {
    match value {
        Value::None => default,
        value => value,
    }
}

/// Returns the number of seconds since the Unix epoch.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn time() -> Result<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| Error::from(err.to_string()))?;
    Ok(i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_counts_chars() {
        assert_eq!(len(Value::from("héllo")).unwrap(), 5);
        assert_eq!(len(Value::from(vec![1, 2])).unwrap(), 2);
        assert!(len(Value::Bool(true)).is_err());
    }

    #[test]
    fn join_formats_values() {
        let list = vec![Value::from("a"), Value::from(1), Value::None];
        assert_eq!(join(list, ", ".into()).unwrap(), "a, 1, ");
    }

    #[test]
    fn e_escapes_html() {
        let s = e(Value::from("<a href=\"x\">Tom & 'Jerry'</a>")).unwrap();
        assert_eq!(
            s,
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn range_is_inclusive() {
        assert_eq!(range(1, 3), vec![1.into(), 2.into(), 3.into()] as Vec<Value>);
        assert_eq!(range(2, 1), vec![2.into(), 1.into()] as Vec<Value>);
    }
}
