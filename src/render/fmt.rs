use std::fmt::Write;

use crate::{Error, Result, Value};

/// The default value formatter.
///
/// Values are formatted as follows:
/// - [`Value::None`]: empty string
/// - [`Value::Bool`]: `true` or `false`
/// - [`Value::Integer`]: the integer formatted using [`Display`][std::fmt::Display]
/// - [`Value::Float`]: the float formatted using [`Display`][std::fmt::Display]
/// - [`Value::String`]: the string, unescaped
///
/// Lists and maps cannot be formatted and produce an error.
pub fn format(buf: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::None => {}
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Integer(n) => write!(buf, "{n}").map_err(err_write)?,
        Value::Float(n) => write!(buf, "{n}").map_err(err_write)?,
        Value::String(s) => buf.push_str(s),
        value => {
            return Err(Error::from(format!(
                "expected renderable value, but expression evaluated to {}",
                value.human()
            )));
        }
    }
    Ok(())
}

fn err_write(_: std::fmt::Error) -> Error {
    Error::from("failed to format value")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn format_scalars() {
        let mut buf = String::new();
        for value in [
            Value::None,
            Value::Bool(true),
            Value::Integer(-3),
            Value::Float(1.5),
            Value::Float(2.0),
            Value::from("x"),
        ] {
            format(&mut buf, &value).unwrap();
            buf.push('|');
        }
        assert_eq!(buf, "|true|-3|1.5|2|x|");
    }

    #[test]
    fn format_list_is_error() {
        let err = format(&mut String::new(), &Value::List(vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
    }
}
