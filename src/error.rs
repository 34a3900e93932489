use std::cmp::max;
use std::fmt;
use std::io;

use crate::types::span::Span;

/// An error that can occur while loading, compiling or rendering a view.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    name: Option<String>,
    span: Option<(String, Span)>,
}

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The view name could not be resolved by the store.
    ViewNotFound,
    /// A section was stopped but no section was being captured.
    SectionUnderflow,
    /// A view finished rendering with a section still being captured.
    UnclosedSection,
    /// The compiled fragment could not be parsed.
    Syntax,
    /// The compiled fragment failed while executing.
    Render,
    /// Views were nested deeper than the configured maximum.
    MaxIncludeDepth,
    /// Reading or writing a view or its cached fragment failed.
    Io,
    /// View data could not be converted to a value.
    Serialize,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            name: None,
            span: None,
        }
    }

    pub(crate) fn view_not_found(name: &str) -> Self {
        Self::new(ErrorKind::ViewNotFound, format!("view `{name}` not found"))
    }

    pub(crate) fn section_underflow() -> Self {
        Self::new(
            ErrorKind::SectionUnderflow,
            "cannot stop a section without first starting one",
        )
    }

    pub(crate) fn unclosed_section(section: &str) -> Self {
        Self::new(
            ErrorKind::UnclosedSection,
            format!("section `{section}` was started but never stopped"),
        )
    }

    pub(crate) fn max_include_depth(max: usize) -> Self {
        Self::new(
            ErrorKind::MaxIncludeDepth,
            format!("reached maximum include depth ({max})"),
        )
    }

    pub(crate) fn syntax(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::new(ErrorKind::Syntax, msg).with_span(source, span)
    }

    pub(crate) fn render(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::new(ErrorKind::Render, msg).with_span(source, span)
    }

    /// Attaches a source location, unless the error already has one.
    pub(crate) fn with_span(mut self, source: &str, span: impl Into<Span>) -> Self {
        if self.span.is_none() {
            self.span = Some((source.to_owned(), span.into()));
        }
        self
    }

    /// Attaches the view name, unless the error already has one. Errors from
    /// nested views therefore keep the name of the innermost view.
    pub(crate) fn with_view_name(mut self, name: &str) -> Self {
        if self.name.is_none() {
            self.name = Some(name.to_owned());
        }
        self
    }

    /// Returns the category of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the name of the view that caused this error, if known.
    #[inline]
    pub fn view_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self::new(ErrorKind::Render, msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Self::new(ErrorKind::Render, msg)
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::new(ErrorKind::Serialize, msg.to_string())
    }
}

impl std::error::Error for Error {}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => {
                write_header(self, f)?;
                fmt_pretty(&self.msg, source, *span, f)
            }
            None => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) if f.alternate() => {
                write_header(self, f)?;
                fmt_pretty(&self.msg, source, *span, f)
            }
            Some((_, span)) => {
                write!(f, "{} between bytes {} and {}", self.msg, span.start, span.end)?;
                if let Some(name) = &self.name {
                    write!(f, " in view `{name}`")?;
                }
                Ok(())
            }
            None => {
                write!(f, "{}", self.msg)?;
                if let Some(name) = &self.name {
                    write!(f, " in view `{name}`")?;
                }
                Ok(())
            }
        }
    }
}

fn write_header(err: &Error, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let what = match err.kind {
        ErrorKind::Syntax => "invalid fragment syntax",
        _ => "render error",
    };
    match &err.name {
        Some(name) => write!(f, "{what} in view `{name}`"),
        None => write!(f, "{what}"),
    }
}

fn fmt_pretty(msg: &str, source: &str, span: Span, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let lines: Vec<_> = source.split_terminator('\n').collect();
    let (line, col) = to_line_col(&lines, span.start);
    let width = max(1, display_width(&source[span]));
    let code = match lines.get(line).or_else(|| lines.last()) {
        Some(code) => *code,
        None => "",
    };

    let num = (line + 1).to_string();
    let pad = display_width(&num);
    let pipe = "|";
    let underline = "^".repeat(width);

    write!(
        f,
        "\n \
        {0:pad$} {pipe}\n \
        {num:>} {pipe} {code}\n \
        {0:pad$} {pipe} {underline:>width$} {msg}\n",
        "",
        pad = pad,
        pipe = pipe,
        num = num,
        code = code,
        underline = underline,
        width = col + width,
        msg = msg
    )
}

fn to_line_col(lines: &[&str], offset: usize) -> (usize, usize) {
    let mut n = 0;
    for (i, line) in lines.iter().enumerate() {
        let len = line.len() + 1;
        if n + len > offset {
            return (i, display_width(&line[..offset - n]));
        }
        n += len;
    }
    (lines.len(), lines.last().map(|l| display_width(l)).unwrap_or(0))
}

#[cfg(feature = "unicode")]
fn display_width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(not(feature = "unicode"))]
fn display_width(s: &str) -> usize {
    s.chars().count()
}
