//! Splits view source into a flat stream of pieces.
//!
//! The tokenizer only recognizes the authoring tokens: `{{-- --}}` comments,
//! `{{ }}` echos and `@name(args)` directives. Everything else is text. No
//! piece is ever rejected, anything that does not form a valid token is
//! simply left as text.

const COMMENT_OPEN: &str = "{{--";
const COMMENT_CLOSE: &str = "--}}";
const ECHO_OPEN: &str = "{{";
const ECHO_CLOSE: &str = "}}";

/// A unit of view source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Literal text, emitted as is.
    Text(String),

    /// Lowered fragment code, emitted as is.
    Code(String),

    /// A `{{-- text --}}` comment, or a `{{-- text` comment running to the end
    /// of the line.
    Comment {
        text: String,
        closed: bool,
        raw: String,
    },

    /// A `{{ expr }}` echo.
    Echo { expr: String, raw: String },

    /// An `@name` or `@name(args)` directive.
    Directive {
        kind: Kind,
        args: Option<String>,
        raw: String,
    },
}

/// The known directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Extends,
    If,
    ElseIf,
    ForEach,
    For,
    While,
    EndIf,
    EndForEach,
    EndFor,
    EndWhile,
    Else,
    Unless,
    EndUnless,
    Include,
    Each,
    Yield,
    Show,
    Section,
    Stop,
}

impl Kind {
    fn all() -> &'static [Kind] {
        use Kind::*;
        &[
            Extends, If, ElseIf, ForEach, For, While, EndIf, EndForEach, EndFor, EndWhile, Else,
            Unless, EndUnless, Include, Each, Yield, Show, Section, Stop,
        ]
    }

    /// Returns the directive name as written after the `@`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Extends => "extends",
            Self::If => "if",
            Self::ElseIf => "elseif",
            Self::ForEach => "foreach",
            Self::For => "for",
            Self::While => "while",
            Self::EndIf => "endif",
            Self::EndForEach => "endforeach",
            Self::EndFor => "endfor",
            Self::EndWhile => "endwhile",
            Self::Else => "else",
            Self::Unless => "unless",
            Self::EndUnless => "endunless",
            Self::Include => "include",
            Self::Each => "each",
            Self::Yield => "yield",
            Self::Show => "show",
            Self::Section => "section",
            Self::Stop => "stop",
        }
    }

    /// Whether the directive requires a parenthesized argument list.
    pub fn takes_args(self) -> bool {
        matches!(
            self,
            Self::Extends
                | Self::If
                | Self::ElseIf
                | Self::ForEach
                | Self::For
                | Self::While
                | Self::Unless
                | Self::Include
                | Self::Each
                | Self::Yield
                | Self::Section
        )
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.name() == name)
    }
}

impl Piece {
    /// Returns the original source of the piece.
    pub fn raw(&self) -> &str {
        match self {
            Self::Text(s) | Self::Code(s) => s,
            Self::Comment { raw, .. } | Self::Echo { raw, .. } | Self::Directive { raw, .. } => raw,
        }
    }
}

/// Splits the source into pieces.
///
/// Concatenating the raw source of the returned pieces reproduces the input.
pub fn tokenize(source: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while let Some(c) = source[i..].chars().next() {
        let found = match c {
            '{' => lex_braces(source, i),
            '@' => lex_directive(source, i),
            _ => None,
        };
        match found {
            Some((piece, end)) => {
                if text_start < i {
                    pieces.push(Piece::Text(source[text_start..i].to_owned()));
                }
                pieces.push(piece);
                i = end;
                text_start = end;
            }
            None => i += c.len_utf8(),
        }
    }

    if text_start < source.len() {
        pieces.push(Piece::Text(source[text_start..].to_owned()));
    }
    pieces
}

/// Lexes a comment or echo starting at `i`.
fn lex_braces(source: &str, i: usize) -> Option<(Piece, usize)> {
    let rest = &source[i..];

    if let Some(after) = rest.strip_prefix(COMMENT_OPEN) {
        let begin = i + COMMENT_OPEN.len();
        if let Some(j) = after.find(COMMENT_CLOSE) {
            let end = begin + j + COMMENT_CLOSE.len();
            let piece = Piece::Comment {
                text: after[..j].to_owned(),
                closed: true,
                raw: source[i..end].to_owned(),
            };
            return Some((piece, end));
        }
        // No close anywhere after, the comment runs to the end of the line and
        // the line break stays in the output.
        let j = after.find('\n')?;
        let text = after[..j].strip_suffix('\r').unwrap_or(&after[..j]);
        let end = begin + text.len();
        let piece = Piece::Comment {
            text: text.to_owned(),
            closed: false,
            raw: source[i..end].to_owned(),
        };
        return Some((piece, end));
    }

    let after = rest.strip_prefix(ECHO_OPEN)?;
    let j = after.find(ECHO_CLOSE)?;
    let expr = after[..j].trim();
    if expr.is_empty() {
        return None;
    }
    let end = i + ECHO_OPEN.len() + j + ECHO_CLOSE.len();
    let piece = Piece::Echo {
        expr: expr.to_owned(),
        raw: source[i..end].to_owned(),
    };
    Some((piece, end))
}

/// Lexes a directive starting at the `@` at `i`.
fn lex_directive(source: &str, i: usize) -> Option<(Piece, usize)> {
    let begin = i + 1;
    let len = source[begin..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(source.len() - begin);
    let kind = Kind::from_name(&source[begin..begin + len])?;
    let mut end = begin + len;

    let args = if kind.takes_args() {
        let open = end + source[end..].len() - source[end..].trim_start_matches([' ', '\t']).len();
        if !source[open..].starts_with('(') {
            return None;
        }
        let close = find_close_paren(source, open)?;
        end = close + 1;
        Some(source[open + 1..close].to_owned())
    } else {
        None
    };

    let piece = Piece::Directive {
        kind,
        args,
        raw: source[i..end].to_owned(),
    };
    Some((piece, end))
}

/// Returns the index of the parenthesis closing the one at `open`.
///
/// Parentheses inside single or double quoted strings are ignored and a
/// backslash escapes the next character within a string.
fn find_close_paren(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;

    for (j, c) in source[open..].char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(open + j);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(kind: Kind, args: Option<&str>, raw: &str) -> Piece {
        Piece::Directive {
            kind,
            args: args.map(String::from),
            raw: raw.into(),
        }
    }

    fn text(s: &str) -> Piece {
        Piece::Text(s.into())
    }

    #[test]
    fn tokenize_text_only() {
        assert_eq!(tokenize("hello world"), [text("hello world")]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn tokenize_echo() {
        let pieces = tokenize("Hi {{  name }}!");
        assert_eq!(
            pieces,
            [
                text("Hi "),
                Piece::Echo {
                    expr: "name".into(),
                    raw: "{{  name }}".into()
                },
                text("!"),
            ]
        );
    }

    #[test]
    fn tokenize_echo_unclosed_or_empty_is_text() {
        assert_eq!(tokenize("{{ name"), [text("{{ name")]);
        assert_eq!(tokenize("{{ }}"), [text("{{ }}")]);
    }

    #[test]
    fn tokenize_comment_closed_multiline() {
        let pieces = tokenize("{{-- a\nb --}}x");
        assert_eq!(
            pieces,
            [
                Piece::Comment {
                    text: " a\nb ".into(),
                    closed: true,
                    raw: "{{-- a\nb --}}".into()
                },
                text("x"),
            ]
        );
    }

    #[test]
    fn tokenize_comment_to_end_of_line() {
        let pieces = tokenize("{{-- note\r\nnext");
        assert_eq!(
            pieces,
            [
                Piece::Comment {
                    text: " note".into(),
                    closed: false,
                    raw: "{{-- note".into()
                },
                text("\r\nnext"),
            ]
        );
    }

    #[test]
    fn tokenize_comment_unclosed_without_newline_is_text() {
        assert_eq!(tokenize("{{-- note"), [text("{{-- note")]);
    }

    #[test]
    fn tokenize_directives() {
        let pieces = tokenize("@if (x)\na\n@endif");
        assert_eq!(
            pieces,
            [
                directive(Kind::If, Some("x"), "@if (x)"),
                text("\na\n"),
                directive(Kind::EndIf, None, "@endif"),
            ]
        );
    }

    #[test]
    fn tokenize_directive_balanced_args() {
        let pieces = tokenize("@include('a(', f(1, \"b)\\\"\"))!");
        assert_eq!(
            pieces,
            [
                directive(
                    Kind::Include,
                    Some("'a(', f(1, \"b)\\\"\")"),
                    "@include('a(', f(1, \"b)\\\"\"))"
                ),
                text("!"),
            ]
        );
    }

    #[test]
    fn tokenize_directive_missing_args_is_text() {
        assert_eq!(tokenize("@if x"), [text("@if x")]);
        assert_eq!(tokenize("@yield('a'"), [text("@yield('a'")]);
    }

    #[test]
    fn tokenize_unknown_directive_is_text() {
        assert_eq!(tokenize("@media screen"), [text("@media screen")]);
        assert_eq!(tokenize("@stopped"), [text("@stopped")]);
    }

    #[test]
    fn tokenize_directive_after_word() {
        assert_eq!(
            tokenize("Home@stop"),
            [text("Home"), directive(Kind::Stop, None, "@stop")]
        );
        assert_eq!(
            tokenize("x@include('part')y"),
            [
                text("x"),
                directive(Kind::Include, Some("'part'"), "@include('part')"),
                text("y")
            ]
        );
    }

    #[test]
    fn tokenize_longest_name_wins() {
        assert_eq!(
            tokenize("@endforeach"),
            [directive(Kind::EndForEach, None, "@endforeach")]
        );
        assert_eq!(
            tokenize("@elseif(a)"),
            [directive(Kind::ElseIf, Some("a"), "@elseif(a)")]
        );
    }

    #[test]
    fn tokenize_raw_roundtrip() {
        let source = "@section('a')\n{{-- c --}} {{ x }} @stop\n@yield('a')";
        let joined: String = tokenize(source).iter().map(Piece::raw).collect();
        assert_eq!(joined, source);
    }
}
