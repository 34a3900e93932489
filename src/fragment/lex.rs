use crate::fragment::parse::Keyword;
use crate::types::span::Span;
use crate::{Error, Result};

const BEGIN_TAG: &str = "<%";
const END_TAG: &str = "%>";

/// A lexer that tokenizes a compiled fragment into distinct chunks so that the
/// parser doesn't have to operate on raw text.
///
/// The lexer is implemented as a fallible iterator. The parser should
/// repeatedly call the [`.next()?`][Lexer::next] method to return the next
/// non-whitespace token until [`None`] is returned.
#[cfg_attr(any(test, internal_debug), derive(Debug))]
pub struct Lexer<'source> {
    /// The fragment source.
    pub source: &'source str,

    /// A cursor over the fragment source.
    cursor: usize,

    /// The current state of the lexer.
    state: State,

    /// A buffer to store the next token.
    next: Option<(Token, Span)>,
}

/// The state of the lexer.
///
/// Text outside of `<% ... %>` is passed through untouched, text inside is
/// tokenized as code.
#[cfg_attr(any(test, internal_debug), derive(Debug))]
enum State {
    /// Within raw text.
    Text,

    /// Between code tags.
    Code {
        /// The span of the begin tag.
        begin: Span,
    },
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Raw text
    Raw,
    /// Begin code tag `<%`
    BeginTag,
    /// End code tag `%>`
    EndTag,
    /// A `// line` or `/* block */` comment
    Comment,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
    /// `=>`
    FatArrow,
    /// `=`
    Assign,
    /// `+=`
    PlusAssign,
    /// `-=`
    MinusAssign,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
    /// Sequence of spaces, tabs and newlines
    Whitespace,
    /// A keyword like `if` or `foreach`
    Keyword,
    /// A variable or function name
    Ident,
    /// An integer or float literal, e.g. `19` or `0.5`
    Number,
    /// A string literal, e.g. `'Hello'` or `"World!\n"`
    String,
}

impl<'source> Lexer<'source> {
    /// Construct a new lexer.
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            cursor: 0,
            state: State::Text,
            next: None,
        }
    }

    /// Returns the next non-whitespace token and its span.
    pub fn next(&mut self) -> Result<Option<(Token, Span)>> {
        loop {
            match self.lex()? {
                Some((tk, sp)) if !tk.is_whitespace() => return Ok(Some((tk, sp))),
                None => return Ok(None),
                _ => continue,
            }
        }
    }

    /// Returns the next token and span.
    fn lex(&mut self) -> Result<Option<(Token, Span)>> {
        if let Some(next) = self.next.take() {
            return Ok(Some(next));
        }

        let i = self.cursor;

        if self.source[i..].is_empty() {
            if let State::Code { begin } = self.state {
                // Only report once, the cursor is at the end.
                self.state = State::Text;
                return Err(self.err_unclosed(begin));
            }
            return Ok(None);
        }

        match self.state {
            State::Text => Ok(self.lex_text(i)),
            State::Code { .. } => self.lex_code(i).map(Some),
        }
    }

    fn lex_text(&mut self, i: usize) -> Option<(Token, Span)> {
        // We are within raw text, that means all we have to do is find the
        // next begin tag from `i`.
        //
        // xxxxxxx<%xxxxxxxxx
        //    ^   ^ ^
        //    i   j k

        match self.source[i..].find(BEGIN_TAG) {
            Some(d) => {
                let j = i + d;
                let k = j + BEGIN_TAG.len();
                let begin = Span::from(j..k);
                self.cursor = k;
                self.state = State::Code { begin };
                if i == j {
                    Some((Token::BeginTag, begin))
                } else {
                    // We must first emit the raw token, so we store the
                    // begin tag token in the `next` buffer.
                    self.next = Some((Token::BeginTag, begin));
                    Some((Token::Raw, Span::from(i..j)))
                }
            }
            None => {
                let j = self.source.len();
                self.cursor = j;
                Some((Token::Raw, Span::from(i..j)))
            }
        }
    }

    fn lex_code(&mut self, i: usize) -> Result<(Token, Span)> {
        let rest = &self.source[i..];

        if rest.starts_with(END_TAG) {
            let j = i + END_TAG.len();
            self.cursor = j;
            self.state = State::Text;
            return Ok((Token::EndTag, Span::from(i..j)));
        }

        // We iterate over chars because that is nicer than operating on raw
        // bytes. The map call here fixes the index to be relative to the
        // actual fragment source.
        let mut iter = rest.char_indices().map(|(d, c)| (i + d, c));

        let Some((_, c)) = iter.next() else {
            return Err(self.err_unexpected_character(i..i));
        };
        let peek = iter.clone().next().map(|(_, c)| c);

        let (tk, j) = match (c, peek) {
            ('/', Some('/')) => self.lex_line_comment(i),
            ('/', Some('*')) => self.lex_block_comment(i)?,

            // Two character tokens.
            ('=', Some('>')) => (Token::FatArrow, i + 2),
            ('=', Some('=')) => (Token::Eq, i + 2),
            ('!', Some('=')) => (Token::NotEq, i + 2),
            ('<', Some('=')) => (Token::Le, i + 2),
            ('>', Some('=')) => (Token::Ge, i + 2),
            ('+', Some('=')) => (Token::PlusAssign, i + 2),
            ('-', Some('=')) => (Token::MinusAssign, i + 2),
            ('+', Some('+')) => (Token::PlusPlus, i + 2),
            ('-', Some('-')) => (Token::MinusMinus, i + 2),
            ('&', Some('&')) => (Token::And, i + 2),
            ('|', Some('|')) => (Token::Or, i + 2),

            // Single character to token mappings.
            ('(', _) => (Token::LParen, i + 1),
            (')', _) => (Token::RParen, i + 1),
            ('[', _) => (Token::LBracket, i + 1),
            (']', _) => (Token::RBracket, i + 1),
            (',', _) => (Token::Comma, i + 1),
            (':', _) => (Token::Colon, i + 1),
            (';', _) => (Token::Semicolon, i + 1),
            ('.', _) => (Token::Dot, i + 1),
            ('=', _) => (Token::Assign, i + 1),
            ('+', _) => (Token::Plus, i + 1),
            ('-', _) => (Token::Minus, i + 1),
            ('*', _) => (Token::Star, i + 1),
            ('/', _) => (Token::Slash, i + 1),
            ('%', _) => (Token::Percent, i + 1),
            ('!', _) => (Token::Bang, i + 1),
            ('<', _) => (Token::Lt, i + 1),
            ('>', _) => (Token::Gt, i + 1),

            // Multi-character tokens with a distinct start character.
            ('"' | '\'', _) => self.lex_string(iter, i, c)?,
            (c, _) if c.is_ascii_digit() => self.lex_number(iter),
            (c, _) if is_whitespace(c) => self.lex_whitespace(iter),
            (c, _) if is_ident_start(c) => self.lex_ident_or_keyword(iter, i),

            // Any other character...
            (c, _) => {
                return Err(self.err_unexpected_character(i..(i + c.len_utf8())));
            }
        };

        self.cursor = j;
        Ok((tk, Span::from(i..j)))
    }

    fn lex_line_comment(&mut self, i: usize) -> (Token, usize) {
        // A line comment runs until the end of the line or the end tag,
        // whichever comes first.
        let rest = &self.source[i..];
        let eol = rest.find('\n').unwrap_or(rest.len());
        let end = rest[..eol].find(END_TAG).unwrap_or(eol);
        (Token::Comment, i + end)
    }

    fn lex_block_comment(&mut self, i: usize) -> Result<(Token, usize)> {
        match self.source[i + 2..].find("*/") {
            Some(d) => Ok((Token::Comment, i + 2 + d + 2)),
            None => Err(Error::syntax(
                "unclosed comment",
                self.source,
                i..self.source.len(),
            )),
        }
    }

    fn lex_string<I>(&mut self, mut iter: I, i: usize, quote: char) -> Result<(Token, usize)>
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let mut escaped = false;
        loop {
            match iter.next() {
                None => {
                    return Err(self.err_undelimited_string(i..self.source.len()));
                }
                Some((j, c)) if c == quote && !escaped => {
                    return Ok((Token::String, j + 1));
                }
                Some((_, c)) => {
                    escaped = c == '\\' && !escaped;
                }
            }
        }
    }

    fn lex_number<I>(&mut self, iter: I) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let j = self.lex_while(iter, is_digit);

        // A fractional part must have a digit after the dot, otherwise the dot
        // is a member access like `list.0.name`.
        let rest = &self.source[j..];
        let mut chars = rest.chars();
        if chars.next() == Some('.') && chars.next().map_or(false, |c| c.is_ascii_digit()) {
            let iter = rest[1..].char_indices().map(|(d, c)| (j + 1 + d, c));
            return (Token::Number, self.lex_while(iter, is_digit));
        }
        (Token::Number, j)
    }

    fn lex_whitespace<I>(&mut self, iter: I) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        (Token::Whitespace, self.lex_while(iter, is_whitespace))
    }

    fn lex_ident_or_keyword<I>(&mut self, iter: I, i: usize) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let j = self.lex_while(iter, is_ident);
        let tk = match Keyword::all().contains(&&self.source[i..j]) {
            true => Token::Keyword,
            false => Token::Ident,
        };
        (tk, j)
    }

    fn lex_while<I, P>(&mut self, mut iter: I, pred: P) -> usize
    where
        I: Iterator<Item = (usize, char)> + Clone,
        P: Fn(char) -> bool,
    {
        loop {
            match iter.clone().next() {
                Some((_, c)) if pred(c) => {
                    iter.next();
                }
                Some((j, _)) => return j,
                None => return self.source.len(),
            }
        }
    }

    fn err_unclosed(&self, begin: Span) -> Error {
        Error::syntax("unclosed code tag", self.source, begin)
    }

    fn err_unexpected_character(&self, span: impl Into<Span>) -> Error {
        Error::syntax("unexpected character", self.source, span)
    }

    fn err_undelimited_string(&self, span: impl Into<Span>) -> Error {
        Error::syntax("undelimited string", self.source, span)
    }
}

impl Token {
    pub fn human(&self) -> &'static str {
        match self {
            Self::Raw => "raw text",
            Self::BeginTag => "begin tag",
            Self::EndTag => "end tag",
            Self::Comment => "comment",
            Self::LParen => "open parenthesis",
            Self::RParen => "close parenthesis",
            Self::LBracket => "open bracket",
            Self::RBracket => "close bracket",
            Self::Comma => "comma",
            Self::Colon => "colon",
            Self::Semicolon => "semicolon",
            Self::Dot => "member access operator",
            Self::FatArrow => "arrow",
            Self::Assign => "assignment",
            Self::PlusAssign => "add assignment",
            Self::MinusAssign => "subtract assignment",
            Self::PlusPlus => "increment",
            Self::MinusMinus => "decrement",
            Self::Plus => "plus",
            Self::Minus => "minus",
            Self::Star => "star",
            Self::Slash => "slash",
            Self::Percent => "percent",
            Self::Bang => "not",
            Self::Eq => "equals",
            Self::NotEq => "not equals",
            Self::Lt => "less than",
            Self::Le => "less than or equal",
            Self::Gt => "greater than",
            Self::Ge => "greater than or equal",
            Self::And => "and",
            Self::Or => "or",
            Self::Whitespace => "whitespace",
            Self::Keyword => "keyword",
            Self::Ident => "identifier",
            Self::Number => "number",
            Self::String => "string",
        }
    }

    fn is_whitespace(&self) -> bool {
        matches!(self, Self::Whitespace)
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, '\t' | ' ' | '\r' | '\n')
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || c == '_'
}

#[cfg(feature = "unicode")]
pub(crate) fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
pub(crate) fn is_ident_start(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_empty() {
        let tokens = lex("").unwrap();
        assert_eq!(tokens, []);
    }

    #[test]
    fn lex_raw() {
        let tokens = lex("lorem ipsum").unwrap();
        assert_eq!(tokens, [(Token::Raw, "lorem ipsum")]);
    }

    #[test]
    fn lex_raw_with_percent() {
        let tokens = lex("100% %> done").unwrap();
        assert_eq!(tokens, [(Token::Raw, "100% %> done")]);
    }

    #[test]
    fn lex_begin_tag() {
        let tokens = lex("lorem <%%> ipsum").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Raw, "lorem "),
                (Token::BeginTag, "<%"),
                (Token::EndTag, "%>"),
                (Token::Raw, " ipsum"),
            ]
        );
    }

    #[test]
    fn lex_unclosed_tag() {
        let err = lex("lorem <% echo x;").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Syntax);
    }

    #[test]
    fn lex_echo() {
        let tokens = lex("<% echo user.name; %>").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::BeginTag, "<%"),
                (Token::Whitespace, " "),
                (Token::Keyword, "echo"),
                (Token::Whitespace, " "),
                (Token::Ident, "user"),
                (Token::Dot, "."),
                (Token::Ident, "name"),
                (Token::Semicolon, ";"),
                (Token::Whitespace, " "),
                (Token::EndTag, "%>"),
            ]
        );
    }

    #[test]
    fn lex_operators() {
        let tokens = lex("<%=>==!=<=>=+=-=++--&&||()[],:.=+-*/%!<>%>").unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|(tk, _)| tk).collect();
        assert_eq!(
            kinds,
            [
                Token::BeginTag,
                Token::FatArrow,
                Token::Eq,
                Token::NotEq,
                Token::Le,
                Token::Ge,
                Token::PlusAssign,
                Token::MinusAssign,
                Token::PlusPlus,
                Token::MinusMinus,
                Token::And,
                Token::Or,
                Token::LParen,
                Token::RParen,
                Token::LBracket,
                Token::RBracket,
                Token::Comma,
                Token::Colon,
                Token::Dot,
                Token::Assign,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Bang,
                Token::Lt,
                Token::Gt,
                Token::EndTag,
            ]
        );
    }

    #[test]
    fn lex_literals() {
        let tokens = lex("<% 'it\\'s' \"x\" 12 0.5 list.0 %>").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::BeginTag, "<%"),
                (Token::Whitespace, " "),
                (Token::String, "'it\\'s'"),
                (Token::Whitespace, " "),
                (Token::String, "\"x\""),
                (Token::Whitespace, " "),
                (Token::Number, "12"),
                (Token::Whitespace, " "),
                (Token::Number, "0.5"),
                (Token::Whitespace, " "),
                (Token::Ident, "list"),
                (Token::Dot, "."),
                (Token::Number, "0"),
                (Token::Whitespace, " "),
                (Token::EndTag, "%>"),
            ]
        );
    }

    #[test]
    fn lex_comments() {
        let tokens = lex("<% // note %><% /* a %> b */ %>").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::BeginTag, "<%"),
                (Token::Whitespace, " "),
                (Token::Comment, "// note "),
                (Token::EndTag, "%>"),
                (Token::BeginTag, "<%"),
                (Token::Whitespace, " "),
                (Token::Comment, "/* a %> b */"),
                (Token::Whitespace, " "),
                (Token::EndTag, "%>"),
            ]
        );
    }

    #[test]
    fn lex_undelimited_string() {
        let err = lex("<% echo 'abc %>").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Syntax);
    }

    #[track_caller]
    fn lex(source: &str) -> Result<Vec<(Token, &str)>> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        while let Some((tk, sp)) = lexer.lex()? {
            tokens.push((tk, &source[sp]));
        }
        for _ in 0..3 {
            assert!(lexer.lex().unwrap().is_none());
        }
        Ok(tokens)
    }
}
