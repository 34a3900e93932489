use crate::directive::lex::{Kind, Piece};

/// A rewrite pass of the directive compiler.
///
/// Passes run in the order they are declared here. Each one lowers a
/// particular kind of piece into fragment code, pieces that no pass lowers
/// are emitted as they were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Moves a leading `@extends(parent)` to the end of the view as an
    /// `@include(parent)`, so that the child's sections are captured before
    /// the parent renders.
    Inheritance,
    /// `{{-- text --}}` to `<% /* text */ %>`, and `{{-- text` at the end of
    /// a line to `<% // text %>`.
    Comments,
    /// `{{ expr }}` to `<% echo expr; %>`.
    Echos,
    /// `@if`, `@elseif`, `@foreach`, `@for` and `@while`.
    Openings,
    /// `@endif`, `@endforeach`, `@endfor` and `@endwhile`.
    Closings,
    /// `@else`.
    Else,
    /// `@unless` and `@endunless`.
    Unless,
    /// `@include(view, ...)`.
    Includes,
    /// `@each(view, data, iterator[, empty])`.
    Each,
    /// `@yield(section)`.
    Yields,
    /// `@show`.
    Shows,
    /// `@section(name[, content])`.
    SectionStart,
    /// `@stop`.
    SectionStop,
}

impl Pass {
    /// Every pass, in order.
    pub const ALL: [Pass; 13] = [
        Pass::Inheritance,
        Pass::Comments,
        Pass::Echos,
        Pass::Openings,
        Pass::Closings,
        Pass::Else,
        Pass::Unless,
        Pass::Includes,
        Pass::Each,
        Pass::Yields,
        Pass::Shows,
        Pass::SectionStart,
        Pass::SectionStop,
    ];

    /// Applies this pass to the pieces.
    pub(crate) fn apply(self, pieces: &mut Vec<Piece>) {
        match self {
            Pass::Inheritance => inheritance(pieces),
            pass => {
                for piece in pieces.iter_mut() {
                    if let Some(code) = pass.lower(piece) {
                        *piece = Piece::Code(code);
                    }
                }
            }
        }
    }

    /// Returns the fragment code for the piece, if this pass lowers it.
    fn lower(self, piece: &Piece) -> Option<String> {
        match (self, piece) {
            (Pass::Comments, Piece::Comment { text, closed, .. }) => Some(if *closed {
                format!("<% /*{}*/ %>", sanitize(text).replace("*/", "* /"))
            } else {
                format!("<% //{} %>", sanitize(text))
            }),

            (Pass::Echos, Piece::Echo { expr, .. }) => Some(format!("<% echo {expr}; %>")),

            (Pass::SectionStop, Piece::Directive { kind: Kind::Stop, .. }) => {
                Some("<% __env.stop_section(); %>".into())
            }

            (Pass::Shows, Piece::Directive { kind: Kind::Show, .. }) => {
                Some("<% echo __env.yield_section(); %>".into())
            }

            (Pass::Else, Piece::Directive { kind: Kind::Else, .. }) => Some("<% else: %>".into()),

            (Pass::Closings, Piece::Directive { kind, .. })
                if matches!(
                    kind,
                    Kind::EndIf | Kind::EndForEach | Kind::EndFor | Kind::EndWhile
                ) =>
            {
                Some(format!("<% {}; %>", kind.name()))
            }

            (Pass::Unless, Piece::Directive { kind: Kind::EndUnless, .. }) => {
                Some("<% endif; %>".into())
            }

            (pass, Piece::Directive { kind, args: Some(args), .. }) => {
                let code = match (pass, kind) {
                    (
                        Pass::Openings,
                        Kind::If | Kind::ElseIf | Kind::ForEach | Kind::For | Kind::While,
                    ) => format!("<% {} ({args}): %>", kind.name()),
                    (Pass::Unless, Kind::Unless) => format!("<% if (!({args})): %>"),
                    (Pass::Includes, Kind::Include) => {
                        format!("<% echo __env.make({args}, defined_vars()); %>")
                    }
                    (Pass::Each, Kind::Each) => format!("<% echo __env.show_each({args}); %>"),
                    (Pass::Yields, Kind::Yield) => format!("<% echo __env.yield({args}); %>"),
                    (Pass::SectionStart, Kind::Section) => {
                        format!("<% __env.start_section({args}); %>")
                    }
                    _ => return None,
                };
                Some(code)
            }

            _ => None,
        }
    }
}

/// Comment text must not end the code tag early.
fn sanitize(text: &str) -> String {
    text.replace("%>", "% >")
}

/// Moves a leading `@extends(parent)` line to the end of the view.
///
/// The directive is only honored as the very first piece. It is removed
/// together with the rest of its line: trailing text on the line is kept and
/// placed after the include, the line break is dropped. If the remaining body
/// does not end with a line break then the original one is inserted before
/// the include.
fn inheritance(pieces: &mut Vec<Piece>) {
    let args = match pieces.first() {
        Some(Piece::Directive {
            kind: Kind::Extends,
            args: Some(args),
            ..
        }) => args.clone(),
        _ => return,
    };
    pieces.remove(0);

    let mut trailing = String::new();
    let mut newline = "";
    if let Some(Piece::Text(text)) = pieces.first_mut() {
        let (line, nl, rest) = split_line(text);
        trailing = line.to_owned();
        newline = nl;
        *text = rest.to_owned();
        if text.is_empty() {
            pieces.remove(0);
        }
    }

    let ends_with_newline = match pieces.last() {
        Some(Piece::Text(text)) => text.ends_with('\n'),
        _ => false,
    };
    if !pieces.is_empty() && !ends_with_newline && !newline.is_empty() {
        pieces.push(Piece::Text(newline.to_owned()));
    }

    pieces.push(Piece::Directive {
        kind: Kind::Include,
        raw: format!("@include({args})"),
        args: Some(args),
    });
    if !trailing.is_empty() {
        pieces.push(Piece::Text(trailing));
    }
}

/// Splits text at its first line break into the line, the line break and the
/// remaining text.
fn split_line(text: &str) -> (&str, &'static str, &str) {
    match text.find('\n') {
        Some(i) if text[..i].ends_with('\r') => (&text[..i - 1], "\r\n", &text[i + 1..]),
        Some(i) => (&text[..i], "\n", &text[i + 1..]),
        None => (text, "", ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::lex::tokenize;

    fn run(pass: Pass, source: &str) -> Vec<Piece> {
        let mut pieces = tokenize(source);
        pass.apply(&mut pieces);
        pieces
    }

    fn code(s: &str) -> Piece {
        Piece::Code(s.into())
    }

    #[test]
    fn pass_only_lowers_its_own_pieces() {
        let pieces = run(Pass::Echos, "{{ a }}@stop");
        assert_eq!(pieces[0], code("<% echo a; %>"));
        assert!(matches!(pieces[1], Piece::Directive { kind: Kind::Stop, .. }));
    }

    #[test]
    fn pass_comments() {
        assert_eq!(
            run(Pass::Comments, "{{-- test --}}"),
            [code("<% /* test */ %>")]
        );
        assert_eq!(
            run(Pass::Comments, "{{-- a */ b %> --}}"),
            [code("<% /* a * / b % > */ %>")]
        );
        assert_eq!(
            run(Pass::Comments, "{{-- test\nx"),
            [code("<% // test %>"), Piece::Text("\nx".into())]
        );
    }

    #[test]
    fn pass_openings_and_closings() {
        assert_eq!(
            run(Pass::Openings, "@foreach (comments as comment)"),
            [code("<% foreach (comments as comment): %>")]
        );
        assert_eq!(
            run(Pass::Closings, "@endwhile"),
            [code("<% endwhile; %>")]
        );
    }

    #[test]
    fn pass_unless() {
        assert_eq!(
            run(Pass::Unless, "@unless (a) b\n@endunless"),
            [
                code("<% if (!(a)): %>"),
                Piece::Text(" b\n".into()),
                code("<% endif; %>")
            ]
        );
    }

    #[test]
    fn pass_inheritance_moves_directive() {
        let pieces = run(Pass::Inheritance, "@extends('layout')\nbody\n");
        assert_eq!(
            pieces,
            [
                Piece::Text("body\n".into()),
                Piece::Directive {
                    kind: Kind::Include,
                    args: Some("'layout'".into()),
                    raw: "@include('layout')".into(),
                },
            ]
        );
    }

    #[test]
    fn pass_inheritance_keeps_trailing_text() {
        let pieces = run(Pass::Inheritance, "@extends('a')  \r\nbody");
        assert_eq!(
            pieces,
            [
                Piece::Text("body".into()),
                Piece::Text("\r\n".into()),
                Piece::Directive {
                    kind: Kind::Include,
                    args: Some("'a'".into()),
                    raw: "@include('a')".into(),
                },
                Piece::Text("  ".into()),
            ]
        );
    }

    #[test]
    fn pass_inheritance_only_at_start() {
        let source = " @extends('a')\nbody";
        assert_eq!(run(Pass::Inheritance, source), tokenize(source));
    }

    #[test]
    fn pass_inheritance_alone() {
        let pieces = run(Pass::Inheritance, "@extends('a')");
        assert_eq!(
            pieces,
            [Piece::Directive {
                kind: Kind::Include,
                args: Some("'a'".into()),
                raw: "@include('a')".into(),
            }]
        );
    }
}
