//! Lexical analysis for query text.
//!
//! Raw token recognition is driven by a `logos` automaton; this module turns
//! its output into [`Token`]s, resolving keywords, unescaping string
//! contents and collecting diagnostics for anything it cannot recognize.
//! Lexing never stops at the first bad character, but the parser refuses to
//! run on a token stream that carries diagnostics.

pub mod keywords;
pub mod token;

use crate::diag::Diag;
use logos::Logos;
use smol_str::SmolStr;
use token::{Token, TokenKind};

/// Tokens produced from a source string, terminated by [`TokenKind::Eof`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diag>,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
enum RawToken {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,
    #[regex(r"`[^`]*`")]
    QuotedName,
    #[regex(r"\$[A-Za-z_][A-Za-z0-9_]*")]
    Parameter,
    #[regex(r"[0-9]+")]
    Integer,
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    Float,
    #[regex(r"'([^'\\]|\\.)*'")]
    #[regex(r#""([^"\\]|\\.)*""#)]
    String,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("=")]
    Eq,
    #[token("<>")]
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("->")]
    Arrow,
    #[token("<-")]
    LeftArrow,
}

/// Converts query text into tokens.
pub struct Lexer<'a> {
    source: &'a str,
    /// Added to every span, for lexing a suffix of a larger text.
    offset: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<Diag>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Lexes `source[offset..]`, reporting spans relative to `source`.
    pub fn with_offset(source: &'a str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        Self {
            source: &source[offset..],
            offset,
            ..Self::new(source)
        }
    }

    pub fn tokenize(mut self) -> LexerResult {
        let mut raw = RawToken::lexer(self.source);
        while let Some(next) = raw.next() {
            let span = raw.span();
            let span = span.start + self.offset..span.end + self.offset;
            let text = raw.slice();
            match next {
                Ok(kind) => self.push(kind, text, span),
                Err(()) => {
                    if self.unrecognized(text, span) {
                        break;
                    }
                }
            }
        }

        let end = self.offset + self.source.len();
        self.tokens.push(Token::new(TokenKind::Eof, end..end));

        LexerResult {
            tokens: self.tokens,
            diagnostics: self.diagnostics,
        }
    }

    fn push(&mut self, raw: RawToken, text: &str, span: std::ops::Range<usize>) {
        let kind = match raw {
            RawToken::Word => {
                keywords::lookup_keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.into()))
            }
            RawToken::QuotedName => TokenKind::Identifier(SmolStr::new(&text[1..text.len() - 1])),
            RawToken::Parameter => TokenKind::Parameter(SmolStr::new(&text[1..])),
            RawToken::Integer => TokenKind::IntegerLiteral(text.into()),
            RawToken::Float => TokenKind::FloatLiteral(text.into()),
            RawToken::String => match unescape(&text[1..text.len() - 1]) {
                Ok(value) => TokenKind::StringLiteral(value.into()),
                Err(message) => {
                    self.error(span.clone(), message, "lex::escape");
                    TokenKind::StringLiteral(SmolStr::default())
                }
            },
            RawToken::LParen => TokenKind::LParen,
            RawToken::RParen => TokenKind::RParen,
            RawToken::LBracket => TokenKind::LBracket,
            RawToken::RBracket => TokenKind::RBracket,
            RawToken::LBrace => TokenKind::LBrace,
            RawToken::RBrace => TokenKind::RBrace,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Dot => TokenKind::Dot,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Semicolon => TokenKind::Semicolon,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => TokenKind::Star,
            RawToken::Slash => TokenKind::Slash,
            RawToken::Percent => TokenKind::Percent,
            RawToken::Caret => TokenKind::Caret,
            RawToken::Eq => TokenKind::Eq,
            RawToken::NotEq => TokenKind::NotEq,
            RawToken::Lt => TokenKind::Lt,
            RawToken::LtEq => TokenKind::LtEq,
            RawToken::Gt => TokenKind::Gt,
            RawToken::GtEq => TokenKind::GtEq,
            RawToken::Arrow => TokenKind::Arrow,
            RawToken::LeftArrow => TokenKind::LeftArrow,
        };
        self.tokens.push(Token::new(kind, span));
    }

    /// Records a diagnostic for unrecognized input. Returns true when the
    /// rest of the source cannot be tokenized meaningfully.
    fn unrecognized(&mut self, text: &str, span: std::ops::Range<usize>) -> bool {
        match text.chars().next() {
            Some(quote @ ('\'' | '"')) => {
                let rest = self.offset + self.source.len();
                self.error(
                    span.start..rest,
                    format!("unclosed string literal starting with {quote}"),
                    "lex::unclosed_string",
                );
                true
            }
            Some('`') => {
                let rest = self.offset + self.source.len();
                self.error(span.start..rest, "unclosed quoted identifier", "lex::unclosed_name");
                true
            }
            Some('$') => {
                self.error(span, "expected parameter name after '$'", "lex::parameter");
                false
            }
            Some(ch) => {
                self.error(span, format!("invalid character '{ch}'"), "lex::invalid_char");
                false
            }
            None => false,
        }
    }

    fn error(&mut self, span: std::ops::Range<usize>, message: impl Into<String>, code: &str) {
        self.diagnostics.push(
            Diag::error(message)
                .with_primary_label(span, "here")
                .with_code(code),
        );
    }
}

/// Tokenizes `source`.
pub fn tokenize(source: &str) -> LexerResult {
    Lexer::new(source).tokenize()
}

fn unescape(body: &str) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some(c @ ('\'' | '"' | '\\')) => out.push(c),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid unicode escape '\\u{hex}'"))?;
                out.push(decoded);
            }
            Some(other) => return Err(format!("invalid escape sequence '\\{other}'")),
            None => return Err("dangling escape at end of string".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let result = tokenize(source);
        assert!(
            result.diagnostics.is_empty(),
            "unexpected diagnostics for `{source}`: {:?}",
            result.diagnostics
        );
        result.tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn declaration_prefix() {
        assert_eq!(
            kinds("CYPHER param=1 RETURN $param"),
            vec![
                TokenKind::Cypher,
                TokenKind::Identifier("param".into()),
                TokenKind::Eq,
                TokenKind::IntegerLiteral("1".into()),
                TokenKind::Return,
                TokenKind::Parameter("param".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_property_access() {
        assert_eq!(
            kinds("n.age 2.5 1e3"),
            vec![
                TokenKind::Identifier("n".into()),
                TokenKind::Dot,
                TokenKind::Identifier("age".into()),
                TokenKind::FloatLiteral("2.5".into()),
                TokenKind::FloatLiteral("1e3".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn pattern_arrows() {
        assert_eq!(
            kinds("(a)-[r]->(b)<-(c)"),
            vec![
                TokenKind::LParen,
                TokenKind::Identifier("a".into()),
                TokenKind::RParen,
                TokenKind::Minus,
                TokenKind::LBracket,
                TokenKind::Identifier("r".into()),
                TokenKind::RBracket,
                TokenKind::Arrow,
                TokenKind::LParen,
                TokenKind::Identifier("b".into()),
                TokenKind::RParen,
                TokenKind::LeftArrow,
                TokenKind::LParen,
                TokenKind::Identifier("c".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_are_unescaped() {
        assert_eq!(
            kinds(r#"'it\'s' "a\tb" 'A'"#),
            vec![
                TokenKind::StringLiteral("it's".into()),
                TokenKind::StringLiteral("a\tb".into()),
                TokenKind::StringLiteral("A".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_quoted_names_are_handled() {
        assert_eq!(
            kinds("RETURN `my var` // trailing\n/* block */ 1"),
            vec![
                TokenKind::Return,
                TokenKind::Identifier("my var".into()),
                TokenKind::IntegerLiteral("1".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unclosed_string_reports_once() {
        let result = tokenize("RETURN 'abc");
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].message.contains("unclosed string"));
        assert_eq!(result.tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    }

    #[test]
    fn bare_dollar_and_invalid_chars() {
        let result = tokenize("RETURN $ + 1 # 2");
        let messages: Vec<_> = result.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            ["expected parameter name after '$'", "invalid character '#'"]
        );
    }

    #[test]
    fn offset_lexing_keeps_absolute_spans() {
        let source = "CYPHER a=1 RETURN $a";
        let result = Lexer::with_offset(source, 11).tokenize();
        let slices: Vec<_> = result.tokens.iter().map(|t| t.slice(source)).collect();
        assert_eq!(slices, ["RETURN", "$a", ""]);
        assert_eq!(result.tokens[0].span, 11..17);
    }

    #[test]
    fn spans_cover_source_text() {
        let source = "CYPHER x = 'v'";
        let result = tokenize(source);
        let slices: Vec<_> = result.tokens.iter().map(|t| t.slice(source)).collect();
        assert_eq!(slices, ["CYPHER", "x", "=", "'v'", ""]);
    }
}
