//! Token stream navigation shared by the declaration, expression and clause
//! parsers.

use crate::ast::Span;
use crate::diag::Diag;
use crate::lexer::token::{Token, TokenKind};
use smol_str::SmolStr;

pub type ParseError = Box<Diag>;

pub type ParseResult<T> = Result<T, ParseError>;

/// Cursor over a token slice that always ends with [`TokenKind::Eof`].
pub struct TokenStream<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenStream<'a> {
    /// `tokens` must be non-empty and end with `Eof`, as produced by the lexer.
    pub fn new(tokens: &'a [Token]) -> Self {
        debug_assert!(matches!(
            tokens.last().map(|t| &t.kind),
            Some(TokenKind::Eof)
        ));
        Self { tokens, pos: 0 }
    }

    pub fn current(&self) -> &'a Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos + 1)
    }

    pub fn peek_kind(&self) -> Option<&'a TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    /// Does nothing once `Eof` is reached.
    pub fn advance(&mut self) {
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
    }

    pub fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    pub fn at_eof(&self) -> bool {
        self.check(&TokenKind::Eof)
    }

    pub fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, kind: TokenKind) -> ParseResult<Span> {
        if self.check(&kind) {
            let span = self.current().span.clone();
            self.advance();
            Ok(span)
        } else {
            Err(self.error_here(format!("expected {kind}, found {}", self.current().kind)))
        }
    }

    /// Consumes an identifier and returns its name and span.
    pub fn expect_identifier(&mut self, what: &str) -> ParseResult<(SmolStr, Span)> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let span = self.current().span.clone();
                let name = name.clone();
                self.advance();
                Ok((name, span))
            }
            other => Err(self.error_here(format!("expected {what}, found {other}"))),
        }
    }

    pub fn error_here(&self, message: impl Into<String>) -> ParseError {
        Box::new(
            Diag::error(message.into())
                .with_primary_label(self.current().span.clone(), "here")
                .with_code("syntax"),
        )
    }

    pub fn error_at(&self, span: Span, message: impl Into<String>) -> ParseError {
        Box::new(
            Diag::error(message.into())
                .with_primary_label(span, "here")
                .with_code("syntax"),
        )
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Span of the most recently consumed token.
    pub fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span.clone()
        } else {
            self.current().span.clone()
        }
    }
}
