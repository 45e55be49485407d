//! Parsing entry points.
//!
//! Parsing happens in two steps that mirror compilation order: the
//! `CYPHER` prefix first ([`parse_declarations`]), then the body
//! ([`parse_body`]) once the parameter table has been built. Lexer
//! diagnostics are reported for the part being parsed only, so an invalid
//! declaration is reported even when the body would not lex either.

pub mod base;
pub mod clause;
pub mod declarations;
pub mod expression;

use crate::ast::{Expr, Query};
use crate::lexer::token::TokenKind;
use crate::lexer::{Lexer, LexerResult};
use base::{ParseError, ParseResult, TokenStream};
use clause::ClauseParser;
use declarations::DeclarationParser;
use expression::ExpressionParser;

pub use declarations::{DeclarationBlock, ParameterDeclaration};

/// Knobs that shape what the parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Deepest expression nesting accepted before failing.
    pub max_depth: usize,
    pub allow_declarations: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: 128,
            allow_declarations: true,
        }
    }
}

/// Parses the `CYPHER` prefix of `source`.
pub fn parse_declarations(source: &str, options: &ParseOptions) -> ParseResult<DeclarationBlock> {
    let lexed = Lexer::new(source).tokenize();
    let mut stream = TokenStream::new(&lexed.tokens);
    let result = DeclarationParser::new(
        &mut stream,
        source,
        options.max_depth,
        options.allow_declarations,
    )
    .parse();

    let parsed_up_to = match &result {
        Ok(block) => block.body_start,
        Err(err) => err
            .primary_span()
            .map_or(stream.current().span.end, |span| span.end),
    };
    if let Some(diag) = first_lex_error_before(&lexed, parsed_up_to) {
        return Err(diag);
    }
    result
}

/// Parses the query body starting at byte offset `body_start`.
pub fn parse_body(source: &str, body_start: usize, options: &ParseOptions) -> ParseResult<Query> {
    let lexed = Lexer::with_offset(source, body_start).tokenize();
    if let Some(diag) = first_lex_error_before(&lexed, usize::MAX) {
        return Err(diag);
    }
    let mut stream = TokenStream::new(&lexed.tokens);
    ClauseParser::new(&mut stream, source, options.max_depth).parse_query()
}

/// Parses a complete query: declarations and body.
pub fn parse_query(source: &str, options: &ParseOptions) -> ParseResult<(DeclarationBlock, Query)> {
    let block = parse_declarations(source, options)?;
    let query = parse_body(source, block.body_start, options)?;
    Ok((block, query))
}

/// Parses `source` as a single standalone expression.
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let lexed = Lexer::new(source).tokenize();
    if let Some(diag) = first_lex_error_before(&lexed, usize::MAX) {
        return Err(diag);
    }
    let mut stream = TokenStream::new(&lexed.tokens);
    let expr = ExpressionParser::new(&mut stream, source, ParseOptions::default().max_depth)
        .parse_expression()?;
    if !stream.check(&TokenKind::Eof) {
        return Err(stream.error_here(format!(
            "unexpected {} after expression",
            stream.current().kind
        )));
    }
    Ok(expr)
}

fn first_lex_error_before(lexed: &LexerResult, offset: usize) -> Option<ParseError> {
    lexed
        .diagnostics
        .iter()
        .find(|diag| diag.primary_span().is_none_or(|span| span.start < offset))
        .map(|diag| Box::new(diag.clone()))
}
