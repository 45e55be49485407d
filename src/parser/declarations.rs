//! `CYPHER name=expr ...` prefix parsing.
//!
//! A single `CYPHER` keyword may introduce several `name=expr` pairs and the
//! keyword may repeat. Each expression ends where the expression parser
//! stops, so `CYPHER a=1 b=[2] RETURN ...` yields two declarations and a body
//! starting at `RETURN`.

use crate::ast::{Expr, Span};
use crate::diag::Diag;
use crate::lexer::token::TokenKind;
use crate::parser::base::{ParseResult, TokenStream};
use crate::parser::expression::ExpressionParser;
use smol_str::SmolStr;

/// One `name=expr` pair from the query prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDeclaration {
    pub name: SmolStr,
    pub name_span: Span,
    pub expr: Expr,
    /// Expression text exactly as written.
    pub raw: String,
    /// Covers `name=expr`.
    pub span: Span,
}

/// Declarations in textual order plus the offset where the body begins.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationBlock {
    pub declarations: Vec<ParameterDeclaration>,
    pub body_start: usize,
}

impl DeclarationBlock {
    /// The query body, verbatim.
    pub fn body<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.body_start..).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

pub struct DeclarationParser<'s, 'a> {
    stream: &'s mut TokenStream<'a>,
    source: &'a str,
    max_depth: usize,
    allow_declarations: bool,
}

impl<'s, 'a> DeclarationParser<'s, 'a> {
    pub fn new(
        stream: &'s mut TokenStream<'a>,
        source: &'a str,
        max_depth: usize,
        allow_declarations: bool,
    ) -> Self {
        Self {
            stream,
            source,
            max_depth,
            allow_declarations,
        }
    }

    /// Consumes every leading `CYPHER` segment. The stream is left on the
    /// first body token.
    pub fn parse(&mut self) -> ParseResult<DeclarationBlock> {
        let mut declarations: Vec<ParameterDeclaration> = Vec::new();

        while self.stream.check(&TokenKind::Cypher) {
            if !self.allow_declarations {
                return Err(Box::new(
                    Diag::error("CYPHER parameter declarations are disabled")
                        .with_primary_label(self.stream.current().span.clone(), "here")
                        .with_help("pass parameters in the parameter map instead")
                        .with_code("syntax"),
                ));
            }
            self.stream.advance();

            if !matches!(self.stream.current().kind, TokenKind::Identifier(_)) {
                return Err(self.stream.error_here(format!(
                    "expected parameter declaration after CYPHER, found {}",
                    self.stream.current().kind
                )));
            }

            while matches!(self.stream.current().kind, TokenKind::Identifier(_)) {
                let declaration = self.parse_declaration()?;
                if let Some(first) = declarations.iter().find(|d| d.name == declaration.name) {
                    return Err(Box::new(
                        Diag::error(format!(
                            "duplicate parameter declaration '{}'",
                            declaration.name
                        ))
                        .with_primary_label(declaration.name_span.clone(), "declared again here")
                        .with_secondary_label(first.name_span.clone(), "first declared here")
                        .with_code("syntax"),
                    ));
                }
                declarations.push(declaration);
            }
        }

        Ok(DeclarationBlock {
            declarations,
            body_start: self.stream.current().span.start,
        })
    }

    fn parse_declaration(&mut self) -> ParseResult<ParameterDeclaration> {
        let (name, name_span) = self.stream.expect_identifier("parameter name")?;
        self.stream.expect(TokenKind::Eq)?;

        let expr = ExpressionParser::new(self.stream, self.source, self.max_depth)
            .parse_expression()
            .map_err(|err| {
                let mut err = err;
                err.message = format!("invalid value for parameter '{name}': {}", err.message);
                err
            })?;

        let raw = self.source[expr.span()].to_string();
        let span = name_span.start..expr.span().end;
        Ok(ParameterDeclaration {
            name,
            name_span,
            expr,
            raw,
            span,
        })
    }
}
