//! Query body parsing: clauses and path patterns.

use crate::ast::{
    Clause, CreateClause, DeleteClause, Direction, Expr, MatchClause, NodePattern, PathPattern,
    ProjectionClause, ProjectionItem, Query, RelationshipPattern, SetClause, SetItem,
    SortItem, Span, UnwindClause,
};
use crate::lexer::token::TokenKind;
use crate::parser::base::{ParseResult, TokenStream};
use crate::parser::expression::ExpressionParser;
use smol_str::SmolStr;

pub struct ClauseParser<'s, 'a> {
    stream: &'s mut TokenStream<'a>,
    source: &'a str,
    max_depth: usize,
}

impl<'s, 'a> ClauseParser<'s, 'a> {
    pub fn new(stream: &'s mut TokenStream<'a>, source: &'a str, max_depth: usize) -> Self {
        Self {
            stream,
            source,
            max_depth,
        }
    }

    fn expressions(&mut self) -> ExpressionParser<'_, 'a> {
        ExpressionParser::new(self.stream, self.source, self.max_depth)
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        self.expressions().parse_expression()
    }

    /// Parses clauses up to the end of input.
    pub fn parse_query(&mut self) -> ParseResult<Query> {
        let start = self.stream.current().span.start;
        let mut clauses: Vec<Clause> = Vec::new();

        while !self.stream.at_eof() {
            if self.stream.consume(&TokenKind::Semicolon) {
                if !self.stream.at_eof() {
                    return Err(self.stream.error_here("only one query per request is supported"));
                }
                break;
            }
            if let Some(Clause::Return(_)) = clauses.last() {
                return Err(self.stream.error_here(format!(
                    "RETURN must be the last clause, found {}",
                    self.stream.current().kind
                )));
            }
            clauses.push(self.parse_clause()?);
        }

        let Some(last) = clauses.last() else {
            return Err(self
                .stream
                .error_here("expected a query clause, found end of input"));
        };
        if matches!(last, Clause::Match(_) | Clause::Unwind(_) | Clause::With(_)) {
            return Err(self.stream.error_at(
                last.span(),
                format!(
                    "query cannot conclude with {} (must be RETURN or an update clause)",
                    last.name()
                ),
            ));
        }

        Ok(Query {
            clauses,
            span: start..self.stream.previous_span().end,
        })
    }

    fn parse_clause(&mut self) -> ParseResult<Clause> {
        let start = self.stream.current().span.start;
        match self.stream.current().kind {
            TokenKind::Match => {
                self.stream.advance();
                let patterns = self.parse_patterns()?;
                let where_clause = self.parse_where()?;
                Ok(Clause::Match(MatchClause {
                    patterns,
                    where_clause,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Unwind => {
                self.stream.advance();
                let expr = self.expr()?;
                self.stream.expect(TokenKind::As)?;
                let (alias, _) = self.stream.expect_identifier("variable name")?;
                Ok(Clause::Unwind(UnwindClause {
                    expr,
                    alias,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Create => {
                self.stream.advance();
                let patterns = self.parse_patterns()?;
                Ok(Clause::Create(CreateClause {
                    patterns,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Set => {
                self.stream.advance();
                let mut items = vec![self.parse_set_item()?];
                while self.stream.consume(&TokenKind::Comma) {
                    items.push(self.parse_set_item()?);
                }
                Ok(Clause::Set(SetClause {
                    items,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Detach | TokenKind::Delete => {
                let detach = self.stream.consume(&TokenKind::Detach);
                self.stream.expect(TokenKind::Delete)?;
                let mut targets = vec![self.expr()?];
                while self.stream.consume(&TokenKind::Comma) {
                    targets.push(self.expr()?);
                }
                Ok(Clause::Delete(DeleteClause {
                    detach,
                    targets,
                    span: self.span_from(start),
                }))
            }
            TokenKind::With => {
                self.stream.advance();
                let mut projection = self.parse_projection(start)?;
                projection.where_clause = self.parse_where()?;
                projection.span = self.span_from(start);
                Ok(Clause::With(projection))
            }
            TokenKind::Return => {
                self.stream.advance();
                Ok(Clause::Return(self.parse_projection(start)?))
            }
            ref other => Err(self
                .stream
                .error_here(format!("expected a query clause, found {other}"))),
        }
    }

    fn parse_where(&mut self) -> ParseResult<Option<Expr>> {
        if self.stream.consume(&TokenKind::Where) {
            Ok(Some(self.expr()?))
        } else {
            Ok(None)
        }
    }

    fn parse_set_item(&mut self) -> ParseResult<SetItem> {
        let (variable, variable_span) = self.stream.expect_identifier("variable name")?;
        self.stream.expect(TokenKind::Dot)?;
        let (key, _) = self.expressions().parse_symbolic_name("property key")?;
        self.stream.expect(TokenKind::Eq)?;
        let value = self.expr()?;
        Ok(SetItem {
            variable,
            variable_span,
            key,
            value,
        })
    }

    fn parse_projection(&mut self, start: usize) -> ParseResult<ProjectionClause> {
        let distinct = self.stream.consume(&TokenKind::Distinct);

        let mut items = vec![self.parse_projection_item()?];
        while self.stream.consume(&TokenKind::Comma) {
            items.push(self.parse_projection_item()?);
        }

        let mut order_by = Vec::new();
        if self.stream.consume(&TokenKind::Order) {
            self.stream.expect(TokenKind::By)?;
            loop {
                let expr = self.expr()?;
                let descending = if self.stream.consume(&TokenKind::Desc) {
                    true
                } else {
                    self.stream.consume(&TokenKind::Asc);
                    false
                };
                order_by.push(SortItem { expr, descending });
                if !self.stream.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let skip = if self.stream.consume(&TokenKind::Skip) {
            Some(self.expr()?)
        } else {
            None
        };
        let limit = if self.stream.consume(&TokenKind::Limit) {
            Some(self.expr()?)
        } else {
            None
        };

        Ok(ProjectionClause {
            distinct,
            items,
            order_by,
            skip,
            limit,
            where_clause: None,
            span: self.span_from(start),
        })
    }

    fn parse_projection_item(&mut self) -> ParseResult<ProjectionItem> {
        let expr = self.expr()?;
        let alias = if self.stream.consume(&TokenKind::As) {
            Some(self.stream.expect_identifier("alias")?.0)
        } else {
            None
        };
        let span = expr.span().start..self.stream.previous_span().end;
        Ok(ProjectionItem { expr, alias, span })
    }

    fn parse_patterns(&mut self) -> ParseResult<Vec<PathPattern>> {
        let mut patterns = vec![self.parse_path()?];
        while self.stream.consume(&TokenKind::Comma) {
            patterns.push(self.parse_path()?);
        }
        Ok(patterns)
    }

    fn parse_path(&mut self) -> ParseResult<PathPattern> {
        let start = self.parse_node()?;
        let mut hops = Vec::new();
        while matches!(
            self.stream.current().kind,
            TokenKind::Minus | TokenKind::LeftArrow
        ) {
            let rel = self.parse_relationship()?;
            let node = self.parse_node()?;
            hops.push((rel, node));
        }
        let span = start.span.start..self.stream.previous_span().end;
        Ok(PathPattern { start, hops, span })
    }

    fn parse_node(&mut self) -> ParseResult<NodePattern> {
        let start = self.stream.expect(TokenKind::LParen)?.start;
        let variable = self.optional_variable();

        let mut labels = Vec::new();
        while self.stream.consume(&TokenKind::Colon) {
            labels.push(self.expressions().parse_symbolic_name("label")?.0);
        }

        let properties = self.optional_properties()?;
        let end = self.stream.expect(TokenKind::RParen)?.end;
        Ok(NodePattern {
            variable,
            labels,
            properties,
            span: start..end,
        })
    }

    fn parse_relationship(&mut self) -> ParseResult<RelationshipPattern> {
        let start = self.stream.current().span.start;
        let incoming = self.stream.consume(&TokenKind::LeftArrow);
        if !incoming {
            self.stream.expect(TokenKind::Minus)?;
        }

        let mut variable = None;
        let mut rel_type = None;
        let mut properties = Vec::new();
        if self.stream.consume(&TokenKind::LBracket) {
            variable = self.optional_variable();
            if self.stream.consume(&TokenKind::Colon) {
                rel_type = Some(self.expressions().parse_symbolic_name("relationship type")?.0);
            }
            properties = self.optional_properties()?;
            self.stream.expect(TokenKind::RBracket)?;
        }

        let outgoing = match self.stream.current().kind {
            TokenKind::Arrow => true,
            TokenKind::Minus => false,
            ref other => {
                return Err(self
                    .stream
                    .error_here(format!("expected '-' or '->' to close relationship, found {other}")));
            }
        };
        self.stream.advance();

        let direction = match (incoming, outgoing) {
            (true, true) => {
                return Err(self.stream.error_at(
                    self.span_from(start),
                    "relationship cannot point in both directions",
                ));
            }
            (true, false) => Direction::Incoming,
            (false, true) => Direction::Outgoing,
            (false, false) => Direction::Either,
        };

        Ok(RelationshipPattern {
            variable,
            rel_type,
            properties,
            direction,
            span: self.span_from(start),
        })
    }

    fn optional_variable(&mut self) -> Option<SmolStr> {
        if let TokenKind::Identifier(name) = &self.stream.current().kind {
            let name = name.clone();
            self.stream.advance();
            Some(name)
        } else {
            None
        }
    }

    fn optional_properties(&mut self) -> ParseResult<Vec<(SmolStr, Expr)>> {
        if self.stream.check(&TokenKind::LBrace) {
            Ok(self.expressions().parse_map_entries()?.0)
        } else if let TokenKind::Parameter(_) = self.stream.current().kind {
            Err(self
                .stream
                .error_here("a parameter cannot be used as a whole property map in a pattern"))
        } else {
            Ok(Vec::new())
        }
    }

    fn span_from(&self, start: usize) -> Span {
        start..self.stream.previous_span().end
    }
}
