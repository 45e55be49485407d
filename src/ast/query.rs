//! Query body AST: clauses and patterns.

use crate::ast::{Expr, Span};
use smol_str::SmolStr;

/// A parsed query body (everything after the `CYPHER` declarations).
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match(MatchClause),
    Unwind(UnwindClause),
    Create(CreateClause),
    Set(SetClause),
    Delete(DeleteClause),
    With(ProjectionClause),
    Return(ProjectionClause),
}

impl Clause {
    /// Keyword that introduces the clause.
    pub fn name(&self) -> &'static str {
        match self {
            Clause::Match(_) => "MATCH",
            Clause::Unwind(_) => "UNWIND",
            Clause::Create(_) => "CREATE",
            Clause::Set(_) => "SET",
            Clause::Delete(_) => "DELETE",
            Clause::With(_) => "WITH",
            Clause::Return(_) => "RETURN",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Clause::Match(c) => c.span.clone(),
            Clause::Unwind(c) => c.span.clone(),
            Clause::Create(c) => c.span.clone(),
            Clause::Set(c) => c.span.clone(),
            Clause::Delete(c) => c.span.clone(),
            Clause::With(c) | Clause::Return(c) => c.span.clone(),
        }
    }
}

/// `MATCH pattern, ... [WHERE predicate]`
#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    pub patterns: Vec<PathPattern>,
    pub where_clause: Option<Expr>,
    pub span: Span,
}

/// `UNWIND expr AS alias`
#[derive(Debug, Clone, PartialEq)]
pub struct UnwindClause {
    pub expr: Expr,
    pub alias: SmolStr,
    pub span: Span,
}

/// `CREATE pattern, ...`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateClause {
    pub patterns: Vec<PathPattern>,
    pub span: Span,
}

/// `SET target.key = value, ...`
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub items: Vec<SetItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetItem {
    pub variable: SmolStr,
    pub variable_span: Span,
    pub key: SmolStr,
    pub value: Expr,
}

/// `[DETACH] DELETE expr, ...`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteClause {
    pub detach: bool,
    pub targets: Vec<Expr>,
    pub span: Span,
}

/// Body of `WITH` and `RETURN`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionClause {
    pub distinct: bool,
    pub items: Vec<ProjectionItem>,
    pub order_by: Vec<SortItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
    /// Only `WITH` accepts a trailing `WHERE`.
    pub where_clause: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<SmolStr>,
    pub span: Span,
}

impl ProjectionItem {
    /// Column name: the alias, or the expression text as written.
    pub fn column_name(&self, source: &str) -> SmolStr {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => alias.clone(),
            (None, Expr::Identifier(name, _)) => name.clone(),
            (None, expr) => source
                .get(expr.span())
                .map(|text| SmolStr::new(text.trim()))
                .unwrap_or_else(|| SmolStr::new(expr.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub expr: Expr,
    pub descending: bool,
}

/// A node followed by zero or more `(relationship, node)` hops.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub start: NodePattern,
    pub hops: Vec<(RelationshipPattern, NodePattern)>,
    pub span: Span,
}

impl PathPattern {
    /// Iterates every node pattern in path order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodePattern> {
        std::iter::once(&self.start).chain(self.hops.iter().map(|(_, node)| node))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<SmolStr>,
    pub labels: Vec<SmolStr>,
    pub properties: Vec<(SmolStr, Expr)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<SmolStr>,
    pub rel_type: Option<SmolStr>,
    pub properties: Vec<(SmolStr, Expr)>,
    pub direction: Direction,
    pub span: Span,
}

/// Direction of a relationship as written, relative to the path order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `-[]->`
    Outgoing,
    /// `<-[]-`
    Incoming,
    /// `-[]-`
    Either,
}
