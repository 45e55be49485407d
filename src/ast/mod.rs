//! AST for `CYPHER` declarations and query bodies.

mod expression;
mod query;
mod span;
pub mod visit;

pub use expression::{BinaryOperator, Expr, FunctionCall, UnaryOperator};
pub use query::{
    Clause, CreateClause, DeleteClause, Direction, MatchClause, NodePattern, PathPattern,
    ProjectionClause, ProjectionItem, Query, RelationshipPattern, SetClause, SetItem, SortItem,
    UnwindClause,
};
pub use span::{Span, merge_spans};
