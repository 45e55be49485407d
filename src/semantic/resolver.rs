//! Scope checking and name resolution for the query body.
//!
//! Clauses are walked in order and the first failure is returned. Every
//! identifier must be visible in the current scope, every `$name` must be
//! bound in the frozen parameter table, and every function must exist with
//! a matching arity. Maximal statically reducible sub-expressions are then
//! evaluated so that operand type errors surface before execution.

use crate::ast::visit::{Visit, VisitResult, walk_expr};
use crate::ast::{
    Clause, CreateClause, Direction, Expr, FunctionCall, MatchClause, NodePattern, PathPattern,
    ProjectionClause, Query, SetClause, SortItem, Span,
};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::semantic::const_eval::{
    aggregate_not_allowed, evaluate_static, is_static, missing_parameter, unknown_function,
    wrong_arity,
};
use crate::semantic::functions::FunctionRegistry;
use crate::semantic::params::ParameterTable;
use indexmap::IndexSet;
use smol_str::SmolStr;
use std::ops::ControlFlow;

/// Where aggregate calls may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggregateContext {
    Forbidden,
    Allowed,
    InsideAggregate,
}

/// Variables visible at a point in the body.
pub type Scope = IndexSet<SmolStr>;

pub struct Resolver<'q> {
    source: &'q str,
    table: &'q ParameterTable,
    registry: &'q FunctionRegistry,
    scope: Scope,
}

impl<'q> Resolver<'q> {
    pub fn new(source: &'q str, table: &'q ParameterTable, registry: &'q FunctionRegistry) -> Self {
        Self {
            source,
            table,
            registry,
            scope: Scope::new(),
        }
    }

    pub fn resolve(mut self, query: &Query) -> CompileResult<()> {
        for clause in &query.clauses {
            match clause {
                Clause::Match(clause) => self.resolve_match(clause)?,
                Clause::Unwind(clause) => {
                    self.check(&clause.expr, AggregateContext::Forbidden)?;
                    self.scope.insert(clause.alias.clone());
                }
                Clause::Create(clause) => self.resolve_create(clause)?,
                Clause::Set(clause) => self.resolve_set(clause)?,
                Clause::Delete(clause) => {
                    for target in &clause.targets {
                        self.check(target, AggregateContext::Forbidden)?;
                    }
                }
                Clause::With(projection) => self.resolve_projection(projection, true)?,
                Clause::Return(projection) => self.resolve_projection(projection, false)?,
            }
        }
        Ok(())
    }

    fn resolve_match(&mut self, clause: &MatchClause) -> CompileResult<()> {
        for path in &clause.patterns {
            for node in path.nodes() {
                if let Some(variable) = &node.variable {
                    self.scope.insert(variable.clone());
                }
            }
            for (rel, _) in &path.hops {
                if let Some(variable) = &rel.variable {
                    self.scope.insert(variable.clone());
                }
            }
        }
        for path in &clause.patterns {
            self.check_pattern_properties(path)?;
        }
        if let Some(predicate) = &clause.where_clause {
            self.check(predicate, AggregateContext::Forbidden)?;
        }
        Ok(())
    }

    fn check_pattern_properties(&self, path: &PathPattern) -> CompileResult<()> {
        for node in path.nodes() {
            for (_, value) in &node.properties {
                self.check(value, AggregateContext::Forbidden)?;
            }
        }
        for (rel, _) in &path.hops {
            for (_, value) in &rel.properties {
                self.check(value, AggregateContext::Forbidden)?;
            }
        }
        Ok(())
    }

    fn resolve_create(&mut self, clause: &CreateClause) -> CompileResult<()> {
        for path in &clause.patterns {
            self.create_node(&path.start)?;
            for (rel, node) in &path.hops {
                if rel.rel_type.is_none() {
                    return Err(CompileError::new(
                        ErrorKind::Syntax,
                        "Exactly one relationship type must be specified for CREATE",
                        rel.span.clone(),
                    ));
                }
                if rel.direction == Direction::Either {
                    return Err(CompileError::new(
                        ErrorKind::Syntax,
                        "Only directed relationships are supported in CREATE",
                        rel.span.clone(),
                    ));
                }
                for (_, value) in &rel.properties {
                    self.check(value, AggregateContext::Forbidden)?;
                }
                if let Some(variable) = &rel.variable {
                    if !self.scope.insert(variable.clone()) {
                        return Err(already_declared(variable, &rel.span));
                    }
                }
                self.create_node(node)?;
            }
        }
        Ok(())
    }

    fn create_node(&mut self, node: &NodePattern) -> CompileResult<()> {
        for (_, value) in &node.properties {
            self.check(value, AggregateContext::Forbidden)?;
        }
        if let Some(variable) = &node.variable {
            let fresh = self.scope.insert(variable.clone());
            if !fresh && (!node.labels.is_empty() || !node.properties.is_empty()) {
                return Err(already_declared(variable, &node.span));
            }
        }
        Ok(())
    }

    fn resolve_set(&self, clause: &SetClause) -> CompileResult<()> {
        for item in &clause.items {
            if !self.scope.contains(&item.variable) {
                return Err(undefined_identifier(&item.variable, &item.variable_span));
            }
            self.check(&item.value, AggregateContext::Forbidden)?;
        }
        Ok(())
    }

    fn resolve_projection(&mut self, clause: &ProjectionClause, is_with: bool) -> CompileResult<()> {
        for item in &clause.items {
            self.check(&item.expr, AggregateContext::Allowed)?;
        }

        let aggregating = is_aggregating(clause, self.registry);
        if aggregating {
            for item in &clause.items {
                if !contains_aggregate(&item.expr, self.registry) {
                    continue;
                }
                if let Some((name, span)) = grouping_outside_aggregate(&item.expr, self.registry) {
                    return Err(CompileError::new(
                        ErrorKind::Syntax,
                        format!(
                            "Aggregation column contains implicit grouping expression '{name}'"
                        ),
                        span,
                    )
                    .with_help("project the grouping expression as its own column"));
                }
            }
        }

        let mut columns = Scope::new();
        for item in &clause.items {
            if is_with && item.alias.is_none() && !matches!(item.expr, Expr::Identifier(..)) {
                return Err(CompileError::new(
                    ErrorKind::Syntax,
                    "Expression in WITH must be aliased (use AS)",
                    item.span.clone(),
                ));
            }
            let name = item.column_name(self.source);
            if !columns.insert(name.clone()) {
                return Err(CompileError::new(
                    ErrorKind::Syntax,
                    format!("Multiple result columns with the same name '{name}' are not supported"),
                    item.span.clone(),
                ));
            }
        }

        let input = std::mem::take(&mut self.scope);
        self.scope = columns.clone();
        if order_by_sees_input(clause, self.registry) {
            self.scope.extend(input);
        }
        for sort in sort_keys(clause, self.source, self.registry) {
            self.check(&sort.expr, AggregateContext::Forbidden)?;
        }

        self.scope = columns;
        if let Some(predicate) = &clause.where_clause {
            self.check(predicate, AggregateContext::Forbidden)?;
        }
        Ok(())
    }

    /// Resolves `expr`, then folds its static parts.
    fn check(&self, expr: &Expr, context: AggregateContext) -> CompileResult<()> {
        self.resolve_expr(expr, context)?;
        self.fold(expr)
    }

    fn resolve_expr(&self, expr: &Expr, context: AggregateContext) -> CompileResult<()> {
        match expr {
            Expr::Literal(..) => Ok(()),
            Expr::Identifier(name, span) => {
                if self.scope.contains(name) {
                    Ok(())
                } else {
                    Err(undefined_identifier(name, span))
                }
            }
            Expr::Parameter(name, span) => {
                if self.table.contains(name) {
                    Ok(())
                } else {
                    Err(missing_parameter(name, span))
                }
            }
            Expr::FunctionCall(call) => self.resolve_call(call, context),
            Expr::Binary(_, left, right, _) => {
                self.resolve_expr(left, context)?;
                self.resolve_expr(right, context)
            }
            Expr::Unary(_, operand, _)
            | Expr::Property(operand, _, _)
            | Expr::HasLabels(operand, _, _) => self.resolve_expr(operand, context),
            Expr::List(items, _) => items
                .iter()
                .try_for_each(|item| self.resolve_expr(item, context)),
            Expr::Map(entries, _) => entries
                .iter()
                .try_for_each(|(_, value)| self.resolve_expr(value, context)),
        }
    }

    fn resolve_call(&self, call: &FunctionCall, context: AggregateContext) -> CompileResult<()> {
        let signature = self
            .registry
            .lookup(&call.name)
            .ok_or_else(|| unknown_function(call))?;
        if call.star && signature.name != "count" {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                format!("'*' is only valid in count(*), not in {}", call.name),
                call.span.clone(),
            ));
        }
        if !signature.accepts(call.args.len()) {
            return Err(wrong_arity(call, signature));
        }

        let inner = if signature.is_aggregate() {
            match context {
                AggregateContext::Allowed => AggregateContext::InsideAggregate,
                AggregateContext::Forbidden => return Err(aggregate_not_allowed(call)),
                AggregateContext::InsideAggregate => {
                    return Err(CompileError::new(
                        ErrorKind::AggregateNotAllowed,
                        "Can't use aggregate functions inside of aggregate functions",
                        call.span.clone(),
                    ));
                }
            }
        } else {
            context
        };
        call.args
            .iter()
            .try_for_each(|arg| self.resolve_expr(arg, inner))
    }

    /// Evaluates every maximal static sub-expression against the table.
    fn fold(&self, expr: &Expr) -> CompileResult<()> {
        if is_static(expr, self.registry) {
            if !matches!(expr, Expr::Literal(..)) {
                evaluate_static(expr, self.table, self.registry)?;
            }
            return Ok(());
        }
        match expr {
            Expr::Literal(..) | Expr::Identifier(..) | Expr::Parameter(..) => Ok(()),
            Expr::FunctionCall(call) => call.args.iter().try_for_each(|arg| self.fold(arg)),
            Expr::Binary(_, left, right, _) => {
                self.fold(left)?;
                self.fold(right)
            }
            Expr::Unary(_, operand, _)
            | Expr::Property(operand, _, _)
            | Expr::HasLabels(operand, _, _) => self.fold(operand),
            Expr::List(items, _) => items.iter().try_for_each(|item| self.fold(item)),
            Expr::Map(entries, _) => entries.iter().try_for_each(|(_, value)| self.fold(value)),
        }
    }
}

fn undefined_identifier(name: &str, span: &Span) -> CompileError {
    CompileError::new(
        ErrorKind::UndefinedIdentifier,
        format!("'{name}' not defined"),
        span.clone(),
    )
}

fn already_declared(name: &str, span: &Span) -> CompileError {
    CompileError::new(
        ErrorKind::Syntax,
        format!("The bound variable '{name}' can't be redeclared in a CREATE clause"),
        span.clone(),
    )
}

/// True if `expr` contains a call to an aggregate function.
pub fn contains_aggregate(expr: &Expr, registry: &FunctionRegistry) -> bool {
    struct FindAggregate<'r>(&'r FunctionRegistry);

    impl Visit for FindAggregate<'_> {
        type Break = ();

        fn visit_expr(&mut self, expr: &Expr) -> VisitResult<()> {
            match expr {
                Expr::FunctionCall(call) if self.0.is_aggregate(&call.name) => {
                    ControlFlow::Break(())
                }
                _ => walk_expr(self, expr),
            }
        }
    }

    FindAggregate(registry).visit_expr(expr).is_break()
}

pub fn is_aggregating(clause: &ProjectionClause, registry: &FunctionRegistry) -> bool {
    clause
        .items
        .iter()
        .any(|item| contains_aggregate(&item.expr, registry))
}

/// `ORDER BY` may refer to the projection's input variables only when
/// the projection keeps one output row per input row.
pub fn order_by_sees_input(clause: &ProjectionClause, registry: &FunctionRegistry) -> bool {
    !clause.order_by.is_empty() && !clause.distinct && !is_aggregating(clause, registry)
}

/// `ORDER BY` keys as evaluated after the projection. When the projection
/// drops its input rows, a key part written like a projected item reads that
/// item's column instead.
pub fn sort_keys(
    clause: &ProjectionClause,
    source: &str,
    registry: &FunctionRegistry,
) -> Vec<SortItem> {
    if clause.order_by.is_empty() || order_by_sees_input(clause, registry) {
        return clause.order_by.clone();
    }
    let columns: Vec<(String, SmolStr)> = clause
        .items
        .iter()
        .map(|item| (item.expr.to_string(), item.column_name(source)))
        .collect();
    clause
        .order_by
        .iter()
        .map(|key| SortItem {
            expr: onto_columns(&key.expr, &columns),
            descending: key.descending,
        })
        .collect()
}

fn onto_columns(expr: &Expr, columns: &[(String, SmolStr)]) -> Expr {
    let written = expr.to_string();
    match columns.iter().find(|(text, _)| *text == written) {
        Some((_, column)) => Expr::Identifier(column.clone(), expr.span()),
        None => expr.map_children(|child| onto_columns(child, columns)),
    }
}

/// First variable referenced outside any aggregate call.
fn grouping_outside_aggregate(
    expr: &Expr,
    registry: &FunctionRegistry,
) -> Option<(SmolStr, Span)> {
    struct Outside<'r>(&'r FunctionRegistry);

    impl Visit for Outside<'_> {
        type Break = (SmolStr, Span);

        fn visit_expr(&mut self, expr: &Expr) -> VisitResult<Self::Break> {
            match expr {
                Expr::Identifier(name, span) => ControlFlow::Break((name.clone(), span.clone())),
                Expr::FunctionCall(call) if self.0.is_aggregate(&call.name) => {
                    ControlFlow::Continue(())
                }
                _ => walk_expr(self, expr),
            }
        }
    }

    match Outside(registry).visit_expr(expr) {
        ControlFlow::Break(found) => Some(found),
        ControlFlow::Continue(()) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseOptions, parse_query};
    use crate::semantic::params::{ParameterMap, ParameterTableBuilder};
    use crate::value::Value;

    fn resolve_with(source: &str, params: &[(&str, Value)]) -> CompileResult<()> {
        let (_, query) =
            parse_query(source, &ParseOptions::default()).map_err(CompileError::syntax)?;
        let client: ParameterMap = params
            .iter()
            .map(|(name, value)| (SmolStr::new(name), value.clone()))
            .collect();
        let table = ParameterTableBuilder::from_client(&client)?.freeze();
        let registry = FunctionRegistry::with_builtins();
        Resolver::new(source, &table, &registry).resolve(&query)
    }

    fn kind(source: &str) -> ErrorKind {
        match resolve_with(source, &[]) {
            Ok(()) => panic!("`{source}` resolved"),
            Err(err) => err.kind,
        }
    }

    #[test]
    fn valid_queries_resolve() {
        let ok = [
            "MATCH (n:Person {name: $name}) RETURN n",
            "MATCH (a)-[r:KNOWS]->(b) WHERE a.age > 1 RETURN a, r, b.name",
            "UNWIND [1, 2] AS x WITH x AS y RETURN y",
            "MATCH (n) RETURN n.age AS age, count(*) AS c ORDER BY c",
            "MATCH (n) RETURN n.name ORDER BY n.age",
            "CREATE (a:A {v: 1})-[:R]->(b) SET b.w = a.v",
            "MATCH (n) DETACH DELETE n",
        ];
        for source in ok {
            let params = [("name", Value::from("a"))];
            if let Err(err) = resolve_with(source, &params) {
                panic!("`{source}` failed: {err}");
            }
        }
    }

    #[test]
    fn unresolved_references() {
        assert_eq!(kind("RETURN $missing"), ErrorKind::MissingParameter);
        assert_eq!(kind("MATCH (n) WHERE n.v = $missing RETURN n"), ErrorKind::MissingParameter);
        assert_eq!(kind("MATCH (n) SET n.v = $missing"), ErrorKind::MissingParameter);
        assert_eq!(kind("RETURN x"), ErrorKind::UndefinedIdentifier);
        assert_eq!(kind("MATCH (n) SET m.v = 1"), ErrorKind::UndefinedIdentifier);
        assert_eq!(kind("MATCH (n) WITH n.v AS v RETURN n"), ErrorKind::UndefinedIdentifier);
        assert_eq!(kind("RETURN nope(1)"), ErrorKind::UndefinedFunction);
    }

    #[test]
    fn aggregate_placement() {
        assert_eq!(
            kind("MATCH (n) WHERE count(n) > 1 RETURN n"),
            ErrorKind::AggregateNotAllowed
        );
        assert_eq!(kind("UNWIND [count(1)] AS x RETURN x"), ErrorKind::AggregateNotAllowed);
        assert_eq!(kind("RETURN sum(count(1))"), ErrorKind::AggregateNotAllowed);
        assert_eq!(
            kind("MATCH (n) RETURN n.v ORDER BY count(n)"),
            ErrorKind::AggregateNotAllowed
        );
        assert_eq!(kind("MATCH (n) RETURN n.v + count(n)"), ErrorKind::Syntax);
    }

    #[test]
    fn static_operands_are_type_checked() {
        assert_eq!(kind("RETURN 1 * 'a'"), ErrorKind::Type);
        assert_eq!(kind("MATCH (n) RETURN n.v + (1 / 0)"), ErrorKind::Arithmetic);
        assert_eq!(kind("RETURN abs()"), ErrorKind::Type);
        let err = resolve_with("RETURN $p.key", &[("p", Value::Integer(1))]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert!(resolve_with("RETURN $p + 1", &[("p", Value::Integer(1))]).is_ok());
    }

    #[test]
    fn projection_shape() {
        assert_eq!(kind("UNWIND [1] AS x WITH x + 1 RETURN x"), ErrorKind::Syntax);
        assert_eq!(kind("RETURN 1 AS a, 2 AS a"), ErrorKind::Syntax);
        assert_eq!(
            kind("MATCH (n) RETURN DISTINCT n.v ORDER BY n.w"),
            ErrorKind::UndefinedIdentifier
        );
        assert_eq!(kind("RETURN sum(*)"), ErrorKind::Syntax);
    }

    #[test]
    fn order_by_after_dropped_input_reads_projected_items() {
        for source in [
            "MATCH (n) RETURN DISTINCT n.v ORDER BY n.v",
            "MATCH (n) RETURN DISTINCT n.v AS v ORDER BY n.v DESC",
            "MATCH (n) RETURN n.v, count(*) ORDER BY n.v",
            "MATCH (n) RETURN n.v, count(*) ORDER BY count(*) DESC, n.v",
            "MATCH (n) RETURN DISTINCT n ORDER BY n.v",
            "MATCH (n) WITH DISTINCT n.v AS v ORDER BY n.v RETURN v",
        ] {
            if let Err(err) = resolve_with(source, &[]) {
                panic!("`{source}` failed: {err}");
            }
        }
    }

    #[test]
    fn sort_keys_map_onto_columns() {
        let source = "MATCH (n) RETURN n.v AS v, count(*) ORDER BY n.v + 1, count(*)";
        let (_, query) = parse_query(source, &ParseOptions::default()).expect("parses");
        let Clause::Return(projection) = &query.clauses[1] else {
            panic!("expected RETURN");
        };
        let keys: Vec<String> = sort_keys(projection, source, &FunctionRegistry::with_builtins())
            .iter()
            .map(|key| key.expr.to_string())
            .collect();
        assert_eq!(keys, ["v + 1", "count(*)"]);
    }

    #[test]
    fn create_requires_typed_directed_relationships() {
        assert_eq!(kind("CREATE (a)-[:R]-(b)"), ErrorKind::Syntax);
        assert_eq!(kind("CREATE (a)-[]->(b)"), ErrorKind::Syntax);
        assert_eq!(kind("MATCH (a) CREATE (a:Label)"), ErrorKind::Syntax);
        assert!(resolve_with("MATCH (a) CREATE (a)-[:R]->(:B)", &[]).is_ok());
    }
}
