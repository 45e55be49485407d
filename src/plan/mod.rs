//! Execution plans.
//!
//! A plan is a linear pipeline: each operator consumes the rows of the one
//! before it. The first operator starts from a single empty row.

pub mod id_seek;
pub mod operator;
pub mod planner;

pub use operator::{AggFunc, AggregateSpec, Operator, ProjectItem};
pub use planner::Planner;

use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    operators: Vec<Operator>,
    columns: Vec<SmolStr>,
}

impl ExecutionPlan {
    pub fn new(operators: Vec<Operator>, columns: Vec<SmolStr>) -> Self {
        Self { operators, columns }
    }

    /// Operators in execution order.
    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    /// Result columns; empty for queries without `RETURN`.
    pub fn columns(&self) -> &[SmolStr] {
        &self.columns
    }

    pub fn contains(&self, operator: &str) -> bool {
        self.operators.iter().any(|op| op.name() == operator)
    }

    pub fn operator_names(&self) -> Vec<&'static str> {
        self.operators.iter().map(Operator::name).collect()
    }

    /// Explain output: the last operator first, each input indented one
    /// level deeper than its consumer.
    pub fn lines(&self) -> Vec<String> {
        self.operators
            .iter()
            .rev()
            .enumerate()
            .map(|(depth, op)| format!("{}{op}", "    ".repeat(depth)))
            .collect()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseOptions, parse_query};
    use crate::semantic::functions::FunctionRegistry;
    use crate::semantic::type_gate::RowBounds;

    fn plan(source: &str, enable_id_seek: bool) -> ExecutionPlan {
        let (_, query) = parse_query(source, &ParseOptions::default()).expect("parses");
        let registry = FunctionRegistry::with_builtins();
        let bounds = vec![RowBounds::default(); query.clauses.len()];
        Planner::new(source, &registry, enable_id_seek).plan(&query, &bounds)
    }

    #[test]
    fn id_predicate_becomes_seek() {
        let plan = plan("MATCH (n) WHERE id(n) = $id RETURN n.val", true);
        assert_eq!(
            plan.operator_names(),
            ["NodeByIdSeek", "Project", "Results"]
        );
        assert_eq!(
            plan.lines(),
            [
                "Results | n.val",
                "    Project | n.val AS n.val",
                "        NodeByIdSeek | (n) id = $id",
            ]
        );
    }

    #[test]
    fn seek_can_be_disabled() {
        let plan = plan("MATCH (n) WHERE id(n) = $id RETURN n", false);
        assert_eq!(
            plan.operator_names(),
            ["AllNodeScan", "Filter", "Project", "Results"]
        );
    }

    #[test]
    fn residual_conjuncts_and_pattern_filters() {
        let plan = plan(
            "MATCH (n:Person:Admin {name: $name}) WHERE n.age > 1 AND id(n) = 0 RETURN n",
            true,
        );
        let lines: Vec<String> = plan.operators().iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            [
                "NodeByIdSeek | (n) id = 0",
                "Filter | n:Person:Admin",
                "Filter | n.name = $name",
                "Filter | n.age > 1",
                "Project | n",
                "Results | n",
            ]
        );
    }

    #[test]
    fn label_scan_and_expand() {
        let plan = plan("MATCH (a:A)-[:R]->(b:B) RETURN b", true);
        let lines: Vec<String> = plan.operators().iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            [
                "NodeByLabelScan | (a:A)",
                "Expand | (a)-[__anon0:R]->(b)",
                "Filter | b:B",
                "Project | b",
                "Results | b",
            ]
        );
    }

    #[test]
    fn bound_start_node_is_not_rescanned() {
        let plan = plan("MATCH (a) MATCH (a)-->(b) WHERE id(a) = 1 RETURN b", true);
        assert_eq!(
            plan.operator_names(),
            ["AllNodeScan", "Expand", "Filter", "Project", "Results"]
        );
    }

    #[test]
    fn aggregation_pipeline() {
        let plan = plan(
            "UNWIND [1, 2, 2] AS x RETURN x, count(*) AS c, count(*) + 1 AS d ORDER BY c",
            true,
        );
        assert_eq!(
            plan.operator_names(),
            ["Unwind", "Aggregate", "Project", "Sort", "Results"]
        );
        let Operator::Aggregate { keys, aggregates } = &plan.operators()[1] else {
            panic!("expected Aggregate");
        };
        assert_eq!(keys.len(), 1);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(plan.columns(), ["x", "c", "d"]);
    }

    #[test]
    fn with_order_by_input_is_trimmed() {
        let plan = plan("MATCH (n) WITH n.v AS v ORDER BY n.w WHERE v > 1 RETURN v", true);
        assert_eq!(
            plan.operator_names(),
            ["AllNodeScan", "Project", "Sort", "Project", "Filter", "Project", "Results"]
        );
        assert!(matches!(
            plan.operators()[1],
            Operator::Project {
                retain_input: true,
                ..
            }
        ));
    }

    #[test]
    fn display_matches_lines() {
        let plan = plan("CREATE (:A)", true);
        assert_eq!(plan.to_string(), "Create | 1 node pattern(s), 0 relationship pattern(s)");
        assert!(plan.columns().is_empty());
    }
}
