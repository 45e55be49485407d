//! Reference executor.
//!
//! Runs an [`ExecutionPlan`](crate::plan::ExecutionPlan) against a
//! [`Graph`](crate::graph::Graph). Rows are materialized between operators.

pub mod eval;
pub mod executor;
pub mod stats;

pub use executor::Executor;
pub use stats::ResultStatistics;

use crate::value::Value;
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::time::Duration;

/// Variable bindings flowing between operators.
pub type Row = IndexMap<SmolStr, Value>;

/// Rows returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<SmolStr>,
    pub rows: Vec<Vec<Value>>,
    pub statistics: ResultStatistics,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of column `name`, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }
}

/// Records produced by one operator during a profiled run.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorProfile {
    pub name: &'static str,
    pub detail: String,
    pub records: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfiledResult {
    pub result: ResultSet,
    /// Operators in execution order.
    pub operators: Vec<OperatorProfile>,
}

impl ProfiledResult {
    /// Profile output, laid out like explain output.
    pub fn lines(&self) -> Vec<String> {
        self.operators
            .iter()
            .rev()
            .enumerate()
            .map(|(depth, op)| {
                let name = if op.detail.is_empty() {
                    op.name.to_string()
                } else {
                    format!("{} | {}", op.name, op.detail)
                };
                format!(
                    "{}{name} | Records produced: {}, Execution time: {:.6} ms",
                    "    ".repeat(depth),
                    op.records,
                    op.elapsed.as_secs_f64() * 1000.0
                )
            })
            .collect()
    }

    pub fn records_of(&self, operator: &str) -> Option<usize> {
        self.operators
            .iter()
            .find(|op| op.name == operator)
            .map(|op| op.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::graph::{Graph, MemoryGraph};
    use crate::parser::{ParseOptions, parse_query};
    use crate::plan::Planner;
    use crate::semantic::functions::FunctionRegistry;
    use crate::semantic::params::{ParameterMap, ParameterTableBuilder};
    use crate::semantic::type_gate;
    use crate::value::NodeId;

    fn run_with(
        graph: &mut MemoryGraph,
        source: &str,
        params: &[(&str, Value)],
    ) -> Result<ResultSet, RuntimeError> {
        let (_, query) = parse_query(source, &ParseOptions::default()).expect("parses");
        let client: ParameterMap = params
            .iter()
            .map(|(name, value)| (SmolStr::new(name), value.clone()))
            .collect();
        let table = ParameterTableBuilder::from_client(&client)
            .expect("bindable")
            .freeze();
        let registry = FunctionRegistry::with_builtins();
        let bounds = type_gate::check_query(&query, &table, &registry).expect("valid bounds");
        let plan = Planner::new(source, &registry, true).plan(&query, &bounds);
        Executor::new(&registry, &table)
            .run(&plan, graph)
            .map(|(result, _)| result)
    }

    fn run(graph: &mut MemoryGraph, source: &str) -> ResultSet {
        run_with(graph, source, &[]).unwrap_or_else(|err| panic!("`{source}` failed: {err}"))
    }

    fn people() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph.add_node(["Person"], [("name", Value::from("a")), ("age", Value::Integer(30))]);
        graph.add_node(["Person"], [("name", Value::from("b")), ("age", Value::Integer(20))]);
        graph.add_node(["NoPerson"], [("name", Value::from("a")), ("age", Value::Integer(40))]);
        graph
    }

    #[test]
    fn create_then_match() {
        let mut graph = MemoryGraph::new();
        let created = run(&mut graph, "CREATE (:A {v: 1})-[:R {w: 2}]->(:B)");
        let stats = &created.statistics;
        assert_eq!(stats.nodes_created, 2);
        assert_eq!(stats.labels_added, 2);
        assert_eq!(stats.relationships_created, 1);
        assert_eq!(stats.properties_set, 2);
        assert!(created.is_empty());

        let result = run(&mut graph, "MATCH (a:A)-[r:R]->(b) RETURN a.v, r.w, labels(b)");
        assert_eq!(result.columns, ["a.v", "r.w", "labels(b)"]);
        assert_eq!(
            result.rows,
            [vec![Value::Integer(1), Value::Integer(2), Value::from(vec!["B"])]]
        );
    }

    #[test]
    fn label_and_property_filters() {
        let mut graph = people();
        let result = run_with(
            &mut graph,
            "MATCH (n:Person {name: $name}) RETURN n.age",
            &[("name", Value::from("a"))],
        )
        .expect("runs");
        assert_eq!(result.rows, [vec![Value::Integer(30)]]);
    }

    #[test]
    fn id_seek_accepts_integral_floats_only() {
        let mut graph = people();
        let seek = |graph: &mut MemoryGraph, id: Value| {
            run_with(graph, "MATCH (n) WHERE id(n) = $id RETURN n.name", &[("id", id)])
                .expect("runs")
                .rows
        };
        assert_eq!(seek(&mut graph, Value::Integer(1)), [vec![Value::from("b")]]);
        assert_eq!(seek(&mut graph, Value::Float(1.0)), [vec![Value::from("b")]]);
        assert!(seek(&mut graph, Value::Float(1.5)).is_empty());
        assert!(seek(&mut graph, Value::Integer(-1)).is_empty());
        assert!(seek(&mut graph, Value::from("1")).is_empty());
        assert!(seek(&mut graph, Value::Integer(9)).is_empty());
    }

    #[test]
    fn aggregation_and_ordering() {
        let mut graph = people();
        let result = run(
            &mut graph,
            "MATCH (n) RETURN n.name AS name, count(*) AS c, collect(n.age) AS ages ORDER BY name",
        );
        assert_eq!(
            result.rows,
            [
                vec![Value::from("a"), Value::Integer(2), Value::from(vec![30, 40])],
                vec![Value::from("b"), Value::Integer(1), Value::from(vec![20])],
            ]
        );

        let empty = run(&mut MemoryGraph::new(), "MATCH (n) RETURN count(n), sum(n.v), avg(n.v)");
        assert_eq!(
            empty.rows,
            [vec![Value::Integer(0), Value::Integer(0), Value::Null]]
        );
    }

    #[test]
    fn distinct_aggregates_and_rows() {
        let mut graph = MemoryGraph::new();
        let result = run(
            &mut graph,
            "UNWIND [1, 2, 2, null] AS x RETURN count(DISTINCT x) AS d, sum(x) AS s, min(x), max(x)",
        );
        assert_eq!(
            result.rows,
            [vec![
                Value::Integer(2),
                Value::Integer(5),
                Value::Integer(1),
                Value::Integer(2)
            ]]
        );
        let rows = run(&mut graph, "UNWIND [3, 1, 3] AS x RETURN DISTINCT x ORDER BY x DESC");
        assert_eq!(rows.rows, [vec![Value::Integer(3)], vec![Value::Integer(1)]]);
    }

    #[test]
    fn order_by_input_variable_skip_limit() {
        let mut graph = people();
        let result = run(
            &mut graph,
            "MATCH (n) RETURN n.name AS name ORDER BY n.age DESC SKIP 1 LIMIT 1",
        );
        assert_eq!(result.rows, [vec![Value::from("a")]]);
    }

    #[test]
    fn set_and_delete() {
        let mut graph = people();
        let set = run(&mut graph, "MATCH (n:Person) SET n.age = n.age + 1");
        assert_eq!(set.statistics.properties_set, 2);

        graph.create_relationship("KNOWS".into(), NodeId(0), NodeId(1), Default::default());
        let err = run_with(&mut graph, "MATCH (n:Person) DELETE n", &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::ConnectedNode(_)));

        let deleted = run(&mut graph, "MATCH (n:Person) DETACH DELETE n");
        assert_eq!(deleted.statistics.nodes_deleted, 2);
        assert_eq!(deleted.statistics.relationships_deleted, 1);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn runtime_type_errors() {
        let mut graph = people();
        let err = run_with(&mut graph, "MATCH (n) RETURN n.name * 2", &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::Operation(_)));
        let err = run_with(&mut graph, "UNWIND [1] AS x SET x.v = 1", &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }

    #[test]
    fn column_lookup() {
        let result = run(&mut MemoryGraph::new(), "UNWIND [1, 2] AS x RETURN x");
        assert_eq!(
            result.column("x"),
            Some(vec![&Value::Integer(1), &Value::Integer(2)])
        );
        assert_eq!(result.column("y"), None);
    }
}
