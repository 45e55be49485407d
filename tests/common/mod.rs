//! Common test utilities
//!
//! Shared fixtures and assertions for the integration tests.
//!
//! # Fixtures
//! - [`engine`] - Engine with the default configuration
//! - [`params`] - Build a [`ParameterMap`] from name/value pairs
//! - [`people_graph`] - Three nodes, two of them `:Person`
//!
//! # Assertions
//! - [`execute_ok`] - Execute a query, panicking with the rendered error on failure
//! - [`assert_fails_everywhere`] - Assert execute, profile and explain fail with one kind

#![allow(dead_code)]

use cypher_params::{
    Engine, ErrorKind, Graph, MemoryGraph, ParameterMap, QueryError, ResultSet, Value,
};

pub fn engine() -> Engine {
    Engine::default()
}

/// Builds a parameter map, preserving order.
///
/// # Example
/// ```no_run
/// let p = params(&[("skip", 1.into()), ("limit", 1.into())]);
/// ```
pub fn params(entries: &[(&str, Value)]) -> ParameterMap {
    entries
        .iter()
        .map(|(name, value)| ((*name).into(), value.clone()))
        .collect()
}

/// `(:Person {name:'a'})`, `(:Person {name:'b'})`, `(:NoPerson {name:'a'})`
/// with ids 0, 1 and 2.
pub fn people_graph() -> MemoryGraph {
    let mut graph = MemoryGraph::new();
    graph.add_node(["Person"], [("name", "a")]);
    graph.add_node(["Person"], [("name", "b")]);
    graph.add_node(["NoPerson"], [("name", "a")]);
    graph
}

/// Renders a failure with its source context.
pub fn describe(err: &QueryError, source: &str) -> String {
    match err {
        QueryError::Compile(compile) => format!("{:?}", compile.to_report(source)),
        QueryError::Runtime(runtime) => runtime.to_string(),
    }
}

/// Executes `source`, panicking on failure.
pub fn execute_ok(graph: &mut MemoryGraph, source: &str, params: &ParameterMap) -> ResultSet {
    engine()
        .execute(graph, source, params)
        .unwrap_or_else(|err| panic!("`{source}` failed:\n{}", describe(&err, source)))
}

/// Asserts that all three entry points reject `source` with `kind`.
///
/// # Panics
/// Panics if any entry point succeeds or fails with another kind.
pub fn assert_fails_everywhere(source: &str, params: &ParameterMap, kind: ErrorKind) {
    let engine = engine();
    let mut graph = MemoryGraph::new();
    let outcomes = [
        ("execute", engine.execute(&mut graph, source, params).err()),
        ("profile", engine.profile(&mut graph, source, params).err()),
        ("explain", engine.explain(source, params).err()),
    ];
    for (entry_point, outcome) in outcomes {
        let err = outcome.unwrap_or_else(|| panic!("{entry_point} accepted `{source}`"));
        assert_eq!(
            err.kind(),
            Some(kind),
            "{entry_point} rejected `{source}` with the wrong kind:\n{}",
            describe(&err, source)
        );
    }
    assert_eq!(graph.node_count(), 0, "`{source}` touched the graph");
}
