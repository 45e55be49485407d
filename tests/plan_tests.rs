//! Explain output and index seek selection.

mod common;

use common::{engine, execute_ok, params, people_graph};
use cypher_params::{Engine, EngineConfig, MemoryGraph, Operator, ParameterMap, Value};

fn explain(source: &str, params: &ParameterMap) -> Vec<String> {
    engine()
        .explain(source, params)
        .unwrap_or_else(|err| panic!("`{source}` failed: {err}"))
        .lines()
}

#[test]
fn test_id_scan() {
    let mut graph = MemoryGraph::new();
    execute_ok(&mut graph, "CREATE ({val:1})", &ParameterMap::new());

    let p = params(&[("id", Value::Integer(0))]);
    let source = "MATCH (n) WHERE id(n)=$id return n.val";
    let result = execute_ok(&mut graph, source, &p);
    assert_eq!(result.rows, [vec![Value::Integer(1)]]);

    let plan = explain(source, &p);
    assert!(plan.iter().any(|line| line.contains("NodeByIdSeek")), "{plan:?}");
}

#[test]
fn test_seek_key_from_declaration() {
    let plan = engine()
        .explain("CYPHER id=1 MATCH (n) WHERE 1 = 1 AND $id = id(n) RETURN n", &ParameterMap::new())
        .expect("plans");
    let Operator::NodeByIdSeek { alias, .. } = &plan.operators()[0] else {
        panic!("expected a seek, got {plan}");
    };
    assert_eq!(alias, "n");
    assert!(!plan.contains("AllNodeScan"));
}

#[test]
fn test_seek_requires_static_key() {
    let plan = explain("MATCH (n), (m) WHERE id(n) = m.ref RETURN n", &ParameterMap::new());
    assert!(plan.iter().all(|line| !line.contains("NodeByIdSeek")));
    assert!(plan.iter().any(|line| line.contains("Filter")), "{plan:?}");
}

#[test]
fn test_seek_and_scan_agree() {
    let scanning = Engine::new(EngineConfig::default().with_id_seek(false));
    let source = "MATCH (n) WHERE id(n) = $id RETURN n.name";
    let keys = [
        Value::Integer(0),
        Value::Integer(2),
        Value::Float(1.0),
        Value::Float(1.5),
        Value::Integer(-1),
        Value::Integer(42),
        Value::from("1"),
        Value::Null,
    ];
    for key in keys {
        let p = params(&[("id", key.clone())]);
        let seek = engine().execute(&mut people_graph(), source, &p).expect("seek runs");
        let scan = scanning.execute(&mut people_graph(), source, &p).expect("scan runs");
        assert_eq!(seek.rows, scan.rows, "id = {key}");
    }
}

#[test]
fn test_explain_is_idempotent() {
    let p = params(&[("id", Value::Integer(0)), ("limit", Value::Integer(3))]);
    let source = "MATCH (n:Person)-[r:KNOWS]->(m) WHERE id(n) = $id \
                  RETURN m.name AS name ORDER BY name LIMIT $limit";
    let first = explain(source, &p);
    let second = explain(source, &p);
    assert_eq!(first, second);
    assert!(first.iter().any(|line| line.trim_start() == "Limit | 3"), "{first:?}");
}

#[test]
fn test_explain_does_not_need_graph() {
    let plan = engine()
        .explain("MATCH (n) DETACH DELETE n", &ParameterMap::new())
        .expect("plans");
    assert_eq!(plan.operator_names(), ["AllNodeScan", "Delete"]);
    assert!(plan.columns().is_empty());
}

#[test]
fn test_property_pattern_with_parameter() {
    let plan = explain(
        "MATCH (n :Person {name:$name}) RETURN n",
        &params(&[("name", Value::from("a"))]),
    );
    assert_eq!(
        plan,
        [
            "Results | n",
            "    Project | n",
            "        Filter | n.name = $name",
            "            NodeByLabelScan | (n:Person)",
        ]
    );
}
