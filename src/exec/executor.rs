//! Pipeline executor.
//!
//! Each operator consumes the fully materialized output of the previous
//! one. Execution starts from a single empty row.

use std::collections::HashSet;
use std::time::Instant;

use crate::ast::{BinaryOperator, Direction, Expr, NodePattern, PathPattern, SetItem, SortItem};
use crate::error::RuntimeError;
use crate::exec::eval::evaluate;
use crate::exec::stats::ResultStatistics;
use crate::exec::{OperatorProfile, ResultSet, Row};
use crate::graph::Graph;
use crate::plan::{AggFunc, AggregateSpec, ExecutionPlan, Operator, ProjectItem};
use crate::semantic::functions::FunctionRegistry;
use crate::semantic::params::ParameterTable;
use crate::value::ops::{self, OpError};
use crate::value::{NodeId, RelationshipId, Value, ValueMap};
use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use tracing::trace;

pub struct Executor<'e> {
    registry: &'e FunctionRegistry,
    params: &'e ParameterTable,
    stats: ResultStatistics,
}

impl<'e> Executor<'e> {
    pub fn new(registry: &'e FunctionRegistry, params: &'e ParameterTable) -> Self {
        Self {
            registry,
            params,
            stats: ResultStatistics::default(),
        }
    }

    /// Runs `plan` to completion, recording per-operator counts.
    pub fn run(
        mut self,
        plan: &ExecutionPlan,
        graph: &mut dyn Graph,
    ) -> Result<(ResultSet, Vec<OperatorProfile>), RuntimeError> {
        let started = Instant::now();
        let mut rows = vec![Row::new()];
        let mut profiles = Vec::with_capacity(plan.operators().len());
        let mut output = Vec::new();

        for op in plan.operators() {
            let op_started = Instant::now();
            rows = match op {
                Operator::Results { columns } => {
                    output = rows
                        .iter()
                        .map(|row| {
                            columns
                                .iter()
                                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                                .collect()
                        })
                        .collect();
                    rows
                }
                op => self.apply(op, rows, graph)?,
            };
            trace!(operator = op.name(), records = rows.len(), "operator finished");
            profiles.push(OperatorProfile {
                name: op.name(),
                detail: op.detail(),
                records: rows.len(),
                elapsed: op_started.elapsed(),
            });
        }

        self.stats.execution_time = started.elapsed();
        let result = ResultSet {
            columns: plan.columns().to_vec(),
            rows: output,
            statistics: self.stats,
        };
        Ok((result, profiles))
    }

    fn apply(
        &mut self,
        op: &Operator,
        rows: Vec<Row>,
        graph: &mut dyn Graph,
    ) -> Result<Vec<Row>, RuntimeError> {
        match op {
            Operator::AllNodeScan { alias } => Ok(scan(rows, alias, &graph.node_ids())),
            Operator::NodeByLabelScan { alias, label } => {
                Ok(scan(rows, alias, &graph.nodes_with_label(label)))
            }
            Operator::NodeByIdSeek { alias, id } => self.seek(rows, alias, id, graph),
            Operator::Expand {
                from,
                rel_alias,
                rel_type,
                direction,
                to,
                to_bound,
                distinct_from,
            } => {
                let step = Expansion {
                    from,
                    rel_alias,
                    rel_type: rel_type.as_deref(),
                    direction: *direction,
                    to,
                    to_bound: *to_bound,
                    distinct_from,
                };
                expand(rows, &step, graph)
            }
            Operator::Filter { predicate } => {
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    if ops::is_true(&self.eval(predicate, &row, graph)?) {
                        kept.push(row);
                    }
                }
                Ok(kept)
            }
            Operator::Unwind { expr, alias } => self.unwind(rows, expr, alias, graph),
            Operator::Create { patterns } => self.create(rows, patterns, graph),
            Operator::Update { items } => self.update(rows, items, graph),
            Operator::Delete { targets, detach } => self.delete(rows, targets, *detach, graph),
            Operator::Aggregate { keys, aggregates } => {
                self.aggregate(rows, keys, aggregates, graph)
            }
            Operator::Project {
                items,
                retain_input,
            } => self.project(rows, items, *retain_input, graph),
            Operator::Distinct { columns } => {
                let mut seen = HashSet::new();
                Ok(rows
                    .into_iter()
                    .filter(|row| {
                        let key: Vec<Value> = columns
                            .iter()
                            .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                            .collect();
                        seen.insert(key)
                    })
                    .collect())
            }
            Operator::Sort { keys } => self.sort(rows, keys, graph),
            Operator::Skip { count } => Ok(rows.into_iter().skip(as_len(*count)).collect()),
            Operator::Limit { count } => Ok(rows.into_iter().take(as_len(*count)).collect()),
            Operator::Results { .. } => Ok(rows),
        }
    }

    fn eval(&self, expr: &Expr, row: &Row, graph: &dyn Graph) -> Result<Value, RuntimeError> {
        evaluate(expr, row, self.params, graph, self.registry)
    }

    fn seek(
        &self,
        rows: Vec<Row>,
        alias: &SmolStr,
        id: &Expr,
        graph: &dyn Graph,
    ) -> Result<Vec<Row>, RuntimeError> {
        let mut out = Vec::new();
        for row in rows {
            let key = self.eval(id, &row, graph)?;
            let Some(node) = seek_key(&key) else {
                continue;
            };
            if graph.node(node).is_some() {
                let mut row = row;
                row.insert(alias.clone(), Value::Node(node));
                out.push(row);
            }
        }
        Ok(out)
    }

    fn unwind(
        &self,
        rows: Vec<Row>,
        expr: &Expr,
        alias: &SmolStr,
        graph: &dyn Graph,
    ) -> Result<Vec<Row>, RuntimeError> {
        let mut out = Vec::new();
        for row in rows {
            let items = match self.eval(expr, &row, graph)? {
                Value::Null => Vec::new(),
                Value::List(items) => items,
                other => vec![other],
            };
            for item in items {
                let mut next = row.clone();
                next.insert(alias.clone(), item);
                out.push(next);
            }
        }
        Ok(out)
    }

    fn create(
        &mut self,
        rows: Vec<Row>,
        patterns: &[PathPattern],
        graph: &mut dyn Graph,
    ) -> Result<Vec<Row>, RuntimeError> {
        let mut out = Vec::with_capacity(rows.len());
        for mut row in rows {
            for path in patterns {
                let mut from = self.create_node(&mut row, &path.start, graph)?;
                for (rel, node) in &path.hops {
                    let to = self.create_node(&mut row, node, graph)?;
                    let properties = self.eval_properties(&rel.properties, &row, graph)?;
                    let (start, end) = match rel.direction {
                        Direction::Incoming => (to, from),
                        Direction::Outgoing | Direction::Either => (from, to),
                    };
                    self.stats.properties_set += properties.len() as u64;
                    let rel_type = rel.rel_type.clone().unwrap_or_default();
                    let id = graph
                        .create_relationship(rel_type, start, end, properties)
                        .ok_or(RuntimeError::MissingNode(start))?;
                    self.stats.relationships_created += 1;
                    if let Some(variable) = &rel.variable {
                        row.insert(variable.clone(), Value::Relationship(id));
                    }
                    from = to;
                }
            }
            out.push(row);
        }
        Ok(out)
    }

    fn create_node(
        &mut self,
        row: &mut Row,
        node: &NodePattern,
        graph: &mut dyn Graph,
    ) -> Result<NodeId, RuntimeError> {
        if let Some(variable) = &node.variable {
            match row.get(variable) {
                Some(Value::Node(id)) => {
                    let id = *id;
                    if graph.node(id).is_none() {
                        return Err(RuntimeError::MissingNode(id));
                    }
                    return Ok(id);
                }
                Some(other) => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "Node",
                        found: other.value_type(),
                    });
                }
                None => {}
            }
        }

        let properties = self.eval_properties(&node.properties, row, graph)?;
        self.stats.nodes_created += 1;
        self.stats.labels_added += node.labels.len() as u64;
        self.stats.properties_set += properties.len() as u64;
        let id = graph.create_node(node.labels.clone(), properties);
        if let Some(variable) = &node.variable {
            row.insert(variable.clone(), Value::Node(id));
        }
        Ok(id)
    }

    /// Evaluates pattern properties, dropping nulls.
    fn eval_properties(
        &self,
        properties: &[(SmolStr, Expr)],
        row: &Row,
        graph: &dyn Graph,
    ) -> Result<ValueMap, RuntimeError> {
        let mut map = ValueMap::with_capacity(properties.len());
        for (key, expr) in properties {
            let value = storable(self.eval(expr, row, graph)?)?;
            if !value.is_null() {
                map.insert(key.clone(), value);
            }
        }
        Ok(map)
    }

    fn update(
        &mut self,
        rows: Vec<Row>,
        items: &[SetItem],
        graph: &mut dyn Graph,
    ) -> Result<Vec<Row>, RuntimeError> {
        for row in &rows {
            for item in items {
                let value = storable(self.eval(&item.value, row, graph)?)?;
                let applied = match row.get(&item.variable) {
                    None | Some(Value::Null) => false,
                    Some(Value::Node(id)) => graph.set_node_property(*id, item.key.clone(), value),
                    Some(Value::Relationship(id)) => {
                        graph.set_relationship_property(*id, item.key.clone(), value)
                    }
                    Some(other) => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: "Node or Relationship",
                            found: other.value_type(),
                        });
                    }
                };
                if applied {
                    self.stats.properties_set += 1;
                }
            }
        }
        Ok(rows)
    }

    /// Deletes every target of every row: relationships first, then nodes.
    fn delete(
        &mut self,
        rows: Vec<Row>,
        targets: &[Expr],
        detach: bool,
        graph: &mut dyn Graph,
    ) -> Result<Vec<Row>, RuntimeError> {
        let mut nodes = IndexSet::new();
        let mut relationships = IndexSet::new();
        for row in &rows {
            for target in targets {
                match self.eval(target, row, graph)? {
                    Value::Null => {}
                    Value::Node(id) => {
                        nodes.insert(id);
                    }
                    Value::Relationship(id) => {
                        relationships.insert(id);
                    }
                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: "Node or Relationship",
                            found: other.value_type(),
                        });
                    }
                }
            }
        }

        for id in relationships {
            self.delete_relationship(id, graph);
        }
        for id in nodes {
            if graph.node(id).is_none() {
                continue;
            }
            let attached = graph.relationships_of(id);
            if !attached.is_empty() && !detach {
                return Err(RuntimeError::ConnectedNode(id));
            }
            for rel in attached {
                self.delete_relationship(rel, graph);
            }
            if graph.delete_node(id) {
                self.stats.nodes_deleted += 1;
            }
        }
        Ok(rows)
    }

    fn delete_relationship(&mut self, id: RelationshipId, graph: &mut dyn Graph) {
        if graph.delete_relationship(id) {
            self.stats.relationships_deleted += 1;
        }
    }

    fn aggregate(
        &self,
        rows: Vec<Row>,
        keys: &[ProjectItem],
        aggregates: &[AggregateSpec],
        graph: &dyn Graph,
    ) -> Result<Vec<Row>, RuntimeError> {
        let mut groups: IndexMap<Vec<Value>, Vec<Accumulator>> = IndexMap::new();
        for row in &rows {
            let key = keys
                .iter()
                .map(|item| self.eval(&item.expr, row, graph))
                .collect::<Result<Vec<_>, _>>()?;
            let accumulators = groups
                .entry(key)
                .or_insert_with(|| aggregates.iter().map(Accumulator::new).collect());
            for (spec, accumulator) in aggregates.iter().zip(accumulators.iter_mut()) {
                let value = match &spec.arg {
                    Some(arg) => Some(self.eval(arg, row, graph)?),
                    None => None,
                };
                accumulator.update(value)?;
            }
        }

        // Aggregating nothing without grouping keys still yields one row.
        if groups.is_empty() && keys.is_empty() {
            groups.insert(Vec::new(), aggregates.iter().map(Accumulator::new).collect());
        }

        Ok(groups
            .into_iter()
            .map(|(key, accumulators)| {
                let mut row: Row = keys
                    .iter()
                    .map(|item| item.name.clone())
                    .zip(key)
                    .collect();
                for (spec, accumulator) in aggregates.iter().zip(accumulators) {
                    row.insert(spec.slot.clone(), accumulator.finish());
                }
                row
            })
            .collect())
    }

    fn project(
        &self,
        rows: Vec<Row>,
        items: &[ProjectItem],
        retain_input: bool,
        graph: &dyn Graph,
    ) -> Result<Vec<Row>, RuntimeError> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let values = items
                .iter()
                .map(|item| self.eval(&item.expr, &row, graph))
                .collect::<Result<Vec<_>, _>>()?;
            let mut next = if retain_input { row } else { Row::new() };
            for (item, value) in items.iter().zip(values) {
                next.insert(item.name.clone(), value);
            }
            out.push(next);
        }
        Ok(out)
    }

    fn sort(
        &self,
        rows: Vec<Row>,
        keys: &[SortItem],
        graph: &dyn Graph,
    ) -> Result<Vec<Row>, RuntimeError> {
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let sort_key = keys
                .iter()
                .map(|key| self.eval(&key.expr, &row, graph))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((sort_key, row));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            for ((left, right), key) in a.iter().zip(b).zip(keys) {
                let ordering = if key.descending {
                    right.cmp(left)
                } else {
                    left.cmp(right)
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }
}

fn scan(rows: Vec<Row>, alias: &SmolStr, nodes: &[NodeId]) -> Vec<Row> {
    let mut out = Vec::with_capacity(rows.len() * nodes.len());
    for row in &rows {
        for id in nodes {
            let mut next = row.clone();
            next.insert(alias.clone(), Value::Node(*id));
            out.push(next);
        }
    }
    out
}

struct Expansion<'a> {
    from: &'a SmolStr,
    rel_alias: &'a SmolStr,
    rel_type: Option<&'a str>,
    direction: Direction,
    to: &'a SmolStr,
    to_bound: bool,
    distinct_from: &'a [SmolStr],
}

fn expand(
    rows: Vec<Row>,
    step: &Expansion<'_>,
    graph: &dyn Graph,
) -> Result<Vec<Row>, RuntimeError> {
    let mut out = Vec::new();
    for row in rows {
        let from = match row.get(step.from) {
            Some(Value::Node(id)) => *id,
            None | Some(Value::Null) => continue,
            Some(other) => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "Node",
                    found: other.value_type(),
                });
            }
        };
        for rel_id in graph.relationships_of(from) {
            let Some(rel) = graph.relationship(rel_id) else {
                continue;
            };
            if step.rel_type.is_some_and(|t| rel.rel_type != t) {
                continue;
            }
            let Some(other) = rel.other_end(from, step.direction) else {
                continue;
            };
            let reused = step
                .distinct_from
                .iter()
                .any(|alias| row.get(alias) == Some(&Value::Relationship(rel_id)));
            if reused {
                continue;
            }
            if step.to_bound && row.get(step.to) != Some(&Value::Node(other)) {
                continue;
            }
            let mut next = row.clone();
            next.insert(step.rel_alias.clone(), Value::Relationship(rel_id));
            next.insert(step.to.clone(), Value::Node(other));
            out.push(next);
        }
    }
    Ok(out)
}

/// Node addressed by an id seek key. Keys that cannot equal any node id
/// address nothing.
fn seek_key(key: &Value) -> Option<NodeId> {
    match key {
        Value::Integer(i) => u64::try_from(*i).ok().map(NodeId),
        Value::Float(f) if f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f < 1.8e19 => {
            Some(NodeId(*f as u64))
        }
        _ => None,
    }
}

fn storable(value: Value) -> Result<Value, RuntimeError> {
    if value.is_bindable() {
        Ok(value)
    } else {
        Err(RuntimeError::TypeMismatch {
            expected: "a property value",
            found: value.value_type(),
        })
    }
}

fn as_len(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX)
}

struct Accumulator {
    func: AggFunc,
    state: AccumulatorState,
    seen: Option<HashSet<Value>>,
}

enum AccumulatorState {
    Count(i64),
    Sum(Value),
    Avg { sum: f64, count: u64 },
    Extreme(Option<Value>),
    Collect(Vec<Value>),
}

impl Accumulator {
    fn new(spec: &AggregateSpec) -> Self {
        let state = match spec.func {
            AggFunc::Count => AccumulatorState::Count(0),
            AggFunc::Sum => AccumulatorState::Sum(Value::Integer(0)),
            AggFunc::Avg => AccumulatorState::Avg { sum: 0.0, count: 0 },
            AggFunc::Min | AggFunc::Max => AccumulatorState::Extreme(None),
            AggFunc::Collect => AccumulatorState::Collect(Vec::new()),
        };
        Self {
            func: spec.func,
            state,
            seen: spec.distinct.then(HashSet::new),
        }
    }

    /// `None` is a `count(*)` row.
    fn update(&mut self, value: Option<Value>) -> Result<(), RuntimeError> {
        let value = match value {
            None => {
                if let AccumulatorState::Count(n) = &mut self.state {
                    *n += 1;
                }
                return Ok(());
            }
            Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };
        if let Some(seen) = &mut self.seen {
            if !seen.insert(value.clone()) {
                return Ok(());
            }
        }

        match &mut self.state {
            AccumulatorState::Count(n) => *n += 1,
            AccumulatorState::Sum(total) => {
                if !matches!(value, Value::Integer(_) | Value::Float(_)) {
                    return Err(aggregate_type_error(self.func, &value));
                }
                *total = ops::binary(BinaryOperator::Add, total, &value)?;
            }
            AccumulatorState::Avg { sum, count } => {
                let Some(number) = value.as_f64() else {
                    return Err(aggregate_type_error(self.func, &value));
                };
                *sum += number;
                *count += 1;
            }
            AccumulatorState::Extreme(current) => {
                let replace = match current {
                    None => true,
                    Some(current) if self.func == AggFunc::Min => value < *current,
                    Some(current) => value > *current,
                };
                if replace {
                    *current = Some(value);
                }
            }
            AccumulatorState::Collect(items) => items.push(value),
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self.state {
            AccumulatorState::Count(n) => Value::Integer(n),
            AccumulatorState::Sum(total) => total,
            AccumulatorState::Avg { count: 0, .. } => Value::Null,
            AccumulatorState::Avg { sum, count } => Value::Float(sum / count as f64),
            AccumulatorState::Extreme(value) => value.unwrap_or(Value::Null),
            AccumulatorState::Collect(items) => Value::List(items),
        }
    }
}

fn aggregate_type_error(func: AggFunc, value: &Value) -> RuntimeError {
    let name = match func {
        AggFunc::Sum => "+",
        _ => "avg",
    };
    RuntimeError::Operation(OpError::Type {
        op: name,
        left: value.value_type(),
        right: None,
    })
}
