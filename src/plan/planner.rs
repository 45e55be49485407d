//! Query planner.
//!
//! Translates a resolved query into a linear pipeline of operators. The
//! planner assumes resolution and the row-bound gate already passed and
//! cannot fail.

use crate::ast::{
    BinaryOperator, Clause, Expr, FunctionCall, MatchClause, NodePattern, PathPattern,
    ProjectionClause, Query, RelationshipPattern, Span,
};
use crate::plan::id_seek::{self, IdSeek};
use crate::plan::operator::{AggFunc, AggregateSpec, Operator, ProjectItem};
use crate::plan::ExecutionPlan;
use crate::semantic::functions::FunctionRegistry;
use crate::semantic::resolver::{
    Scope, contains_aggregate, is_aggregating, order_by_sees_input, sort_keys,
};
use crate::semantic::type_gate::RowBounds;
use smol_str::SmolStr;
use tracing::debug;

pub struct Planner<'p> {
    source: &'p str,
    registry: &'p FunctionRegistry,
    enable_id_seek: bool,
    operators: Vec<Operator>,
    /// Variables bound by the operators emitted so far.
    bound: Scope,
    anonymous: usize,
    aggregates: usize,
}

impl<'p> Planner<'p> {
    pub fn new(source: &'p str, registry: &'p FunctionRegistry, enable_id_seek: bool) -> Self {
        Self {
            source,
            registry,
            enable_id_seek,
            operators: Vec::new(),
            bound: Scope::new(),
            anonymous: 0,
            aggregates: 0,
        }
    }

    /// Plans `query`. `bounds` holds one entry per `WITH`/`RETURN`, in
    /// clause order.
    pub fn plan(mut self, query: &Query, bounds: &[RowBounds]) -> ExecutionPlan {
        let mut bounds = bounds.iter().copied();
        let mut columns = Vec::new();
        for clause in &query.clauses {
            match clause {
                Clause::Match(clause) => self.plan_match(clause),
                Clause::Unwind(clause) => {
                    self.operators.push(Operator::Unwind {
                        expr: clause.expr.clone(),
                        alias: clause.alias.clone(),
                    });
                    self.bound.insert(clause.alias.clone());
                }
                Clause::Create(clause) => {
                    let patterns: Vec<PathPattern> =
                        clause.patterns.iter().map(|p| self.name_path(p)).collect();
                    for path in &patterns {
                        self.bind_path(path);
                    }
                    self.operators.push(Operator::Create { patterns });
                }
                Clause::Set(clause) => self.operators.push(Operator::Update {
                    items: clause.items.clone(),
                }),
                Clause::Delete(clause) => self.operators.push(Operator::Delete {
                    targets: clause.targets.clone(),
                    detach: clause.detach,
                }),
                Clause::With(projection) => {
                    let bounds = bounds.next().unwrap_or_default();
                    self.plan_projection(projection, bounds, true);
                }
                Clause::Return(projection) => {
                    let bounds = bounds.next().unwrap_or_default();
                    columns = self.plan_projection(projection, bounds, false);
                }
            }
        }
        debug!(operators = self.operators.len(), "plan built");
        ExecutionPlan::new(self.operators, columns)
    }

    fn plan_match(&mut self, clause: &MatchClause) {
        let patterns: Vec<PathPattern> =
            clause.patterns.iter().map(|p| self.name_path(p)).collect();
        let conjuncts = clause
            .where_clause
            .as_ref()
            .map(Expr::conjuncts)
            .unwrap_or_default();

        let seek = if self.enable_id_seek {
            let candidates = self.seek_candidates(clause);
            id_seek::select(&conjuncts, &candidates, self.registry)
        } else {
            None
        };
        if let Some(seek) = &seek {
            debug!(alias = %seek.alias, key = %seek.key, "id seek selected");
        }

        let mut matched_rels = Vec::new();
        for path in &patterns {
            self.plan_path(path, seek.as_ref(), &mut matched_rels);
        }

        let residual: Vec<Expr> = conjuncts
            .iter()
            .enumerate()
            .filter(|(index, _)| seek.as_ref().is_none_or(|s| s.conjunct != *index))
            .map(|(_, conjunct)| (*conjunct).clone())
            .collect();
        if let Some(predicate) = Expr::conjunction(residual) {
            self.operators.push(Operator::Filter { predicate });
        }
    }

    /// Named start nodes this `MATCH` introduces.
    fn seek_candidates(&self, clause: &MatchClause) -> Vec<SmolStr> {
        let mut seen = self.bound.clone();
        let mut candidates = Vec::new();
        for path in &clause.patterns {
            if let Some(variable) = &path.start.variable {
                if !seen.contains(variable) {
                    candidates.push(variable.clone());
                }
            }
            seen.extend(path.nodes().filter_map(|node| node.variable.clone()));
        }
        candidates
    }

    fn plan_path(
        &mut self,
        path: &PathPattern,
        seek: Option<&IdSeek>,
        matched_rels: &mut Vec<SmolStr>,
    ) {
        let start = alias_of(&path.start.variable);
        let start_bound = self.bound.contains(&start);
        let mut labels = path.start.labels.as_slice();
        if !start_bound {
            match (seek, labels.split_first()) {
                (Some(seek), _) if seek.alias == start => {
                    self.operators.push(Operator::NodeByIdSeek {
                        alias: start.clone(),
                        id: seek.key.clone(),
                    });
                }
                (_, Some((label, rest))) => {
                    self.operators.push(Operator::NodeByLabelScan {
                        alias: start.clone(),
                        label: label.clone(),
                    });
                    labels = rest;
                }
                _ => self.operators.push(Operator::AllNodeScan {
                    alias: start.clone(),
                }),
            }
            self.bound.insert(start.clone());
        }
        self.filter_labels(&start, labels, &path.start.span);
        self.filter_properties(&start, &path.start.properties);

        let mut from = start;
        for (rel, node) in &path.hops {
            let rel_alias = alias_of(&rel.variable);
            let to = alias_of(&node.variable);
            self.operators.push(Operator::Expand {
                from: from.clone(),
                rel_alias: rel_alias.clone(),
                rel_type: rel.rel_type.clone(),
                direction: rel.direction,
                to: to.clone(),
                to_bound: self.bound.contains(&to),
                distinct_from: matched_rels.clone(),
            });
            self.bound.insert(rel_alias.clone());
            self.bound.insert(to.clone());
            matched_rels.push(rel_alias.clone());

            self.filter_properties(&rel_alias, &rel.properties);
            self.filter_labels(&to, &node.labels, &node.span);
            self.filter_properties(&to, &node.properties);
            from = to;
        }
    }

    fn filter_labels(&mut self, alias: &SmolStr, labels: &[SmolStr], span: &Span) {
        if labels.is_empty() {
            return;
        }
        let target = Expr::Identifier(alias.clone(), span.clone());
        self.operators.push(Operator::Filter {
            predicate: Expr::HasLabels(Box::new(target), labels.to_vec(), span.clone()),
        });
    }

    fn filter_properties(&mut self, alias: &SmolStr, properties: &[(SmolStr, Expr)]) {
        for (key, value) in properties {
            let span = value.span();
            let target = Expr::Identifier(alias.clone(), span.clone());
            let property = Expr::Property(Box::new(target), key.clone(), span.clone());
            self.operators.push(Operator::Filter {
                predicate: Expr::Binary(
                    BinaryOperator::Eq,
                    Box::new(property),
                    Box::new(value.clone()),
                    span,
                ),
            });
        }
    }

    fn plan_projection(
        &mut self,
        clause: &ProjectionClause,
        bounds: RowBounds,
        is_with: bool,
    ) -> Vec<SmolStr> {
        let items: Vec<ProjectItem> = clause
            .items
            .iter()
            .map(|item| ProjectItem {
                name: item.column_name(self.source),
                expr: item.expr.clone(),
            })
            .collect();
        let columns: Vec<SmolStr> = items.iter().map(|item| item.name.clone()).collect();

        let retain_input = order_by_sees_input(clause, self.registry);
        if is_aggregating(clause, self.registry) {
            let mut keys = Vec::new();
            let mut specs = Vec::new();
            let mut projected = Vec::with_capacity(items.len());
            for item in items {
                if contains_aggregate(&item.expr, self.registry) {
                    let expr = self.extract_aggregates(&item.expr, &mut specs);
                    projected.push(ProjectItem {
                        name: item.name,
                        expr,
                    });
                } else {
                    projected.push(ProjectItem {
                        name: item.name.clone(),
                        expr: Expr::Identifier(item.name.clone(), item.expr.span()),
                    });
                    keys.push(item);
                }
            }
            self.operators.push(Operator::Aggregate {
                keys,
                aggregates: specs,
            });
            self.operators.push(Operator::Project {
                items: projected,
                retain_input: false,
            });
        } else {
            self.operators.push(Operator::Project {
                items,
                retain_input,
            });
        }

        if clause.distinct {
            self.operators.push(Operator::Distinct {
                columns: columns.clone(),
            });
        }
        if !clause.order_by.is_empty() {
            self.operators.push(Operator::Sort {
                keys: sort_keys(clause, self.source, self.registry),
            });
        }
        if let Some(count) = bounds.skip {
            self.operators.push(Operator::Skip { count });
        }
        if let Some(count) = bounds.limit {
            self.operators.push(Operator::Limit { count });
        }

        if is_with {
            if retain_input {
                self.operators.push(Operator::Project {
                    items: columns
                        .iter()
                        .map(|name| ProjectItem {
                            name: name.clone(),
                            expr: Expr::Identifier(name.clone(), clause.span.clone()),
                        })
                        .collect(),
                    retain_input: false,
                });
            }
            if let Some(predicate) = &clause.where_clause {
                self.operators.push(Operator::Filter {
                    predicate: predicate.clone(),
                });
            }
        } else {
            self.operators.push(Operator::Results {
                columns: columns.clone(),
            });
        }
        self.bound = columns.iter().cloned().collect();
        columns
    }

    /// Replaces each aggregate call in `expr` by a reference to its slot.
    fn extract_aggregates(&mut self, expr: &Expr, specs: &mut Vec<AggregateSpec>) -> Expr {
        match expr {
            Expr::FunctionCall(call) if self.registry.is_aggregate(&call.name) => {
                let slot = self.aggregate_slot(call, specs);
                Expr::Identifier(slot, call.span.clone())
            }
            _ => expr.map_children(|child| self.extract_aggregates(child, specs)),
        }
    }

    /// Slot for `call`; identical calls share one.
    fn aggregate_slot(&mut self, call: &FunctionCall, specs: &mut Vec<AggregateSpec>) -> SmolStr {
        let text = Expr::FunctionCall(call.clone()).to_string();
        if let Some(existing) = specs.iter().find(|spec| spec.text == text) {
            return existing.slot.clone();
        }
        let slot = SmolStr::new(format!("__agg{}", self.aggregates));
        self.aggregates += 1;
        specs.push(AggregateSpec {
            // Only registered aggregates reach here.
            func: AggFunc::from_name(&call.name).unwrap_or(AggFunc::Count),
            arg: call.args.first().cloned(),
            distinct: call.distinct,
            slot: slot.clone(),
            text,
        });
        slot
    }

    /// Gives every anonymous node and relationship a unique alias.
    fn name_path(&mut self, path: &PathPattern) -> PathPattern {
        let mut named = path.clone();
        self.name_node(&mut named.start);
        for (rel, node) in &mut named.hops {
            self.name_relationship(rel);
            self.name_node(node);
        }
        named
    }

    fn name_node(&mut self, node: &mut NodePattern) {
        if node.variable.is_none() {
            node.variable = Some(self.fresh_alias());
        }
    }

    fn name_relationship(&mut self, rel: &mut RelationshipPattern) {
        if rel.variable.is_none() {
            rel.variable = Some(self.fresh_alias());
        }
    }

    fn fresh_alias(&mut self) -> SmolStr {
        let alias = SmolStr::new(format!("__anon{}", self.anonymous));
        self.anonymous += 1;
        alias
    }

    fn bind_path(&mut self, path: &PathPattern) {
        self.bound
            .extend(path.nodes().filter_map(|node| node.variable.clone()));
        self.bound
            .extend(path.hops.iter().filter_map(|(rel, _)| rel.variable.clone()));
    }
}

fn alias_of(variable: &Option<SmolStr>) -> SmolStr {
    // Paths are named before planning, so the fallback is never used.
    variable.clone().unwrap_or_default()
}
