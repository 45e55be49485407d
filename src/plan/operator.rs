//! Plan operators.

use crate::ast::{Direction, Expr, PathPattern, SetItem, SortItem};
use smol_str::SmolStr;
use std::fmt::{self, Write};

/// Resolved aggregate function, dispatched without a registry lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Collect,
}

impl AggFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "collect" => Some(Self::Collect),
            _ => None,
        }
    }
}

/// One aggregate computed by an `Aggregate` operator.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateSpec {
    pub func: AggFunc,
    /// `None` for `count(*)`.
    pub arg: Option<Expr>,
    pub distinct: bool,
    /// Row slot the result is written to.
    pub slot: SmolStr,
    /// The call as written, for plan output.
    pub text: String,
}

/// A projected column.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectItem {
    pub name: SmolStr,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operator {
    AllNodeScan {
        alias: SmolStr,
    },
    NodeByLabelScan {
        alias: SmolStr,
        label: SmolStr,
    },
    NodeByIdSeek {
        alias: SmolStr,
        id: Expr,
    },
    Expand {
        from: SmolStr,
        rel_alias: SmolStr,
        rel_type: Option<SmolStr>,
        direction: Direction,
        to: SmolStr,
        /// `to` was bound before this step; the expansion only checks it.
        to_bound: bool,
        /// Relationships matched earlier in the same pattern, which this
        /// step must not reuse.
        distinct_from: Vec<SmolStr>,
    },
    Filter {
        predicate: Expr,
    },
    Unwind {
        expr: Expr,
        alias: SmolStr,
    },
    Create {
        patterns: Vec<PathPattern>,
    },
    Update {
        items: Vec<SetItem>,
    },
    Delete {
        targets: Vec<Expr>,
        detach: bool,
    },
    Aggregate {
        keys: Vec<ProjectItem>,
        aggregates: Vec<AggregateSpec>,
    },
    Project {
        items: Vec<ProjectItem>,
        /// Keep the input columns next to the projected ones, for an
        /// `ORDER BY` that refers to them.
        retain_input: bool,
    },
    Distinct {
        columns: Vec<SmolStr>,
    },
    Sort {
        keys: Vec<SortItem>,
    },
    Skip {
        count: u64,
    },
    Limit {
        count: u64,
    },
    Results {
        columns: Vec<SmolStr>,
    },
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::AllNodeScan { .. } => "AllNodeScan",
            Operator::NodeByLabelScan { .. } => "NodeByLabelScan",
            Operator::NodeByIdSeek { .. } => "NodeByIdSeek",
            Operator::Expand { .. } => "Expand",
            Operator::Filter { .. } => "Filter",
            Operator::Unwind { .. } => "Unwind",
            Operator::Create { .. } => "Create",
            Operator::Update { .. } => "Update",
            Operator::Delete { .. } => "Delete",
            Operator::Aggregate { .. } => "Aggregate",
            Operator::Project { .. } => "Project",
            Operator::Distinct { .. } => "Distinct",
            Operator::Sort { .. } => "Sort",
            Operator::Skip { .. } => "Skip",
            Operator::Limit { .. } => "Limit",
            Operator::Results { .. } => "Results",
        }
    }

    /// Operator arguments as shown by explain; empty when there are none.
    pub fn detail(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_detail(&mut out);
        out
    }

    fn write_detail(&self, out: &mut String) -> fmt::Result {
        match self {
            Operator::AllNodeScan { alias } => write!(out, "({alias})"),
            Operator::NodeByLabelScan { alias, label } => write!(out, "({alias}:{label})"),
            Operator::NodeByIdSeek { alias, id } => write!(out, "({alias}) id = {id}"),
            Operator::Expand {
                from,
                rel_alias,
                rel_type,
                direction,
                to,
                ..
            } => {
                let rel = match rel_type {
                    Some(rel_type) => format!("[{rel_alias}:{rel_type}]"),
                    None => format!("[{rel_alias}]"),
                };
                match direction {
                    Direction::Outgoing => write!(out, "({from})-{rel}->({to})"),
                    Direction::Incoming => write!(out, "({from})<-{rel}-({to})"),
                    Direction::Either => write!(out, "({from})-{rel}-({to})"),
                }
            }
            Operator::Filter { predicate } => write!(out, "{predicate}"),
            Operator::Unwind { expr, alias } => write!(out, "{expr} AS {alias}"),
            Operator::Create { patterns } => {
                let count: usize = patterns.iter().map(|p| p.nodes().count()).sum();
                let rels: usize = patterns.iter().map(|p| p.hops.len()).sum();
                write!(out, "{count} node pattern(s), {rels} relationship pattern(s)")
            }
            Operator::Update { items } => write_list(
                out,
                items
                    .iter()
                    .map(|item| format!("{}.{} = {}", item.variable, item.key, item.value)),
            ),
            Operator::Delete { targets, detach } => {
                if *detach {
                    out.push_str("DETACH ");
                }
                write_list(out, targets.iter().map(ToString::to_string))
            }
            Operator::Aggregate { keys, aggregates } => {
                write_list(out, keys.iter().map(|k| k.expr.to_string()))?;
                if !keys.is_empty() && !aggregates.is_empty() {
                    out.push_str(", ");
                }
                write_list(out, aggregates.iter().map(|a| a.text.clone()))
            }
            Operator::Project { items, .. } => write_list(
                out,
                items.iter().map(|item| match &item.expr {
                    Expr::Identifier(name, _) if *name == item.name => name.to_string(),
                    expr => format!("{expr} AS {}", item.name),
                }),
            ),
            Operator::Distinct { columns } | Operator::Results { columns } => {
                write_list(out, columns.iter().map(ToString::to_string))
            }
            Operator::Sort { keys } => write_list(
                out,
                keys.iter().map(|key| {
                    if key.descending {
                        format!("{} DESC", key.expr)
                    } else {
                        key.expr.to_string()
                    }
                }),
            ),
            Operator::Skip { count } | Operator::Limit { count } => write!(out, "{count}"),
        }
    }
}

fn write_list(out: &mut String, items: impl Iterator<Item = String>) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&item);
    }
    Ok(())
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self.detail();
        if detail.is_empty() {
            f.write_str(self.name())
        } else {
            write!(f, "{} | {detail}", self.name())
        }
    }
}
