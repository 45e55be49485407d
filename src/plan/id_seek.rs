//! Routing of `id(n) = k` predicates to a direct node lookup.

use crate::ast::{BinaryOperator, Expr};
use crate::semantic::const_eval::is_static;
use crate::semantic::functions::FunctionRegistry;
use smol_str::SmolStr;

/// A conjunct of a `WHERE` that can be answered by `NodeByIdSeek`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdSeek {
    pub alias: SmolStr,
    pub key: Expr,
    /// Position of the consumed conjunct.
    pub conjunct: usize,
}

/// Picks the first conjunct of shape `id(v) = k` or `k = id(v)` where `v`
/// is one of `candidates` and `k` is statically reducible.
pub fn select(
    conjuncts: &[&Expr],
    candidates: &[SmolStr],
    registry: &FunctionRegistry,
) -> Option<IdSeek> {
    conjuncts.iter().enumerate().find_map(|(index, conjunct)| {
        let Expr::Binary(BinaryOperator::Eq, left, right, _) = conjunct else {
            return None;
        };
        let (alias, key) = match (id_of(left, registry), id_of(right, registry)) {
            (Some(alias), _) if is_static(right, registry) => (alias, right),
            (_, Some(alias)) if is_static(left, registry) => (alias, left),
            _ => return None,
        };
        candidates.contains(alias).then(|| IdSeek {
            alias: alias.clone(),
            key: (**key).clone(),
            conjunct: index,
        })
    })
}

/// `v` for an expression of the form `id(v)`, where the call resolves to
/// the registry's entity id function.
fn id_of<'e>(expr: &'e Expr, registry: &FunctionRegistry) -> Option<&'e SmolStr> {
    let Expr::FunctionCall(call) = expr else {
        return None;
    };
    let resolves_to_id = registry
        .lookup(&call.name)
        .is_some_and(|signature| signature.is_entity_id());
    if !resolves_to_id || call.distinct || call.args.len() != 1 {
        return None;
    }
    match &call.args[0] {
        Expr::Identifier(name, _) => Some(name),
        _ => None,
    }
}
