//! `SKIP` and `LIMIT` checks.
//!
//! Row bounds are fixed before planning: each must reduce, from literals
//! and parameters alone, to a non-negative integer.

use crate::ast::{Clause, Expr, Query};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::semantic::const_eval::evaluate_static;
use crate::semantic::functions::FunctionRegistry;
use crate::semantic::params::ParameterTable;
use crate::value::Value;

/// Evaluated `SKIP`/`LIMIT` of one `WITH` or `RETURN`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowBounds {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Reduces a `SKIP`/`LIMIT` operand. `clause` names the keyword in errors.
pub fn row_bound(
    expr: &Expr,
    table: &ParameterTable,
    registry: &FunctionRegistry,
    clause: &str,
) -> CompileResult<u64> {
    let value = evaluate_static(expr, table, registry)?;
    match value {
        Value::Integer(n) if n >= 0 => Ok(n as u64),
        Value::Integer(n) => Err(CompileError::new(
            ErrorKind::Type,
            format!("{clause} specified value of invalid type, must be a non-negative integer (got {n})"),
            expr.span(),
        )),
        other => Err(CompileError::new(
            ErrorKind::Type,
            format!(
                "{clause} specified value of invalid type, must be a non-negative integer (got {})",
                other.value_type()
            ),
            expr.span(),
        )),
    }
}

/// Checks every projection in `query`, in clause order.
pub fn check_query(
    query: &Query,
    table: &ParameterTable,
    registry: &FunctionRegistry,
) -> CompileResult<Vec<RowBounds>> {
    let mut bounds = Vec::new();
    for clause in &query.clauses {
        let (Clause::With(projection) | Clause::Return(projection)) = clause else {
            continue;
        };
        let skip = projection
            .skip
            .as_ref()
            .map(|expr| row_bound(expr, table, registry, "SKIP"))
            .transpose()?;
        let limit = projection
            .limit
            .as_ref()
            .map(|expr| row_bound(expr, table, registry, "LIMIT"))
            .transpose()?;
        bounds.push(RowBounds { skip, limit });
    }
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseOptions, parse_query};
    use crate::semantic::params::{ParameterMap, ParameterTableBuilder};
    use smol_str::SmolStr;

    fn gate(source: &str, params: &[(&str, Value)]) -> CompileResult<Vec<RowBounds>> {
        let (_, query) = parse_query(source, &ParseOptions::default()).expect("parses");
        let client: ParameterMap = params
            .iter()
            .map(|(name, value)| (SmolStr::new(name), value.clone()))
            .collect();
        let table = ParameterTableBuilder::from_client(&client)?.freeze();
        check_query(&query, &table, &FunctionRegistry::with_builtins())
    }

    #[test]
    fn integer_parameters_bind_like_literals() {
        let params = [("skip", Value::Integer(1)), ("limit", Value::Integer(2))];
        let bounds = gate("UNWIND [1,2,3] AS x RETURN x SKIP $skip LIMIT $limit", &params)
            .expect("valid");
        assert_eq!(
            bounds,
            [RowBounds {
                skip: Some(1),
                limit: Some(2)
            }]
        );
        let literal = gate("UNWIND [1,2,3] AS x RETURN x SKIP 1 LIMIT 2", &[]).expect("valid");
        assert_eq!(bounds, literal);
    }

    #[test]
    fn non_integers_are_rejected() {
        for value in [Value::from("1"), Value::Float(1.0), Value::Integer(-1), Value::Null] {
            let err = gate("RETURN 1 LIMIT $limit", &[("limit", value.clone())]).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Type, "{value}");
        }
    }

    #[test]
    fn references_in_bounds() {
        let err = gate("UNWIND [1] AS x RETURN x SKIP x", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedIdentifier);
        let err = gate("RETURN 1 SKIP $missing", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingParameter);
        let err = gate("RETURN 1 LIMIT count(1)", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AggregateNotAllowed);
    }
}
