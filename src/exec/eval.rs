//! Row-level expression evaluation.

use crate::ast::{Expr, FunctionCall, Span};
use crate::error::RuntimeError;
use crate::exec::Row;
use crate::graph::Graph;
use crate::semantic::const_eval::{EvalScope, Evaluator};
use crate::semantic::functions::{FunctionRegistry, FunctionSignature};
use crate::semantic::params::ParameterTable;
use crate::value::Value;
use smol_str::SmolStr;

/// Scope over one row. Resolution guarantees every name is known, so an
/// unbound name reads as null.
pub struct RowScope<'a> {
    row: &'a Row,
    params: &'a ParameterTable,
    graph: &'a dyn Graph,
}

impl<'a> RowScope<'a> {
    pub fn new(row: &'a Row, params: &'a ParameterTable, graph: &'a dyn Graph) -> Self {
        Self { row, params, graph }
    }
}

impl EvalScope for RowScope<'_> {
    type Error = RuntimeError;

    fn identifier(&mut self, name: &SmolStr, _span: &Span) -> Result<Value, RuntimeError> {
        Ok(self.row.get(name).cloned().unwrap_or(Value::Null))
    }

    fn parameter(&mut self, name: &SmolStr, _span: &Span) -> Result<Value, RuntimeError> {
        Ok(self.params.get(name).cloned().unwrap_or(Value::Null))
    }

    fn graph(&self) -> Option<&dyn Graph> {
        Some(self.graph)
    }

    fn aggregate(&mut self, call: &FunctionCall) -> Result<Value, RuntimeError> {
        Err(RuntimeError::Function {
            function: call.name.clone(),
            message: "aggregate evaluated outside of aggregation".to_string(),
        })
    }

    fn unknown_function(&mut self, call: &FunctionCall) -> RuntimeError {
        RuntimeError::Function {
            function: call.name.clone(),
            message: "unknown function".to_string(),
        }
    }

    fn wrong_arity(&mut self, call: &FunctionCall, signature: &FunctionSignature) -> RuntimeError {
        RuntimeError::Function {
            function: call.name.clone(),
            message: format!(
                "received {} arguments, expected {}",
                call.args.len(),
                signature.arity()
            ),
        }
    }

    fn failed(&mut self, error: RuntimeError, _span: &Span) -> RuntimeError {
        error
    }
}

pub fn evaluate(
    expr: &Expr,
    row: &Row,
    params: &ParameterTable,
    graph: &dyn Graph,
    registry: &FunctionRegistry,
) -> Result<Value, RuntimeError> {
    let mut scope = RowScope::new(row, params, graph);
    Evaluator::new(registry, &mut scope).evaluate(expr)
}
