//! Expression evaluation over a pluggable scope.
//!
//! [`Evaluator`] is written once and instantiated with different scopes:
//! [`ConstScope`] for `CYPHER` declarations and static folding of body
//! expressions at compile time, and the executor's row scope at runtime.
//! Because both share the operator implementation in [`crate::value::ops`],
//! a type error found while folding is the one execution would raise.

use crate::ast::visit::{Visit, VisitResult, walk_expr};
use crate::ast::{Expr, FunctionCall, Span};
use crate::error::{CompileError, ErrorKind, RuntimeError};
use crate::graph::Graph;
use crate::semantic::functions::{FunctionRegistry, FunctionSignature};
use crate::semantic::params::ParameterTable;
use crate::value::ops::{self, OpError};
use crate::value::{Value, ValueMap};
use smol_str::SmolStr;
use std::ops::ControlFlow;

/// Name resolution and failure reporting for one evaluation context.
pub trait EvalScope {
    type Error;

    fn identifier(&mut self, name: &SmolStr, span: &Span) -> Result<Value, Self::Error>;

    fn parameter(&mut self, name: &SmolStr, span: &Span) -> Result<Value, Self::Error>;

    /// Graph used for property access and entity functions, if any.
    fn graph(&self) -> Option<&dyn Graph>;

    /// Called for aggregate calls; only pre-computed aggregation slots
    /// can satisfy these.
    fn aggregate(&mut self, call: &FunctionCall) -> Result<Value, Self::Error>;

    fn unknown_function(&mut self, call: &FunctionCall) -> Self::Error;

    fn wrong_arity(&mut self, call: &FunctionCall, signature: &FunctionSignature) -> Self::Error;

    fn failed(&mut self, error: RuntimeError, span: &Span) -> Self::Error;
}

pub struct Evaluator<'r, 's, S: EvalScope> {
    registry: &'r FunctionRegistry,
    scope: &'s mut S,
}

impl<'r, 's, S: EvalScope> Evaluator<'r, 's, S> {
    pub fn new(registry: &'r FunctionRegistry, scope: &'s mut S) -> Self {
        Self { registry, scope }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, S::Error> {
        match expr {
            Expr::Literal(value, _) => Ok(value.clone()),
            Expr::Identifier(name, span) => self.scope.identifier(name, span),
            Expr::Parameter(name, span) => self.scope.parameter(name, span),
            Expr::FunctionCall(call) => self.call(call),
            Expr::Binary(op, left, right, span) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                ops::binary(*op, &left, &right).map_err(|err| self.op_failed(err, span))
            }
            Expr::Unary(op, operand, span) => {
                let operand = self.evaluate(operand)?;
                ops::unary(*op, &operand).map_err(|err| self.op_failed(err, span))
            }
            Expr::Property(target, key, span) => {
                let target = self.evaluate(target)?;
                self.property(&target, key, span)
            }
            Expr::HasLabels(target, labels, span) => {
                let target = self.evaluate(target)?;
                self.has_labels(&target, labels, span)
            }
            Expr::List(items, _) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Map(entries, _) => {
                let mut map = ValueMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Value::Map(map))
            }
        }
    }

    fn call(&mut self, call: &FunctionCall) -> Result<Value, S::Error> {
        let registry = self.registry;
        let Some(signature) = registry.lookup(&call.name) else {
            return Err(self.scope.unknown_function(call));
        };
        if !signature.accepts(call.args.len()) {
            return Err(self.scope.wrong_arity(call, signature));
        }
        if signature.is_aggregate() {
            return self.scope.aggregate(call);
        }

        let args = call
            .args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>, _>>()?;
        signature
            .invoke(&args, self.scope.graph())
            .map_err(|err| self.scope.failed(err, &call.span))
    }

    fn property(&mut self, target: &Value, key: &str, span: &Span) -> Result<Value, S::Error> {
        let found = match target {
            Value::Null => return Ok(Value::Null),
            Value::Map(map) => map.get(key).cloned(),
            Value::Node(id) => self
                .scope
                .graph()
                .and_then(|graph| graph.node(*id))
                .and_then(|node| node.properties.get(key).cloned()),
            Value::Relationship(id) => self
                .scope
                .graph()
                .and_then(|graph| graph.relationship(*id))
                .and_then(|rel| rel.properties.get(key).cloned()),
            other => {
                let err = RuntimeError::TypeMismatch {
                    expected: "Map, Node or Relationship",
                    found: other.value_type(),
                };
                return Err(self.scope.failed(err, span));
            }
        };
        Ok(found.unwrap_or(Value::Null))
    }

    fn has_labels(
        &mut self,
        target: &Value,
        labels: &[SmolStr],
        span: &Span,
    ) -> Result<Value, S::Error> {
        match target {
            Value::Null => Ok(Value::Null),
            Value::Node(id) => {
                let node = self.scope.graph().and_then(|graph| graph.node(*id));
                Ok(Value::Boolean(node.is_some_and(|node| {
                    labels.iter().all(|label| node.has_label(label))
                })))
            }
            other => {
                let err = RuntimeError::TypeMismatch {
                    expected: "Node",
                    found: other.value_type(),
                };
                Err(self.scope.failed(err, span))
            }
        }
    }

    fn op_failed(&mut self, err: OpError, span: &Span) -> S::Error {
        self.scope.failed(RuntimeError::Operation(err), span)
    }
}

/// Compile-time scope. No variable is ever visible; parameters come from
/// the frozen table, or are refused outright while the table is still
/// being built from declarations.
pub struct ConstScope<'t> {
    table: Option<&'t ParameterTable>,
}

impl<'t> ConstScope<'t> {
    /// Scope for `CYPHER` declarations.
    pub fn empty() -> Self {
        Self { table: None }
    }

    /// Scope for folding body expressions against a frozen table.
    pub fn with_table(table: &'t ParameterTable) -> Self {
        Self { table: Some(table) }
    }
}

impl EvalScope for ConstScope<'_> {
    type Error = CompileError;

    fn identifier(&mut self, name: &SmolStr, span: &Span) -> Result<Value, CompileError> {
        Err(CompileError::new(
            ErrorKind::UndefinedIdentifier,
            format!("'{name}' not defined"),
            span.clone(),
        ))
    }

    fn parameter(&mut self, name: &SmolStr, span: &Span) -> Result<Value, CompileError> {
        match self.table {
            Some(table) => table.get(name).cloned().ok_or_else(|| missing_parameter(name, span)),
            None => Err(CompileError::new(
                ErrorKind::UndefinedIdentifier,
                format!("'${name}' not defined"),
                span.clone(),
            )
            .with_help("parameter declarations cannot reference other parameters")),
        }
    }

    fn graph(&self) -> Option<&dyn Graph> {
        None
    }

    fn aggregate(&mut self, call: &FunctionCall) -> Result<Value, CompileError> {
        Err(aggregate_not_allowed(call))
    }

    fn unknown_function(&mut self, call: &FunctionCall) -> CompileError {
        unknown_function(call)
    }

    fn wrong_arity(&mut self, call: &FunctionCall, signature: &FunctionSignature) -> CompileError {
        wrong_arity(call, signature)
    }

    fn failed(&mut self, error: RuntimeError, span: &Span) -> CompileError {
        let kind = match error {
            RuntimeError::Operation(OpError::DivisionByZero) => ErrorKind::Arithmetic,
            _ => ErrorKind::Type,
        };
        CompileError::new(kind, error.to_string(), span.clone())
    }
}

pub(crate) fn missing_parameter(name: &str, span: &Span) -> CompileError {
    CompileError::new(
        ErrorKind::MissingParameter,
        format!("Missing parameter '{name}'"),
        span.clone(),
    )
}

pub(crate) fn unknown_function(call: &FunctionCall) -> CompileError {
    CompileError::new(
        ErrorKind::UndefinedFunction,
        format!("Unknown function '{}'", call.name),
        call.span.clone(),
    )
}

pub(crate) fn wrong_arity(call: &FunctionCall, signature: &FunctionSignature) -> CompileError {
    CompileError::new(
        ErrorKind::Type,
        format!(
            "Received {} arguments to function '{}', expected {}",
            call.args.len(),
            call.name,
            signature.arity()
        ),
        call.span.clone(),
    )
}

pub(crate) fn aggregate_not_allowed(call: &FunctionCall) -> CompileError {
    CompileError::new(
        ErrorKind::AggregateNotAllowed,
        format!("Aggregate function '{}' is not allowed in this context", call.name),
        call.span.clone(),
    )
}

/// Evaluates a declaration expression in the empty scope.
pub fn evaluate_constant(expr: &Expr, registry: &FunctionRegistry) -> Result<Value, CompileError> {
    let mut scope = ConstScope::empty();
    Evaluator::new(registry, &mut scope).evaluate(expr)
}

/// Evaluates a statically reducible body expression against `table`.
pub fn evaluate_static(
    expr: &Expr,
    table: &ParameterTable,
    registry: &FunctionRegistry,
) -> Result<Value, CompileError> {
    let mut scope = ConstScope::with_table(table);
    Evaluator::new(registry, &mut scope).evaluate(expr)
}

/// True if `expr` can be reduced without a row: it uses only literals,
/// parameters, and known non-aggregate functions over them.
pub fn is_static(expr: &Expr, registry: &FunctionRegistry) -> bool {
    struct Dynamic<'r>(&'r FunctionRegistry);

    impl Visit for Dynamic<'_> {
        type Break = ();

        fn visit_expr(&mut self, expr: &Expr) -> VisitResult<()> {
            match expr {
                Expr::Identifier(..) => ControlFlow::Break(()),
                Expr::FunctionCall(call)
                    if self.0.lookup(&call.name).is_none_or(|f| f.is_aggregate()) =>
                {
                    ControlFlow::Break(())
                }
                _ => walk_expr(self, expr),
            }
        }
    }

    Dynamic(registry).visit_expr(expr).is_continue()
}
