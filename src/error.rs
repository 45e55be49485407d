//! Error types returned by the engine.

use crate::ast::Span;
use crate::diag::{Diag, SourceFile, convert_diag_to_report};
use crate::parser::base::ParseError;
use crate::value::ops::OpError;
use crate::value::{NodeId, ValueType};
use smol_str::SmolStr;
use std::fmt;
use thiserror::Error;

/// Classification of a compile-time failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    UndefinedIdentifier,
    UndefinedFunction,
    AggregateNotAllowed,
    Type,
    MissingParameter,
    /// Division by zero while folding a constant expression.
    Arithmetic,
}

impl ErrorKind {
    /// `UndefinedIdentifier` and `MissingParameter` are both unresolved
    /// references; callers that only care about that distinction use this.
    pub fn is_undefined_reference(self) -> bool {
        matches!(
            self,
            ErrorKind::UndefinedIdentifier | ErrorKind::MissingParameter
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::UndefinedIdentifier => "UndefinedIdentifierError",
            ErrorKind::UndefinedFunction => "UndefinedFunctionError",
            ErrorKind::AggregateNotAllowed => "AggregateNotAllowedError",
            ErrorKind::Type => "TypeError",
            ErrorKind::MissingParameter => "MissingParameterError",
            ErrorKind::Arithmetic => "ArithmeticError",
        }
    }

    /// Diagnostic code attached to rendered reports.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::UndefinedIdentifier => "semantic::undefined_identifier",
            ErrorKind::UndefinedFunction => "semantic::undefined_function",
            ErrorKind::AggregateNotAllowed => "semantic::aggregate_not_allowed",
            ErrorKind::Type => "semantic::type",
            ErrorKind::MissingParameter => "params::missing",
            ErrorKind::Arithmetic => "semantic::arithmetic",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A query rejected before execution. Only the first failure is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {}", .diag.message)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub diag: Diag,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            diag: Diag::error(message)
                .with_primary_label(span, "here")
                .with_code(kind.code()),
        }
    }

    /// Wraps a fully built diagnostic.
    pub fn from_diag(kind: ErrorKind, diag: Diag) -> Self {
        let diag = if diag.code.is_some() {
            diag
        } else {
            diag.with_code(kind.code())
        };
        Self { kind, diag }
    }

    pub fn syntax(err: ParseError) -> Self {
        Self::from_diag(ErrorKind::Syntax, *err)
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diag.help = Some(help.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.diag.message
    }

    pub fn span(&self) -> Option<Span> {
        self.diag.primary_span()
    }

    /// Renders the error against the query text it came from.
    pub fn to_report(&self, source: &str) -> miette::Report {
        convert_diag_to_report(&self.diag, &SourceFile::with_name(source, "query"))
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Failure raised while running a compiled plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Operation(#[from] OpError),

    #[error("Cannot delete node {0:?} without detaching its relationships")]
    ConnectedNode(NodeId),

    #[error("Node {0:?} does not exist")]
    MissingNode(NodeId),

    #[error("Type mismatch: expected {expected} but was {found}")]
    TypeMismatch {
        expected: &'static str,
        found: ValueType,
    },

    #[error("{function}: {message}")]
    Function { function: SmolStr, message: String },
}

/// Any failure of an engine entry point.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl QueryError {
    /// The compile error kind, if this failed before execution.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            QueryError::Compile(err) => Some(err.kind),
            QueryError::Runtime(_) => None,
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
