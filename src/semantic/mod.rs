//! Semantic passes between parsing and planning.
//!
//! # Architecture
//!
//! Compilation runs these passes in order, each failing fast:
//!
//! 1. **Parameter binding** ([`params`]) - evaluate `CYPHER` declarations in
//!    an empty scope with [`const_eval`] and freeze the parameter table
//! 2. **Resolution** ([`resolver`]) - check identifiers, parameters,
//!    functions and aggregate placement in the body, folding static
//!    sub-expressions
//! 3. **Row bounds** ([`type_gate`]) - reduce `SKIP`/`LIMIT` to
//!    non-negative integers
//!
//! [`functions`] holds the built-in function catalog shared by all passes
//! and by the executor.

pub mod const_eval;
pub mod functions;
pub mod params;
pub mod resolver;
pub mod type_gate;

pub use const_eval::{ConstScope, EvalScope, Evaluator};
pub use functions::{FunctionKind, FunctionRegistry, FunctionSignature};
pub use params::{
    ParameterMap, ParameterTable, ParameterTableBuilder, bind_declarations, parameters_from_json,
};
pub use resolver::Resolver;
pub use type_gate::RowBounds;
