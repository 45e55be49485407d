//! Parameter binding, validation and planning for a Cypher-like graph query
//! language, with a small in-memory executor.
//!
//! Queries may start with `CYPHER name=expr ...` declarations. Their values
//! are folded at compile time, merged over the client's parameters and
//! frozen before the body is checked and planned.
//!
//! # Example
//!
//! ```
//! use cypher_params::{Engine, MemoryGraph, ParameterMap, Value};
//!
//! let engine = Engine::default();
//! let mut graph = MemoryGraph::new();
//! graph.add_node(["Person"], [("name", "Alice")]);
//!
//! let mut params = ParameterMap::new();
//! params.insert("name".into(), Value::from("Alice"));
//!
//! let result = engine
//!     .execute(&mut graph, "MATCH (p:Person {name: $name}) RETURN id(p)", &params)
//!     .unwrap();
//! assert_eq!(result.rows, vec![vec![Value::Integer(0)]]);
//!
//! let plan = engine
//!     .explain("CYPHER id=0 MATCH (n) WHERE id(n) = $id RETURN n", &ParameterMap::new())
//!     .unwrap();
//! assert!(plan.contains("NodeByIdSeek"));
//! ```

pub mod ast;
pub mod config;
pub mod diag;
pub mod engine;
pub mod error;
pub mod exec;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod plan;
pub mod semantic;
pub mod value;

pub use ast::Span;
pub use config::EngineConfig;
pub use diag::{Diag, DiagLabel, DiagSeverity, LabelRole};
pub use engine::{CompiledQuery, Engine};
pub use error::{CompileError, ErrorKind, QueryError, RuntimeError};
pub use exec::{ProfiledResult, ResultSet, ResultStatistics};
pub use graph::{Graph, MemoryGraph};
pub use lexer::token::{Token, TokenKind};
pub use lexer::{Lexer, LexerResult, tokenize};
pub use plan::{ExecutionPlan, Operator};
pub use semantic::{FunctionRegistry, ParameterMap, parameters_from_json};
pub use value::{NodeId, RelationshipId, Value, ValueMap};
