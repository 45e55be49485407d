//! Parameter table construction.
//!
//! The table is seeded from the client map, then each `CYPHER` declaration
//! is evaluated in order and written over it. Once frozen the table is
//! immutable and owned by the compiled query.

use crate::ast::Span;
use crate::diag::Diag;
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::parser::DeclarationBlock;
use crate::semantic::const_eval::evaluate_constant;
use crate::semantic::functions::FunctionRegistry;
use crate::value::Value;
use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::{debug, warn};

/// Parameters supplied by the client alongside the query text.
pub type ParameterMap = IndexMap<SmolStr, Value>;

/// Reads client parameters from a JSON object.
pub fn parameters_from_json(json: serde_json::Value) -> CompileResult<ParameterMap> {
    match json {
        serde_json::Value::Object(entries) => Ok(entries
            .into_iter()
            .map(|(name, value)| (SmolStr::from(name), Value::from(value)))
            .collect()),
        other => Err(CompileError::from_diag(
            ErrorKind::Type,
            Diag::error(format!("parameters must be a JSON object, got {other}")),
        )),
    }
}

/// Frozen name to value bindings for one query invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTable {
    values: ParameterMap,
    warnings: Vec<Diag>,
}

impl ParameterTable {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Value)> {
        self.values.iter()
    }

    /// Non-fatal diagnostics raised while binding, in declaration order.
    pub fn warnings(&self) -> &[Diag] {
        &self.warnings
    }
}

/// Mutable table used while declarations are evaluated.
#[derive(Debug, Default)]
pub struct ParameterTableBuilder {
    values: ParameterMap,
    warnings: Vec<Diag>,
}

impl ParameterTableBuilder {
    /// Seeds the table from client parameters. Graph entities cannot be
    /// bound.
    pub fn from_client(client: &ParameterMap) -> CompileResult<Self> {
        for (name, value) in client {
            if !value.is_bindable() {
                let diag = Diag::error(format!(
                    "Type mismatch: parameter '{name}' cannot be bound to a graph entity"
                ))
                .with_help("parameters accept null, booleans, numbers, strings, lists and maps");
                return Err(CompileError::from_diag(ErrorKind::Type, diag));
            }
        }
        Ok(Self {
            values: client.clone(),
            warnings: Vec::new(),
        })
    }

    /// Binds `name`, replacing any earlier value. Replacing a client value
    /// records a warning labeled at `span`.
    pub fn declare(&mut self, name: SmolStr, span: Span, value: Value) {
        if self.values.contains_key(&name) {
            warn!(parameter = %name, "declaration overrides client parameter");
            self.warnings.push(
                Diag::warning(format!("declaration of '{name}' overrides the client parameter"))
                    .with_primary_label(span, "declared here")
                    .with_note("the declared value is used for this query")
                    .with_code("params::override"),
            );
        }
        self.values.insert(name, value);
    }

    pub fn freeze(self) -> ParameterTable {
        ParameterTable {
            values: self.values,
            warnings: self.warnings,
        }
    }
}

/// Builds the frozen table for one invocation. Declarations are evaluated
/// in textual order and evaluation stops at the first failure.
pub fn bind_declarations(
    block: &DeclarationBlock,
    client: &ParameterMap,
    registry: &FunctionRegistry,
) -> CompileResult<ParameterTable> {
    let mut builder = ParameterTableBuilder::from_client(client)?;
    for declaration in &block.declarations {
        let value = evaluate_constant(&declaration.expr, registry)?;
        debug!(parameter = %declaration.name, %value, "declaration evaluated");
        builder.declare(declaration.name.clone(), declaration.name_span.clone(), value);
    }
    let table = builder.freeze();
    debug!(parameters = table.len(), "parameter table frozen");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::DiagSeverity;
    use crate::parser::{ParseOptions, parse_declarations};
    use crate::value::NodeId;

    fn bind(source: &str, client: &ParameterMap) -> CompileResult<ParameterTable> {
        let block = parse_declarations(source, &ParseOptions::default())
            .map_err(CompileError::syntax)?;
        bind_declarations(&block, client, &FunctionRegistry::with_builtins())
    }

    #[test]
    fn declarations_override_client_values() {
        let mut client = ParameterMap::new();
        client.insert("a".into(), Value::Integer(1));
        client.insert("b".into(), Value::Integer(2));
        let table = bind("CYPHER a='x' c=[1, 2] RETURN $a", &client).expect("binds");

        assert_eq!(table.get("a"), Some(&Value::from("x")));
        assert_eq!(table.get("b"), Some(&Value::Integer(2)));
        assert_eq!(table.get("c"), Some(&Value::from(vec![1, 2])));
        let names: Vec<_> = table.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn overriding_a_client_value_records_a_warning() {
        let mut client = ParameterMap::new();
        client.insert("a".into(), Value::Integer(1));
        let table = bind("CYPHER a=10 b=2 RETURN $a", &client).expect("binds");

        let warnings = table.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, DiagSeverity::Warning);
        assert_eq!(warnings[0].code.as_deref(), Some("params::override"));
        assert_eq!(warnings[0].primary_span(), Some(7..8));
        assert_eq!(warnings[0].notes.len(), 1);

        let fresh = bind("CYPHER a=10 RETURN $a", &ParameterMap::new()).expect("binds");
        assert!(fresh.warnings().is_empty());
    }

    #[test]
    fn first_failing_declaration_wins() {
        let err = bind("CYPHER a=f(1) b=count(1) RETURN 1", &ParameterMap::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedFunction);
    }

    #[test]
    fn declarations_cannot_see_each_other() {
        let err = bind("CYPHER param0=1 param1=$param0 RETURN 1", &ParameterMap::new())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedIdentifier);
    }

    #[test]
    fn entities_are_not_bindable() {
        let mut client = ParameterMap::new();
        client.insert("n".into(), Value::List(vec![Value::Node(NodeId(0))]));
        let err = ParameterTableBuilder::from_client(&client).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(err.span(), None);
    }

    #[test]
    fn json_object_becomes_parameter_map() {
        let params = parameters_from_json(serde_json::json!({"id": 3, "names": ["a"]}))
            .expect("object");
        assert_eq!(params.get("id"), Some(&Value::Integer(3)));
        assert_eq!(params.get("names"), Some(&Value::from(vec!["a"])));

        let err = parameters_from_json(serde_json::json!([1])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }
}
