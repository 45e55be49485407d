//! Built-in function catalog.
//!
//! Populated once and shared read-only between compilations. Names resolve
//! case-insensitively. Aggregates carry no scalar implementation; their
//! accumulators live in the executor.

use std::collections::HashMap;

use crate::error::RuntimeError;
use crate::graph::Graph;
use crate::value::{Value, ValueMap};
use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Scalar,
    Aggregate,
}

/// Scalar implementation. The graph is absent during compile-time folding.
pub type ScalarFn = fn(&[Value], Option<&dyn Graph>) -> Result<Value, RuntimeError>;

#[derive(Clone)]
pub struct FunctionSignature {
    pub name: SmolStr,
    pub kind: FunctionKind,
    pub min_args: usize,
    /// `None` for variadic functions.
    pub max_args: Option<usize>,
    implementation: Option<ScalarFn>,
    /// Set only on the built-in `id`, whose result is a graph entity key.
    entity_id: bool,
}

impl std::fmt::Debug for FunctionSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSignature")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish()
    }
}

impl FunctionSignature {
    pub fn is_aggregate(&self) -> bool {
        self.kind == FunctionKind::Aggregate
    }

    /// True when a call maps a node to the key its store is indexed by.
    pub fn is_entity_id(&self) -> bool {
        self.entity_id
    }

    pub fn accepts(&self, arg_count: usize) -> bool {
        arg_count >= self.min_args && self.max_args.is_none_or(|max| arg_count <= max)
    }

    /// Human readable arity, e.g. `1`, `2 or 3`, `at least 1`.
    pub fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) if max == self.min_args + 1 => format!("{} or {max}", self.min_args),
            Some(max) => format!("{} to {max}", self.min_args),
            None => format!("at least {}", self.min_args),
        }
    }

    /// Calls a scalar function. Aggregates cannot be invoked row by row.
    pub fn invoke(&self, args: &[Value], graph: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
        match self.implementation {
            Some(implementation) => implementation(args, graph),
            None => Err(RuntimeError::Function {
                function: self.name.clone(),
                message: "aggregate function invoked outside of aggregation".to_string(),
            }),
        }
    }
}

#[derive(Debug)]
pub struct FunctionRegistry {
    signatures: Vec<FunctionSignature>,
    name_index: HashMap<SmolStr, usize>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            signatures: Vec::new(),
            name_index: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        register_builtins(&mut registry);
        registry
    }

    /// Registers a scalar function, replacing any function of the same name.
    pub fn register_scalar(
        &mut self,
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: ScalarFn,
    ) {
        self.insert(FunctionSignature {
            name: SmolStr::new(name.to_ascii_lowercase()),
            kind: FunctionKind::Scalar,
            min_args,
            max_args,
            implementation: Some(implementation),
            entity_id: false,
        });
    }

    fn register_entity_id(&mut self) {
        self.insert(FunctionSignature {
            name: SmolStr::new("id"),
            kind: FunctionKind::Scalar,
            min_args: 1,
            max_args: Some(1),
            implementation: Some(id),
            entity_id: true,
        });
    }

    fn register_aggregate(&mut self, name: &str, min_args: usize, max_args: usize) {
        self.insert(FunctionSignature {
            name: SmolStr::new(name),
            kind: FunctionKind::Aggregate,
            min_args,
            max_args: Some(max_args),
            implementation: None,
            entity_id: false,
        });
    }

    fn insert(&mut self, signature: FunctionSignature) {
        match self.name_index.get(&signature.name) {
            Some(&idx) => self.signatures[idx] = signature,
            None => {
                self.name_index
                    .insert(signature.name.clone(), self.signatures.len());
                self.signatures.push(signature);
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionSignature> {
        let idx = match self.name_index.get(name) {
            Some(idx) => *idx,
            None => *self.name_index.get(name.to_ascii_lowercase().as_str())?,
        };
        self.signatures.get(idx)
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(FunctionSignature::is_aggregate)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

fn register_builtins(reg: &mut FunctionRegistry) {
    for name in ["sum", "avg", "min", "max", "collect"] {
        reg.register_aggregate(name, 1, 1);
    }
    // count(*) is parsed with zero arguments.
    reg.register_aggregate("count", 0, 1);

    reg.register_scalar("abs", 1, Some(1), abs);
    reg.register_scalar("ceil", 1, Some(1), |a, _| float_op("ceil", &a[0], f64::ceil));
    reg.register_scalar("floor", 1, Some(1), |a, _| float_op("floor", &a[0], f64::floor));
    reg.register_scalar("round", 1, Some(1), |a, _| float_op("round", &a[0], f64::round));
    reg.register_scalar("sqrt", 1, Some(1), |a, _| float_op("sqrt", &a[0], f64::sqrt));
    reg.register_scalar("exp", 1, Some(1), |a, _| float_op("exp", &a[0], f64::exp));
    reg.register_scalar("log", 1, Some(1), |a, _| float_op("log", &a[0], f64::ln));
    reg.register_scalar("sign", 1, Some(1), sign);
    reg.register_scalar("tointeger", 1, Some(1), to_integer);
    reg.register_scalar("tofloat", 1, Some(1), to_float);
    reg.register_scalar("tostring", 1, Some(1), to_string);
    reg.register_scalar("toboolean", 1, Some(1), to_boolean);
    reg.register_scalar("toupper", 1, Some(1), |a, _| {
        string_op("toUpper", &a[0], |s| s.to_uppercase())
    });
    reg.register_scalar("tolower", 1, Some(1), |a, _| {
        string_op("toLower", &a[0], |s| s.to_lowercase())
    });
    reg.register_scalar("trim", 1, Some(1), |a, _| {
        string_op("trim", &a[0], |s| s.trim().to_string())
    });
    reg.register_scalar("ltrim", 1, Some(1), |a, _| {
        string_op("lTrim", &a[0], |s| s.trim_start().to_string())
    });
    reg.register_scalar("rtrim", 1, Some(1), |a, _| {
        string_op("rTrim", &a[0], |s| s.trim_end().to_string())
    });
    reg.register_scalar("substring", 2, Some(3), substring);
    reg.register_scalar("replace", 3, Some(3), replace);
    reg.register_scalar("reverse", 1, Some(1), reverse);
    reg.register_scalar("size", 1, Some(1), size);
    reg.register_scalar("head", 1, Some(1), |a, _| {
        list_op("head", &a[0], |l| l.first().cloned().unwrap_or(Value::Null))
    });
    reg.register_scalar("last", 1, Some(1), |a, _| {
        list_op("last", &a[0], |l| l.last().cloned().unwrap_or(Value::Null))
    });
    reg.register_scalar("tail", 1, Some(1), |a, _| {
        list_op("tail", &a[0], |l| Value::List(l.iter().skip(1).cloned().collect()))
    });
    reg.register_scalar("range", 2, Some(3), range);
    reg.register_scalar("keys", 1, Some(1), keys);
    reg.register_scalar("coalesce", 1, None, |a, _| {
        Ok(a.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null))
    });
    reg.register_entity_id();
    reg.register_scalar("labels", 1, Some(1), labels);
    reg.register_scalar("type", 1, Some(1), rel_type);
    reg.register_scalar("properties", 1, Some(1), properties);
}

fn invalid(function: &str, expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::Function {
        function: SmolStr::new(function),
        message: format!("expected {expected}, got {}", found.value_type()),
    }
}

fn abs(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Integer(i) => Ok(Value::Integer(i.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(invalid("abs", "a number", other)),
    }
}

fn float_op(name: &str, arg: &Value, op: fn(f64) -> f64) -> Result<Value, RuntimeError> {
    match arg {
        Value::Null => Ok(Value::Null),
        Value::Integer(i) => Ok(Value::Float(op(*i as f64))),
        Value::Float(f) => Ok(Value::Float(op(*f))),
        other => Err(invalid(name, "a number", other)),
    }
}

fn sign(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Integer(i) => Ok(Value::Integer(i.signum())),
        Value::Float(f) if *f == 0.0 || f.is_nan() => Ok(Value::Integer(0)),
        Value::Float(f) => Ok(Value::Integer(if *f > 0.0 { 1 } else { -1 })),
        other => Err(invalid("sign", "a number", other)),
    }
}

fn to_integer(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Integer(i) => Ok(Value::Integer(*i)),
        Value::Float(f) if f.is_finite() => Ok(Value::Integer(f.trunc() as i64)),
        Value::Float(_) => Ok(Value::Null),
        Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
        Value::String(s) => {
            let s = s.trim();
            Ok(s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .map_or(Value::Null, Value::Integer))
        }
        other => Err(invalid("toInteger", "a number, boolean or string", other)),
    }
}

fn to_float(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Integer(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::String(s) => Ok(s.trim().parse::<f64>().map_or(Value::Null, Value::Float)),
        other => Err(invalid("toFloat", "a number or string", other)),
    }
}

fn to_string(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.clone())),
        Value::Boolean(b) => Ok(Value::String(SmolStr::new(b.to_string()))),
        value @ (Value::Integer(_) | Value::Float(_)) => {
            Ok(Value::String(SmolStr::new(value.to_string())))
        }
        other => Err(invalid("toString", "a scalar", other)),
    }
}

fn to_boolean(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Boolean(b) => Ok(Value::Boolean(*b)),
        Value::Integer(i) => Ok(Value::Boolean(*i != 0)),
        Value::String(s) => Ok(match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => Value::Null,
        }),
        other => Err(invalid("toBoolean", "a boolean, integer or string", other)),
    }
}

fn string_op(name: &str, arg: &Value, op: impl Fn(&str) -> String) -> Result<Value, RuntimeError> {
    match arg {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(SmolStr::new(op(s)))),
        other => Err(invalid(name, "a string", other)),
    }
}

fn list_op(name: &str, arg: &Value, op: impl Fn(&[Value]) -> Value) -> Result<Value, RuntimeError> {
    match arg {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(op(items)),
        other => Err(invalid(name, "a list", other)),
    }
}

fn integer_arg(name: &str, arg: &Value) -> Result<Option<i64>, RuntimeError> {
    match arg {
        Value::Null => Ok(None),
        Value::Integer(i) => Ok(Some(*i)),
        other => Err(invalid(name, "an integer", other)),
    }
}

fn substring(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    let text = match &args[0] {
        Value::Null => return Ok(Value::Null),
        Value::String(s) => s,
        other => return Err(invalid("substring", "a string", other)),
    };
    let Some(start) = integer_arg("substring", &args[1])? else {
        return Ok(Value::Null);
    };
    let length = match args.get(2) {
        Some(arg) => match integer_arg("substring", arg)? {
            Some(len) => Some(len),
            None => return Ok(Value::Null),
        },
        None => None,
    };
    if start < 0 || length.is_some_and(|l| l < 0) {
        return Err(RuntimeError::Function {
            function: "substring".into(),
            message: "start and length must be non-negative".to_string(),
        });
    }
    let chars = text.chars().skip(start as usize);
    let result: String = match length {
        Some(len) => chars.take(len as usize).collect(),
        None => chars.collect(),
    };
    Ok(Value::String(result.into()))
}

fn replace(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    let mut parts = Vec::with_capacity(3);
    for arg in args {
        match arg {
            Value::Null => return Ok(Value::Null),
            Value::String(s) => parts.push(s.as_str()),
            other => return Err(invalid("replace", "a string", other)),
        }
    }
    Ok(Value::String(parts[0].replace(parts[1], parts[2]).into()))
}

fn reverse(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.chars().rev().collect::<String>().into())),
        Value::List(items) => Ok(Value::List(items.iter().rev().cloned().collect())),
        other => Err(invalid("reverse", "a string or list", other)),
    }
}

fn size(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Integer(items.len() as i64)),
        other => Err(invalid("size", "a string or list", other)),
    }
}

/// Largest list `range` will build, whether folded at compile time or run.
const MAX_RANGE_LEN: i128 = 1_000_000;

fn range(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    let bound = |arg: &Value| -> Result<i64, RuntimeError> {
        match arg {
            Value::Integer(i) => Ok(*i),
            other => Err(invalid("range", "an integer", other)),
        }
    };
    let start = bound(&args[0])?;
    let end = bound(&args[1])?;
    let step = match args.get(2) {
        Some(arg) => bound(arg)?,
        None => 1,
    };
    if step == 0 {
        return Err(RuntimeError::Function {
            function: "range".into(),
            message: "step must not be zero".to_string(),
        });
    }

    let (start, end, step) = (i128::from(start), i128::from(end), i128::from(step));
    let len = if (step > 0 && start > end) || (step < 0 && start < end) {
        0
    } else {
        (end - start) / step + 1
    };
    if len > MAX_RANGE_LEN {
        return Err(RuntimeError::Function {
            function: "range".into(),
            message: format!("would produce {len} elements, more than the limit of {MAX_RANGE_LEN}"),
        });
    }
    // Every element lies between start and end, so it fits in an i64.
    let items = (0..len)
        .map(|i| Value::Integer((start + i * step) as i64))
        .collect();
    Ok(Value::List(items))
}

fn entity_properties<'g>(
    name: &str,
    value: &Value,
    graph: Option<&'g dyn Graph>,
) -> Result<Option<&'g ValueMap>, RuntimeError> {
    let properties = match (value, graph) {
        (Value::Node(id), Some(graph)) => graph.node(*id).map(|n| &n.properties),
        (Value::Relationship(id), Some(graph)) => graph.relationship(*id).map(|r| &r.properties),
        (other, _) => return Err(invalid(name, "a node, relationship or map", other)),
    };
    Ok(properties)
}

fn keys(args: &[Value], graph: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    let names = |map: &ValueMap| {
        Value::List(map.keys().map(|k| Value::String(k.clone())).collect())
    };
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Map(map) => Ok(names(map)),
        other => Ok(entity_properties("keys", other, graph)?.map_or(Value::Null, names)),
    }
}

fn properties(args: &[Value], graph: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Map(map) => Ok(Value::Map(map.clone())),
        other => Ok(entity_properties("properties", other, graph)?
            .map_or(Value::Null, |map| Value::Map(map.clone()))),
    }
}

fn id(args: &[Value], _: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Node(id) => Ok(Value::Integer(id.0 as i64)),
        Value::Relationship(id) => Ok(Value::Integer(id.0 as i64)),
        other => Err(invalid("id", "a node or relationship", other)),
    }
}

fn labels(args: &[Value], graph: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match (&args[0], graph) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Node(id), Some(graph)) => Ok(graph.node(*id).map_or(Value::Null, |node| {
            Value::List(node.labels.iter().map(|l| Value::String(l.clone())).collect())
        })),
        (other, _) => Err(invalid("labels", "a node", other)),
    }
}

fn rel_type(args: &[Value], graph: Option<&dyn Graph>) -> Result<Value, RuntimeError> {
    match (&args[0], graph) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Relationship(id), Some(graph)) => Ok(graph
            .relationship(*id)
            .map_or(Value::Null, |rel| Value::String(rel.rel_type.clone()))),
        (other, _) => Err(invalid("type", "a relationship", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use crate::value::NodeId;

    fn call(name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let registry = FunctionRegistry::with_builtins();
        let signature = registry
            .lookup(name)
            .unwrap_or_else(|| panic!("missing builtin {name}"));
        assert!(signature.accepts(args.len()), "bad arity for {name}");
        signature.invoke(args, None)
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = FunctionRegistry::with_builtins();
        assert!(registry.lookup("toUpper").is_some());
        assert!(registry.lookup("COUNT").is_some_and(|f| f.is_aggregate()));
        assert!(registry.lookup("f").is_none());
        assert!(registry.is_aggregate("collect"));
        assert!(!registry.is_aggregate("abs"));
    }

    #[test]
    fn arity_descriptions() {
        let registry = FunctionRegistry::with_builtins();
        let arity = |name: &str| registry.lookup(name).map(|f| f.arity());
        assert_eq!(arity("abs").as_deref(), Some("1"));
        assert_eq!(arity("substring").as_deref(), Some("2 or 3"));
        assert_eq!(arity("coalesce").as_deref(), Some("at least 1"));
        assert_eq!(arity("count").as_deref(), Some("0 or 1"));
    }

    #[test]
    fn numeric_functions() {
        assert_eq!(call("abs", &[Value::Integer(-3)]), Ok(Value::Integer(3)));
        assert_eq!(call("ceil", &[Value::Float(1.2)]), Ok(Value::Float(2.0)));
        assert_eq!(call("sign", &[Value::Float(-0.5)]), Ok(Value::Integer(-1)));
        assert_eq!(call("abs", &[Value::Null]), Ok(Value::Null));
        assert!(call("abs", &[Value::from("a")]).is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(call("toInteger", &[Value::from("42")]), Ok(Value::Integer(42)));
        assert_eq!(call("toInteger", &[Value::from("4.7")]), Ok(Value::Integer(4)));
        assert_eq!(call("toInteger", &[Value::from("x")]), Ok(Value::Null));
        assert_eq!(call("toFloat", &[Value::Integer(2)]), Ok(Value::Float(2.0)));
        assert_eq!(call("toString", &[Value::Float(2.0)]), Ok(Value::from("2.0")));
        assert_eq!(call("toBoolean", &[Value::from("TRUE")]), Ok(Value::Boolean(true)));
    }

    #[test]
    fn string_functions() {
        assert_eq!(
            call("substring", &[Value::from("hello"), Value::Integer(1), Value::Integer(3)]),
            Ok(Value::from("ell"))
        );
        assert_eq!(
            call("replace", &[Value::from("a-b-c"), Value::from("-"), Value::from("+")]),
            Ok(Value::from("a+b+c"))
        );
        assert_eq!(call("reverse", &[Value::from("abc")]), Ok(Value::from("cba")));
        assert_eq!(call("size", &[Value::from("héllo")]), Ok(Value::Integer(5)));
        assert_eq!(call("trim", &[Value::from("  x ")]), Ok(Value::from("x")));
    }

    #[test]
    fn range_refuses_oversized_lists() {
        assert_eq!(
            call("range", &[Value::Integer(1), Value::Integer(1_000_000)])
                .map(|list| matches!(list, Value::List(items) if items.len() == 1_000_000)),
            Ok(true)
        );
        let err = call("range", &[Value::Integer(0), Value::Integer(i64::MAX)]).unwrap_err();
        assert!(matches!(err, RuntimeError::Function { ref function, .. } if function == "range"));
        assert!(call("range", &[Value::Integer(0), Value::Integer(-2_000_000), Value::Integer(-1)]).is_err());
    }

    #[test]
    fn list_functions() {
        let list = Value::from(vec![1, 2, 3]);
        assert_eq!(call("head", &[list.clone()]), Ok(Value::Integer(1)));
        assert_eq!(call("last", &[list.clone()]), Ok(Value::Integer(3)));
        assert_eq!(call("tail", &[list]), Ok(Value::from(vec![2, 3])));
        assert_eq!(
            call("range", &[Value::Integer(0), Value::Integer(6), Value::Integer(3)]),
            Ok(Value::from(vec![0, 3, 6]))
        );
        assert_eq!(
            call("range", &[Value::Integer(3), Value::Integer(1), Value::Integer(-1)]),
            Ok(Value::from(vec![3, 2, 1]))
        );
        assert!(call("range", &[Value::Integer(0), Value::Integer(1), Value::Integer(0)]).is_err());
        assert_eq!(
            call("range", &[Value::Integer(5), Value::Integer(1)]),
            Ok(Value::List(Vec::new()))
        );
        assert_eq!(
            call("range", &[Value::Integer(i64::MIN), Value::Integer(i64::MAX), Value::Integer(i64::MAX)]),
            Ok(Value::from(vec![i64::MIN, -1, i64::MAX - 1]))
        );
        assert_eq!(
            call("coalesce", &[Value::Null, Value::Integer(2), Value::Integer(3)]),
            Ok(Value::Integer(2))
        );
    }

    #[test]
    fn entity_functions_need_a_graph() {
        let mut graph = MemoryGraph::new();
        let node = graph.add_node(["Person"], [("name", "a")]);
        let registry = FunctionRegistry::with_builtins();
        let invoke = |name: &str, graph: Option<&dyn Graph>| {
            registry
                .lookup(name)
                .map(|f| f.invoke(&[Value::Node(node)], graph))
        };

        assert_eq!(invoke("id", Some(&graph)), Some(Ok(Value::Integer(0))));
        assert_eq!(
            invoke("labels", Some(&graph)),
            Some(Ok(Value::from(vec!["Person"])))
        );
        assert_eq!(invoke("keys", Some(&graph)), Some(Ok(Value::from(vec!["name"]))));
        assert!(matches!(invoke("labels", None), Some(Err(_))));
        assert_eq!(
            call("id", &[Value::Node(NodeId(4))]),
            Ok(Value::Integer(4))
        );
        assert!(call("id", &[Value::Integer(4)]).is_err());
    }
}
