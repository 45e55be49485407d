//! Query entry points.
//!
//! [`Engine::execute`], [`Engine::profile`] and [`Engine::explain`] share
//! [`Engine::compile`], so a query that fails to compile fails the same way
//! through all three.

use crate::ast::Query;
use crate::config::EngineConfig;
use crate::diag::{Diag, SourceFile, convert_diag_to_report};
use crate::error::{CompileError, CompileResult, QueryResult};
use crate::exec::{Executor, OperatorProfile, ProfiledResult, ResultSet};
use crate::graph::Graph;
use crate::parser::{parse_body, parse_declarations};
use crate::plan::{ExecutionPlan, Planner};
use crate::semantic::{
    FunctionRegistry, ParameterMap, ParameterTable, Resolver, bind_declarations, type_gate,
};
use std::sync::Arc;
use tracing::debug;

/// A query that passed every compile-time check.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    source: String,
    parameters: ParameterTable,
    query: Query,
    plan: ExecutionPlan,
}

impl CompiledQuery {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Warnings raised while binding parameters.
    pub fn warnings(&self) -> &[Diag] {
        self.parameters.warnings()
    }

    /// Renders each warning against the query text.
    pub fn warning_reports(&self) -> Vec<miette::Report> {
        let source = SourceFile::with_name(self.source.as_str(), "query");
        self.warnings()
            .iter()
            .map(|diag| convert_diag_to_report(diag, &source))
            .collect()
    }
}

/// Compiles and runs queries with one configuration and function catalog.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    registry: Arc<FunctionRegistry>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, Arc::new(FunctionRegistry::with_builtins()))
    }

    /// Uses a caller-provided function catalog, possibly shared with other
    /// engines.
    pub fn with_registry(config: EngineConfig, registry: Arc<FunctionRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Binds parameters, validates the body and plans it. The first failure
    /// is returned.
    pub fn compile(&self, query: &str, params: &ParameterMap) -> CompileResult<CompiledQuery> {
        let options = self.config.parse_options();
        let block = parse_declarations(query, &options).map_err(CompileError::syntax)?;
        debug!(
            declarations = block.declarations.len(),
            body_start = block.body_start,
            "declarations parsed"
        );

        let parameters = bind_declarations(&block, params, &self.registry)?;
        let body = parse_body(query, block.body_start, &options).map_err(CompileError::syntax)?;
        debug!(clauses = body.clauses.len(), "body parsed");

        Resolver::new(query, &parameters, &self.registry).resolve(&body)?;
        let bounds = type_gate::check_query(&body, &parameters, &self.registry)?;
        debug!("body validated");

        let plan = Planner::new(query, &self.registry, self.config.enable_id_seek)
            .plan(&body, &bounds);
        debug!(operators = plan.operators().len(), "plan selected");

        Ok(CompiledQuery {
            source: query.to_string(),
            parameters,
            query: body,
            plan,
        })
    }

    /// Compiles and runs `query` against `graph`.
    pub fn execute(
        &self,
        graph: &mut dyn Graph,
        query: &str,
        params: &ParameterMap,
    ) -> QueryResult<ResultSet> {
        let compiled = self.compile(query, params)?;
        let (result, _) = self.run(&compiled, graph)?;
        Ok(result)
    }

    /// Like [`Engine::execute`], also reporting per-operator record counts
    /// and timings.
    pub fn profile(
        &self,
        graph: &mut dyn Graph,
        query: &str,
        params: &ParameterMap,
    ) -> QueryResult<ProfiledResult> {
        let compiled = self.compile(query, params)?;
        let (result, operators) = self.run(&compiled, graph)?;
        Ok(ProfiledResult { result, operators })
    }

    /// Returns the plan `query` would run, without touching a graph.
    pub fn explain(&self, query: &str, params: &ParameterMap) -> QueryResult<ExecutionPlan> {
        Ok(self.compile(query, params)?.plan)
    }

    fn run(
        &self,
        compiled: &CompiledQuery,
        graph: &mut dyn Graph,
    ) -> QueryResult<(ResultSet, Vec<OperatorProfile>)> {
        let (result, operators) =
            Executor::new(&self.registry, &compiled.parameters).run(&compiled.plan, graph)?;
        debug!(
            rows = result.len(),
            elapsed_ms = result.statistics.execution_time.as_secs_f64() * 1000.0,
            "query executed"
        );
        Ok((result, operators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, QueryError};
    use crate::graph::MemoryGraph;
    use crate::value::Value;

    fn params(entries: &[(&str, Value)]) -> ParameterMap {
        entries
            .iter()
            .map(|(name, value)| ((*name).into(), value.clone()))
            .collect()
    }

    #[test]
    fn compile_exposes_bound_parameters_and_plan() {
        let engine = Engine::default();
        let compiled = engine
            .compile("CYPHER b=2 RETURN $a + $b AS s", &params(&[("a", Value::Integer(1))]))
            .expect("compiles");
        assert_eq!(compiled.parameters().get("b"), Some(&Value::Integer(2)));
        assert_eq!(compiled.plan().columns(), ["s"]);
        assert_eq!(compiled.source(), "CYPHER b=2 RETURN $a + $b AS s");
        assert_eq!(compiled.query().clauses.len(), 1);
    }

    #[test]
    fn overridden_client_parameters_surface_as_warnings() {
        let engine = Engine::default();
        let compiled = engine
            .compile("CYPHER a=10 RETURN $a", &params(&[("a", Value::Integer(1))]))
            .expect("compiles");
        assert_eq!(compiled.parameters().get("a"), Some(&Value::Integer(10)));
        assert_eq!(compiled.warnings().len(), 1);

        let reports = compiled.warning_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].severity(), Some(miette::Severity::Warning));
        assert_eq!(
            reports[0].to_string(),
            "declaration of 'a' overrides the client parameter"
        );
        let related: Vec<_> = reports[0].related().expect("related").collect();
        assert_eq!(related.len(), 1);

        let clean = engine
            .compile("CYPHER b=2 RETURN $b", &params(&[("a", Value::Integer(1))]))
            .expect("compiles");
        assert!(clean.warnings().is_empty());
    }

    #[test]
    fn entry_points_fail_alike() {
        let engine = Engine::default();
        let mut graph = MemoryGraph::new();
        let source = "MATCH (n) WHERE n.v = $missing RETURN n";
        let none = ParameterMap::new();

        let kinds = [
            engine.execute(&mut graph, source, &none).unwrap_err().kind(),
            engine.profile(&mut graph, source, &none).unwrap_err().kind(),
            engine.explain(source, &none).unwrap_err().kind(),
        ];
        assert_eq!(kinds, [Some(ErrorKind::MissingParameter); 3]);
    }

    #[test]
    fn runtime_failures_are_not_compile_errors() {
        let engine = Engine::default();
        let mut graph = MemoryGraph::new();
        graph.add_node(["A"], [("v", Value::from("x"))]);
        let err = engine
            .execute(&mut graph, "MATCH (n) RETURN n.v * 2", &ParameterMap::new())
            .unwrap_err();
        assert!(matches!(err, QueryError::Runtime(_)));
    }

    #[test]
    fn declarations_can_be_disabled() {
        let engine = Engine::new(EngineConfig::default().with_declarations(false));
        let err = engine.explain("CYPHER a=1 RETURN $a", &ParameterMap::new()).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Syntax));
    }

    #[test]
    fn expression_depth_is_bounded() {
        let engine = Engine::new(EngineConfig::default().with_max_expression_depth(8));
        let nested = format!("RETURN {}1{}", "(".repeat(20), ")".repeat(20));
        let err = engine.explain(&nested, &ParameterMap::new()).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Syntax));
        assert!(Engine::default().explain(&nested, &ParameterMap::new()).is_ok());
    }

    #[test]
    fn id_seek_follows_config() {
        let source = "MATCH (n) WHERE id(n) = 0 RETURN n";
        let seek = Engine::default().explain(source, &ParameterMap::new()).expect("plans");
        assert!(seek.contains("NodeByIdSeek"));

        let engine = Engine::new(EngineConfig::default().with_id_seek(false));
        let scan = engine.explain(source, &ParameterMap::new()).expect("plans");
        assert!(!scan.contains("NodeByIdSeek"));
        assert!(scan.contains("AllNodeScan"));
        assert!(scan.contains("Filter"));
    }

    #[test]
    fn shared_registry() {
        let registry = Arc::new(FunctionRegistry::with_builtins());
        let a = Engine::with_registry(EngineConfig::default(), Arc::clone(&registry));
        let b = Engine::with_registry(EngineConfig::default(), Arc::clone(&registry));
        assert!(Arc::ptr_eq(a.registry(), b.registry()));
        assert!(a.config().enable_id_seek);
    }

    #[test]
    fn profile_counts_records() {
        let engine = Engine::default();
        let mut graph = MemoryGraph::new();
        for _ in 0..3 {
            graph.add_node(["A"], std::iter::empty::<(&str, Value)>());
        }
        let profiled = engine
            .profile(&mut graph, "MATCH (n:A) RETURN count(n) AS c", &ParameterMap::new())
            .expect("runs");
        assert_eq!(profiled.records_of("NodeByLabelScan"), Some(3));
        assert_eq!(profiled.records_of("Aggregate"), Some(1));
        assert_eq!(profiled.result.rows, [vec![Value::Integer(3)]]);
        assert_eq!(profiled.lines().len(), profiled.operators.len());
        assert!(profiled.lines()[0].starts_with("Results | c | Records produced: 1"));
    }
}
