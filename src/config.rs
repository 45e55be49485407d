//! Engine configuration.

use crate::parser::ParseOptions;

/// Settings shared by every entry point of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Route `id(n) = k` predicates to a `NodeByIdSeek` instead of a scan.
    pub enable_id_seek: bool,

    /// Deepest expression nesting the parser accepts.
    pub max_expression_depth: usize,

    /// Accept a `CYPHER name=expr` prefix.
    pub allow_declarations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_id_seek: true,
            max_expression_depth: 128,
            allow_declarations: true,
        }
    }
}

impl EngineConfig {
    pub fn with_id_seek(mut self, enabled: bool) -> Self {
        self.enable_id_seek = enabled;
        self
    }

    pub fn with_max_expression_depth(mut self, depth: usize) -> Self {
        self.max_expression_depth = depth;
        self
    }

    pub fn with_declarations(mut self, allowed: bool) -> Self {
        self.allow_declarations = allowed;
        self
    }

    pub(crate) fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_depth: self.max_expression_depth,
            allow_declarations: self.allow_declarations,
        }
    }
}
