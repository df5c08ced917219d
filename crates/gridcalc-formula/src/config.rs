//! Engine configuration

use crate::functions::FunctionResolver;
use std::fmt;
use std::sync::Arc;

/// Default bound on nested groups, arrays and function calls
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 64;

/// Settings for [`FormulaParser`](crate::FormulaParser)
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParsingConfiguration {
    /// A flagged circular reference compiles to empty instead of failing
    pub allow_circular_references: bool,
    pub max_recursion_depth: usize,
    /// Consulted in order for names the built-in repository does not know
    #[cfg_attr(feature = "serde", serde(skip))]
    pub function_resolvers: Vec<Arc<dyn FunctionResolver>>,
}

impl Default for ParsingConfiguration {
    fn default() -> Self {
        Self {
            allow_circular_references: false,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            function_resolvers: Vec::new(),
        }
    }
}

impl ParsingConfiguration {
    pub fn with_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_function_resolver(mut self, resolver: Arc<dyn FunctionResolver>) -> Self {
        self.function_resolvers.push(resolver);
        self
    }
}

impl fmt::Debug for ParsingConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsingConfiguration")
            .field("allow_circular_references", &self.allow_circular_references)
            .field("max_recursion_depth", &self.max_recursion_depth)
            .field("function_resolvers", &self.function_resolvers.len())
            .finish()
    }
}
