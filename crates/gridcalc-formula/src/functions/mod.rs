//! Built-in spreadsheet functions

pub mod date;
pub mod helpers;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod text;

use crate::compile_result::CompileResult;
use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use ahash::AHashMap;
use std::fmt;
use std::sync::OnceLock;

/// Function implementation signature
///
/// Arguments arrive compiled; the context gives access to the data provider
/// and the cell being evaluated.
pub type FunctionImpl = fn(&[CompileResult], &ParsingContext) -> FormulaResult<CompileResult>;

/// How a function's arguments are compiled before the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionCompilerKind {
    /// All arguments eagerly; the first argument error is the result
    #[default]
    Default,
    /// Only the branch picked by the condition
    If,
    /// The fallback only when the first argument is an error
    IfError,
    /// First argument stays a range even for a single cell
    Lookup,
    /// All arguments eagerly; errors are passed to the function
    ErrorHandling,
}

/// Function definition
#[derive(Clone, Copy)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Is volatile (recalculates every time)
    pub volatile: bool,
    pub compiler: FunctionCompilerKind,
}

impl FunctionDef {
    pub fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation,
            volatile: false,
            compiler: FunctionCompilerKind::Default,
        }
    }

    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    pub fn with_compiler(mut self, compiler: FunctionCompilerKind) -> Self {
        self.compiler = compiler;
        self
    }

    /// Check an argument count against the declared bounds
    pub fn check_arity(&self, count: usize) -> FormulaResult<()> {
        let too_many = self.max_args.map_or(false, |max| count > max);
        if count < self.min_args || too_many {
            let expected = match self.max_args {
                Some(max) if max == self.min_args => max.to_string(),
                Some(max) => format!("{}..{}", self.min_args, max),
                None => format!("at least {}", self.min_args),
            };
            return Err(FormulaError::ArgumentCount {
                function: self.name.to_string(),
                expected,
                actual: count,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("volatile", &self.volatile)
            .field("compiler", &self.compiler)
            .finish_non_exhaustive()
    }
}

/// Fallback lookup for names the built-in repository does not define
pub trait FunctionResolver: Send + Sync {
    fn find_function(&self, name: &str) -> Option<FunctionDef>;
}

/// Function registry
#[derive(Debug, Clone, Default)]
pub struct FunctionRepository {
    functions: AHashMap<String, FunctionDef>,
}

/// The process-wide repository of built-in functions
pub fn builtin_functions() -> &'static FunctionRepository {
    static REGISTRY: OnceLock<FunctionRepository> = OnceLock::new();
    REGISTRY.get_or_init(FunctionRepository::with_builtins)
}

impl FunctionRepository {
    /// An empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository with all built-in functions
    pub fn with_builtins() -> Self {
        let mut repository = Self::new();
        math::register(&mut repository);
        logical::register(&mut repository);
        text::register(&mut repository);
        info::register(&mut repository);
        lookup::register(&mut repository);
        date::register(&mut repository);
        repository
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl FunctionResolver for FunctionRepository {
    fn find_function(&self, name: &str) -> Option<FunctionDef> {
        self.get(name).copied()
    }
}

/// Run `f` against an empty workbook evaluated at `Sheet1!A1`
#[cfg(test)]
pub(crate) fn with_test_context<R>(f: impl FnOnce(&ParsingContext) -> R) -> R {
    use crate::config::ParsingConfiguration;
    use crate::context::EvaluationScope;
    use crate::memory::MemoryDataProvider;

    let provider = MemoryDataProvider::new();
    let config = ParsingConfiguration::default();
    let ctx = ParsingContext::new(
        &provider,
        &config,
        builtin_functions(),
        EvaluationScope::new("Sheet1", 0, 0),
    );
    f(&ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        let functions = builtin_functions();
        assert!(functions.contains("sum"));
        assert!(functions.contains("Offset"));
        assert!(!functions.contains("FOOBAR"));
    }

    #[test]
    fn test_volatile_functions() {
        let functions = builtin_functions();
        for name in ["RAND", "RANDBETWEEN", "NOW", "TODAY"] {
            assert!(functions.get(name).unwrap().volatile, "{} should be volatile", name);
        }
        assert!(!functions.get("SUM").unwrap().volatile);
    }

    #[test]
    fn test_check_arity() {
        let functions = builtin_functions();
        let round = functions.get("ROUND").unwrap();
        assert!(round.check_arity(2).is_ok());
        assert!(matches!(
            round.check_arity(3),
            Err(FormulaError::ArgumentCount { actual: 3, .. })
        ));
        assert!(functions.get("SUM").unwrap().check_arity(0).is_err());
    }

    #[test]
    fn test_compiler_kinds() {
        let functions = builtin_functions();
        assert_eq!(functions.get("IF").unwrap().compiler, FunctionCompilerKind::If);
        assert_eq!(functions.get("IFERROR").unwrap().compiler, FunctionCompilerKind::IfError);
        assert_eq!(
            functions.get("ISERROR").unwrap().compiler,
            FunctionCompilerKind::ErrorHandling
        );
        assert_eq!(functions.get("OFFSET").unwrap().compiler, FunctionCompilerKind::Lookup);
    }
}
