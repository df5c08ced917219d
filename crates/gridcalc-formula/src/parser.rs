//! Public entry point tying tokenizer, builder and compiler together

use crate::address_cache::AddressCache;
use crate::builder::ExpressionGraphBuilder;
use crate::compile_result::CompileResult;
use crate::compiler::ExpressionCompiler;
use crate::config::ParsingConfiguration;
use crate::context::{EvaluationScope, ParsingContext};
use crate::error::FormulaResult;
use crate::expression::ExpressionGraph;
use crate::functions::{builtin_functions, FunctionRepository};
use crate::provider::ExcelDataProvider;
use crate::tokenizer::{tokenize, Token};
use std::cell::RefCell;

/// Formula parser and evaluator
///
/// Every `parse*` call evaluates one formula for one cell. Failures are
/// reported as error values (`#VALUE!`, `#NAME?`, `#REF!`, ...) in the
/// returned [`CompileResult`]; only a disallowed circular reference comes
/// back as `Err`.
///
/// ```rust
/// use gridcalc_formula::{EvaluationScope, FormulaParser, MemoryDataProvider};
///
/// let mut provider = MemoryDataProvider::new();
/// provider.set_value("Sheet1", "A1", 2.0).unwrap();
///
/// let parser = FormulaParser::new(&provider);
/// let result = parser.parse("=A1*3+1", &EvaluationScope::new("Sheet1", 0, 1)).unwrap();
/// assert_eq!(result.result_numeric(), 7.0);
/// ```
pub struct FormulaParser<'a> {
    provider: &'a dyn ExcelDataProvider,
    functions: &'a FunctionRepository,
    config: ParsingConfiguration,
    /// Addresses resolved by the most recent compile
    last_addresses: RefCell<AddressCache>,
}

impl<'a> FormulaParser<'a> {
    /// Parser over `provider` with the built-in function library
    pub fn new(provider: &'a dyn ExcelDataProvider) -> Self {
        Self {
            provider,
            functions: builtin_functions(),
            config: ParsingConfiguration::default(),
            last_addresses: RefCell::new(AddressCache::new()),
        }
    }

    pub fn with_configuration(mut self, config: ParsingConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Use `functions` instead of the built-in library
    pub fn with_functions(mut self, functions: &'a FunctionRepository) -> Self {
        self.functions = functions;
        self
    }

    pub fn configuration(&self) -> &ParsingConfiguration {
        &self.config
    }

    /// Tokenize, build and compile `formula` for the cell in `scope`
    pub fn parse(&self, formula: &str, scope: &EvaluationScope) -> FormulaResult<CompileResult> {
        log::trace!("parsing {:?} for {}!R{}C{}", formula, scope.worksheet, scope.row, scope.column);
        match tokenize(formula) {
            Ok(tokens) => self.parse_tokens(&tokens, scope),
            Err(e) => {
                self.last_addresses.borrow_mut().clear();
                into_cell_value(Err(e))
            }
        }
    }

    /// Build and compile an already tokenized formula
    pub fn parse_tokens(
        &self,
        tokens: &[Token],
        scope: &EvaluationScope,
    ) -> FormulaResult<CompileResult> {
        match ExpressionGraphBuilder::new(&self.config).build(tokens) {
            Ok(mut graph) => self.compile_graph(&mut graph, scope),
            Err(e) => {
                self.last_addresses.borrow_mut().clear();
                into_cell_value(Err(e))
            }
        }
    }

    /// Tokenize and build without compiling
    ///
    /// Lets a caller inspect the graph, e.g. to flag circular references
    /// before handing it to [`compile_graph`](Self::compile_graph).
    pub fn build_graph(&self, formula: &str) -> FormulaResult<ExpressionGraph> {
        let tokens = tokenize(formula)?;
        ExpressionGraphBuilder::new(&self.config).build(&tokens)
    }

    /// Compile a built graph for the cell in `scope`
    pub fn compile_graph(
        &self,
        graph: &mut ExpressionGraph,
        scope: &EvaluationScope,
    ) -> FormulaResult<CompileResult> {
        let ctx = ParsingContext::new(self.provider, &self.config, self.functions, scope.clone());
        let result = ExpressionCompiler::compile_graph(graph, &ctx);
        *self.last_addresses.borrow_mut() = ctx.address_cache();
        into_cell_value(result)
    }

    /// Addresses resolved by the most recent `parse*`/`compile_graph` call
    pub fn address_cache(&self) -> AddressCache {
        self.last_addresses.borrow().clone()
    }
}

/// Turn every failure except a circular reference into an error value
fn into_cell_value(result: FormulaResult<CompileResult>) -> FormulaResult<CompileResult> {
    match result {
        Err(e) if !e.is_circular_reference() => {
            log::debug!("formula failed: {}", e);
            Ok(CompileResult::error(e.to_cell_error()))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::flag_self_references;
    use crate::error::FormulaError;
    use crate::memory::MemoryDataProvider;
    use gridcalc_core::CellError;
    use pretty_assertions::assert_eq;

    fn scope() -> EvaluationScope {
        EvaluationScope::new("Sheet1", 0, 0)
    }

    #[test]
    fn test_syntax_errors_become_values() {
        let provider = MemoryDataProvider::new();
        let parser = FormulaParser::new(&provider);

        assert_eq!(parser.parse("1+", &scope()).unwrap(), CompileResult::error(CellError::Value));
        assert_eq!(parser.parse("SUM(1", &scope()).unwrap(), CompileResult::error(CellError::Value));
        assert_eq!(parser.parse("\"abc", &scope()).unwrap(), CompileResult::error(CellError::Value));
    }

    #[test]
    fn test_unknown_function_is_name_error() {
        let provider = MemoryDataProvider::new();
        let parser = FormulaParser::new(&provider);
        assert_eq!(
            parser.parse("FOOBAR(1)", &scope()).unwrap(),
            CompileResult::error(CellError::Name)
        );
    }

    #[test]
    fn test_address_cache_tracks_last_parse() {
        let mut provider = MemoryDataProvider::new();
        provider.set_value("Sheet1", "B1", 1.0).unwrap();
        let parser = FormulaParser::new(&provider);

        parser.parse("B1+B2", &scope()).unwrap();
        assert_eq!(parser.address_cache().len(), 2);

        parser.parse("1+1", &scope()).unwrap();
        assert!(parser.address_cache().is_empty());
    }

    #[test]
    fn test_flagged_self_reference() {
        let provider = MemoryDataProvider::new();
        let here = EvaluationScope::new("Sheet1", 0, 0);

        let parser = FormulaParser::new(&provider);
        let mut graph = parser.build_graph("A1+1").unwrap();
        assert_eq!(flag_self_references(&mut graph, &here), 1);
        assert!(matches!(
            parser.compile_graph(&mut graph, &here),
            Err(FormulaError::CircularReference(_))
        ));

        let parser = FormulaParser::new(&provider)
            .with_configuration(ParsingConfiguration::default().with_circular_references(true));
        let mut graph = parser.build_graph("A1").unwrap();
        flag_self_references(&mut graph, &here);
        assert!(parser.compile_graph(&mut graph, &here).unwrap().is_empty());
    }

    #[test]
    fn test_custom_repository() {
        let provider = MemoryDataProvider::new();
        let functions = FunctionRepository::new();
        let parser = FormulaParser::new(&provider).with_functions(&functions);
        assert_eq!(
            parser.parse("SUM(1)", &scope()).unwrap(),
            CompileResult::error(CellError::Name)
        );
    }
}
