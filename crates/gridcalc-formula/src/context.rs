//! Per-evaluation state shared by the compiler and function implementations

use crate::address_cache::AddressCache;
use crate::config::ParsingConfiguration;
use crate::functions::{FunctionDef, FunctionRepository, FunctionResolver};
use crate::provider::ExcelDataProvider;
use std::cell::RefCell;
use std::rc::Rc;

/// The cell a formula is evaluated for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvaluationScope {
    pub worksheet: String,
    /// 0-based
    pub row: u32,
    /// 0-based
    pub column: u16,
}

impl EvaluationScope {
    pub fn new(worksheet: impl Into<String>, row: u32, column: u16) -> Self {
        Self {
            worksheet: worksheet.into(),
            row,
            column,
        }
    }
}

/// Context handed to every compile step and function call
#[derive(Clone)]
pub struct ParsingContext<'a> {
    pub provider: &'a dyn ExcelDataProvider,
    pub config: &'a ParsingConfiguration,
    pub functions: &'a FunctionRepository,
    pub scope: EvaluationScope,
    address_cache: Rc<RefCell<AddressCache>>,
}

impl<'a> ParsingContext<'a> {
    pub fn new(
        provider: &'a dyn ExcelDataProvider,
        config: &'a ParsingConfiguration,
        functions: &'a FunctionRepository,
        scope: EvaluationScope,
    ) -> Self {
        Self {
            provider,
            config,
            functions,
            scope,
            address_cache: Rc::new(RefCell::new(AddressCache::new())),
        }
    }

    /// Built-in function first, then the configured resolvers in order
    pub fn find_function(&self, name: &str) -> Option<FunctionDef> {
        self.functions.find_function(name).or_else(|| {
            self.config
                .function_resolvers
                .iter()
                .find_map(|resolver| resolver.find_function(name))
        })
    }

    /// Record a resolved address for dependency tracking
    pub fn register_address(&self, address: &str) -> u32 {
        self.address_cache.borrow_mut().add(address)
    }

    pub fn address_cache(&self) -> AddressCache {
        self.address_cache.borrow().clone()
    }
}
