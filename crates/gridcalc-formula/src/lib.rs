//! # gridcalc-formula
//!
//! Spreadsheet formula engine for gridcalc.
//!
//! This crate provides:
//! - Tokenizing formula text into classified tokens
//! - Building an expression graph (an arena of linked nodes) from tokens
//! - Precedence-driven compilation of the graph into a [`CompileResult`]
//! - A function repository with a library of built-in functions
//! - Address tracking and dependency helpers for recalculation ordering
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_formula::{EvaluationScope, FormulaParser, MemoryDataProvider};
//!
//! let mut provider = MemoryDataProvider::new();
//! provider.set_value("Sheet1", "A1", 10.0).unwrap();
//! provider.set_value("Sheet1", "A2", 32.0).unwrap();
//!
//! let parser = FormulaParser::new(&provider);
//! let scope = EvaluationScope::new("Sheet1", 2, 0);
//! let result = parser.parse("=SUM(A1:A2)", &scope).unwrap();
//! assert_eq!(result.result_numeric(), 42.0);
//! assert_eq!(parser.address_cache().len(), 1);
//! ```

pub mod address_cache;
pub mod builder;
pub mod compile_result;
pub mod compiler;
pub mod config;
pub mod context;
pub mod dependency;
pub mod error;
pub mod expression;
pub mod functions;
pub mod memory;
pub mod operators;
pub mod parser;
pub mod provider;
pub mod tokenizer;

pub use address_cache::AddressCache;
pub use builder::ExpressionGraphBuilder;
pub use compile_result::{CompileResult, DataType, ResultValue};
pub use compiler::ExpressionCompiler;
pub use config::ParsingConfiguration;
pub use context::{EvaluationScope, ParsingContext};
pub use dependency::{flag_self_references, CellKey, DependencyGraph};
pub use error::{FormulaError, FormulaResult};
pub use expression::{ExprId, ExpressionGraph, ExpressionKind};
pub use functions::{
    builtin_functions, FunctionCompilerKind, FunctionDef, FunctionRepository, FunctionResolver,
};
pub use memory::MemoryDataProvider;
pub use operators::Operator;
pub use parser::FormulaParser;
pub use provider::{CellInfo, ExcelDataProvider, NameInfo, NameValue, RangeHandle, RangeInfo, TableInfo};
pub use tokenizer::{tokenize, Token, TokenType};
