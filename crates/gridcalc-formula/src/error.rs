//! Formula error types

use gridcalc_core::CellError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula tokenizing, graph building or compilation
///
/// Everything except [`FormulaError::CircularReference`] is turned into an
/// in-cell error value by [`FormulaParser`](crate::FormulaParser) before it
/// reaches the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    /// Malformed formula syntax
    #[error("Parse error: {0}")]
    Parse(String),

    /// A spreadsheet error raised while evaluating (e.g. a bad argument type)
    #[error("Formula error: {0}")]
    Excel(CellError),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Circular reference while circular references are disallowed
    #[error("Circular reference detected in {0}")]
    CircularReference(String),

    /// Reference to invalid cell
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Address parsing failure
    #[error(transparent)]
    Core(#[from] gridcalc_core::Error),
}

impl FormulaError {
    /// Error literal this failure is reported as inside a cell
    pub fn to_cell_error(&self) -> CellError {
        match self {
            FormulaError::Excel(e) => *e,
            FormulaError::UnknownFunction(_) => CellError::Name,
            FormulaError::InvalidReference(_) | FormulaError::Core(_) => CellError::Ref,
            FormulaError::Parse(_)
            | FormulaError::Argument(_)
            | FormulaError::ArgumentCount { .. }
            | FormulaError::CircularReference(_) => CellError::Value,
        }
    }

    /// True for the circular-reference fault, which is never turned into a cell value
    pub fn is_circular_reference(&self) -> bool {
        matches!(self, FormulaError::CircularReference(_))
    }
}

impl From<CellError> for FormulaError {
    fn from(e: CellError) -> Self {
        FormulaError::Excel(e)
    }
}
