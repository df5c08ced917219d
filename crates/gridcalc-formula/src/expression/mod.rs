//! Expression nodes
//!
//! Nodes live in an [`ExpressionGraph`] arena and refer to each other by
//! [`ExprId`]. Siblings form a doubly linked chain through `prev`/`next`;
//! the chain is traversal order only, a parent owns its `children`.

mod factory;
mod graph;

pub use factory::{ExpressionConverter, ExpressionFactory};
pub use graph::ExpressionGraph;

use crate::compile_result::CompileResult;
use crate::operators::Operator;
use gridcalc_core::CellError;
use std::fmt;

/// Handle of a node in an [`ExpressionGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(usize);

impl ExprId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An address operand
#[derive(Debug, Clone, PartialEq)]
pub struct AddressExpression {
    /// Address text, possibly sheet-qualified
    pub address: String,
    /// Keep a single cell as a range instead of unwrapping it to a scalar
    pub resolve_as_range: bool,
    /// Set by the caller's dependency tracking before compiling
    pub has_circular_reference: bool,
}

impl AddressExpression {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            resolve_as_range: false,
            has_circular_reference: false,
        }
    }
}

/// Node variants
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Integer(f64),
    Decimal(f64),
    Str(String),
    Boolean(bool),
    ExcelError(CellError),
    ExcelAddress(AddressExpression),
    /// Defined name or table; `resolve_as_range` keeps a single-cell name a range
    NamedValue { name: String, resolve_as_range: bool },
    /// Function call; children are `FunctionArgument` nodes
    Function(String),
    /// One comma separated argument; children form its expression chain
    FunctionArgument,
    /// Parenthesized sub-expression
    Group,
    /// Array constant; `row_breaks` holds child indices that start a new row
    Enumerable { row_breaks: Vec<usize> },
    /// `OFFSET(...):A1`, `A1:OFFSET(...)` or `OFFSET(...):OFFSET(...)`
    RangeOffset { start: ExprId, end: ExprId },
    /// Two range operands joined by a free-standing colon
    Colon { left: ExprId, right: ExprId },
    /// Already compiled range or array
    ExcelRange(CompileResult),
    /// Already compiled date or time
    Constant(CompileResult),
    /// Placeholder for an empty group that still has an operator attached
    Empty,
}

impl ExpressionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExpressionKind::Integer(_) => "Integer",
            ExpressionKind::Decimal(_) => "Decimal",
            ExpressionKind::Str(_) => "String",
            ExpressionKind::Boolean(_) => "Boolean",
            ExpressionKind::ExcelError(_) => "ExcelError",
            ExpressionKind::ExcelAddress(_) => "ExcelAddress",
            ExpressionKind::NamedValue { .. } => "NamedValue",
            ExpressionKind::Function(_) => "Function",
            ExpressionKind::FunctionArgument => "FunctionArgument",
            ExpressionKind::Group => "Group",
            ExpressionKind::Enumerable { .. } => "Enumerable",
            ExpressionKind::RangeOffset { .. } => "RangeOffset",
            ExpressionKind::Colon { .. } => "Colon",
            ExpressionKind::ExcelRange(_) => "ExcelRange",
            ExpressionKind::Constant(_) => "Constant",
            ExpressionKind::Empty => "Empty",
        }
    }

    /// Call to OFFSET, the only function allowed on either side of a range colon
    pub fn is_offset_function(&self) -> bool {
        matches!(self, ExpressionKind::Function(name) if name.eq_ignore_ascii_case("OFFSET"))
    }
}

/// A node of the expression graph
#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Source text, empty for synthetic nodes
    pub text: String,
    pub children: Vec<ExprId>,
    pub prev: Option<ExprId>,
    pub next: Option<ExprId>,
    /// Operator applied between this node and `next`
    pub operator: Option<Operator>,
    /// Unary minus pending on this node
    pub negate: bool,
}

impl Expression {
    pub fn new(kind: ExpressionKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            children: Vec::new(),
            prev: None,
            next: None,
            operator: None,
            negate: false,
        }
    }

    /// Groups and array constants are compiled before operators are resolved
    pub fn is_grouped(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Group | ExpressionKind::Enumerable { .. }
        )
    }
}
