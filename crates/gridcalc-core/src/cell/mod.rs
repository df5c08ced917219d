//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The value stored in a cell
//! - [`CellError`] - Spreadsheet error literals
//! - [`CellAddress`], [`CellRange`], [`RangeAddress`] - Cell locations

mod address;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator, RangeAddress};
pub use value::{CellError, CellValue};
