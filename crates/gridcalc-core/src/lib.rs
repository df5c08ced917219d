//! # gridcalc-core
//!
//! Core value types shared by the gridcalc formula engine and the data
//! sources it reads from:
//! - [`CellValue`] - the value stored in a cell (number, text, logical, error)
//! - [`CellError`] - spreadsheet error literals (`#VALUE!`, `#REF!`, ...)
//! - [`CellAddress`], [`CellRange`] and [`RangeAddress`] - A1-style addressing
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellRange, RangeAddress};
//!
//! let range = CellRange::parse("A1:B3").unwrap();
//! assert_eq!(range.row_count(), 3);
//!
//! let qualified = RangeAddress::parse("'My Sheet'!$A$1:A3").unwrap();
//! assert_eq!(qualified.worksheet.as_deref(), Some("My Sheet"));
//! ```

pub mod cell;
pub mod error;

pub use cell::{CellAddress, CellError, CellRange, CellRangeIterator, CellValue, RangeAddress};
pub use error::{Error, Result};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;
