//! Data-source contract the engine resolves addresses and names against

use crate::error::FormulaResult;
use gridcalc_core::{CellValue, RangeAddress, MAX_COLS, MAX_ROWS};
use std::fmt;
use std::rc::Rc;

/// Shared handle to a resolved range
pub type RangeHandle = Rc<dyn RangeInfo>;

/// A cell visited while enumerating a range
#[derive(Debug, Clone, PartialEq)]
pub struct CellInfo {
    /// 0-based row
    pub row: u32,
    /// 0-based column
    pub col: u16,
    pub value: CellValue,
    pub is_hidden_row: bool,
}

/// A resolved range
///
/// Implementations should enumerate lazily: a whole-column reference must not
/// materialise a million empty cells.
pub trait RangeInfo: fmt::Debug {
    /// The address points at a deleted sheet or otherwise dangling range
    fn is_ref_error(&self) -> bool;

    /// No populated cell in the range
    fn is_empty(&self) -> bool;

    /// More than one cell is addressed
    fn is_multi(&self) -> bool {
        !self.address().range.is_single_cell()
    }

    /// Fully qualified address (worksheet always set)
    fn address(&self) -> &RangeAddress;

    /// Populated cells, row by row
    fn cells(&self) -> Box<dyn Iterator<Item = CellInfo> + '_>;

    /// Cell at an offset from the top-left corner
    fn cell_at(&self, row_offset: u32, col_offset: u16) -> CellInfo;

    fn value_at(&self, row_offset: u32, col_offset: u16) -> CellValue {
        self.cell_at(row_offset, col_offset).value
    }

    /// Top-left cell
    fn first(&self) -> Option<CellInfo> {
        if self.is_ref_error() {
            return None;
        }
        Some(self.cell_at(0, 0))
    }
}

/// What a defined name is bound to
#[derive(Debug, Clone)]
pub enum NameValue {
    Range(RangeHandle),
    Value(CellValue),
}

#[derive(Debug, Clone)]
pub struct NameInfo {
    pub name: String,
    pub value: NameValue,
}

/// A structured table
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub worksheet: String,
    pub address: RangeAddress,
}

/// Workbook data the compiler reads from
pub trait ExcelDataProvider {
    /// Resolve `address` as written in a formula on `worksheet` at (`row`, `col`)
    fn get_range(
        &self,
        worksheet: &str,
        row: u32,
        col: u16,
        address: &str,
    ) -> FormulaResult<RangeHandle> {
        let _ = (row, col);
        let parsed = RangeAddress::parse(address)?;
        self.get_range_at(worksheet, &parsed)
    }

    /// Resolve an already parsed address; an unqualified one belongs to `worksheet`
    fn get_range_at(&self, worksheet: &str, address: &RangeAddress) -> FormulaResult<RangeHandle>;

    /// Look up a defined name, sheet-local names first
    fn get_name(&self, worksheet: &str, name: &str) -> Option<NameInfo>;

    fn get_excel_table(&self, name: &str) -> Option<TableInfo>;

    fn excel_max_rows(&self) -> u32 {
        MAX_ROWS
    }

    fn excel_max_columns(&self) -> u16 {
        MAX_COLS
    }

    /// Render `value` with a number format string
    fn get_format(&self, value: f64, format: &str) -> String;
}
