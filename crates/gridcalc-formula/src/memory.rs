//! In-memory workbook implementing [`ExcelDataProvider`]
//!
//! Cells are stored sparsely per sheet (`BTreeMap<row, BTreeMap<col, value>>`)
//! so whole-column ranges enumerate only populated cells. Sheets are shared
//! with the ranges resolved from them; editing a sheet after a range was
//! handed out leaves that range on the earlier snapshot.

use crate::compile_result::format_number;
use crate::error::FormulaResult;
use crate::provider::{
    CellInfo, ExcelDataProvider, NameInfo, NameValue, RangeHandle, RangeInfo, TableInfo,
};
use gridcalc_core::{CellAddress, CellValue, RangeAddress};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// One worksheet's cells
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    name: String,
    rows: BTreeMap<u32, BTreeMap<u16, CellValue>>,
    hidden_rows: BTreeSet<u32>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.rows.get(&row).and_then(|cols| cols.get(&col))
    }

    /// Store a value; storing Empty clears the cell
    pub fn set(&mut self, row: u32, col: u16, value: CellValue) {
        if value.is_empty() {
            if let Some(cols) = self.rows.get_mut(&row) {
                cols.remove(&col);
                if cols.is_empty() {
                    self.rows.remove(&row);
                }
            }
            return;
        }
        self.rows.entry(row).or_default().insert(col, value);
    }

    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.hidden_rows.contains(&row)
    }

    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) {
        if hidden {
            self.hidden_rows.insert(row);
        } else {
            self.hidden_rows.remove(&row);
        }
    }

    pub fn cell_count(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }
}

/// What a defined name refers to
#[derive(Debug, Clone, PartialEq)]
enum NameTarget {
    Range(RangeAddress),
    Value(CellValue),
}

#[derive(Debug, Clone, PartialEq)]
struct DefinedName {
    name: String,
    target: NameTarget,
}

/// In-memory workbook
#[derive(Debug, Default)]
pub struct MemoryDataProvider {
    /// Keyed by upper-cased sheet name
    sheets: BTreeMap<String, Rc<MemorySheet>>,
    deleted_sheets: BTreeSet<String>,
    /// Keyed by (upper-cased sheet for sheet-local names, upper-cased name)
    names: BTreeMap<(Option<String>, String), DefinedName>,
    tables: BTreeMap<String, TableInfo>,
}

fn key(name: &str) -> String {
    name.to_uppercase()
}

impl MemoryDataProvider {
    /// Create an empty workbook
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty sheet, keeping an existing one
    pub fn add_sheet(&mut self, name: &str) -> &mut Self {
        self.deleted_sheets.remove(&key(name));
        self.sheets
            .entry(key(name))
            .or_insert_with(|| Rc::new(MemorySheet::new(name)));
        self
    }

    pub fn sheet(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets.get(&key(name)).map(Rc::as_ref)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.values().map(|sheet| sheet.name())
    }

    fn sheet_mut(&mut self, name: &str) -> &mut MemorySheet {
        self.deleted_sheets.remove(&key(name));
        let sheet = self
            .sheets
            .entry(key(name))
            .or_insert_with(|| Rc::new(MemorySheet::new(name)));
        Rc::make_mut(sheet)
    }

    /// Set a cell by 0-based position, creating the sheet if needed
    pub fn set_cell(&mut self, sheet: &str, row: u32, col: u16, value: impl Into<CellValue>) {
        self.sheet_mut(sheet).set(row, col, value.into());
    }

    /// Set a cell by A1 address
    pub fn set_value(
        &mut self,
        sheet: &str,
        address: &str,
        value: impl Into<CellValue>,
    ) -> FormulaResult<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell(sheet, addr.row, addr.col, value);
        Ok(())
    }

    /// Hide or show a 0-based row
    pub fn set_row_hidden(&mut self, sheet: &str, row: u32, hidden: bool) {
        self.sheet_mut(sheet).set_row_hidden(row, hidden);
    }

    /// Remove a sheet; addresses on it resolve to `#REF!` from now on
    pub fn delete_sheet(&mut self, name: &str) -> bool {
        let removed = self.sheets.remove(&key(name)).is_some();
        if removed {
            self.deleted_sheets.insert(key(name));
        }
        removed
    }

    /// Define a name bound to a range such as `Sheet1!$A$1:$A$3`
    ///
    /// `scope` makes the name local to that sheet.
    pub fn define_name(
        &mut self,
        scope: Option<&str>,
        name: &str,
        refers_to: &str,
    ) -> FormulaResult<()> {
        let address = RangeAddress::parse(refers_to)?;
        self.insert_name(scope, name, NameTarget::Range(address));
        Ok(())
    }

    /// Define a name bound to a constant
    pub fn define_name_value(
        &mut self,
        scope: Option<&str>,
        name: &str,
        value: impl Into<CellValue>,
    ) {
        self.insert_name(scope, name, NameTarget::Value(value.into()));
    }

    fn insert_name(&mut self, scope: Option<&str>, name: &str, target: NameTarget) {
        self.names.insert(
            (scope.map(key), key(name)),
            DefinedName {
                name: name.to_string(),
                target,
            },
        );
    }

    /// Register a table covering `address` on `sheet`
    pub fn add_table(&mut self, name: &str, sheet: &str, address: &str) -> FormulaResult<()> {
        let parsed = RangeAddress::parse(address)?;
        let worksheet = parsed.worksheet_or(sheet).to_string();
        let address = RangeAddress::new(Some(worksheet.clone()), parsed.range);
        self.tables.insert(
            key(name),
            TableInfo {
                name: name.to_string(),
                worksheet,
                address,
            },
        );
        Ok(())
    }
}

impl ExcelDataProvider for MemoryDataProvider {
    fn get_range_at(&self, worksheet: &str, address: &RangeAddress) -> FormulaResult<RangeHandle> {
        let sheet_name = address.worksheet_or(worksheet);
        let sheet_key = key(sheet_name);

        if self.deleted_sheets.contains(&sheet_key) {
            log::debug!("{} points at deleted sheet {}", address, sheet_name);
            let address = RangeAddress::new(Some(sheet_name.to_string()), address.range);
            return Ok(Rc::new(MemoryRange::dangling(address)));
        }

        // A sheet that was never populated reads as empty
        let sheet = self
            .sheets
            .get(&sheet_key)
            .cloned()
            .unwrap_or_else(|| Rc::new(MemorySheet::new(sheet_name)));
        let address = RangeAddress::new(Some(sheet.name().to_string()), address.range);
        Ok(Rc::new(MemoryRange::new(sheet, address)))
    }

    fn get_name(&self, worksheet: &str, name: &str) -> Option<NameInfo> {
        let local = (Some(key(worksheet)), key(name));
        let global = (None, key(name));
        let defined = self.names.get(&local).or_else(|| self.names.get(&global))?;

        let value = match &defined.target {
            NameTarget::Value(v) => NameValue::Value(v.clone()),
            NameTarget::Range(address) => match self.get_range_at(worksheet, address) {
                Ok(range) => NameValue::Range(range),
                Err(e) => NameValue::Value(CellValue::Error(e.to_cell_error())),
            },
        };
        Some(NameInfo {
            name: defined.name.clone(),
            value,
        })
    }

    fn get_excel_table(&self, name: &str) -> Option<TableInfo> {
        self.tables.get(&key(name)).cloned()
    }

    fn get_format(&self, value: f64, format: &str) -> String {
        format_value(value, format)
    }
}

/// A range over a [`MemorySheet`] snapshot
#[derive(Debug)]
pub struct MemoryRange {
    sheet: Option<Rc<MemorySheet>>,
    address: RangeAddress,
}

impl MemoryRange {
    fn new(sheet: Rc<MemorySheet>, address: RangeAddress) -> Self {
        Self {
            sheet: Some(sheet),
            address,
        }
    }

    fn dangling(address: RangeAddress) -> Self {
        Self {
            sheet: None,
            address,
        }
    }
}

impl RangeInfo for MemoryRange {
    fn is_ref_error(&self) -> bool {
        self.sheet.is_none()
    }

    fn is_empty(&self) -> bool {
        self.cells().next().is_none()
    }

    fn address(&self) -> &RangeAddress {
        &self.address
    }

    fn cells(&self) -> Box<dyn Iterator<Item = CellInfo> + '_> {
        let Some(sheet) = &self.sheet else {
            return Box::new(std::iter::empty());
        };
        let range = self.address.range;
        Box::new(
            sheet
                .rows
                .range(range.start.row..=range.end.row)
                .flat_map(move |(row, cols)| {
                    let hidden = sheet.is_row_hidden(*row);
                    cols.range(range.start.col..=range.end.col)
                        .map(move |(col, value)| CellInfo {
                            row: *row,
                            col: *col,
                            value: value.clone(),
                            is_hidden_row: hidden,
                        })
                }),
        )
    }

    fn cell_at(&self, row_offset: u32, col_offset: u16) -> CellInfo {
        let row = self.address.range.start.row.saturating_add(row_offset);
        let col = self.address.range.start.col.saturating_add(col_offset);
        match &self.sheet {
            Some(sheet) => CellInfo {
                row,
                col,
                value: sheet.get(row, col).cloned().unwrap_or_default(),
                is_hidden_row: sheet.is_row_hidden(row),
            },
            None => CellInfo {
                row,
                col,
                value: CellValue::Error(gridcalc_core::CellError::Ref),
                is_hidden_row: false,
            },
        }
    }
}

/// Render a number with a simple number format
///
/// Supports `0`, `0.00`, `#,##0`, `#,##0.00` style patterns, a trailing `%`
/// and `@`. Anything else falls back to the general format.
pub fn format_value(value: f64, format: &str) -> String {
    let format = format.trim();
    let (pattern, percent) = match format.strip_suffix('%') {
        Some(p) => (p, true),
        None => (format, false),
    };
    let is_pattern = !pattern.is_empty()
        && pattern.chars().all(|c| matches!(c, '0' | '#' | ',' | '.'))
        && pattern.contains('0');
    if !is_pattern {
        return format_number(value);
    }

    let value = if percent { value * 100.0 } else { value };
    let decimals = pattern
        .split_once('.')
        .map_or(0, |(_, frac)| frac.chars().filter(|c| *c == '0' || *c == '#').count());
    let grouping = pattern.contains(',');

    let factor = 10_f64.powi(decimals as i32);
    let rounded = (value.abs() * factor).round() / factor;
    let text = format!("{:.*}", decimals, rounded);
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text, None),
    };
    let int_part = if grouping { group_thousands(&int_part) } else { int_part };

    let mut result = String::new();
    if value < 0.0 && rounded != 0.0 {
        result.push('-');
    }
    result.push_str(&int_part);
    if let Some(frac) = frac_part {
        result.push('.');
        result.push_str(&frac);
    }
    if percent {
        result.push('%');
    }
    result
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::{CellError, CellRange};
    use pretty_assertions::assert_eq;

    fn range(provider: &MemoryDataProvider, address: &str) -> RangeHandle {
        provider
            .get_range_at("Sheet1", &RangeAddress::parse(address).unwrap())
            .unwrap()
    }

    #[test]
    fn test_cells_enumerate_populated_only() {
        let mut provider = MemoryDataProvider::new();
        provider.set_value("Sheet1", "A1", 1.0).unwrap();
        provider.set_value("Sheet1", "A3", "x").unwrap();
        provider.set_value("Sheet1", "B1", 5.0).unwrap();

        let column = range(&provider, "A:A");
        let values: Vec<_> = column.cells().map(|c| c.value).collect();
        assert_eq!(values, vec![CellValue::Number(1.0), CellValue::string("x")]);
        assert!(column.is_multi());
        assert!(!column.is_empty());
    }

    #[test]
    fn test_single_cell_and_empty_cell() {
        let mut provider = MemoryDataProvider::new();
        provider.set_value("Sheet1", "B2", true).unwrap();
        let b2 = range(&provider, "B2");
        assert!(!b2.is_multi());
        assert_eq!(b2.first().unwrap().value, CellValue::Boolean(true));

        let c3 = range(&provider, "C3");
        assert!(c3.is_empty());
        assert_eq!(c3.first().unwrap().value, CellValue::Empty);
    }

    #[test]
    fn test_hidden_rows_reported() {
        let mut provider = MemoryDataProvider::new();
        provider.set_value("Sheet1", "A1", 1.0).unwrap();
        provider.set_value("Sheet1", "A2", 2.0).unwrap();
        provider.set_row_hidden("Sheet1", 1, true);

        let hidden: Vec<_> = range(&provider, "A1:A2").cells().map(|c| c.is_hidden_row).collect();
        assert_eq!(hidden, vec![false, true]);
    }

    #[test]
    fn test_deleted_sheet_is_ref_error() {
        let mut provider = MemoryDataProvider::new();
        provider.set_value("Data", "A1", 1.0).unwrap();
        assert!(provider.delete_sheet("data"));

        let dangling = range(&provider, "Data!A1");
        assert!(dangling.is_ref_error());
        assert_eq!(dangling.first(), None);
    }

    #[test]
    fn test_qualified_address_uses_sheet_name() {
        let mut provider = MemoryDataProvider::new();
        provider.add_sheet("My Sheet");
        let r = range(&provider, "'my sheet'!A1:B2");
        assert_eq!(r.address().to_string(), "'My Sheet'!A1:B2");
    }

    #[test]
    fn test_sheet_local_name_wins() {
        let mut provider = MemoryDataProvider::new();
        provider.define_name_value(None, "Rate", 0.1);
        provider.define_name_value(Some("Sheet2"), "Rate", 0.2);

        let global = provider.get_name("Sheet1", "rate").unwrap();
        assert!(matches!(global.value, NameValue::Value(CellValue::Number(n)) if n == 0.1));
        let local = provider.get_name("Sheet2", "RATE").unwrap();
        assert!(matches!(local.value, NameValue::Value(CellValue::Number(n)) if n == 0.2));
        assert!(provider.get_name("Sheet1", "missing").is_none());
    }

    #[test]
    fn test_name_bound_to_range() {
        let mut provider = MemoryDataProvider::new();
        provider.define_name(None, "Items", "Sheet1!$A$1:$A$3").unwrap();
        let info = provider.get_name("Sheet1", "Items").unwrap();
        match info.value {
            NameValue::Range(r) => assert_eq!(r.address().range, CellRange::parse("A1:A3").unwrap()),
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn test_tables() {
        let mut provider = MemoryDataProvider::new();
        provider.add_table("Sales", "Data", "A1:C10").unwrap();
        let table = provider.get_excel_table("sales").unwrap();
        assert_eq!(table.worksheet, "Data");
        assert_eq!(table.address.to_string(), "Data!A1:C10");
    }

    #[test]
    fn test_cell_at_on_deleted_sheet() {
        let r = MemoryRange::dangling(RangeAddress::parse("Gone!A1").unwrap());
        assert_eq!(r.value_at(0, 0), CellValue::Error(CellError::Ref));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1234.5, "#,##0"), "1,235");
        assert_eq!(format_value(1234.567, "#,##0.00"), "1,234.57");
        assert_eq!(format_value(3.14159, "0.00"), "3.14");
        assert_eq!(format_value(2.5, "0"), "3");
        assert_eq!(format_value(0.256, "0%"), "26%");
        assert_eq!(format_value(-1234567.0, "#,##0"), "-1,234,567");
        assert_eq!(format_value(42.0, "@"), "42");
        assert_eq!(format_value(1.5, "General"), "1.5");
    }
}
