//! Lookup and reference functions

use super::helpers::{arg_to_bool, arg_to_int, arg_to_string};
use super::{FunctionCompilerKind, FunctionDef, FunctionRepository};
use crate::compile_result::{CompileResult, ResultValue};
use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::{CellAddress, CellError, CellRange, RangeAddress};

pub(super) fn register(repository: &mut FunctionRepository) {
    let lookup = FunctionCompilerKind::Lookup;
    repository.register(FunctionDef::new("OFFSET", 3, Some(5), fn_offset).with_compiler(lookup));
    repository.register(FunctionDef::new("ROW", 0, Some(1), fn_row).with_compiler(lookup));
    repository.register(FunctionDef::new("COLUMN", 0, Some(1), fn_column).with_compiler(lookup));
    repository.register(FunctionDef::new("ROWS", 1, Some(1), fn_rows).with_compiler(lookup));
    repository.register(FunctionDef::new("COLUMNS", 1, Some(1), fn_columns).with_compiler(lookup));
    repository.register(FunctionDef::new("INDEX", 2, Some(3), fn_index).with_compiler(lookup));
    repository.register(FunctionDef::new("ADDRESS", 2, Some(5), fn_address));
}

/// Resolve `range` on `worksheet` as a reference result
///
/// The resolved address is recorded in the evaluation's address cache.
pub(crate) fn reference_result(
    ctx: &ParsingContext,
    worksheet: &str,
    range: CellRange,
) -> CompileResult {
    let address = RangeAddress::new(Some(worksheet.to_string()), range);
    match ctx.provider.get_range_at(worksheet, &address) {
        Ok(handle) if handle.is_ref_error() => CompileResult::error(CellError::Ref),
        Ok(handle) => {
            let id = ctx.register_address(&handle.address().to_string());
            CompileResult::reference(handle).with_address_reference(id)
        }
        Err(e) => {
            log::debug!("reference {} did not resolve: {}", address, e);
            CompileResult::error(e.to_cell_error())
        }
    }
}

/// Range and worksheet of a reference argument
fn reference_arg<'a>(
    arg: Option<&'a CompileResult>,
    ctx: &'a ParsingContext,
) -> FormulaResult<(&'a str, CellRange)> {
    match arg.map(|a| &a.value) {
        Some(ResultValue::Range(range)) if range.is_ref_error() => {
            Err(FormulaError::Excel(CellError::Ref))
        }
        Some(ResultValue::Range(range)) => {
            let address = range.address();
            Ok((address.worksheet_or(&ctx.scope.worksheet), address.range))
        }
        _ => Err(FormulaError::Excel(CellError::Value)),
    }
}

fn int_arg(args: &[CompileResult], index: usize, default: i64) -> FormulaResult<i64> {
    match args.get(index) {
        Some(arg) if !arg.is_empty() => arg_to_int(arg),
        _ => Ok(default),
    }
}

/// OFFSET(reference, rows, cols, [height], [width])
pub fn fn_offset(args: &[CompileResult], ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let (worksheet, base) = reference_arg(args.first(), ctx)?;
    let rows = int_arg(args, 1, 0)?;
    let cols = int_arg(args, 2, 0)?;
    let height = int_arg(args, 3, base.row_count() as i64)?;
    let width = int_arg(args, 4, base.col_count() as i64)?;

    match base.offset(rows, cols, height, width) {
        Ok(range) => Ok(reference_result(ctx, worksheet, range)),
        Err(e) => {
            log::debug!("OFFSET out of the grid: {}", e);
            Ok(CompileResult::error(CellError::Ref))
        }
    }
}

/// ROW([reference]), 1-based
pub fn fn_row(args: &[CompileResult], ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    if args.is_empty() {
        return Ok(CompileResult::integer(ctx.scope.row as f64 + 1.0));
    }
    let (_, range) = reference_arg(args.first(), ctx)?;
    Ok(CompileResult::integer(range.start.row as f64 + 1.0))
}

/// COLUMN([reference]), 1-based
pub fn fn_column(args: &[CompileResult], ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    if args.is_empty() {
        return Ok(CompileResult::integer(ctx.scope.column as f64 + 1.0));
    }
    let (_, range) = reference_arg(args.first(), ctx)?;
    Ok(CompileResult::integer(range.start.col as f64 + 1.0))
}

/// Rows and columns of a range, array or scalar argument
fn dimensions(arg: Option<&CompileResult>) -> FormulaResult<(u64, u64)> {
    match arg.map(|a| &a.value) {
        Some(ResultValue::Range(range)) if range.is_ref_error() => {
            Err(FormulaError::Excel(CellError::Ref))
        }
        Some(ResultValue::Range(range)) => {
            let r = range.address().range;
            Ok((r.row_count() as u64, r.col_count() as u64))
        }
        Some(ResultValue::Array(rows)) => Ok((
            rows.len() as u64,
            rows.first().map_or(0, |row| row.len() as u64),
        )),
        Some(ResultValue::Error(e)) => Err(FormulaError::Excel(*e)),
        Some(_) => Ok((1, 1)),
        None => Err(FormulaError::Excel(CellError::Value)),
    }
}

/// ROWS(array)
pub fn fn_rows(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let (rows, _) = dimensions(args.first())?;
    Ok(CompileResult::integer(rows as f64))
}

/// COLUMNS(array)
pub fn fn_columns(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let (_, cols) = dimensions(args.first())?;
    Ok(CompileResult::integer(cols as f64))
}

/// INDEX(array, row_num, [column_num])
///
/// A zero index selects the whole row or column. With a single-row source
/// and one index, the index picks the column.
pub fn fn_index(args: &[CompileResult], ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let (height, width) = dimensions(args.first())?;
    let mut row = int_arg(args, 1, 0)?;
    let mut col = int_arg(args, 2, 0)?;
    if args.len() == 2 {
        if height == 1 {
            col = row;
            row = 0;
        } else if width == 1 {
            col = 1;
        }
    }
    if row < 0 || col < 0 {
        return Ok(CompileResult::error(CellError::Value));
    }
    let (row, col) = (row as u64, col as u64);
    if row > height || col > width {
        return Ok(CompileResult::error(CellError::Ref));
    }

    let Some(source) = args.first() else {
        return Err(FormulaError::Excel(CellError::Value));
    };
    match &source.value {
        ResultValue::Range(_) => {
            let (worksheet, base) = reference_arg(Some(source), ctx)?;
            let (start_row, end_row) = match row {
                0 => (base.start.row, base.end.row),
                r => {
                    let r = base.start.row + r as u32 - 1;
                    (r, r)
                }
            };
            let (start_col, end_col) = match col {
                0 => (base.start.col, base.end.col),
                c => {
                    let c = base.start.col + c as u16 - 1;
                    (c, c)
                }
            };
            let range = CellRange::from_indices(start_row, start_col, end_row, end_col);
            Ok(reference_result(ctx, worksheet, range))
        }
        ResultValue::Array(rows) => Ok(index_array(rows, row as usize, col as usize)),
        _ => Ok(source.clone()),
    }
}

fn index_array(rows: &[Vec<CompileResult>], row: usize, col: usize) -> CompileResult {
    match (row, col) {
        (0, 0) => CompileResult::array(rows.to_vec()),
        (0, c) => CompileResult::array(
            rows.iter()
                .map(|r| r.get(c - 1).cloned().into_iter().collect())
                .collect(),
        ),
        (r, 0) => CompileResult::array(rows.get(r - 1).cloned().into_iter().collect()),
        (r, c) => rows
            .get(r - 1)
            .and_then(|values| values.get(c - 1))
            .cloned()
            .unwrap_or(CompileResult::error(CellError::Ref)),
    }
}

/// ADDRESS(row_num, column_num, [abs_num], [a1], [sheet_text])
pub fn fn_address(args: &[CompileResult], ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let row = int_arg(args, 0, 0)?;
    let col = int_arg(args, 1, 0)?;
    let abs_num = int_arg(args, 2, 1)?;
    let a1 = match args.get(3) {
        Some(arg) if !arg.is_empty() => arg_to_bool(arg)?,
        _ => true,
    };
    let sheet = match args.get(4) {
        Some(arg) if !arg.is_empty() => Some(arg_to_string(arg)?),
        _ => None,
    };

    let max_rows = ctx.provider.excel_max_rows() as i64;
    let max_cols = ctx.provider.excel_max_columns() as i64;
    if row < 1 || col < 1 || row > max_rows || col > max_cols || !(1..=4).contains(&abs_num) {
        return Ok(CompileResult::error(CellError::Value));
    }
    let row_absolute = abs_num == 1 || abs_num == 2;
    let col_absolute = abs_num == 1 || abs_num == 3;

    let cell = if a1 {
        let address = CellAddress {
            row: row as u32 - 1,
            col: col as u16 - 1,
            row_absolute,
            col_absolute,
        };
        RangeAddress::new(sheet, CellRange::single(address)).to_qualified_string()
    } else {
        let part = |prefix: char, n: i64, absolute: bool| {
            if absolute {
                format!("{}{}", prefix, n)
            } else {
                format!("{}[{}]", prefix, n)
            }
        };
        let r1c1 = format!("{}{}", part('R', row, row_absolute), part('C', col, col_absolute));
        match sheet {
            Some(sheet) => format!("{}!{}", sheet, r1c1),
            None => r1c1,
        }
    };
    Ok(CompileResult::string(cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::with_test_context;
    use pretty_assertions::assert_eq;

    fn n(value: f64) -> CompileResult {
        CompileResult::integer(value)
    }

    fn range(ctx: &ParsingContext, a1: &str) -> CompileResult {
        reference_result(ctx, "Sheet1", CellRange::parse(a1).unwrap())
    }

    #[test]
    fn test_offset() {
        with_test_context(|ctx| {
            let base = range(ctx, "A1");
            let result = fn_offset(&[base.clone(), n(1.0), n(2.0)], ctx).unwrap();
            assert_eq!(result.as_range().unwrap().address().to_string(), "Sheet1!C2");

            let sized = fn_offset(&[base.clone(), n(0.0), n(0.0), n(2.0), n(3.0)], ctx).unwrap();
            assert_eq!(sized.as_range().unwrap().address().to_string(), "Sheet1!A1:C2");

            assert_eq!(
                fn_offset(&[base, n(-1.0), n(0.0)], ctx).unwrap(),
                CompileResult::error(CellError::Ref)
            );
        });
    }

    #[test]
    fn test_offset_huge_arguments_are_ref() {
        with_test_context(|ctx| {
            let base = range(ctx, "A1");
            let huge = n(9e18);
            assert_eq!(
                fn_offset(&[base.clone(), huge.clone(), n(0.0), huge.clone(), n(1.0)], ctx).unwrap(),
                CompileResult::error(CellError::Ref)
            );
            assert_eq!(
                fn_offset(&[base, n(0.0), huge.clone(), n(1.0), huge], ctx).unwrap(),
                CompileResult::error(CellError::Ref)
            );
        });
    }

    #[test]
    fn test_offset_needs_reference() {
        with_test_context(|ctx| {
            assert_eq!(
                fn_offset(&[n(1.0), n(1.0), n(1.0)], ctx),
                Err(FormulaError::Excel(CellError::Value))
            );
        });
    }

    #[test]
    fn test_row_and_column() {
        with_test_context(|ctx| {
            assert_eq!(fn_row(&[range(ctx, "C5:D9")], ctx).unwrap(), n(5.0));
            assert_eq!(fn_column(&[range(ctx, "C5:D9")], ctx).unwrap(), n(3.0));
            assert_eq!(fn_row(&[], ctx).unwrap(), n(1.0));
            assert_eq!(fn_rows(&[range(ctx, "C5:D9")], ctx).unwrap(), n(5.0));
            assert_eq!(fn_columns(&[range(ctx, "C5:D9")], ctx).unwrap(), n(2.0));
        });
    }

    #[test]
    fn test_index_range() {
        with_test_context(|ctx| {
            let result = fn_index(&[range(ctx, "B2:D4"), n(2.0), n(3.0)], ctx).unwrap();
            assert_eq!(result.as_range().unwrap().address().to_string(), "Sheet1!D3");

            let row = fn_index(&[range(ctx, "B2:D2"), n(2.0)], ctx).unwrap();
            assert_eq!(row.as_range().unwrap().address().to_string(), "Sheet1!C2");

            assert_eq!(
                fn_index(&[range(ctx, "B2:D4"), n(4.0), n(1.0)], ctx).unwrap(),
                CompileResult::error(CellError::Ref)
            );
        });
    }

    #[test]
    fn test_index_array() {
        with_test_context(|ctx| {
            let array = CompileResult::array(vec![vec![n(1.0), n(2.0)], vec![n(3.0), n(4.0)]]);
            assert_eq!(fn_index(&[array, n(2.0), n(1.0)], ctx).unwrap(), n(3.0));
        });
    }

    #[test]
    fn test_address() {
        with_test_context(|ctx| {
            let s = |args: &[CompileResult]| fn_address(args, ctx).unwrap().to_text();
            assert_eq!(s(&[n(2.0), n(3.0)]), "$C$2");
            assert_eq!(s(&[n(2.0), n(3.0), n(4.0)]), "C2");
            assert_eq!(s(&[n(2.0), n(3.0), n(2.0)]), "C$2");
            assert_eq!(
                s(&[n(2.0), n(3.0), n(1.0), CompileResult::boolean(false)]),
                "R2C3"
            );
            assert_eq!(
                s(&[n(1.0), n(1.0), n(1.0), CompileResult::boolean(true), CompileResult::string("My Sheet")]),
                "'My Sheet'!$A$1"
            );
            assert_eq!(s(&[n(0.0), n(1.0)]), "#VALUE!");
        });
    }
}
