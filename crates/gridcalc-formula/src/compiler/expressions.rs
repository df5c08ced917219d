//! Compilation of address, name, array and range-combination nodes

use super::ExpressionCompiler;
use crate::compile_result::CompileResult;
use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expression::{AddressExpression, ExprId, ExpressionGraph, ExpressionKind};
use crate::functions::lookup::reference_result;
use crate::provider::{NameValue, RangeHandle};
use gridcalc_core::CellError;

impl ExpressionCompiler {
    pub(super) fn compile_address(
        address: &AddressExpression,
        negate: bool,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        if address.has_circular_reference {
            if ctx.config.allow_circular_references {
                log::debug!("circular reference to {} compiled as empty", address.address);
                return Ok(CompileResult::EMPTY);
            }
            return Err(FormulaError::CircularReference(address.address.clone()));
        }

        let scope = &ctx.scope;
        let range = match ctx
            .provider
            .get_range(&scope.worksheet, scope.row, scope.column, &address.address)
        {
            Ok(range) => range,
            Err(e) => {
                log::debug!("address {} did not resolve: {}", address.address, e);
                return Ok(CompileResult::error(e.to_cell_error()));
            }
        };
        Ok(range_result(range, address.resolve_as_range, negate, ctx))
    }

    pub(super) fn compile_named_value(
        name: &str,
        resolve_as_range: bool,
        negate: bool,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let (worksheet, name) = match name.rsplit_once('!') {
            Some((sheet, name)) => (unquote_sheet(sheet), name),
            None => (ctx.scope.worksheet.clone(), name),
        };

        if let Some(info) = ctx.provider.get_name(&worksheet, name) {
            return Ok(match info.value {
                NameValue::Range(range) => range_result(range, resolve_as_range, negate, ctx),
                NameValue::Value(value) => negate_numeric(CompileResult::from(value), negate),
            });
        }

        if let Some(table) = ctx.provider.get_excel_table(name) {
            return Ok(match ctx.provider.get_range_at(&table.worksheet, &table.address) {
                Ok(range) => range_result(range, true, negate, ctx),
                Err(e) => CompileResult::error(e.to_cell_error()),
            });
        }

        log::debug!("name {} is not defined", name);
        Ok(CompileResult::error(CellError::Name))
    }

    /// Compile each element of an array constant on its own
    pub(super) fn compile_enumerable(
        graph: &mut ExpressionGraph,
        id: ExprId,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let node = graph.node(id);
        let children = node.children.clone();
        let row_breaks = match &node.kind {
            ExpressionKind::Enumerable { row_breaks } => row_breaks.clone(),
            _ => Vec::new(),
        };

        let mut rows = vec![Vec::new()];
        for (i, child) in children.into_iter().enumerate() {
            if i > 0 && row_breaks.contains(&i) {
                rows.push(Vec::new());
            }
            let value = Self::compile(graph, &[child], ctx)?;
            if let Some(row) = rows.last_mut() {
                row.push(value);
            }
        }
        Ok(CompileResult::array(rows))
    }

    /// `OFFSET(...):A1` style operands, combined into their bounding range
    pub(super) fn compile_range_combination(
        graph: &mut ExpressionGraph,
        id: ExprId,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let (first, second) = match *graph.kind(id) {
            ExpressionKind::RangeOffset { start, end } => (start, end),
            ExpressionKind::Colon { left, right } => {
                if !is_range_operand(graph.kind(left)) || !is_range_operand(graph.kind(right)) {
                    return Ok(CompileResult::error(CellError::Value));
                }
                (left, right)
            }
            _ => return Ok(CompileResult::error(CellError::Value)),
        };

        let start = Self::compile_range_operand(graph, first, ctx)?;
        if start.is_error() {
            return Ok(start);
        }
        let end = Self::compile_range_operand(graph, second, ctx)?;
        if end.is_error() {
            return Ok(end);
        }

        match (start.as_range(), end.as_range()) {
            (Some(a), Some(b)) => Ok(combine_ranges(a, b, ctx)),
            _ => Ok(CompileResult::error(CellError::Value)),
        }
    }

    fn compile_range_operand(
        graph: &mut ExpressionGraph,
        id: ExprId,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        graph.resolve_as_range(id);
        Self::compile_node(graph, id, ctx)
    }
}

fn is_range_operand(kind: &ExpressionKind) -> bool {
    matches!(kind, ExpressionKind::ExcelAddress(_)) || kind.is_offset_function()
}

/// Bounding range of `a` and `b`, both must be on the same sheet
fn combine_ranges(a: &RangeHandle, b: &RangeHandle, ctx: &ParsingContext) -> CompileResult {
    let sheet_a = a.address().worksheet_or(&ctx.scope.worksheet);
    let sheet_b = b.address().worksheet_or(&ctx.scope.worksheet);
    if !sheet_a.eq_ignore_ascii_case(sheet_b) {
        log::debug!("cannot join ranges on {} and {}", sheet_a, sheet_b);
        return CompileResult::error(CellError::Value);
    }

    let union = a.address().range.union(&b.address().range);
    reference_result(ctx, sheet_a, union)
}

/// Classify a resolved range: multi-cell or forced stays a range, else unwraps
fn range_result(
    range: RangeHandle,
    resolve_as_range: bool,
    negate: bool,
    ctx: &ParsingContext,
) -> CompileResult {
    if range.is_ref_error() {
        return CompileResult::error(CellError::Ref);
    }
    let id = ctx.register_address(&range.address().to_string());

    if range.is_multi() || resolve_as_range {
        let result = CompileResult::range(range).with_address_reference(id);
        return if negate { result.negated() } else { result };
    }

    let result = match range.first() {
        Some(cell) => CompileResult::from_cell(&cell),
        None => CompileResult::EMPTY,
    };
    negate_numeric(result, negate).with_address_reference(id)
}

fn negate_numeric(result: CompileResult, negate: bool) -> CompileResult {
    if negate && result.is_numeric() {
        result.negated()
    } else {
        result
    }
}

fn unquote_sheet(sheet: &str) -> String {
    match sheet.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => sheet.to_string(),
    }
}
