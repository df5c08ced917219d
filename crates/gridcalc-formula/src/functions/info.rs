//! Information functions
//!
//! These are compiled with [`FunctionCompilerKind::ErrorHandling`], so an
//! error argument reaches the function instead of short-circuiting the call.

use super::{FunctionCompilerKind, FunctionDef, FunctionImpl, FunctionRepository};
use crate::compile_result::{CompileResult, DataType};
use crate::context::ParsingContext;
use crate::error::FormulaResult;
use gridcalc_core::CellError;

pub(super) fn register(repository: &mut FunctionRepository) {
    let checks: [(&'static str, FunctionImpl); 6] = [
        ("ISERROR", fn_iserror),
        ("ISERR", fn_iserr),
        ("ISNA", fn_isna),
        ("ISNUMBER", fn_isnumber),
        ("ISTEXT", fn_istext),
        ("ISBLANK", fn_isblank),
    ];
    for (name, implementation) in checks {
        repository.register(
            FunctionDef::new(name, 1, Some(1), implementation)
                .with_compiler(FunctionCompilerKind::ErrorHandling),
        );
    }
    repository.register(FunctionDef::new("NA", 0, Some(0), fn_na));
}

fn is_number(value: &CompileResult) -> bool {
    matches!(
        value.data_type,
        DataType::Integer | DataType::Decimal | DataType::Date | DataType::Time
    )
}

fn check(args: &[CompileResult], predicate: impl Fn(&CompileResult) -> bool) -> CompileResult {
    let value = args.first().map(CompileResult::scalar);
    CompileResult::boolean(value.map_or(false, |v| predicate(&v)))
}

/// ISERROR(value)
pub fn fn_iserror(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(check(args, CompileResult::is_error))
}

/// ISERR(value), any error except `#N/A`
pub fn fn_iserr(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(check(args, |v| {
        v.is_error() && v.error_value() != Some(CellError::Na)
    }))
}

/// ISNA(value)
pub fn fn_isna(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(check(args, |v| v.error_value() == Some(CellError::Na)))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(check(args, is_number))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(check(args, |v| v.data_type == DataType::String))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(check(args, CompileResult::is_empty))
}

/// NA()
pub fn fn_na(_args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::error(CellError::Na))
}
