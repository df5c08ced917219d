//! Logical functions

use super::helpers::{arg_to_bool, flatten_arguments};
use super::{FunctionCompilerKind, FunctionDef, FunctionRepository};
use crate::compile_result::{CompileResult, ResultValue};
use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::CellError;

pub(super) fn register(repository: &mut FunctionRepository) {
    repository.register(
        FunctionDef::new("IF", 1, Some(3), fn_if).with_compiler(FunctionCompilerKind::If),
    );
    repository.register(FunctionDef::new("AND", 1, None, fn_and));
    repository.register(FunctionDef::new("OR", 1, None, fn_or));
    repository.register(FunctionDef::new("NOT", 1, Some(1), fn_not));
    repository.register(
        FunctionDef::new("IFERROR", 2, Some(2), fn_iferror)
            .with_compiler(FunctionCompilerKind::IfError),
    );
    repository.register(
        FunctionDef::new("IFNA", 2, Some(2), fn_ifna).with_compiler(FunctionCompilerKind::IfError),
    );
    repository.register(FunctionDef::new("TRUE", 0, Some(0), fn_true));
    repository.register(FunctionDef::new("FALSE", 0, Some(0), fn_false));
}

/// IF(condition, [value_if_true], [value_if_false])
///
/// Only the selected branch has been compiled; the other slot holds Empty.
pub fn fn_if(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let condition = match args.first() {
        Some(arg) => arg_to_bool(arg)?,
        None => return Err(FormulaError::Excel(CellError::Value)),
    };
    let branch = if condition { 1 } else { 2 };
    Ok(match args.get(branch) {
        // Omitted branch argument: `IF(FALSE, 1)`
        None => CompileResult::boolean(condition),
        Some(value) if value.is_empty() => CompileResult::ZERO_INT,
        Some(value) => value.clone(),
    })
}

/// AND function
pub fn fn_and(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let values = logical_values(args)?;
    Ok(CompileResult::boolean(values.iter().all(|b| *b)))
}

/// OR function
pub fn fn_or(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let values = logical_values(args)?;
    Ok(CompileResult::boolean(values.iter().any(|b| *b)))
}

/// NOT function
pub fn fn_not(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    match args.first() {
        Some(arg) => Ok(CompileResult::boolean(!arg_to_bool(arg)?)),
        None => Err(FormulaError::Excel(CellError::Value)),
    }
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let value = args.first().map(CompileResult::scalar).unwrap_or(CompileResult::EMPTY);
    if value.is_error() {
        return Ok(fallback(args.get(1)));
    }
    Ok(args.first().cloned().unwrap_or(CompileResult::EMPTY))
}

/// IFNA(value, value_if_na)
pub fn fn_ifna(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let value = args.first().map(CompileResult::scalar).unwrap_or(CompileResult::EMPTY);
    if value.error_value() == Some(CellError::Na) {
        return Ok(fallback(args.get(1)));
    }
    Ok(args.first().cloned().unwrap_or(CompileResult::EMPTY))
}

/// TRUE function
pub fn fn_true(_args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::boolean(true))
}

/// FALSE function
pub fn fn_false(_args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::boolean(false))
}

fn fallback(value: Option<&CompileResult>) -> CompileResult {
    match value {
        Some(v) if !v.is_empty() => v.clone(),
        _ => CompileResult::ZERO_INT,
    }
}

/// Logical values of the arguments; referenced text and blanks are skipped
fn logical_values(args: &[CompileResult]) -> FormulaResult<Vec<bool>> {
    let mut values = Vec::new();
    for arg in flatten_arguments(args) {
        match &arg.value.value {
            ResultValue::Error(e) => return Err(FormulaError::Excel(*e)),
            ResultValue::Empty => {}
            ResultValue::Text(_) if arg.from_reference => {}
            _ => values.push(arg_to_bool(&arg.value)?),
        }
    }
    if values.is_empty() {
        return Err(FormulaError::Excel(CellError::Value));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::with_test_context;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_if_branches() {
        with_test_context(|ctx| {
            let args = [
                CompileResult::boolean(true),
                CompileResult::integer(1.0),
                CompileResult::EMPTY,
            ];
            assert_eq!(fn_if(&args, ctx).unwrap(), CompileResult::integer(1.0));

            let args = [CompileResult::boolean(false), CompileResult::EMPTY];
            assert_eq!(fn_if(&args, ctx).unwrap(), CompileResult::boolean(false));

            let args = [CompileResult::integer(0.0), CompileResult::EMPTY, CompileResult::EMPTY];
            assert_eq!(fn_if(&args, ctx).unwrap(), CompileResult::ZERO_INT);
        });
    }

    #[test]
    fn test_and_or() {
        with_test_context(|ctx| {
            let args = [CompileResult::boolean(true), CompileResult::integer(0.0)];
            assert_eq!(fn_and(&args, ctx).unwrap(), CompileResult::boolean(false));
            assert_eq!(fn_or(&args, ctx).unwrap(), CompileResult::boolean(true));
            assert_eq!(
                fn_and(&[CompileResult::string("x")], ctx),
                Err(FormulaError::Excel(CellError::Value))
            );
        });
    }

    #[test]
    fn test_iferror_and_ifna() {
        with_test_context(|ctx| {
            let div0 = [CompileResult::error(CellError::Div0), CompileResult::integer(7.0)];
            assert_eq!(fn_iferror(&div0, ctx).unwrap(), CompileResult::integer(7.0));
            assert_eq!(fn_ifna(&div0, ctx).unwrap(), CompileResult::error(CellError::Div0));

            let na = [CompileResult::error(CellError::Na), CompileResult::string("none")];
            assert_eq!(fn_ifna(&na, ctx).unwrap(), CompileResult::string("none"));

            let ok = [CompileResult::integer(1.0), CompileResult::EMPTY];
            assert_eq!(fn_iferror(&ok, ctx).unwrap(), CompileResult::integer(1.0));
        });
    }

    #[test]
    fn test_not() {
        with_test_context(|ctx| {
            assert_eq!(
                fn_not(&[CompileResult::boolean(false)], ctx).unwrap(),
                CompileResult::boolean(true)
            );
        });
    }
}
