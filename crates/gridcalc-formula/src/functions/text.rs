//! Text functions

use super::helpers::{arg_to_decimal, arg_to_int, arg_to_string, flatten_arguments};
use super::{FunctionDef, FunctionRepository};
use crate::compile_result::{CompileResult, DataType};
use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::CellError;

pub(super) fn register(repository: &mut FunctionRepository) {
    repository.register(FunctionDef::new("LEN", 1, Some(1), fn_len));
    repository.register(FunctionDef::new("LEFT", 1, Some(2), fn_left));
    repository.register(FunctionDef::new("RIGHT", 1, Some(2), fn_right));
    repository.register(FunctionDef::new("MID", 3, Some(3), fn_mid));
    repository.register(FunctionDef::new("UPPER", 1, Some(1), fn_upper));
    repository.register(FunctionDef::new("LOWER", 1, Some(1), fn_lower));
    repository.register(FunctionDef::new("TRIM", 1, Some(1), fn_trim));
    repository.register(FunctionDef::new("CONCATENATE", 1, None, fn_concatenate));
    repository.register(FunctionDef::new("CONCAT", 1, None, fn_concat));
    repository.register(FunctionDef::new("TEXT", 2, Some(2), fn_text));
}

fn text_arg(args: &[CompileResult], index: usize) -> FormulaResult<String> {
    match args.get(index) {
        Some(arg) => arg_to_string(arg),
        None => Err(FormulaError::Excel(CellError::Value)),
    }
}

/// Optional character count, 1 when omitted, `#VALUE!` when negative
fn count_arg(args: &[CompileResult], index: usize) -> FormulaResult<usize> {
    let n = match args.get(index) {
        Some(arg) => arg_to_int(arg)?,
        None => 1,
    };
    usize::try_from(n).map_err(|_| FormulaError::Excel(CellError::Value))
}

fn take_left(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn take_right(s: &str, n: usize) -> String {
    let len = s.chars().count();
    s.chars().skip(len.saturating_sub(n)).collect()
}

/// LEN(text)
pub fn fn_len(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let s = text_arg(args, 0)?;
    Ok(CompileResult::integer(s.chars().count() as f64))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let s = text_arg(args, 0)?;
    let n = count_arg(args, 1)?;
    Ok(CompileResult::string(take_left(&s, n)))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let s = text_arg(args, 0)?;
    let n = count_arg(args, 1)?;
    Ok(CompileResult::string(take_right(&s, n)))
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let s = text_arg(args, 0)?;
    let start = count_arg(args, 1)?;
    let n = count_arg(args, 2)?;
    if start < 1 {
        return Ok(CompileResult::error(CellError::Value));
    }
    Ok(CompileResult::string(
        s.chars().skip(start - 1).take(n).collect::<String>(),
    ))
}

/// UPPER(text)
pub fn fn_upper(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::string(text_arg(args, 0)?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::string(text_arg(args, 0)?.to_lowercase()))
}

/// TRIM(text)
///
/// Leading and trailing spaces go, inner runs collapse to one space.
pub fn fn_trim(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let s = text_arg(args, 0)?;
    let trimmed = s.split(' ').filter(|part| !part.is_empty()).collect::<Vec<_>>();
    Ok(CompileResult::string(trimmed.join(" ")))
}

/// CONCATENATE(text1, ...)
pub fn fn_concatenate(
    args: &[CompileResult],
    _ctx: &ParsingContext,
) -> FormulaResult<CompileResult> {
    let mut result = String::new();
    for arg in args {
        result.push_str(&arg_to_string(arg)?);
    }
    Ok(CompileResult::string(result))
}

/// CONCAT(text1, ...), ranges are joined cell by cell
pub fn fn_concat(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let mut result = String::new();
    for arg in flatten_arguments(args) {
        result.push_str(&arg_to_string(&arg.value)?);
    }
    Ok(CompileResult::string(result))
}

/// TEXT(value, format_text)
///
/// Text that does not read as a number is returned unchanged.
pub fn fn_text(args: &[CompileResult], ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let format = text_arg(args, 1)?;
    let value = match args.first() {
        Some(arg) => arg.scalar(),
        None => return Err(FormulaError::Excel(CellError::Value)),
    };
    if value.data_type == DataType::String && !value.is_numeric_string() {
        return Ok(CompileResult::string(arg_to_string(&value)?));
    }
    let n = arg_to_decimal(&value)?;
    Ok(CompileResult::string(ctx.provider.get_format(n, &format)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::with_test_context;
    use pretty_assertions::assert_eq;

    fn s(value: &str) -> CompileResult {
        CompileResult::string(value)
    }

    fn n(value: f64) -> CompileResult {
        CompileResult::integer(value)
    }

    #[test]
    fn test_len() {
        with_test_context(|ctx| {
            assert_eq!(fn_len(&[s("héllo")], ctx).unwrap(), n(5.0));
            assert_eq!(fn_len(&[CompileResult::EMPTY], ctx).unwrap(), n(0.0));
        });
    }

    #[test]
    fn test_left_right_mid() {
        with_test_context(|ctx| {
            assert_eq!(fn_left(&[s("Hello")], ctx).unwrap(), s("H"));
            assert_eq!(fn_left(&[s("Hello"), n(3.0)], ctx).unwrap(), s("Hel"));
            assert_eq!(fn_right(&[s("Hello"), n(10.0)], ctx).unwrap(), s("Hello"));
            assert_eq!(fn_mid(&[s("Hello"), n(2.0), n(3.0)], ctx).unwrap(), s("ell"));
            assert_eq!(
                fn_mid(&[s("Hello"), n(0.0), n(3.0)], ctx).unwrap(),
                CompileResult::error(CellError::Value)
            );
            assert_eq!(
                fn_left(&[s("Hello"), n(-1.0)], ctx),
                Err(FormulaError::Excel(CellError::Value))
            );
        });
    }

    #[test]
    fn test_trim() {
        with_test_context(|ctx| {
            assert_eq!(fn_trim(&[s("  a   b  ")], ctx).unwrap(), s("a b"));
        });
    }

    #[test]
    fn test_concatenate_numbers_and_logicals() {
        with_test_context(|ctx| {
            let args = [s("a"), n(1.0), CompileResult::boolean(true)];
            assert_eq!(fn_concatenate(&args, ctx).unwrap(), s("a1TRUE"));
        });
    }

    #[test]
    fn test_concat_flattens_arrays() {
        with_test_context(|ctx| {
            let array = CompileResult::array(vec![vec![s("x"), s("y")], vec![n(3.0)]]);
            assert_eq!(fn_concat(&[array, s("!")], ctx).unwrap(), s("xy3!"));
        });
    }

    #[test]
    fn test_text_uses_provider_format() {
        with_test_context(|ctx| {
            assert_eq!(
                fn_text(&[CompileResult::decimal(1234.5), s("#,##0")], ctx).unwrap(),
                s("1,235")
            );
            assert_eq!(fn_text(&[CompileResult::decimal(0.25), s("0%")], ctx).unwrap(), s("25%"));
            assert_eq!(fn_text(&[s("abc"), s("0.00")], ctx).unwrap(), s("abc"));
        });
    }
}
