//! Math functions

use super::helpers::{
    arg_to_decimal, arg_to_int, args_to_doubles, flatten_arguments, DoubleOptions,
};
use super::{FunctionCompilerKind, FunctionDef, FunctionRepository};
use crate::compile_result::{CompileResult, DataType};
use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::CellError;
use rand::Rng;

pub(super) fn register(repository: &mut FunctionRepository) {
    repository.register(FunctionDef::new("SUM", 1, None, fn_sum));
    repository.register(FunctionDef::new("PRODUCT", 1, None, fn_product));
    repository.register(FunctionDef::new("AVERAGE", 1, None, fn_average));
    repository.register(FunctionDef::new("MIN", 1, None, fn_min));
    repository.register(FunctionDef::new("MAX", 1, None, fn_max));
    repository.register(
        FunctionDef::new("COUNT", 1, None, fn_count)
            .with_compiler(FunctionCompilerKind::ErrorHandling),
    );
    repository.register(
        FunctionDef::new("COUNTA", 1, None, fn_counta)
            .with_compiler(FunctionCompilerKind::ErrorHandling),
    );
    repository.register(FunctionDef::new("ABS", 1, Some(1), fn_abs));
    repository.register(FunctionDef::new("ROUND", 2, Some(2), fn_round));
    repository.register(FunctionDef::new("INT", 1, Some(1), fn_int));
    repository.register(FunctionDef::new("MOD", 2, Some(2), fn_mod));
    repository.register(FunctionDef::new("POWER", 2, Some(2), fn_power));
    repository.register(FunctionDef::new("SQRT", 1, Some(1), fn_sqrt));
    repository.register(FunctionDef::new("SUBTOTAL", 2, None, fn_subtotal));
    repository.register(FunctionDef::new("RAND", 0, Some(0), fn_rand).volatile());
    repository.register(FunctionDef::new("RANDBETWEEN", 2, Some(2), fn_randbetween).volatile());
}

/// SUM function
pub fn fn_sum(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let numbers = args_to_doubles(args, DoubleOptions::default())?;
    Ok(CompileResult::decimal(numbers.iter().sum()))
}

/// PRODUCT function
pub fn fn_product(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let numbers = args_to_doubles(args, DoubleOptions::default())?;
    Ok(CompileResult::decimal(product(&numbers)))
}

/// AVERAGE function
pub fn fn_average(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let numbers = args_to_doubles(args, DoubleOptions::default())?;
    average(&numbers).map(CompileResult::decimal)
}

/// MIN function
pub fn fn_min(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let numbers = args_to_doubles(args, DoubleOptions::default())?;
    Ok(CompileResult::decimal(min(&numbers)))
}

/// MAX function
pub fn fn_max(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let numbers = args_to_doubles(args, DoubleOptions::default())?;
    Ok(CompileResult::decimal(max(&numbers)))
}

/// COUNT function
///
/// Errors are not counted and do not fail the call.
pub fn fn_count(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::integer(count_numbers(args, DoubleOptions::default()) as f64))
}

/// COUNTA function
pub fn fn_counta(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::integer(count_values(args, DoubleOptions::default()) as f64))
}

/// ABS function
pub fn fn_abs(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let n = number_arg(args, 0)?;
    Ok(CompileResult::decimal(n.abs()))
}

/// ROUND function
pub fn fn_round(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let number = number_arg(args, 0)?;
    let num_digits = match args.get(1) {
        Some(arg) => arg_to_int(arg)?,
        None => 0,
    };
    Ok(CompileResult::decimal(round_half_away(number, num_digits)))
}

/// INT function
pub fn fn_int(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let n = number_arg(args, 0)?;
    Ok(CompileResult::integer(n.floor()))
}

/// MOD function
pub fn fn_mod(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let number = number_arg(args, 0)?;
    let divisor = number_arg(args, 1)?;
    if divisor == 0.0 {
        return Ok(CompileResult::error(CellError::Div0));
    }
    // Result takes the sign of the divisor
    Ok(CompileResult::decimal(number - divisor * (number / divisor).floor()))
}

/// POWER function
pub fn fn_power(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let base = number_arg(args, 0)?;
    let exponent = number_arg(args, 1)?;
    if base == 0.0 && exponent == 0.0 {
        return Ok(CompileResult::error(CellError::Num));
    }
    if base == 0.0 && exponent < 0.0 {
        return Ok(CompileResult::error(CellError::Div0));
    }
    let result = base.powf(exponent);
    if !result.is_finite() {
        return Ok(CompileResult::error(CellError::Num));
    }
    Ok(CompileResult::decimal(result))
}

/// SQRT function
pub fn fn_sqrt(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let n = number_arg(args, 0)?;
    if n < 0.0 {
        return Ok(CompileResult::error(CellError::Num));
    }
    Ok(CompileResult::decimal(n.sqrt()))
}

/// SUBTOTAL(function_num, ref1, ...)
///
/// Codes 1-11 aggregate every value, 101-111 skip hidden rows. Values that
/// are themselves SUBTOTAL results are never counted twice.
pub fn fn_subtotal(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let code = number_arg(args, 0)?.trunc() as i64;
    let (function, ignore_hidden) = match code {
        1..=11 => (code, false),
        101..=111 => (code - 100, true),
        _ => return Ok(CompileResult::error(CellError::Value)),
    };
    let refs = args.get(1..).unwrap_or_default();
    let options = DoubleOptions::subtotal(ignore_hidden);

    let result = match function {
        2 => CompileResult::integer(count_numbers(refs, options) as f64),
        3 => CompileResult::integer(count_values(refs, options) as f64),
        _ => {
            let numbers = args_to_doubles(refs, options)?;
            let value = match function {
                1 => average(&numbers),
                4 => Ok(max(&numbers)),
                5 => Ok(min(&numbers)),
                6 => Ok(product(&numbers)),
                7 => variance(&numbers, true).map(f64::sqrt),
                8 => variance(&numbers, false).map(f64::sqrt),
                9 => Ok(numbers.iter().sum()),
                10 => variance(&numbers, true),
                _ => variance(&numbers, false),
            };
            match value {
                Ok(n) => CompileResult::decimal(n),
                Err(e) => CompileResult::error(e.to_cell_error()),
            }
        }
    };
    Ok(result.with_subtotal(true))
}

/// RAND function
pub fn fn_rand(_args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::decimal(rand::thread_rng().gen::<f64>()))
}

/// RANDBETWEEN function
pub fn fn_randbetween(
    args: &[CompileResult],
    _ctx: &ParsingContext,
) -> FormulaResult<CompileResult> {
    let low = number_arg(args, 0)?.ceil() as i64;
    let high = number_arg(args, 1)?.floor() as i64;
    if low > high {
        return Ok(CompileResult::error(CellError::Num));
    }
    let n = rand::thread_rng().gen_range(low..=high);
    Ok(CompileResult::integer(n as f64))
}

fn number_arg(args: &[CompileResult], index: usize) -> FormulaResult<f64> {
    match args.get(index) {
        Some(arg) => arg_to_decimal(arg),
        None => Err(FormulaError::Excel(CellError::Value)),
    }
}

fn round_half_away(number: f64, num_digits: i64) -> f64 {
    let digits = num_digits.clamp(-308, 308) as i32;
    let multiplier = 10_f64.powi(digits);
    let result = if number >= 0.0 {
        (number * multiplier + 0.5).floor() / multiplier
    } else {
        (number * multiplier - 0.5).ceil() / multiplier
    };
    if result.is_finite() {
        result
    } else {
        number
    }
}

fn product(numbers: &[f64]) -> f64 {
    if numbers.is_empty() {
        0.0
    } else {
        numbers.iter().product()
    }
}

fn average(numbers: &[f64]) -> FormulaResult<f64> {
    if numbers.is_empty() {
        return Err(FormulaError::Excel(CellError::Div0));
    }
    Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

fn min(numbers: &[f64]) -> f64 {
    numbers.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

fn max(numbers: &[f64]) -> f64 {
    numbers.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

fn variance(numbers: &[f64], sample: bool) -> FormulaResult<f64> {
    let n = numbers.len();
    if n == 0 || (sample && n == 1) {
        return Err(FormulaError::Excel(CellError::Div0));
    }
    let mean = numbers.iter().sum::<f64>() / n as f64;
    let squares: f64 = numbers.iter().map(|x| (x - mean).powi(2)).sum();
    let divisor = if sample { n - 1 } else { n };
    Ok(squares / divisor as f64)
}

/// Numbers among the arguments, literal numeric text included
fn count_numbers(args: &[CompileResult], options: DoubleOptions) -> usize {
    flatten_arguments(args)
        .into_iter()
        .filter(|arg| !options.skips(&arg.value))
        .filter(|arg| match arg.value.data_type {
            DataType::Integer | DataType::Decimal | DataType::Date | DataType::Time => true,
            DataType::Boolean => !arg.from_reference,
            DataType::String => !arg.from_reference && arg.value.is_numeric_string(),
            _ => false,
        })
        .count()
}

/// Non-empty values, errors included
fn count_values(args: &[CompileResult], options: DoubleOptions) -> usize {
    flatten_arguments(args)
        .into_iter()
        .filter(|arg| !options.skips(&arg.value) && !arg.value.is_empty())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::with_test_context;
    use pretty_assertions::assert_eq;

    fn numbers(values: &[f64]) -> Vec<CompileResult> {
        values.iter().map(|n| CompileResult::decimal(*n)).collect()
    }

    #[test]
    fn test_sum() {
        with_test_context(|ctx| {
            let result = fn_sum(&numbers(&[1.0, 2.0, 3.0]), ctx).unwrap();
            assert_eq!(result.result_numeric(), 6.0);
        });
    }

    #[test]
    fn test_average_of_nothing_is_div0() {
        with_test_context(|ctx| {
            let empty = CompileResult::array(vec![vec![CompileResult::string("a")]]);
            assert_eq!(
                fn_average(&[empty], ctx),
                Err(FormulaError::Excel(CellError::Div0))
            );
        });
    }

    #[test]
    fn test_round() {
        with_test_context(|ctx| {
            let round = |n: f64, d: f64| {
                fn_round(&numbers(&[n, d]), ctx).unwrap().result_numeric()
            };
            assert_eq!(round(2.5, 0.0), 3.0);
            assert_eq!(round(-2.5, 0.0), -3.0);
            assert_eq!(round(1.234, 2.0), 1.23);
            assert_eq!(round(1250.0, -2.0), 1300.0);
        });
    }

    #[test]
    fn test_mod_sign_follows_divisor() {
        with_test_context(|ctx| {
            assert_eq!(fn_mod(&numbers(&[-3.0, 2.0]), ctx).unwrap().result_numeric(), 1.0);
            assert_eq!(fn_mod(&numbers(&[3.0, -2.0]), ctx).unwrap().result_numeric(), -1.0);
            assert_eq!(
                fn_mod(&numbers(&[3.0, 0.0]), ctx).unwrap(),
                CompileResult::error(CellError::Div0)
            );
        });
    }

    #[test]
    fn test_int_floors() {
        with_test_context(|ctx| {
            assert_eq!(fn_int(&numbers(&[-1.5]), ctx).unwrap(), CompileResult::integer(-2.0));
        });
    }

    #[test]
    fn test_sqrt_and_power_domain() {
        with_test_context(|ctx| {
            assert_eq!(fn_sqrt(&numbers(&[-1.0]), ctx).unwrap(), CompileResult::error(CellError::Num));
            assert_eq!(
                fn_power(&numbers(&[0.0, -1.0]), ctx).unwrap(),
                CompileResult::error(CellError::Div0)
            );
            assert_eq!(fn_power(&numbers(&[2.0, 10.0]), ctx).unwrap().result_numeric(), 1024.0);
        });
    }

    #[test]
    fn test_count_ignores_errors_and_text() {
        with_test_context(|ctx| {
            let args = [
                CompileResult::decimal(1.0),
                CompileResult::error(CellError::Div0),
                CompileResult::string("x"),
                CompileResult::string("2"),
            ];
            assert_eq!(fn_count(&args, ctx).unwrap(), CompileResult::integer(2.0));
            assert_eq!(fn_counta(&args, ctx).unwrap(), CompileResult::integer(4.0));
        });
    }

    #[test]
    fn test_subtotal_marks_result() {
        with_test_context(|ctx| {
            let mut args = numbers(&[9.0, 1.0, 2.0]);
            args.push(CompileResult::decimal(100.0).with_subtotal(true));
            let result = fn_subtotal(&args, ctx).unwrap();
            assert_eq!(result.result_numeric(), 3.0);
            assert!(result.is_result_of_subtotal);
        });
    }

    #[test]
    fn test_subtotal_hidden_rows() {
        with_test_context(|ctx| {
            let args = [
                CompileResult::integer(109.0),
                CompileResult::decimal(1.0),
                CompileResult::decimal(2.0).with_hidden_cell(true),
            ];
            assert_eq!(fn_subtotal(&args, ctx).unwrap().result_numeric(), 1.0);
        });
    }

    #[test]
    fn test_subtotal_unknown_code() {
        with_test_context(|ctx| {
            assert_eq!(
                fn_subtotal(&numbers(&[12.0, 1.0]), ctx).unwrap(),
                CompileResult::error(CellError::Value)
            );
        });
    }

    #[test]
    fn test_randbetween_bounds() {
        with_test_context(|ctx| {
            for _ in 0..20 {
                let n = fn_randbetween(&numbers(&[1.0, 3.0]), ctx).unwrap().result_numeric();
                assert!((1.0..=3.0).contains(&n));
            }
            assert_eq!(
                fn_randbetween(&numbers(&[5.0, 1.0]), ctx).unwrap(),
                CompileResult::error(CellError::Num)
            );
        });
    }
}
