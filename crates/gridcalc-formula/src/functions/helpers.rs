//! Argument validation and coercion shared by the function library

use crate::compile_result::{CompileResult, ResultValue};
use crate::error::{FormulaError, FormulaResult};
use crate::operators::operand_number;
use gridcalc_core::CellError;

/// Fail with `#VALUE!` when fewer than `min` arguments were passed
pub fn validate_arguments(args: &[CompileResult], min: usize) -> FormulaResult<()> {
    if args.len() < min {
        return Err(FormulaError::Excel(CellError::Value));
    }
    Ok(())
}

/// Numeric value of a scalar argument
pub fn arg_to_decimal(arg: &CompileResult) -> FormulaResult<f64> {
    operand_number(arg).map_err(FormulaError::Excel)
}

/// Numeric value truncated toward zero
pub fn arg_to_int(arg: &CompileResult) -> FormulaResult<i64> {
    let n = arg_to_decimal(arg)?;
    if !n.is_finite() || n.abs() >= i64::MAX as f64 {
        return Err(FormulaError::Excel(CellError::Num));
    }
    Ok(n.trunc() as i64)
}

/// Logical value of a scalar argument
///
/// Numbers are true when non-zero; the texts `TRUE` and `FALSE` are accepted.
pub fn arg_to_bool(arg: &CompileResult) -> FormulaResult<bool> {
    let scalar = arg.scalar();
    match &scalar.value {
        ResultValue::Boolean(b) => Ok(*b),
        ResultValue::Empty => Ok(false),
        ResultValue::Error(e) => Err(FormulaError::Excel(*e)),
        ResultValue::Number(n) => Ok(*n != 0.0),
        ResultValue::Date(_) | ResultValue::Time(_) => Ok(scalar.result_numeric() != 0.0),
        ResultValue::Text(s) => {
            if s.eq_ignore_ascii_case("TRUE") {
                Ok(true)
            } else if s.eq_ignore_ascii_case("FALSE") {
                Ok(false)
            } else {
                Err(FormulaError::Excel(CellError::Value))
            }
        }
        ResultValue::Range(_) | ResultValue::Array(_) => Err(FormulaError::Excel(CellError::Value)),
    }
}

/// Text value of a scalar argument
pub fn arg_to_string(arg: &CompileResult) -> FormulaResult<String> {
    let scalar = arg.scalar();
    match &scalar.value {
        ResultValue::Error(e) => Err(FormulaError::Excel(*e)),
        ResultValue::Range(_) | ResultValue::Array(_) => Err(FormulaError::Excel(CellError::Value)),
        _ => Ok(scalar.to_text()),
    }
}

/// What `args_to_doubles` leaves out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoubleOptions {
    /// Skip cells in hidden rows
    pub ignore_hidden_cells: bool,
    /// Skip values produced by a nested SUBTOTAL
    pub ignore_subtotals: bool,
}

impl DoubleOptions {
    pub fn subtotal(ignore_hidden_cells: bool) -> Self {
        Self {
            ignore_hidden_cells,
            ignore_subtotals: true,
        }
    }

    pub(crate) fn skips(&self, value: &CompileResult) -> bool {
        (self.ignore_hidden_cells && value.is_hidden_cell)
            || (self.ignore_subtotals && value.is_result_of_subtotal)
    }
}

/// One value out of a flattened argument list
#[derive(Debug, Clone, PartialEq)]
pub struct FlatArgument {
    pub value: CompileResult,
    /// Came from a cell or an array rather than a literal argument
    pub from_reference: bool,
}

/// Expand ranges and arrays into their values, in argument order
///
/// Range enumeration only visits populated cells.
pub fn flatten_arguments(args: &[CompileResult]) -> Vec<FlatArgument> {
    let mut flat = Vec::new();
    for arg in args {
        flatten_into(arg, &mut flat);
    }
    flat
}

fn flatten_into(arg: &CompileResult, flat: &mut Vec<FlatArgument>) {
    match &arg.value {
        ResultValue::Range(range) => {
            if range.is_ref_error() {
                flat.push(FlatArgument {
                    value: CompileResult::error(CellError::Ref),
                    from_reference: true,
                });
                return;
            }
            flat.extend(range.cells().map(|cell| FlatArgument {
                value: CompileResult::from_cell(&cell),
                from_reference: true,
            }));
        }
        ResultValue::Array(rows) => {
            for value in rows.iter().flatten() {
                flat.push(FlatArgument {
                    value: value.clone(),
                    from_reference: true,
                });
            }
        }
        _ => flat.push(FlatArgument {
            value: arg.clone(),
            from_reference: arg.address_reference_id.is_some(),
        }),
    }
}

/// Numbers of a flattened argument list
///
/// Referenced text and logicals are skipped; literal ones are coerced, and
/// literal text that is not a number is `#VALUE!`. The first error found is
/// returned.
pub fn args_to_doubles(args: &[CompileResult], options: DoubleOptions) -> FormulaResult<Vec<f64>> {
    let mut numbers = Vec::new();
    for FlatArgument {
        value,
        from_reference,
    } in flatten_arguments(args)
    {
        if options.skips(&value) {
            continue;
        }
        match &value.value {
            ResultValue::Error(e) => return Err(FormulaError::Excel(*e)),
            ResultValue::Number(n) => numbers.push(*n),
            ResultValue::Date(_) | ResultValue::Time(_) => numbers.push(value.result_numeric()),
            ResultValue::Boolean(_) if !from_reference => numbers.push(value.result_numeric()),
            ResultValue::Text(_) if !from_reference => numbers.push(arg_to_decimal(&value)?),
            _ => {}
        }
    }
    Ok(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arg_to_bool() {
        assert!(arg_to_bool(&CompileResult::integer(2.0)).unwrap());
        assert!(!arg_to_bool(&CompileResult::EMPTY).unwrap());
        assert!(arg_to_bool(&CompileResult::string("true")).unwrap());
        assert_eq!(
            arg_to_bool(&CompileResult::string("yes")),
            Err(FormulaError::Excel(CellError::Value))
        );
    }

    #[test]
    fn test_arg_to_int_truncates() {
        assert_eq!(arg_to_int(&CompileResult::decimal(2.9)).unwrap(), 2);
        assert_eq!(arg_to_int(&CompileResult::decimal(-2.9)).unwrap(), -2);
        assert_eq!(arg_to_int(&CompileResult::string("7")).unwrap(), 7);
    }

    #[test]
    fn test_arg_to_string() {
        assert_eq!(arg_to_string(&CompileResult::decimal(1.5)).unwrap(), "1.5");
        assert_eq!(arg_to_string(&CompileResult::boolean(true)).unwrap(), "TRUE");
        assert_eq!(
            arg_to_string(&CompileResult::error(CellError::Na)),
            Err(FormulaError::Excel(CellError::Na))
        );
    }

    #[test]
    fn test_args_to_doubles_literals() {
        let args = [
            CompileResult::integer(1.0),
            CompileResult::boolean(true),
            CompileResult::string("2"),
        ];
        assert_eq!(args_to_doubles(&args, DoubleOptions::default()).unwrap(), vec![1.0, 1.0, 2.0]);

        let bad = [CompileResult::string("abc")];
        assert_eq!(
            args_to_doubles(&bad, DoubleOptions::default()),
            Err(FormulaError::Excel(CellError::Value))
        );
    }

    #[test]
    fn test_args_to_doubles_array_skips_text() {
        let array = CompileResult::array(vec![vec![
            CompileResult::integer(1.0),
            CompileResult::string("x"),
            CompileResult::integer(2.0),
        ]]);
        assert_eq!(args_to_doubles(&[array], DoubleOptions::default()).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_args_to_doubles_skips_subtotals() {
        let args = [
            CompileResult::decimal(10.0).with_subtotal(true),
            CompileResult::decimal(5.0),
            CompileResult::decimal(7.0).with_hidden_cell(true),
        ];
        assert_eq!(args_to_doubles(&args, DoubleOptions::subtotal(false)).unwrap(), vec![5.0, 7.0]);
        assert_eq!(args_to_doubles(&args, DoubleOptions::subtotal(true)).unwrap(), vec![5.0]);
    }

    #[test]
    fn test_validate_arguments() {
        assert!(validate_arguments(&[CompileResult::EMPTY], 1).is_ok());
        assert!(validate_arguments(&[], 1).is_err());
    }
}
