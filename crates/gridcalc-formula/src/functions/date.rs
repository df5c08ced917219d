//! Date/time functions
//!
//! Dates are OLE automation serials (days since 1899-12-30), which agree with
//! spreadsheet serial numbers from 1900-03-01 on.

use super::helpers::{arg_to_decimal, arg_to_int};
use super::{FunctionDef, FunctionRepository};
use crate::compile_result::{oa_date, CompileResult, ResultValue};
use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime};
use gridcalc_core::CellError;

pub(super) fn register(repository: &mut FunctionRepository) {
    repository.register(FunctionDef::new("DATE", 3, Some(3), fn_date));
    repository.register(FunctionDef::new("TODAY", 0, Some(0), fn_today).volatile());
    repository.register(FunctionDef::new("NOW", 0, Some(0), fn_now).volatile());
    repository.register(FunctionDef::new("YEAR", 1, Some(1), fn_year));
    repository.register(FunctionDef::new("MONTH", 1, Some(1), fn_month));
    repository.register(FunctionDef::new("DAY", 1, Some(1), fn_day));
}

fn midnight(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

/// Build a date the way DATE does: months and days may overflow
fn date_from_parts(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    // Two-digit style years count from 1900
    let year = if (0..1900).contains(&year) { year + 1900 } else { year };
    if !(1900..=9999).contains(&year) {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, 1, 1)?;
    let months = month - 1;
    let shifted = if months >= 0 {
        first.checked_add_months(Months::new(u32::try_from(months).ok()?))?
    } else {
        first.checked_sub_months(Months::new(u32::try_from(-months).ok()?))?
    };
    shifted
        .checked_add_signed(Duration::try_days(day.checked_sub(1)?)?)
        .filter(|date| date.year() <= 9999)
}

/// DATE(year, month, day)
pub fn fn_date(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    let part = |i: usize| match args.get(i) {
        Some(arg) => arg_to_int(arg),
        None => Err(FormulaError::Excel(CellError::Value)),
    };
    let (year, month, day) = (part(0)?, part(1)?, part(2)?);
    match date_from_parts(year, month, day).and_then(midnight) {
        Some(date) => Ok(CompileResult::date(date)),
        None => Ok(CompileResult::error(CellError::Num)),
    }
}

/// TODAY()
pub fn fn_today(_args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    match midnight(Local::now().date_naive()) {
        Some(today) => Ok(CompileResult::date(today)),
        None => Ok(CompileResult::error(CellError::Num)),
    }
}

/// NOW()
pub fn fn_now(_args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::date(Local::now().naive_local()))
}

/// The date a serial-number argument stands for
fn date_arg(args: &[CompileResult]) -> FormulaResult<NaiveDateTime> {
    let arg = match args.first() {
        Some(arg) => arg.scalar(),
        None => return Err(FormulaError::Excel(CellError::Value)),
    };
    if let ResultValue::Date(date) = arg.value {
        return Ok(date);
    }
    if let ResultValue::Text(s) = &arg.value {
        if let Ok(date) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
            return midnight(date).ok_or(FormulaError::Excel(CellError::Value));
        }
    }
    let serial = arg_to_decimal(&arg)?;
    if serial < 0.0 {
        return Err(FormulaError::Excel(CellError::Num));
    }
    oa_date::from_serial(serial.trunc()).ok_or(FormulaError::Excel(CellError::Num))
}

/// YEAR(serial_number)
pub fn fn_year(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::integer(date_arg(args)?.year() as f64))
}

/// MONTH(serial_number)
pub fn fn_month(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::integer(date_arg(args)?.month() as f64))
}

/// DAY(serial_number)
pub fn fn_day(args: &[CompileResult], _ctx: &ParsingContext) -> FormulaResult<CompileResult> {
    Ok(CompileResult::integer(date_arg(args)?.day() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::with_test_context;
    use pretty_assertions::assert_eq;

    fn n(value: f64) -> CompileResult {
        CompileResult::integer(value)
    }

    #[test]
    fn test_date_serial() {
        with_test_context(|ctx| {
            let date = fn_date(&[n(2024.0), n(1.0), n(15.0)], ctx).unwrap();
            assert_eq!(date.result_numeric(), 45306.0);
        });
    }

    #[test]
    fn test_date_overflow_rolls_over() {
        with_test_context(|ctx| {
            let date = fn_date(&[n(2023.0), n(14.0), n(1.0)], ctx).unwrap();
            assert_eq!(fn_year(&[date.clone()], ctx).unwrap(), n(2024.0));
            assert_eq!(fn_month(&[date], ctx).unwrap(), n(2.0));

            let date = fn_date(&[n(2024.0), n(3.0), n(0.0)], ctx).unwrap();
            assert_eq!(fn_day(&[date], ctx).unwrap(), n(29.0));
        });
    }

    #[test]
    fn test_date_out_of_range_is_num() {
        with_test_context(|ctx| {
            let num = CompileResult::error(CellError::Num);
            assert_eq!(fn_date(&[n(2024.0), n(1.0), n(9e18)], ctx).unwrap(), num);
            assert_eq!(fn_date(&[n(2024.0), n(1.0), n(-9e18)], ctx).unwrap(), num);
            assert_eq!(fn_date(&[n(2024.0), n(1.0), n(5_000_000.0)], ctx).unwrap(), num);
        });
    }

    #[test]
    fn test_parts_from_serial() {
        with_test_context(|ctx| {
            let serial = [CompileResult::decimal(45306.5)];
            assert_eq!(fn_year(&serial, ctx).unwrap(), n(2024.0));
            assert_eq!(fn_month(&serial, ctx).unwrap(), n(1.0));
            assert_eq!(fn_day(&serial, ctx).unwrap(), n(15.0));
            assert_eq!(
                fn_year(&[CompileResult::decimal(-1.0)], ctx),
                Err(FormulaError::Excel(CellError::Num))
            );
        });
    }

    #[test]
    fn test_today_has_no_time() {
        with_test_context(|ctx| {
            let today = fn_today(&[], ctx).unwrap().result_numeric();
            assert_eq!(today.fract(), 0.0);
        });
    }
}
