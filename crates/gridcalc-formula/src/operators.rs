//! Binary operators and their precedence

use crate::compile_result::{oa_date, CompileResult, DataType, ResultValue};
use ahash::AHashMap;
use gridcalc_core::CellError;
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Percent,
    Exponentiation,
    Multiply,
    Divide,
    Add,
    Subtract,
    Concat,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// An operator attached to an expression, applied between it and the next one
///
/// Lower precedence values are applied first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    pub symbol: &'static str,
    pub kind: OperatorKind,
    pub precedence: u8,
}

static OPERATORS: Lazy<AHashMap<&'static str, Operator>> = Lazy::new(|| {
    use OperatorKind::*;

    [
        ("%", Percent, 2),
        ("^", Exponentiation, 4),
        ("*", Multiply, 6),
        ("/", Divide, 6),
        ("+", Add, 12),
        ("-", Subtract, 12),
        ("&", Concat, 15),
        ("=", Equal, 25),
        ("<>", NotEqual, 25),
        ("<", LessThan, 25),
        ("<=", LessThanOrEqual, 25),
        (">", GreaterThan, 25),
        (">=", GreaterThanOrEqual, 25),
    ]
    .into_iter()
    .map(|(symbol, kind, precedence)| {
        (
            symbol,
            Operator {
                symbol,
                kind,
                precedence,
            },
        )
    })
    .collect()
});

impl Operator {
    /// Look up an operator by its symbol
    pub fn lookup(symbol: &str) -> Option<Operator> {
        OPERATORS.get(symbol).copied()
    }

    /// The operator a `%` suffix applies to its operand
    pub fn percent() -> Operator {
        Operator {
            symbol: "%",
            kind: OperatorKind::Percent,
            precedence: 2,
        }
    }

    /// Combine two compiled operands
    ///
    /// Errors in either operand propagate, the left one first.
    pub fn apply(&self, left: &CompileResult, right: &CompileResult) -> CompileResult {
        if let Some(e) = left.error_value() {
            return CompileResult::error(e);
        }
        if let Some(e) = right.error_value() {
            return CompileResult::error(e);
        }

        match self.kind {
            OperatorKind::Concat => concat(left, right),
            OperatorKind::Equal
            | OperatorKind::NotEqual
            | OperatorKind::LessThan
            | OperatorKind::LessThanOrEqual
            | OperatorKind::GreaterThan
            | OperatorKind::GreaterThanOrEqual => self.compare(left, right),
            _ => self.arithmetic(left, right),
        }
    }

    fn arithmetic(&self, left: &CompileResult, right: &CompileResult) -> CompileResult {
        let l = match operand_number(left) {
            Ok(n) => n,
            Err(e) => return CompileResult::error(e),
        };
        let r = match operand_number(right) {
            Ok(n) => n,
            Err(e) => return CompileResult::error(e),
        };
        let integral = is_integer(left) && is_integer(right);

        match self.kind {
            OperatorKind::Add => number_result(l + r, integral),
            OperatorKind::Subtract => number_result(l - r, integral),
            OperatorKind::Multiply => number_result(l * r, integral),
            OperatorKind::Percent => CompileResult::decimal(l * r),
            OperatorKind::Divide => {
                if r == 0.0 {
                    CompileResult::error(CellError::Div0)
                } else {
                    CompileResult::decimal(l / r)
                }
            }
            OperatorKind::Exponentiation => {
                if l == 0.0 && r < 0.0 {
                    return CompileResult::error(CellError::Div0);
                }
                if l == 0.0 && r == 0.0 {
                    return CompileResult::error(CellError::Num);
                }
                let result = l.powf(r);
                if result.is_finite() {
                    number_result(result, integral && r >= 0.0)
                } else {
                    CompileResult::error(CellError::Num)
                }
            }
            _ => CompileResult::error(CellError::Value),
        }
    }

    fn compare(&self, left: &CompileResult, right: &CompileResult) -> CompileResult {
        let (l, r) = match (Comparable::try_from(left), Comparable::try_from(right)) {
            (Ok(l), Ok(r)) => (l, r),
            (Err(e), _) | (_, Err(e)) => return CompileResult::error(e),
        };
        let ordering = compare_values(&l, &r);

        let result = match self.kind {
            OperatorKind::Equal => ordering == Ordering::Equal,
            OperatorKind::NotEqual => ordering != Ordering::Equal,
            OperatorKind::LessThan => ordering == Ordering::Less,
            OperatorKind::LessThanOrEqual => ordering != Ordering::Greater,
            OperatorKind::GreaterThan => ordering == Ordering::Greater,
            OperatorKind::GreaterThanOrEqual => ordering != Ordering::Less,
            _ => return CompileResult::error(CellError::Value),
        };
        CompileResult::boolean(result)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

fn number_result(n: f64, integral: bool) -> CompileResult {
    if integral && n.fract() == 0.0 {
        CompileResult::integer(n)
    } else {
        CompileResult::decimal(n)
    }
}

fn is_integer(result: &CompileResult) -> bool {
    matches!(
        result.data_type,
        DataType::Integer | DataType::Boolean | DataType::Empty
    )
}

/// Numeric value of an operand, `#VALUE!` for text and multi-cell ranges
pub(crate) fn operand_number(result: &CompileResult) -> Result<f64, CellError> {
    match &result.value {
        ResultValue::Error(e) => Err(*e),
        ResultValue::Empty => Ok(0.0),
        ResultValue::Number(_) | ResultValue::Boolean(_) => Ok(result.result_numeric()),
        ResultValue::Date(dt) => Ok(oa_date::to_serial(*dt)),
        ResultValue::Time(span) => Ok(oa_date::duration_to_serial(*span)),
        ResultValue::Text(_) => {
            if result.is_numeric_string() || result.is_percentage_string() {
                Ok(result.result_numeric())
            } else {
                Err(CellError::Value)
            }
        }
        ResultValue::Range(range) => {
            if range.is_multi() {
                Err(CellError::Value)
            } else {
                operand_number(&result.scalar())
            }
        }
        ResultValue::Array(_) => match result.scalar().value {
            ResultValue::Array(_) => Err(CellError::Value),
            _ => operand_number(&result.scalar()),
        },
    }
}

fn concat(left: &CompileResult, right: &CompileResult) -> CompileResult {
    let mut text = String::new();
    for side in [left, right] {
        let scalar = side.scalar();
        match &scalar.value {
            ResultValue::Error(e) => return CompileResult::error(*e),
            ResultValue::Range(_) | ResultValue::Array(_) => {
                return CompileResult::error(CellError::Value)
            }
            _ => text.push_str(&scalar.to_text()),
        }
    }
    CompileResult::string(text)
}

/// Operand of a comparison
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Comparable {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl TryFrom<&CompileResult> for Comparable {
    type Error = CellError;

    fn try_from(result: &CompileResult) -> Result<Self, CellError> {
        let scalar = result.scalar();
        match &scalar.value {
            ResultValue::Empty => Ok(Comparable::Empty),
            ResultValue::Number(n) => Ok(Comparable::Number(*n)),
            ResultValue::Date(_) | ResultValue::Time(_) => {
                Ok(Comparable::Number(scalar.result_numeric()))
            }
            ResultValue::Text(s) => Ok(Comparable::Text(s.clone())),
            ResultValue::Boolean(b) => Ok(Comparable::Boolean(*b)),
            ResultValue::Error(e) => Err(*e),
            ResultValue::Range(_) | ResultValue::Array(_) => Err(CellError::Value),
        }
    }
}

/// Spreadsheet ordering: numbers < text < logicals, text ignores case
///
/// An empty operand takes the zero value of the other side's type.
pub(crate) fn compare_values(left: &Comparable, right: &Comparable) -> Ordering {
    use Comparable::*;

    match (left, right) {
        (Empty, Empty) => Ordering::Equal,
        (Empty, Number(_)) => compare_values(&Number(0.0), right),
        (Empty, Text(_)) => compare_values(&Text(String::new()), right),
        (Empty, Boolean(_)) => compare_values(&Boolean(false), right),
        (_, Empty) => compare_values(right, left).reverse(),

        (Number(l), Number(r)) => {
            if approx_eq(*l, *r) {
                Ordering::Equal
            } else {
                l.partial_cmp(r).unwrap_or(Ordering::Equal)
            }
        }
        (Text(l), Text(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (Boolean(l), Boolean(r)) => l.cmp(r),

        (Number(_), _) => Ordering::Less,
        (_, Number(_)) => Ordering::Greater,
        (Text(_), Boolean(_)) => Ordering::Less,
        (Boolean(_), Text(_)) => Ordering::Greater,
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= scale * 1e-15
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn op(symbol: &str) -> Operator {
        Operator::lookup(symbol).unwrap()
    }

    #[test]
    fn test_precedence_table() {
        assert!(op("^").precedence < op("*").precedence);
        assert!(op("*").precedence < op("+").precedence);
        assert!(op("+").precedence < op("&").precedence);
        assert!(op("&").precedence < op("=").precedence);
        assert_eq!(op("/").precedence, op("*").precedence);
        assert!(Operator::lookup("**").is_none());
    }

    #[test]
    fn test_arithmetic() {
        let two = CompileResult::integer(2.0);
        let three = CompileResult::integer(3.0);
        assert_eq!(op("+").apply(&two, &three), CompileResult::integer(5.0));
        assert_eq!(op("^").apply(&two, &three), CompileResult::integer(8.0));
        assert_eq!(op("/").apply(&three, &two), CompileResult::decimal(1.5));
        assert_eq!(
            op("/").apply(&three, &CompileResult::ZERO_INT),
            CompileResult::error(CellError::Div0)
        );
    }

    #[test]
    fn test_arithmetic_coercion() {
        let text = CompileResult::string("4");
        let one = CompileResult::integer(1.0);
        assert_eq!(op("+").apply(&text, &one).result_numeric(), 5.0);
        assert_eq!(
            op("+").apply(&CompileResult::string("abc"), &one),
            CompileResult::error(CellError::Value)
        );
        assert_eq!(
            op("*").apply(&CompileResult::boolean(true), &CompileResult::EMPTY),
            CompileResult::integer(0.0)
        );
    }

    #[test]
    fn test_error_propagates_left_first() {
        let result = op("+").apply(
            &CompileResult::error(CellError::Na),
            &CompileResult::error(CellError::Div0),
        );
        assert_eq!(result, CompileResult::error(CellError::Na));
    }

    #[test]
    fn test_concat() {
        let result = op("&").apply(&CompileResult::string("a"), &CompileResult::decimal(1.5));
        assert_eq!(result, CompileResult::string("a1.5"));
    }

    #[test]
    fn test_comparison() {
        let a = CompileResult::string("abc");
        let b = CompileResult::string("ABC");
        assert_eq!(op("=").apply(&a, &b), CompileResult::boolean(true));
        assert_eq!(
            op("<").apply(&CompileResult::integer(100.0), &a),
            CompileResult::boolean(true)
        );
        assert_eq!(
            op(">").apply(&CompileResult::boolean(false), &a),
            CompileResult::boolean(true)
        );
        assert_eq!(
            op("=").apply(&CompileResult::EMPTY, &CompileResult::ZERO_INT),
            CompileResult::boolean(true)
        );
        assert_eq!(
            op("=").apply(&CompileResult::decimal(0.1 + 0.2), &CompileResult::decimal(0.3)),
            CompileResult::boolean(true)
        );
    }
}
