//! The value produced by compiling an expression or executing a function

use crate::provider::{CellInfo, RangeHandle};
use chrono::{Duration, NaiveDateTime};
use gridcalc_core::{CellError, CellValue};
use lazy_regex::regex_captures;
use once_cell::unsync::OnceCell;
use std::fmt;
use std::rc::Rc;

/// Type tag of a [`CompileResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    Empty,
    Integer,
    Decimal,
    String,
    Boolean,
    Date,
    Time,
    ExcelError,
    /// A range or an array constant
    Enumerable,
    /// A reference returned by a function such as OFFSET
    ExcelAddress,
}

/// Payload of a [`CompileResult`]
#[derive(Debug, Clone)]
pub enum ResultValue {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
    Date(NaiveDateTime),
    Time(Duration),
    /// Lazily enumerated cell range
    Range(RangeHandle),
    /// Array constant, row by row
    Array(Vec<Vec<CompileResult>>),
}

impl PartialEq for ResultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResultValue::Empty, ResultValue::Empty) => true,
            (ResultValue::Number(a), ResultValue::Number(b)) => a == b,
            (ResultValue::Text(a), ResultValue::Text(b)) => a == b,
            (ResultValue::Boolean(a), ResultValue::Boolean(b)) => a == b,
            (ResultValue::Error(a), ResultValue::Error(b)) => a == b,
            (ResultValue::Date(a), ResultValue::Date(b)) => a == b,
            (ResultValue::Time(a), ResultValue::Time(b)) => a == b,
            (ResultValue::Range(a), ResultValue::Range(b)) => {
                Rc::ptr_eq(a, b) || a.address() == b.address()
            }
            (ResultValue::Array(a), ResultValue::Array(b)) => a == b,
            _ => false,
        }
    }
}

/// Result of compiling an expression
///
/// Numeric views of the value (`result_numeric`, `is_numeric_string`,
/// `is_percentage_string`) are computed on first access and cached.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub value: ResultValue,
    pub data_type: DataType,
    /// Id of the resolved address in the evaluation's [`AddressCache`](crate::AddressCache)
    pub address_reference_id: Option<u32>,
    /// Value came from a cell in a hidden row
    pub is_hidden_cell: bool,
    /// Value was produced by SUBTOTAL
    pub is_result_of_subtotal: bool,
    numeric: OnceCell<f64>,
    numeric_string: OnceCell<Option<f64>>,
    percentage_string: OnceCell<Option<f64>>,
}

impl PartialEq for CompileResult {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type && self.value == other.value
    }
}

// The constants hold empty memo cells, every use gets a fresh copy.
#[allow(clippy::declare_interior_mutable_const)]
impl CompileResult {
    /// The empty result
    pub const EMPTY: CompileResult = CompileResult::constant(ResultValue::Empty, DataType::Empty);

    /// Decimal zero
    pub const ZERO_DECIMAL: CompileResult =
        CompileResult::constant(ResultValue::Number(0.0), DataType::Decimal);

    /// Integer zero
    pub const ZERO_INT: CompileResult =
        CompileResult::constant(ResultValue::Number(0.0), DataType::Integer);

    const fn constant(value: ResultValue, data_type: DataType) -> Self {
        Self {
            value,
            data_type,
            address_reference_id: None,
            is_hidden_cell: false,
            is_result_of_subtotal: false,
            numeric: OnceCell::new(),
            numeric_string: OnceCell::new(),
            percentage_string: OnceCell::new(),
        }
    }

    pub fn new(value: ResultValue, data_type: DataType) -> Self {
        Self::constant(value, data_type)
    }

    pub fn integer(n: f64) -> Self {
        Self::new(ResultValue::Number(n), DataType::Integer)
    }

    pub fn decimal(n: f64) -> Self {
        Self::new(ResultValue::Number(n), DataType::Decimal)
    }

    /// Number tagged `Integer` when it has no fractional part
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0 && n.abs() < 1e15 {
            Self::integer(n)
        } else {
            Self::decimal(n)
        }
    }

    pub fn string<S: Into<String>>(s: S) -> Self {
        Self::new(ResultValue::Text(s.into()), DataType::String)
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(ResultValue::Boolean(b), DataType::Boolean)
    }

    pub fn error(e: CellError) -> Self {
        Self::new(ResultValue::Error(e), DataType::ExcelError)
    }

    pub fn date(dt: NaiveDateTime) -> Self {
        Self::new(ResultValue::Date(dt), DataType::Date)
    }

    pub fn time(span: Duration) -> Self {
        Self::new(ResultValue::Time(span), DataType::Time)
    }

    /// A cell range, enumerated lazily
    pub fn range(range: RangeHandle) -> Self {
        Self::new(ResultValue::Range(range), DataType::Enumerable)
    }

    /// A reference produced by a reference function (OFFSET)
    pub fn reference(range: RangeHandle) -> Self {
        Self::new(ResultValue::Range(range), DataType::ExcelAddress)
    }

    pub fn array(rows: Vec<Vec<CompileResult>>) -> Self {
        Self::new(ResultValue::Array(rows), DataType::Enumerable)
    }

    pub fn with_address_reference(mut self, id: u32) -> Self {
        self.address_reference_id = Some(id);
        self
    }

    pub fn with_hidden_cell(mut self, hidden: bool) -> Self {
        self.is_hidden_cell = hidden;
        self
    }

    pub fn with_subtotal(mut self, subtotal: bool) -> Self {
        self.is_result_of_subtotal = subtotal;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data_type == DataType::Empty
    }

    pub fn is_error(&self) -> bool {
        matches!(self.value, ResultValue::Error(_))
    }

    pub fn error_value(&self) -> Option<CellError> {
        match self.value {
            ResultValue::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Integer or decimal data type
    pub fn is_numeric(&self) -> bool {
        matches!(self.data_type, DataType::Integer | DataType::Decimal)
    }

    pub fn is_range(&self) -> bool {
        matches!(self.value, ResultValue::Range(_))
    }

    pub fn as_range(&self) -> Option<&RangeHandle> {
        match &self.value {
            ResultValue::Range(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ResultValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True for a string that reads as a plain number
    pub fn is_numeric_string(&self) -> bool {
        self.numeric_string_value().is_some()
    }

    /// True for a string like `"12.5%"`
    pub fn is_percentage_string(&self) -> bool {
        self.percentage_string_value().is_some()
    }

    fn numeric_string_value(&self) -> Option<f64> {
        *self.numeric_string.get_or_init(|| match &self.value {
            ResultValue::Text(s) => parse_numeric_string(s),
            _ => None,
        })
    }

    fn percentage_string_value(&self) -> Option<f64> {
        *self.percentage_string.get_or_init(|| match &self.value {
            ResultValue::Text(s) => parse_percentage_string(s),
            _ => None,
        })
    }

    /// Numeric view of the value, computed once
    pub fn result_numeric(&self) -> f64 {
        *self.numeric.get_or_init(|| self.compute_numeric())
    }

    fn compute_numeric(&self) -> f64 {
        match &self.value {
            ResultValue::Number(n) => *n,
            ResultValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            ResultValue::Text(_) => self
                .numeric_string_value()
                .or_else(|| self.percentage_string_value())
                .unwrap_or(0.0),
            ResultValue::Date(dt) => oa_date::to_serial(*dt),
            ResultValue::Time(span) => oa_date::duration_to_serial(*span),
            ResultValue::Range(range) => range
                .first()
                .and_then(|cell| cell.value.as_number())
                .unwrap_or(0.0),
            ResultValue::Array(rows) => rows
                .first()
                .and_then(|row| row.first())
                .map(CompileResult::result_numeric)
                .unwrap_or(0.0),
            ResultValue::Empty | ResultValue::Error(_) => 0.0,
        }
    }

    /// Reduce a single-cell range or a one-element array to its scalar
    ///
    /// Anything else is returned unchanged.
    pub fn scalar(&self) -> CompileResult {
        match &self.value {
            ResultValue::Range(range) if !range.is_multi() => match range.first() {
                Some(cell) => CompileResult::from_cell(&cell),
                None => CompileResult::EMPTY,
            },
            ResultValue::Array(rows) if rows.len() == 1 && rows[0].len() == 1 => rows[0][0].clone(),
            _ => self.clone(),
        }
    }

    /// Scalar produced from a cell, carrying its hidden-row flag
    pub fn from_cell(cell: &CellInfo) -> Self {
        CompileResult::from(cell.value.clone()).with_hidden_cell(cell.is_hidden_row)
    }

    /// Flip the sign of a numeric result
    pub fn negated(&self) -> CompileResult {
        match &self.value {
            ResultValue::Number(n) => {
                let mut r = CompileResult::new(ResultValue::Number(-n), self.data_type);
                r.address_reference_id = self.address_reference_id;
                r.is_hidden_cell = self.is_hidden_cell;
                r
            }
            ResultValue::Error(_) => self.clone(),
            ResultValue::Empty => CompileResult::ZERO_INT,
            ResultValue::Boolean(_) | ResultValue::Date(_) | ResultValue::Time(_) => {
                CompileResult::decimal(-self.result_numeric())
            }
            ResultValue::Text(_) => match self
                .numeric_string_value()
                .or_else(|| self.percentage_string_value())
            {
                Some(n) => CompileResult::decimal(-n),
                None => CompileResult::error(CellError::Value),
            },
            ResultValue::Range(range) if !range.is_multi() => self.scalar().negated(),
            _ => CompileResult::error(CellError::Value),
        }
    }

    /// Text view used by concatenation and text functions
    pub fn to_text(&self) -> String {
        match &self.value {
            ResultValue::Number(n) => format_number(*n),
            ResultValue::Text(s) => s.clone(),
            ResultValue::Boolean(true) => "TRUE".to_string(),
            ResultValue::Boolean(false) => "FALSE".to_string(),
            ResultValue::Error(e) => e.to_string(),
            ResultValue::Empty => String::new(),
            ResultValue::Date(_) | ResultValue::Time(_) => format_number(self.result_numeric()),
            ResultValue::Range(_) | ResultValue::Array(_) => match self.scalar().value {
                ResultValue::Range(_) | ResultValue::Array(_) => CellError::Value.to_string(),
                _ => self.scalar().to_text(),
            },
        }
    }

    /// Convert to a plain cell value, ranges reduce to their first cell
    pub fn to_cell_value(&self) -> CellValue {
        match &self.value {
            ResultValue::Empty => CellValue::Empty,
            ResultValue::Number(n) => CellValue::Number(*n),
            ResultValue::Text(s) => CellValue::String(s.clone()),
            ResultValue::Boolean(b) => CellValue::Boolean(*b),
            ResultValue::Error(e) => CellValue::Error(*e),
            ResultValue::Date(_) | ResultValue::Time(_) => CellValue::Number(self.result_numeric()),
            ResultValue::Range(range) => range.first().map(|c| c.value).unwrap_or_default(),
            ResultValue::Array(rows) => rows
                .first()
                .and_then(|row| row.first())
                .map(CompileResult::to_cell_value)
                .unwrap_or_default(),
        }
    }
}

impl From<CellValue> for CompileResult {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => CompileResult::EMPTY,
            CellValue::Number(n) => CompileResult::decimal(n),
            CellValue::String(s) => CompileResult::string(s),
            CellValue::Boolean(b) => CompileResult::boolean(b),
            CellValue::Error(e) => CompileResult::error(e),
        }
    }
}

impl fmt::Display for CompileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// Format a number without trailing zeros
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn parse_numeric_string(s: &str) -> Option<f64> {
    #[cfg(test)]
    tests::count_parse();

    let (_, number) = regex_captures!(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)\s*$", s)?;
    number.parse().ok()
}

fn parse_percentage_string(s: &str) -> Option<f64> {
    #[cfg(test)]
    tests::count_parse();

    let (_, number) = regex_captures!(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+))\s*%\s*$", s)?;
    number.parse::<f64>().ok().map(|n| n / 100.0)
}

/// OLE automation date conversions (serial days since 1899-12-30)
pub mod oa_date {
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    const MILLIS_PER_DAY: f64 = 86_400_000.0;

    /// Day zero of the serial date system
    pub fn epoch() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1899, 12, 30)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default()
    }

    pub fn to_serial(dt: NaiveDateTime) -> f64 {
        (dt - epoch()).num_milliseconds() as f64 / MILLIS_PER_DAY
    }

    pub fn from_serial(serial: f64) -> Option<NaiveDateTime> {
        if !serial.is_finite() {
            return None;
        }
        let millis = (serial * MILLIS_PER_DAY).round() as i64;
        epoch().checked_add_signed(Duration::milliseconds(millis))
    }

    pub fn duration_to_serial(span: Duration) -> f64 {
        span.num_milliseconds() as f64 / MILLIS_PER_DAY
    }
}
