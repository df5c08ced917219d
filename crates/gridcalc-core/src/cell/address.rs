//! Cell address and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "$B$2")
///
/// Rows and columns are 0-based internally. The `$` markers are kept so an
/// address can be printed back the way it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create an absolute cell address ($A$1 style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: true,
            col_absolute: true,
        }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use gridcalc_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert_eq!(addr.row, 1);
    /// assert_eq!(addr.col, 1);
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let (col_absolute, rest) = strip_dollar(s);
        let letters = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if letters == 0 {
            return Err(Error::InvalidAddress(format!(
                "no column letters in '{}'",
                s
            )));
        }
        let col = Self::letters_to_column(&rest[..letters])?;

        let (row_absolute, digits) = strip_dollar(&rest[letters..]);
        let row = parse_row_number(digits, s)?;

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u16) -> String {
        let mut result = String::new();
        let mut n = col as u32 + 1;

        while n > 0 {
            n -= 1;
            let c = ((n % 26) as u8 + b'A') as char;
            result.insert(0, c);
            n /= 26;
        }

        result
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > MAX_COLS as u32 {
                return Err(Error::ColumnOutOfBounds(col - 1, MAX_COLS - 1));
            }
        }

        Ok((col - 1) as u16)
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();

        if self.col_absolute {
            result.push('$');
        }
        result.push_str(&Self::column_to_letters(self.col));

        if self.row_absolute {
            result.push('$');
        }
        result.push_str(&(self.row + 1).to_string());

        result
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn strip_dollar(s: &str) -> (bool, &str) {
    match s.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s),
    }
}

fn parse_row_number(digits: &str, original: &str) -> Result<u32> {
    if digits.is_empty() {
        return Err(Error::InvalidAddress(format!(
            "no row number in '{}'",
            original
        )));
    }
    let row: u32 = digits
        .parse()
        .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", original)))?;
    if row == 0 {
        return Err(Error::InvalidAddress(format!(
            "row number must be >= 1 in '{}'",
            original
        )));
    }
    if row > MAX_ROWS {
        return Err(Error::RowOutOfBounds(row - 1, MAX_ROWS - 1));
    }
    Ok(row - 1)
}

/// A rectangular range of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range, normalized so `start` is the top-left corner
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (start_row, end_row) = (start.row.min(end.row), start.row.max(end.row));
        let (start_col, end_col) = (start.col.min(end.col), start.col.max(end.col));

        Self {
            start: CellAddress {
                row: start_row,
                col: start_col,
                ..start
            },
            end: CellAddress {
                row: end_row,
                col: end_col,
                ..end
            },
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from `A1:B10`, `A:C` (whole columns) or `2:5` (whole rows)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        let Some((left, right)) = s.split_once(':') else {
            return Ok(Self::single(CellAddress::parse(s)?));
        };

        let bare = |part: &str| part.trim_start_matches('$').to_string();
        let (l, r) = (bare(left), bare(right));

        if is_all(&l, |c| c.is_ascii_alphabetic()) && is_all(&r, |c| c.is_ascii_alphabetic()) {
            let start_col = CellAddress::letters_to_column(&l)?;
            let end_col = CellAddress::letters_to_column(&r)?;
            return Ok(Self::from_indices(0, start_col, MAX_ROWS - 1, end_col));
        }

        if is_all(&l, |c| c.is_ascii_digit()) && is_all(&r, |c| c.is_ascii_digit()) {
            let start_row = parse_row_number(&l, s)?;
            let end_row = parse_row_number(&r, s)?;
            return Ok(Self::from_indices(start_row, 0, end_row, MAX_COLS - 1));
        }

        let start = CellAddress::parse(left)?;
        let end = CellAddress::parse(right)?;
        Ok(Self::new(start, end))
    }

    /// Check if a cell is within this range
    pub fn contains(&self, row: u32, col: u16) -> bool {
        row >= self.start.row && row <= self.end.row && col >= self.start.col && col <= self.end.col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// True when the range covers exactly one cell
    pub fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Smallest range covering both `self` and `other`
    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange::from_indices(
            self.start.row.min(other.start.row),
            self.start.col.min(other.start.col),
            self.end.row.max(other.end.row),
            self.end.col.max(other.end.col),
        )
    }

    /// Shift the range by `rows`/`cols` and resize it to `height` x `width`
    ///
    /// Fails when the result leaves the grid.
    pub fn offset(&self, rows: i64, cols: i64, height: i64, width: i64) -> Result<CellRange> {
        if height < 1 || width < 1 {
            return Err(Error::InvalidRange(format!(
                "offset size {}x{} is not positive",
                height, width
            )));
        }
        let start_row = (self.start.row as i64).checked_add(rows);
        let end_row = start_row.and_then(|r| r.checked_add(height - 1));
        let (start_row, end_row) = match (start_row, end_row) {
            (Some(start), Some(end)) if start >= 0 && end < MAX_ROWS as i64 => (start, end),
            (start, end) => {
                let row = start.max(end).map_or(u32::MAX, |r| r.clamp(0, u32::MAX as i64) as u32);
                return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
            }
        };

        let start_col = (self.start.col as i64).checked_add(cols);
        let end_col = start_col.and_then(|c| c.checked_add(width - 1));
        let (start_col, end_col) = match (start_col, end_col) {
            (Some(start), Some(end)) if start >= 0 && end < MAX_COLS as i64 => (start, end),
            (start, end) => {
                let col = start.max(end).map_or(u32::MAX, |c| c.clamp(0, u32::MAX as i64) as u32);
                return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
            }
        };

        Ok(CellRange::from_indices(
            start_row as u32,
            start_col as u16,
            end_row as u32,
            end_col as u16,
        ))
    }

    /// Iterate over all cell addresses in the range (row by row)
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

fn is_all(s: &str, pred: impl Fn(char) -> bool) -> bool {
    !s.is_empty() && s.chars().all(pred)
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator over cells in a range
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u16,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row > self.range.end.row {
            return None;
        }

        let addr = CellAddress::new(self.current_row, self.current_col);

        if self.current_col == self.range.end.col {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        } else {
            self.current_col += 1;
        }

        Some(addr)
    }
}

/// A range optionally qualified by a worksheet name (`'My Sheet'!A1:B2`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeAddress {
    /// Worksheet name without quotes; `None` means "the sheet being evaluated"
    pub worksheet: Option<String>,
    /// The cells covered
    pub range: CellRange,
}

impl RangeAddress {
    /// Create a new qualified range
    pub fn new(worksheet: Option<String>, range: CellRange) -> Self {
        Self { worksheet, range }
    }

    /// Parse an address with an optional `Sheet!` or `'Quoted Sheet'!` prefix
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.rfind('!') {
            Some(pos) => {
                let sheet = unquote_sheet_name(&s[..pos]);
                if sheet.is_empty() {
                    return Err(Error::InvalidRange(format!("empty worksheet name in '{}'", s)));
                }
                Ok(Self {
                    worksheet: Some(sheet),
                    range: CellRange::parse(&s[pos + 1..])?,
                })
            }
            None => Ok(Self {
                worksheet: None,
                range: CellRange::parse(s)?,
            }),
        }
    }

    /// Worksheet this address points at, falling back to `current`
    pub fn worksheet_or<'a>(&'a self, current: &'a str) -> &'a str {
        self.worksheet.as_deref().unwrap_or(current)
    }

    /// Format with the worksheet prefix, quoting names that need it
    pub fn to_qualified_string(&self) -> String {
        match &self.worksheet {
            Some(sheet) => format!("{}!{}", quote_sheet_name(sheet), self.range),
            None => self.range.to_string(),
        }
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_qualified_string())
    }
}

impl FromStr for RangeAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn unquote_sheet_name(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => raw.to_string(),
    }
}

fn quote_sheet_name(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}
