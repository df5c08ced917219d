//! Formula tokenizer
//!
//! Turns formula text into a flat list of classified [`Token`]s. Nesting is
//! only checked for balance here; structure is recovered by the
//! [`ExpressionGraphBuilder`](crate::builder::ExpressionGraphBuilder).

mod token;

pub use token::{Token, TokenType};

use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::CellError;
use lazy_regex::regex_is_match;

const ERROR_LITERALS: [&str; 8] = [
    "#NULL!", "#DIV/0!", "#VALUE!", "#REF!", "#NAME?", "#NUM!", "#N/A", "#CALC!",
];

/// Tokenize a formula; the leading `=` is optional
///
/// # Example
/// ```rust
/// use gridcalc_formula::tokenizer::{tokenize, TokenType};
///
/// let tokens = tokenize("=SUM(A1:B2)").unwrap();
/// assert!(tokens[0].is(TokenType::FUNCTION));
/// assert_eq!(tokens[2].value, "A1:B2");
/// ```
pub fn tokenize(formula: &str) -> FormulaResult<Vec<Token>> {
    let formula = formula.trim();
    let formula = formula.strip_prefix('=').unwrap_or(formula);

    let mut tokenizer = Tokenizer::new(formula);
    tokenizer.run()?;
    let mut tokens = tokenizer.tokens;
    mark_range_offsets(&mut tokens);

    log::trace!("tokenized '{}' into {} tokens", formula, tokens.len());
    Ok(tokens)
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    brackets: Vec<char>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tokens: Vec::new(),
            brackets: Vec::new(),
        }
    }

    fn run(&mut self) -> FormulaResult<()> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek_char() else { break };

            match c {
                '"' => self.scan_string()?,
                '\'' => self.scan_quoted_sheet()?,
                '(' => self.open_bracket('(', TokenType::OPENING_PARENTHESIS),
                '{' => self.open_bracket('{', TokenType::OPENING_ENUMERABLE),
                ')' => self.close_bracket('(', ')', TokenType::CLOSING_PARENTHESIS)?,
                '}' => self.close_bracket('{', '}', TokenType::CLOSING_ENUMERABLE)?,
                ',' => self.push_char(TokenType::COMMA),
                ';' => self.push_char(TokenType::SEMICOLON),
                ':' => self.push_char(TokenType::COLON),
                '%' => self.push_char(TokenType::PERCENT),
                '+' => {
                    if self.in_unary_position() {
                        self.advance();
                    } else {
                        self.push_char(TokenType::OPERATOR);
                    }
                }
                '-' => {
                    if self.in_unary_position() {
                        self.push_char(TokenType::NEGATOR);
                    } else {
                        self.push_char(TokenType::OPERATOR);
                    }
                }
                '*' | '/' | '^' | '&' | '=' => self.push_char(TokenType::OPERATOR),
                '<' => match self.peek_char_at(1) {
                    Some('=') | Some('>') => self.push_chars(2, TokenType::OPERATOR),
                    _ => self.push_char(TokenType::OPERATOR),
                },
                '>' => match self.peek_char_at(1) {
                    Some('=') => self.push_chars(2, TokenType::OPERATOR),
                    _ => self.push_char(TokenType::OPERATOR),
                },
                '#' => self.scan_error()?,
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_char_at(1).map_or(false, |n| n.is_ascii_digit())) =>
                {
                    self.scan_number()
                }
                c if c.is_alphabetic() || c == '_' || c == '$' || c == '\\' => {
                    self.scan_identifier()?
                }
                other => {
                    return Err(FormulaError::Parse(format!(
                        "unexpected character '{}' at position {}",
                        other, self.pos
                    )))
                }
            }
        }

        match self.brackets.last() {
            Some(open) => Err(FormulaError::Parse(format!("unclosed '{}'", open))),
            None => Ok(()),
        }
    }

    fn in_unary_position(&self) -> bool {
        self.tokens.last().map_or(true, Token::allows_unary)
    }

    fn open_bracket(&mut self, c: char, token_type: TokenType) {
        self.brackets.push(c);
        self.push_char(token_type);
    }

    fn close_bracket(&mut self, open: char, close: char, token_type: TokenType) -> FormulaResult<()> {
        if self.brackets.pop() != Some(open) {
            return Err(FormulaError::Parse(format!(
                "unbalanced '{}' at position {}",
                close, self.pos
            )));
        }
        self.push_char(token_type);
        Ok(())
    }

    fn push_char(&mut self, token_type: TokenType) {
        self.push_chars(1, token_type);
    }

    fn push_chars(&mut self, count: usize, token_type: TokenType) {
        let start = self.pos;
        for _ in 0..count {
            self.advance();
        }
        let value = &self.input[start..self.pos];
        self.tokens.push(Token::new(value, token_type));
    }

    fn scan_string(&mut self) -> FormulaResult<()> {
        self.push_char(TokenType::STRING);

        let mut content = String::new();
        loop {
            match self.peek_char() {
                None => return Err(FormulaError::Parse("unterminated string literal".into())),
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    content.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => break,
                Some(c) => {
                    content.push(c);
                    self.advance();
                }
            }
        }

        self.tokens.push(Token::new(content, TokenType::STRING_CONTENT));
        self.push_char(TokenType::STRING);
        Ok(())
    }

    /// `'My Sheet'!` prefix; the quotes stay in the token value
    fn scan_quoted_sheet(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        self.advance();
        loop {
            match self.peek_char() {
                None => return Err(FormulaError::Parse("unterminated sheet name".into())),
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(_) => self.advance(),
            }
        }

        if self.peek_char() != Some('!') {
            return Err(FormulaError::Parse(format!(
                "quoted name {} is not followed by '!'",
                &self.input[start..self.pos]
            )));
        }
        let name = &self.input[start..self.pos];
        self.tokens.push(Token::new(name, TokenType::WORKSHEET_NAME));
        self.push_char(TokenType::WORKSHEET_NAME_DELIMITER);
        Ok(())
    }

    fn scan_error(&mut self) -> FormulaResult<()> {
        let rest = &self.input[self.pos..];
        let literal = ERROR_LITERALS
            .iter()
            .find(|lit| rest.get(..lit.len()).map_or(false, |s| s.eq_ignore_ascii_case(lit)))
            .ok_or_else(|| FormulaError::Parse(format!("unknown error literal at '{}'", rest)))?;

        self.pos += literal.len();
        let value = CellError::parse(literal).map_or(*literal, |e| e.as_str());
        self.tokens.push(Token::new(value, TokenType::EXCEL_ERROR));
        Ok(())
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        let mut is_decimal = false;

        self.skip_digits();
        if self.peek_char() == Some('.') {
            is_decimal = true;
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_char_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_char_at(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                is_decimal = true;
                for _ in 0..digit_at {
                    self.advance();
                }
                self.skip_digits();
            }
        }

        let text = &self.input[start..self.pos];

        // whole-row range such as 1:3
        if !is_decimal && self.peek_char() == Some(':') {
            let second = self.peek_identifier_after_colon();
            if regex_is_match!(r"^\$?[0-9]+$", second) && !self.followed_by_paren(1 + second.len())
            {
                let end = self.pos + 1 + second.len();
                let address = &self.input[start..end];
                self.pos = end;
                self.tokens.push(Token::new(address, TokenType::EXCEL_ADDRESS));
                return;
            }
        }

        let token_type = if is_decimal {
            TokenType::DECIMAL
        } else {
            TokenType::INTEGER
        };
        self.tokens.push(Token::new(text, token_type));
    }

    fn scan_identifier(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        while self.peek_char().map_or(false, is_identifier_char) {
            self.advance();
        }
        let text = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.tokens.push(Token::new(text, TokenType::WORKSHEET_NAME));
            self.push_char(TokenType::WORKSHEET_NAME_DELIMITER);
            return Ok(());
        }

        if self.peek_char() == Some('(') {
            self.tokens.push(Token::new(text, TokenType::FUNCTION));
            return Ok(());
        }

        if text.eq_ignore_ascii_case("TRUE") || text.eq_ignore_ascii_case("FALSE") {
            self.tokens.push(Token::new(text.to_uppercase(), TokenType::BOOLEAN));
            return Ok(());
        }

        let kind = address_kind(text);
        if kind != AddressKind::None && self.peek_char() == Some(':') {
            let second = self.peek_identifier_after_colon();
            if address_kind(second) == kind && !self.followed_by_paren(1 + second.len()) {
                let end = self.pos + 1 + second.len();
                let address = &self.input[start..end];
                self.pos = end;
                self.tokens.push(Token::new(address, TokenType::EXCEL_ADDRESS));
                return Ok(());
            }
        }

        let token_type = if kind == AddressKind::Cell {
            TokenType::EXCEL_ADDRESS
        } else {
            TokenType::NAME_VALUE
        };
        self.tokens.push(Token::new(text, token_type));
        Ok(())
    }

    /// Identifier text directly after a `:` at the cursor, not consumed
    fn peek_identifier_after_colon(&self) -> &'a str {
        let rest = &self.input[self.pos + 1..];
        let len = rest
            .char_indices()
            .find(|(_, c)| !is_identifier_char(*c))
            .map_or(rest.len(), |(i, _)| i);
        &rest[..len]
    }

    fn followed_by_paren(&self, offset: usize) -> bool {
        self.input
            .get(self.pos + offset..)
            .map_or(false, |rest| rest.starts_with('('))
    }

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.' || c == '\\'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressKind {
    None,
    Cell,
    Column,
    Row,
}

fn address_kind(text: &str) -> AddressKind {
    if regex_is_match!(r"^\$?[A-Za-z]{1,3}\$?[0-9]{1,7}$", text) {
        AddressKind::Cell
    } else if regex_is_match!(r"^\$?[A-Za-z]{1,3}$", text) {
        AddressKind::Column
    } else if regex_is_match!(r"^\$?[0-9]{1,7}$", text) {
        AddressKind::Row
    } else {
        AddressKind::None
    }
}

/// Flag the operands of a free-standing `:` with `RANGE_OFFSET`
///
/// Each side must be an address or a function call (the function token is
/// flagged, not its closing parenthesis). Colons with other neighbours are
/// left alone.
fn mark_range_offsets(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        if !tokens[i].is(TokenType::COLON) || i == 0 {
            continue;
        }
        let (Some(left), Some(right)) = (range_operand_before(tokens, i), range_operand_after(tokens, i))
        else {
            continue;
        };
        tokens[left].token_type |= TokenType::RANGE_OFFSET;
        tokens[right].token_type |= TokenType::RANGE_OFFSET;
    }
}

fn range_operand_before(tokens: &[Token], colon: usize) -> Option<usize> {
    let prev = colon.checked_sub(1)?;
    let token = &tokens[prev];
    if token.is(TokenType::EXCEL_ADDRESS) {
        return Some(prev);
    }
    if !token.is(TokenType::CLOSING_PARENTHESIS) {
        return None;
    }

    let mut depth = 0usize;
    for j in (0..=prev).rev() {
        if tokens[j].is(TokenType::CLOSING_PARENTHESIS) {
            depth += 1;
        } else if tokens[j].is(TokenType::OPENING_PARENTHESIS) {
            depth -= 1;
            if depth == 0 {
                let function = j.checked_sub(1)?;
                return tokens[function].is(TokenType::FUNCTION).then_some(function);
            }
        }
    }
    None
}

fn range_operand_after(tokens: &[Token], colon: usize) -> Option<usize> {
    let mut next = colon + 1;
    if tokens.get(next)?.is(TokenType::WORKSHEET_NAME) {
        next += 2;
    }
    let token = tokens.get(next)?;
    token
        .is_any(TokenType::EXCEL_ADDRESS | TokenType::FUNCTION)
        .then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn types(formula: &str) -> Vec<TokenType> {
        tokenize(formula).unwrap().into_iter().map(|t| t.token_type).collect()
    }

    fn values(formula: &str) -> Vec<String> {
        tokenize(formula).unwrap().into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn test_tokenize_arithmetic() {
        assert_eq!(values("=1+2*3"), vec!["1", "+", "2", "*", "3"]);
        assert_eq!(
            types("1.5<=2"),
            vec![TokenType::DECIMAL, TokenType::OPERATOR, TokenType::INTEGER]
        );
        assert_eq!(values("1<>2"), vec!["1", "<>", "2"]);
    }

    #[test]
    fn test_tokenize_negator() {
        assert_eq!(
            types("--5"),
            vec![TokenType::NEGATOR, TokenType::NEGATOR, TokenType::INTEGER]
        );
        assert_eq!(
            types("2-3"),
            vec![TokenType::INTEGER, TokenType::OPERATOR, TokenType::INTEGER]
        );
        assert_eq!(
            types("2*-3"),
            vec![
                TokenType::INTEGER,
                TokenType::OPERATOR,
                TokenType::NEGATOR,
                TokenType::INTEGER
            ]
        );
        assert_eq!(values("+5"), vec!["5"]);
    }

    #[test]
    fn test_tokenize_string() {
        let tokens = tokenize(r#""say ""hi""""#).unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(tokens[0].is(TokenType::STRING));
        assert_eq!(tokens[1].value, "say \"hi\"");
        assert!(tokens[1].is(TokenType::STRING_CONTENT));
        assert!(tokenize("\"open").is_err());
    }

    #[test]
    fn test_tokenize_addresses() {
        assert_eq!(values("A1:B2+$C$3"), vec!["A1:B2", "+", "$C$3"]);
        assert_eq!(types("A:C"), vec![TokenType::EXCEL_ADDRESS]);
        assert_eq!(types("1:3"), vec![TokenType::EXCEL_ADDRESS]);
        assert_eq!(types("Rate"), vec![TokenType::NAME_VALUE]);
    }

    #[test]
    fn test_tokenize_worksheet() {
        assert_eq!(
            types("Sheet1!A1"),
            vec![
                TokenType::WORKSHEET_NAME,
                TokenType::WORKSHEET_NAME_DELIMITER,
                TokenType::EXCEL_ADDRESS
            ]
        );
        assert_eq!(values("'My Sheet'!B2"), vec!["'My Sheet'", "!", "B2"]);
    }

    #[test]
    fn test_tokenize_function_and_literals() {
        let tokens = tokenize("IF(TRUE,#N/A,x)").unwrap();
        assert!(tokens[0].is(TokenType::FUNCTION));
        assert!(tokens[2].is(TokenType::BOOLEAN));
        assert_eq!(tokens[4].value, "#N/A");
        assert!(tokens[4].is(TokenType::EXCEL_ERROR));
        assert!(tokens[6].is(TokenType::NAME_VALUE));
        assert!(tokenize("#BOGUS").is_err());
    }

    #[test]
    fn test_tokenize_unbalanced() {
        assert!(tokenize("(1+2").is_err());
        assert!(tokenize("1+2)").is_err());
        assert!(tokenize("{1,2)").is_err());
    }

    #[test]
    fn test_range_offset_marking() {
        let tokens = tokenize("SUM(OFFSET(A1,1,0):A5)").unwrap();
        let offset = &tokens[2];
        assert_eq!(offset.value, "OFFSET");
        assert!(offset.is(TokenType::FUNCTION | TokenType::RANGE_OFFSET));

        let colon = tokens.iter().position(|t| t.is(TokenType::COLON)).unwrap();
        assert!(tokens[colon + 1].is(TokenType::EXCEL_ADDRESS | TokenType::RANGE_OFFSET));
        assert!(!tokens[4].is(TokenType::RANGE_OFFSET));
    }
}
