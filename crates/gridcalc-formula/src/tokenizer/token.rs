//! Token types

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Classification of a token
    ///
    /// A set rather than a plain enum: the colon pass adds `RANGE_OFFSET`
    /// on top of an address or function token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TokenType: u32 {
        const OPERATOR = 1 << 0;
        const FUNCTION = 1 << 1;
        const OPENING_PARENTHESIS = 1 << 2;
        const CLOSING_PARENTHESIS = 1 << 3;
        const OPENING_ENUMERABLE = 1 << 4;
        const CLOSING_ENUMERABLE = 1 << 5;
        const COMMA = 1 << 6;
        const SEMICOLON = 1 << 7;
        const EXCEL_ADDRESS = 1 << 8;
        const RANGE_OFFSET = 1 << 9;
        const WORKSHEET_NAME = 1 << 10;
        const WORKSHEET_NAME_DELIMITER = 1 << 11;
        const NEGATOR = 1 << 12;
        const PERCENT = 1 << 13;
        const STRING = 1 << 14;
        const STRING_CONTENT = 1 << 15;
        const COLON = 1 << 16;
        const INTEGER = 1 << 17;
        const DECIMAL = 1 << 18;
        const BOOLEAN = 1 << 19;
        const EXCEL_ERROR = 1 << 20;
        const NAME_VALUE = 1 << 21;
    }
}

/// A classified lexical unit of a formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
}

impl Token {
    pub fn new(value: impl Into<String>, token_type: TokenType) -> Self {
        Self {
            value: value.into(),
            token_type,
        }
    }

    /// True when every flag in `flags` is set
    pub fn is(&self, flags: TokenType) -> bool {
        self.token_type.contains(flags)
    }

    /// True when any flag in `flags` is set
    pub fn is_any(&self, flags: TokenType) -> bool {
        self.token_type.intersects(flags)
    }

    pub fn with_flag(mut self, flag: TokenType) -> Self {
        self.token_type |= flag;
        self
    }

    /// Token that can start an operand after an operator or separator
    pub(crate) fn allows_unary(&self) -> bool {
        self.is_any(
            TokenType::OPERATOR
                | TokenType::NEGATOR
                | TokenType::OPENING_PARENTHESIS
                | TokenType::OPENING_ENUMERABLE
                | TokenType::COMMA
                | TokenType::SEMICOLON
                | TokenType::COLON,
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
