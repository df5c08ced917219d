//! Token to node, and compiled result back to node

use super::{AddressExpression, ExpressionKind};
use crate::compile_result::{CompileResult, DataType, ResultValue};
use crate::error::{FormulaError, FormulaResult};
use crate::tokenizer::{Token, TokenType};
use gridcalc_core::CellError;

/// Creates leaf expressions from tokens
pub struct ExpressionFactory;

impl ExpressionFactory {
    pub fn create(token: &Token) -> FormulaResult<ExpressionKind> {
        let value = token.value.as_str();
        let t = token.token_type;

        if t.contains(TokenType::FUNCTION) {
            Ok(ExpressionKind::Function(value.to_string()))
        } else if t.contains(TokenType::EXCEL_ADDRESS) {
            Ok(ExpressionKind::ExcelAddress(AddressExpression::new(value)))
        } else if t.contains(TokenType::INTEGER) {
            parse_literal(value).map(ExpressionKind::Integer)
        } else if t.contains(TokenType::DECIMAL) {
            parse_literal(value).map(ExpressionKind::Decimal)
        } else if t.contains(TokenType::STRING_CONTENT) {
            Ok(ExpressionKind::Str(value.to_string()))
        } else if t.contains(TokenType::BOOLEAN) {
            Ok(ExpressionKind::Boolean(value.eq_ignore_ascii_case("TRUE")))
        } else if t.contains(TokenType::EXCEL_ERROR) {
            CellError::parse(value)
                .map(ExpressionKind::ExcelError)
                .ok_or_else(|| FormulaError::Parse(format!("unknown error literal '{}'", value)))
        } else if t.contains(TokenType::NAME_VALUE) {
            Ok(ExpressionKind::NamedValue {
                name: value.to_string(),
                resolve_as_range: false,
            })
        } else {
            Err(FormulaError::Parse(format!(
                "token '{}' ({:?}) does not start an expression",
                value, t
            )))
        }
    }
}

fn parse_literal(value: &str) -> FormulaResult<f64> {
    value
        .parse()
        .map_err(|_| FormulaError::Parse(format!("invalid number '{}'", value)))
}

/// Turns a compiled result back into a leaf so it can rejoin a chain
pub struct ExpressionConverter;

impl ExpressionConverter {
    /// `None` for an empty result
    pub fn from_compile_result(result: &CompileResult) -> Option<ExpressionKind> {
        let kind = match &result.value {
            ResultValue::Empty => return None,
            ResultValue::Number(n) if result.data_type == DataType::Integer => {
                ExpressionKind::Integer(*n)
            }
            ResultValue::Number(n) => ExpressionKind::Decimal(*n),
            ResultValue::Text(s) => ExpressionKind::Str(s.clone()),
            ResultValue::Boolean(b) => ExpressionKind::Boolean(*b),
            ResultValue::Error(e) => ExpressionKind::ExcelError(*e),
            ResultValue::Range(_) | ResultValue::Array(_) => {
                ExpressionKind::ExcelRange(result.clone())
            }
            ResultValue::Date(_) | ResultValue::Time(_) => ExpressionKind::Constant(result.clone()),
        };
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_from_tokens() {
        let kind = ExpressionFactory::create(&Token::new("42", TokenType::INTEGER)).unwrap();
        assert_eq!(kind, ExpressionKind::Integer(42.0));

        let kind = ExpressionFactory::create(&Token::new("true", TokenType::BOOLEAN)).unwrap();
        assert_eq!(kind, ExpressionKind::Boolean(true));

        let token = Token::new("A1", TokenType::EXCEL_ADDRESS | TokenType::RANGE_OFFSET);
        assert!(matches!(
            ExpressionFactory::create(&token).unwrap(),
            ExpressionKind::ExcelAddress(_)
        ));

        assert!(ExpressionFactory::create(&Token::new(",", TokenType::COMMA)).is_err());
    }

    #[test]
    fn test_convert_results() {
        assert_eq!(
            ExpressionConverter::from_compile_result(&CompileResult::integer(3.0)),
            Some(ExpressionKind::Integer(3.0))
        );
        assert_eq!(
            ExpressionConverter::from_compile_result(&CompileResult::string("x")),
            Some(ExpressionKind::Str("x".into()))
        );
        assert_eq!(ExpressionConverter::from_compile_result(&CompileResult::EMPTY), None);
    }
}
