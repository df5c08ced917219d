//! Builds an [`ExpressionGraph`] from a token stream

use crate::config::ParsingConfiguration;
use crate::error::{FormulaError, FormulaResult};
use crate::expression::{ExprId, ExpressionFactory, ExpressionGraph, ExpressionKind};
use crate::operators::Operator;
use crate::tokenizer::{Token, TokenType};
use gridcalc_core::CellError;

/// Mutable cursor state of one `build` call
#[derive(Debug, Default)]
struct BuilderState {
    token_index: usize,
    negate_next: bool,
    /// First half of a colon-joined range operand pair
    range_offset: Option<PendingRangeOffset>,
    depth: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingRangeOffset {
    id: ExprId,
    negate: bool,
}

/// Recursive-descent builder over a flat token list
///
/// Groups, array constants and function calls recurse; the matching closing
/// token returns from the nested call.
#[derive(Debug, Clone)]
pub struct ExpressionGraphBuilder {
    max_depth: usize,
}

impl ExpressionGraphBuilder {
    pub fn new(config: &ParsingConfiguration) -> Self {
        Self {
            max_depth: config.max_recursion_depth,
        }
    }

    pub fn build(&self, tokens: &[Token]) -> FormulaResult<ExpressionGraph> {
        let mut graph = ExpressionGraph::new();
        let mut state = BuilderState::default();

        self.build_up(&mut graph, tokens, &mut state, None)?;

        if state.range_offset.is_some() {
            return Err(FormulaError::Parse(
                "invalid formula syntax: range operand missing its pair".into(),
            ));
        }
        log::trace!(
            "built expression graph with {} top-level expressions",
            graph.expressions().len()
        );
        Ok(graph)
    }

    fn build_up(
        &self,
        graph: &mut ExpressionGraph,
        tokens: &[Token],
        state: &mut BuilderState,
        parent: Option<ExprId>,
    ) -> FormulaResult<()> {
        state.depth += 1;
        if state.depth > self.max_depth {
            return Err(FormulaError::Parse(format!(
                "formula nesting exceeds {} levels",
                self.max_depth
            )));
        }
        let result = self.build_scope(graph, tokens, state, parent);
        state.depth -= 1;
        result
    }

    fn build_scope(
        &self,
        graph: &mut ExpressionGraph,
        tokens: &[Token],
        state: &mut BuilderState,
        parent: Option<ExprId>,
    ) -> FormulaResult<()> {
        while let Some(token) = tokens.get(state.token_index) {
            state.token_index += 1;
            let t = token.token_type;

            if t.contains(TokenType::OPERATOR) {
                let operator = Operator::lookup(&token.value).ok_or_else(|| {
                    FormulaError::Parse(format!("unknown operator '{}'", token.value))
                })?;
                set_operator(graph, parent, operator)?;
            } else if t.contains(TokenType::PERCENT) {
                set_operator(graph, parent, Operator::percent())?;
                let id = graph.create(ExpressionKind::Decimal(0.01), "0.01");
                add_to_scope(graph, parent, id);
            } else if t.intersects(TokenType::STRING | TokenType::COLON)
                && !t.contains(TokenType::STRING_CONTENT)
            {
                continue;
            } else if t.contains(TokenType::NEGATOR) {
                state.negate_next = !state.negate_next;
            } else if t.contains(TokenType::WORKSHEET_NAME) {
                let merged = merge_worksheet_address(tokens, state, token)?;
                self.add_token_expression(graph, tokens, state, parent, &merged)?;
            } else if t.contains(TokenType::OPENING_PARENTHESIS) {
                self.open_scope(graph, tokens, state, parent, ExpressionKind::Group, "(")?;
            } else if t.contains(TokenType::OPENING_ENUMERABLE) {
                let kind = ExpressionKind::Enumerable { row_breaks: Vec::new() };
                self.open_scope(graph, tokens, state, parent, kind, "{")?;
            } else if t.intersects(TokenType::CLOSING_PARENTHESIS | TokenType::CLOSING_ENUMERABLE) {
                if parent.is_none() {
                    return Err(FormulaError::Parse(format!("unexpected '{}'", token.value)));
                }
                return Ok(());
            } else if t.intersects(TokenType::COMMA | TokenType::SEMICOLON) {
                prepare_for_next_child(graph, parent, t)?;
            } else {
                self.add_token_expression(graph, tokens, state, parent, token)?;
            }
        }
        Ok(())
    }

    fn open_scope(
        &self,
        graph: &mut ExpressionGraph,
        tokens: &[Token],
        state: &mut BuilderState,
        parent: Option<ExprId>,
        kind: ExpressionKind,
        text: &str,
    ) -> FormulaResult<()> {
        let negate = std::mem::take(&mut state.negate_next);
        let id = graph.create(kind, text);
        graph.node_mut(id).negate = negate;
        add_to_scope(graph, parent, id);
        self.build_up(graph, tokens, state, Some(id))
    }

    fn add_token_expression(
        &self,
        graph: &mut ExpressionGraph,
        tokens: &[Token],
        state: &mut BuilderState,
        parent: Option<ExprId>,
        token: &Token,
    ) -> FormulaResult<()> {
        let kind = ExpressionFactory::create(token)?;
        let negate = std::mem::take(&mut state.negate_next);
        let id = graph.create(kind, token.value.clone());

        if token.is(TokenType::FUNCTION) {
            let argument = graph.create(ExpressionKind::FunctionArgument, "");
            graph.add_child(id, argument);

            match tokens.get(state.token_index) {
                Some(next) if next.is(TokenType::OPENING_PARENTHESIS) => state.token_index += 1,
                _ => {
                    log::debug!(
                        "invalid formula syntax, function call {} missing parenthesis",
                        token.value
                    );
                    return Err(FormulaError::Excel(CellError::Value));
                }
            }
            self.build_up(graph, tokens, state, Some(id))?;
        }

        if token.is(TokenType::RANGE_OFFSET) {
            match state.range_offset.take() {
                None => state.range_offset = Some(PendingRangeOffset { id, negate }),
                Some(first) => {
                    let composite = combine_range_operands(graph, first.id, id);
                    graph.node_mut(composite).negate = first.negate;
                    add_to_scope(graph, parent, composite);
                }
            }
            return Ok(());
        }

        graph.node_mut(id).negate = negate;
        add_to_scope(graph, parent, id);
        Ok(())
    }
}

fn combine_range_operands(graph: &mut ExpressionGraph, first: ExprId, second: ExprId) -> ExprId {
    let is_operand = |kind: &ExpressionKind| {
        matches!(kind, ExpressionKind::ExcelAddress(_)) || kind.is_offset_function()
    };
    let (a, b) = (graph.kind(first), graph.kind(second));
    let kind = if is_operand(a) && is_operand(b) && (a.is_offset_function() || b.is_offset_function()) {
        ExpressionKind::RangeOffset {
            start: first,
            end: second,
        }
    } else {
        ExpressionKind::Colon {
            left: first,
            right: second,
        }
    };
    graph.create(kind, "")
}

/// Concatenate `Sheet`, `!` and the following address into one token
fn merge_worksheet_address(
    tokens: &[Token],
    state: &mut BuilderState,
    sheet: &Token,
) -> FormulaResult<Token> {
    let delimiter = tokens.get(state.token_index);
    let target = tokens.get(state.token_index + 1);
    let (Some(delimiter), Some(target)) = (delimiter, target) else {
        return Err(FormulaError::Parse(format!(
            "worksheet {} is not followed by a reference",
            sheet.value
        )));
    };
    if !delimiter.is(TokenType::WORKSHEET_NAME_DELIMITER) {
        return Err(FormulaError::Parse(format!(
            "expected '!' after worksheet {}",
            sheet.value
        )));
    }
    state.token_index += 2;

    if target.is_any(TokenType::EXCEL_ADDRESS | TokenType::NAME_VALUE) {
        let value = format!("{}!{}", sheet.value, target.value);
        Ok(Token::new(value, target.token_type))
    } else if target.is(TokenType::EXCEL_ERROR) {
        Ok(target.clone())
    } else {
        Err(FormulaError::Parse(format!(
            "'{}' is not a reference on worksheet {}",
            target.value, sheet.value
        )))
    }
}

/// Last expression of the current scope; inside a call, of its last argument
fn last_in_scope(graph: &ExpressionGraph, parent: Option<ExprId>) -> Option<ExprId> {
    match parent {
        None => graph.current(),
        Some(p) => {
            let scope = scope_node(graph, p);
            graph.children(scope).last().copied()
        }
    }
}

fn scope_node(graph: &ExpressionGraph, parent: ExprId) -> ExprId {
    match graph.kind(parent) {
        ExpressionKind::Function(_) => graph.children(parent).last().copied().unwrap_or(parent),
        _ => parent,
    }
}

fn add_to_scope(graph: &mut ExpressionGraph, parent: Option<ExprId>, id: ExprId) {
    match parent {
        None => graph.add(id),
        Some(p) => {
            let scope = scope_node(graph, p);
            graph.add_child(scope, id);
        }
    }
}

fn set_operator(
    graph: &mut ExpressionGraph,
    parent: Option<ExprId>,
    operator: Operator,
) -> FormulaResult<()> {
    let target = last_in_scope(graph, parent).ok_or_else(|| {
        FormulaError::Parse(format!(
            "invalid formula syntax: operator '{}' missing left operand",
            operator
        ))
    })?;
    let node = graph.node_mut(target);
    if let Some(existing) = node.operator {
        return Err(FormulaError::Parse(format!(
            "invalid formula syntax: '{}' follows '{}'",
            operator, existing
        )));
    }
    node.operator = Some(operator);
    Ok(())
}

/// Open the next argument slot, or record an array row break
fn prepare_for_next_child(
    graph: &mut ExpressionGraph,
    parent: Option<ExprId>,
    separator: TokenType,
) -> FormulaResult<()> {
    let Some(p) = parent else {
        return Err(FormulaError::Parse("separator outside a function or array".into()));
    };

    if matches!(graph.kind(p), ExpressionKind::Function(_)) {
        let argument = graph.create(ExpressionKind::FunctionArgument, "");
        graph.add_child(p, argument);
        return Ok(());
    }

    let child_count = graph.children(p).len();
    match &mut graph.node_mut(p).kind {
        ExpressionKind::Enumerable { row_breaks } => {
            if separator.contains(TokenType::SEMICOLON) {
                row_breaks.push(child_count);
            }
            Ok(())
        }
        _ => Err(FormulaError::Parse("separator outside a function or array".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use pretty_assertions::assert_eq;

    fn build(formula: &str) -> FormulaResult<ExpressionGraph> {
        let tokens = tokenize(formula)?;
        ExpressionGraphBuilder::new(&ParsingConfiguration::default()).build(&tokens)
    }

    fn kinds(graph: &ExpressionGraph, ids: &[ExprId]) -> Vec<&'static str> {
        ids.iter().map(|id| graph.kind(*id).name()).collect()
    }

    #[test]
    fn test_operators_attach_to_previous() {
        let graph = build("1+2*3").unwrap();
        let ids = graph.expressions();
        assert_eq!(ids.len(), 3);
        assert_eq!(graph.node(ids[0]).operator.map(|o| o.symbol), Some("+"));
        assert_eq!(graph.node(ids[1]).operator.map(|o| o.symbol), Some("*"));
        assert_eq!(graph.node(ids[2]).operator, None);
        assert!(graph.check_chain());
    }

    #[test]
    fn test_negator_toggles() {
        let graph = build("--5").unwrap();
        let id = graph.expressions()[0];
        assert!(!graph.node(id).negate);

        let graph = build("-5").unwrap();
        assert!(graph.node(graph.expressions()[0]).negate);
    }

    #[test]
    fn test_percent_inserts_constant() {
        let graph = build("50%").unwrap();
        let ids = graph.expressions();
        assert_eq!(kinds(&graph, ids), vec!["Integer", "Decimal"]);
        assert_eq!(graph.node(ids[0]).operator.map(|o| o.symbol), Some("%"));
    }

    #[test]
    fn test_function_arguments() {
        let graph = build("SUM(1,2+3)").unwrap();
        let function = graph.expressions()[0];
        let args = graph.children(function);
        assert_eq!(args.len(), 2);
        assert_eq!(graph.children(args[0]).len(), 1);
        assert_eq!(graph.children(args[1]).len(), 2);
        let first = graph.children(args[1])[0];
        assert_eq!(graph.node(first).operator.map(|o| o.symbol), Some("+"));
    }

    #[test]
    fn test_group_and_array() {
        let graph = build("(1+2)*{1,2;3,4}").unwrap();
        let ids = graph.expressions();
        assert_eq!(kinds(&graph, ids), vec!["Group", "Enumerable"]);
        assert_eq!(graph.children(ids[0]).len(), 2);
        assert_eq!(
            graph.kind(ids[1]),
            &ExpressionKind::Enumerable { row_breaks: vec![2] }
        );
    }

    #[test]
    fn test_worksheet_address_merged() {
        let graph = build("'My Sheet'!A1+1").unwrap();
        let id = graph.expressions()[0];
        match graph.kind(id) {
            ExpressionKind::ExcelAddress(address) => assert_eq!(address.address, "'My Sheet'!A1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_range_offset_composite() {
        let graph = build("-OFFSET(A1,1,0):A5").unwrap();
        let ids = graph.expressions();
        assert_eq!(ids.len(), 1);
        assert!(matches!(graph.kind(ids[0]), ExpressionKind::RangeOffset { .. }));
        assert!(graph.node(ids[0]).negate);

        let graph = build("A1 : B2").unwrap();
        assert!(matches!(
            graph.kind(graph.expressions()[0]),
            ExpressionKind::Colon { .. }
        ));
    }

    #[test]
    fn test_function_missing_parenthesis() {
        let tokens = vec![Token::new("SUM", TokenType::FUNCTION)];
        let result = ExpressionGraphBuilder::new(&ParsingConfiguration::default()).build(&tokens);
        assert_eq!(result.unwrap_err(), FormulaError::Excel(CellError::Value));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(build("*1"), Err(FormulaError::Parse(_))));
        assert!(matches!(build("1,2"), Err(FormulaError::Parse(_))));
    }

    #[test]
    fn test_depth_limit() {
        let config = ParsingConfiguration::default().with_max_recursion_depth(3);
        let tokens = tokenize("((((1))))").unwrap();
        let result = ExpressionGraphBuilder::new(&config).build(&tokens);
        assert!(matches!(result, Err(FormulaError::Parse(_))));
    }
}
