//! Reduces an expression graph to a single [`CompileResult`]
//!
//! A chain is compiled in two passes. Grouped nodes (parentheses, array
//! constants) are compiled first and spliced back as leaves. Then operators
//! are applied level by level, lowest precedence value first, left to right.
//! The first error produced halts the whole chain.

mod expressions;
mod functions;

use crate::compile_result::CompileResult;
use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expression::{ExprId, ExpressionConverter, ExpressionGraph, ExpressionKind};

pub struct ExpressionCompiler;

impl ExpressionCompiler {
    /// Compile the top-level chain of `graph`
    pub fn compile_graph(
        graph: &mut ExpressionGraph,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let ids = graph.expressions().to_vec();
        Self::compile(graph, &ids, ctx)
    }

    /// Compile `ids` as one operator chain
    pub fn compile(
        graph: &mut ExpressionGraph,
        ids: &[ExprId],
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        if ids.is_empty() {
            return Ok(CompileResult::EMPTY);
        }
        graph.link_chain(ids);
        let mut head = Some(ids[0]);

        if let Some(error) = Self::compile_grouped(graph, &mut head, ctx)? {
            return Ok(error);
        }

        while let Some(precedence) = lowest_precedence(graph, head) {
            let mut cursor = head;
            while let Some(id) = cursor {
                let node = graph.node(id);
                let operator = match node.operator {
                    Some(op) if op.precedence == precedence => op,
                    _ => {
                        cursor = node.next;
                        continue;
                    }
                };
                let Some(next) = node.next else {
                    return Err(FormulaError::Parse(
                        "invalid formula syntax: operator missing expression".into(),
                    ));
                };

                let left = Self::compile_node(graph, id, ctx)?;
                if left.is_error() {
                    return Ok(left);
                }
                let right = Self::compile_node(graph, next, ctx)?;
                if right.is_error() {
                    return Ok(right);
                }
                let result = operator.apply(&left, &right);
                if result.is_error() {
                    log::debug!("{} {} {} -> {}", left, operator, right, result);
                    return Ok(result);
                }

                let kind = ExpressionConverter::from_compile_result(&result)
                    .unwrap_or(ExpressionKind::Empty);
                let merged = graph.merge_with_next(id, kind)?;
                if head == Some(id) {
                    head = Some(merged);
                }
                cursor = Some(merged);
            }
        }

        match graph.chain(head).as_slice() {
            [] => Ok(CompileResult::EMPTY),
            [single] => Self::compile_node(graph, *single, ctx),
            _ => Err(FormulaError::Parse(
                "invalid formula syntax: expressions without an operator".into(),
            )),
        }
    }

    /// Replace grouped nodes by their compiled value; returns an error result to halt on
    fn compile_grouped(
        graph: &mut ExpressionGraph,
        head: &mut Option<ExprId>,
        ctx: &ParsingContext,
    ) -> FormulaResult<Option<CompileResult>> {
        let mut cursor = *head;
        while let Some(id) = cursor {
            let node = graph.node(id);
            let next = node.next;
            if !node.is_grouped() {
                cursor = next;
                continue;
            }

            let result = match node.kind {
                ExpressionKind::Group => {
                    let children = node.children.clone();
                    Self::compile(graph, &children, ctx)?
                }
                _ => Self::compile_enumerable(graph, id, ctx)?,
            };
            log::debug!("grouped expression {} compiled to {:?}", id, result.data_type);
            if result.is_error() {
                return Ok(Some(result));
            }

            let replacement = match ExpressionConverter::from_compile_result(&result) {
                Some(kind) => Some(graph.replace(id, kind)),
                None if is_only_node(graph, id) => {
                    graph.remove(id);
                    None
                }
                None => Some(graph.replace(id, ExpressionKind::Empty)),
            };
            if *head == Some(id) {
                *head = replacement.or(next);
            }
            cursor = next;
        }
        Ok(None)
    }

    /// Compile one node in isolation
    pub(crate) fn compile_node(
        graph: &mut ExpressionGraph,
        id: ExprId,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let node = graph.node(id);
        let negate = node.negate;

        let result = match &node.kind {
            ExpressionKind::Integer(n) => {
                return Ok(CompileResult::integer(if negate { -n } else { *n }))
            }
            ExpressionKind::Decimal(n) => {
                return Ok(CompileResult::decimal(if negate { -n } else { *n }))
            }
            ExpressionKind::Str(s) => CompileResult::string(s.clone()),
            ExpressionKind::Boolean(b) => CompileResult::boolean(*b),
            ExpressionKind::ExcelError(e) => CompileResult::error(*e),
            ExpressionKind::ExcelRange(r) | ExpressionKind::Constant(r) => r.clone(),
            ExpressionKind::Empty => CompileResult::EMPTY,
            ExpressionKind::ExcelAddress(address) => {
                let address = address.clone();
                return Self::compile_address(&address, negate, ctx);
            }
            ExpressionKind::NamedValue {
                name,
                resolve_as_range,
            } => {
                let (name, resolve_as_range) = (name.clone(), *resolve_as_range);
                return Self::compile_named_value(&name, resolve_as_range, negate, ctx);
            }
            ExpressionKind::Function(_) => return Self::compile_function(graph, id, ctx),
            ExpressionKind::FunctionArgument | ExpressionKind::Group => {
                let children = node.children.clone();
                Self::compile(graph, &children, ctx)?
            }
            ExpressionKind::Enumerable { .. } => Self::compile_enumerable(graph, id, ctx)?,
            ExpressionKind::RangeOffset { .. } | ExpressionKind::Colon { .. } => {
                Self::compile_range_combination(graph, id, ctx)?
            }
        };

        Ok(if negate { result.negated() } else { result })
    }
}

fn lowest_precedence(graph: &ExpressionGraph, head: Option<ExprId>) -> Option<u8> {
    graph
        .chain(head)
        .into_iter()
        .filter_map(|id| graph.node(id).operator.map(|op| op.precedence))
        .min()
}

/// The node is the whole chain and carries no operator
fn is_only_node(graph: &ExpressionGraph, id: ExprId) -> bool {
    let node = graph.node(id);
    node.operator.is_none() && node.prev.is_none() && node.next.is_none()
}
