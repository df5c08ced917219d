//! Function call compilation
//!
//! The resolved function's [`FunctionCompilerKind`] decides how arguments
//! are compiled: eagerly, lazily for IF/IFERROR, or as ranges for reference
//! functions.

use super::ExpressionCompiler;
use crate::compile_result::CompileResult;
use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expression::{ExprId, ExpressionGraph, ExpressionKind};
use crate::functions::helpers::arg_to_bool;
use crate::functions::{FunctionCompilerKind, FunctionDef};
use gridcalc_core::CellError;

const LEGACY_PREFIX: &str = "_XLFN.";

impl ExpressionCompiler {
    pub(super) fn compile_function(
        graph: &mut ExpressionGraph,
        id: ExprId,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let node = graph.node(id);
        let negate = node.negate;
        let name = match &node.kind {
            ExpressionKind::Function(name) => normalize_name(name),
            other => {
                return Err(FormulaError::Parse(format!(
                    "{} is not a function call",
                    other.name()
                )))
            }
        };

        let Some(def) = ctx.find_function(&name) else {
            log::warn!("unknown function {}", name);
            return Ok(CompileResult::error(CellError::Name));
        };

        let arguments = function_arguments(graph, id);
        if let Err(e) = def.check_arity(arguments.len()) {
            log::debug!("{}", e);
            return Ok(CompileResult::error(e.to_cell_error()));
        }

        let result = match def.compiler {
            FunctionCompilerKind::Default => {
                Self::compile_eager(graph, &def, &arguments, true, ctx)?
            }
            FunctionCompilerKind::ErrorHandling => {
                Self::compile_eager(graph, &def, &arguments, false, ctx)?
            }
            FunctionCompilerKind::If => Self::compile_if(graph, &def, &arguments, ctx)?,
            FunctionCompilerKind::IfError => Self::compile_if_error(graph, &def, &arguments, ctx)?,
            FunctionCompilerKind::Lookup => {
                let only = arguments.first().and_then(|first| match graph.children(*first) {
                    [single] => Some(*single),
                    _ => None,
                });
                if let Some(address) = only {
                    graph.resolve_as_range(address);
                }
                Self::compile_eager(graph, &def, &arguments, true, ctx)?
            }
        };

        Ok(if negate { negate_function_result(result) } else { result })
    }

    fn compile_argument(
        graph: &mut ExpressionGraph,
        argument: ExprId,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let children = graph.children(argument).to_vec();
        match Self::compile(graph, &children, ctx) {
            Err(e) if !e.is_circular_reference() => {
                log::debug!("argument failed to compile: {}", e);
                Ok(CompileResult::error(e.to_cell_error()))
            }
            other => other,
        }
    }

    /// Compile every argument; with `short_circuit` the first error is the result
    fn compile_eager(
        graph: &mut ExpressionGraph,
        def: &FunctionDef,
        arguments: &[ExprId],
        short_circuit: bool,
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = Self::compile_argument(graph, *argument, ctx)?;
            if short_circuit && value.is_error() {
                return Ok(value);
            }
            args.push(value);
        }
        execute(def, &args, ctx)
    }

    /// Only the branch selected by the condition is compiled
    fn compile_if(
        graph: &mut ExpressionGraph,
        def: &FunctionDef,
        arguments: &[ExprId],
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let Some(first) = arguments.first() else {
            return execute(def, &[], ctx);
        };
        let condition = Self::compile_argument(graph, *first, ctx)?;
        if condition.is_error() {
            return Ok(condition);
        }
        let taken = match arg_to_bool(&condition) {
            Ok(true) => 1,
            Ok(false) => 2,
            Err(e) => return Ok(CompileResult::error(e.to_cell_error())),
        };

        let mut args = vec![condition];
        for (i, argument) in arguments.iter().enumerate().skip(1) {
            if i == taken {
                args.push(Self::compile_argument(graph, *argument, ctx)?);
            } else {
                args.push(CompileResult::EMPTY);
            }
        }
        execute(def, &args, ctx)
    }

    /// The fallback is compiled only when the first argument is an error
    fn compile_if_error(
        graph: &mut ExpressionGraph,
        def: &FunctionDef,
        arguments: &[ExprId],
        ctx: &ParsingContext,
    ) -> FormulaResult<CompileResult> {
        let Some(first) = arguments.first() else {
            return execute(def, &[], ctx);
        };
        let value = Self::compile_argument(graph, *first, ctx)?;
        let fallback = match arguments.get(1) {
            Some(argument) if value.is_error() => Self::compile_argument(graph, *argument, ctx)?,
            _ => CompileResult::EMPTY,
        };
        execute(def, &[value, fallback], ctx)
    }
}

fn execute(
    def: &FunctionDef,
    args: &[CompileResult],
    ctx: &ParsingContext,
) -> FormulaResult<CompileResult> {
    match (def.implementation)(args, ctx) {
        Err(e) if !e.is_circular_reference() => {
            log::debug!("{} failed: {}", def.name, e);
            Ok(CompileResult::error(e.to_cell_error()))
        }
        other => other,
    }
}

/// Upper-case name without the `_xlfn.` compatibility prefix
fn normalize_name(name: &str) -> String {
    let upper = name.to_uppercase();
    match upper.strip_prefix(LEGACY_PREFIX) {
        Some(stripped) => stripped.to_string(),
        None => upper,
    }
}

/// Argument slots of a call; `F()` has none
fn function_arguments(graph: &ExpressionGraph, id: ExprId) -> Vec<ExprId> {
    let arguments = graph.children(id);
    match arguments {
        [only] if graph.children(*only).is_empty() => Vec::new(),
        _ => arguments.to_vec(),
    }
}

/// Unary minus on a call result: numbers only, errors pass through
fn negate_function_result(result: CompileResult) -> CompileResult {
    let scalar = result.scalar();
    if scalar.is_error() {
        scalar
    } else if scalar.is_numeric() {
        scalar.negated()
    } else {
        CompileResult::error(CellError::Value)
    }
}
