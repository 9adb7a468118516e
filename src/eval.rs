//! Evaluation of parse trees and compiled programs.
//!
//! Neither walker recurses: parse trees are walked with an explicit operation stack and
//! compiled programs are already in postfix order, so a long operand chain costs heap,
//! not native stack. Call arguments are evaluated left to right.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::Real;
use crate::error::{ExprError, Result};
use crate::symbols::SymbolTable;
use crate::types::{AstExpr, Callee, Instr, Operator, UnaryOp};
use crate::variable::SlotTable;

/// Pending work while walking a parse tree.
enum EvalOp<'a> {
    Eval(&'a AstExpr<'a>),
    ApplyUnary(UnaryOp),
    ApplyBinary(Operator),
    ApplyCall { callee: Callee, argc: usize },
}

/// Evaluate a parse tree directly, reading variables from their current values.
///
/// This is the path taken by `interpret`, where the tree is evaluated once and thrown
/// away together with its arena.
pub fn eval_ast<'a>(expr: &'a AstExpr<'a>, symbols: &SymbolTable) -> Result<Real> {
    let mut ops = Vec::with_capacity(16);
    let mut values: Vec<Real> = Vec::with_capacity(16);
    ops.push(EvalOp::Eval(expr));

    while let Some(op) = ops.pop() {
        match op {
            EvalOp::Eval(expr) => match *expr {
                AstExpr::Constant(value) => values.push(value),
                AstExpr::Variable { slot } => values.push(
                    symbols
                        .slot_value(slot)
                        .ok_or_else(|| ExprError::Other(format!("no variable in slot {}", slot)))?,
                ),
                AstExpr::Unary { op, operand } => {
                    ops.push(EvalOp::ApplyUnary(op));
                    ops.push(EvalOp::Eval(operand));
                }
                AstExpr::Binary { op, left, right } => {
                    ops.push(EvalOp::ApplyBinary(op));
                    ops.push(EvalOp::Eval(right));
                    ops.push(EvalOp::Eval(left));
                }
                AstExpr::Call { callee, args } => {
                    ops.push(EvalOp::ApplyCall {
                        callee,
                        argc: args.len(),
                    });
                    ops.extend(args.iter().rev().map(EvalOp::Eval));
                }
            },
            EvalOp::ApplyUnary(op) => {
                let a = pop(&mut values)?;
                values.push(op.apply(a));
            }
            EvalOp::ApplyBinary(op) => {
                let b = pop(&mut values)?;
                let a = pop(&mut values)?;
                values.push(op.apply(a, b));
            }
            EvalOp::ApplyCall { callee, argc } => {
                let start = args_start(&values, argc)?;
                let value = match callee {
                    Callee::Builtin(builtin) => builtin.call(&values[start..]),
                    Callee::Host(idx) => symbols
                        .function_at(idx)
                        .ok_or_else(|| ExprError::Other(format!("no function at index {}", idx)))?
                        .call(&values[start..])?,
                };
                values.truncate(start);
                values.push(value);
            }
        }
    }

    single_result(&values)
}

/// Run a compiled program against the slots of its expression.
///
/// `stack` is scratch space reused between evaluations; it is cleared first.
pub(crate) fn run(program: &[Instr], slots: &SlotTable, stack: &mut Vec<Real>) -> Result<Real> {
    stack.clear();
    for instr in program {
        match instr {
            Instr::Constant(value) => stack.push(*value),
            Instr::Variable(slot) => stack.push(slots.value(*slot)?),
            Instr::Unary(op) => {
                let a = pop(stack)?;
                stack.push(op.apply(a));
            }
            Instr::Binary(op) => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                stack.push(op.apply(a, b));
            }
            Instr::Call { target, argc } => {
                let start = args_start(stack, *argc)?;
                let value = target.call(&stack[start..])?;
                stack.truncate(start);
                stack.push(value);
            }
        }
    }
    single_result(stack)
}

fn pop(values: &mut Vec<Real>) -> Result<Real> {
    values
        .pop()
        .ok_or_else(|| ExprError::Other(String::from("value stack underflow")))
}

fn args_start(values: &[Real], argc: usize) -> Result<usize> {
    values
        .len()
        .checked_sub(argc)
        .ok_or_else(|| {
            ExprError::Other(format!(
                "call needs {} values, stack has {}",
                argc,
                values.len()
            ))
        })
}

fn single_result(values: &[Real]) -> Result<Real> {
    match values {
        [value] => Ok(*value),
        _ => Err(ExprError::Other(format!(
            "evaluation left {} values on the stack",
            values.len()
        ))),
    }
}
