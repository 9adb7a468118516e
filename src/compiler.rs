//! Lowering of parse trees into compiled expressions.
//!
//! Lowering flattens the arena tree into an owned postfix program and folds constant
//! subexpressions on the way: an operator with constant operands, or a call to a pure
//! function with constant arguments, becomes a single constant computed with the same
//! kernels evaluation uses.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use log::{debug, trace};

use crate::Real;
use crate::error::{ExprError, Result, StateError};
use crate::eval::run;
use crate::symbols::SymbolTable;
use crate::types::{ArgBuffer, AstExpr, Callee, Instr, Target};
use crate::variable::SlotTable;

enum Visit<'a> {
    Enter(&'a AstExpr<'a>),
    Exit(&'a AstExpr<'a>),
}

/// Flatten `expr` into a postfix program, folding constants when `fold` is set.
///
/// The tree is walked with an explicit stack, so operand chains of any length lower in
/// constant native stack.
pub(crate) fn lower<'a>(
    expr: &'a AstExpr<'a>,
    symbols: &SymbolTable,
    fold: bool,
) -> Result<Vec<Instr>> {
    let mut program = Vec::new();
    let mut pending = Vec::with_capacity(16);
    pending.push(Visit::Enter(expr));

    while let Some(visit) = pending.pop() {
        match visit {
            Visit::Enter(expr) => match *expr {
                AstExpr::Constant(value) => program.push(Instr::Constant(value)),
                AstExpr::Variable { slot } => program.push(Instr::Variable(slot)),
                AstExpr::Unary { operand, .. } => {
                    pending.push(Visit::Exit(expr));
                    pending.push(Visit::Enter(operand));
                }
                AstExpr::Binary { left, right, .. } => {
                    pending.push(Visit::Exit(expr));
                    pending.push(Visit::Enter(right));
                    pending.push(Visit::Enter(left));
                }
                AstExpr::Call { args, .. } => {
                    pending.push(Visit::Exit(expr));
                    pending.extend(args.iter().rev().map(Visit::Enter));
                }
            },
            Visit::Exit(expr) => emit(&mut program, expr, symbols, fold)?,
        }
    }
    Ok(program)
}

/// Append the instruction for `expr`, whose operands are already at the end of `program`.
///
/// The last instruction of an operand is its root, so a trailing `Constant` is always a
/// whole operand and can be folded into the instruction that consumes it.
fn emit(
    program: &mut Vec<Instr>,
    expr: &AstExpr<'_>,
    symbols: &SymbolTable,
    fold: bool,
) -> Result<()> {
    match *expr {
        AstExpr::Unary { op, .. } => match program.last_mut() {
            Some(Instr::Constant(value)) if fold => *value = op.apply(*value),
            _ => program.push(Instr::Unary(op)),
        },
        AstExpr::Binary { op, .. } => {
            let folded = match program.as_slice() {
                [.., Instr::Constant(a), Instr::Constant(b)] if fold => {
                    let value = op.apply(*a, *b);
                    trace!("folded {} {} {} to {}", a, op, b, value);
                    Some(value)
                }
                _ => None,
            };
            match folded {
                Some(value) => replace_tail(program, 2, value),
                None => program.push(Instr::Binary(op)),
            }
        }
        AstExpr::Call { callee, args } => {
            let target = match callee {
                Callee::Builtin(builtin) => Target::Builtin(builtin),
                Callee::Host(idx) => Target::Host(Rc::clone(
                    symbols
                        .function_at(idx)
                        .ok_or_else(|| ExprError::Other(format!("no function at index {}", idx)))?,
                )),
            };
            let argc = args.len();
            let start = program.len().checked_sub(argc).ok_or_else(|| {
                ExprError::Other(format!("call to '{}' is missing arguments", target.name()))
            })?;
            let folded = if fold && target.is_pure() {
                fold_call(&target, &program[start..])?
            } else {
                None
            };
            match folded {
                Some(value) => replace_tail(program, argc, value),
                None => program.push(Instr::Call { target, argc }),
            }
        }
        AstExpr::Constant(_) | AstExpr::Variable { .. } => {}
    }
    Ok(())
}

fn replace_tail(program: &mut Vec<Instr>, count: usize, value: Real) {
    program.truncate(program.len() - count);
    program.push(Instr::Constant(value));
}

/// Evaluate a pure call whose arguments are all constants.
///
/// A host failure leaves the call in place so it is reported by `evaluate`.
fn fold_call(target: &Target, args: &[Instr]) -> Result<Option<Real>> {
    let mut values = ArgBuffer::new();
    for arg in args {
        let Some(value) = arg.as_constant() else {
            return Ok(None);
        };
        values
            .push(value)
            .map_err(|_| ExprError::CapacityExceeded("arguments"))?;
    }
    match target.call(&values) {
        Ok(value) => {
            trace!("folded call to '{}' to {}", target.name(), value);
            Ok(Some(value))
        }
        Err(err) => {
            trace!("left call to '{}' unfolded: {}", target.name(), err);
            Ok(None)
        }
    }
}

/// Deepest the value stack gets while running `program`.
fn stack_height(program: &[Instr]) -> usize {
    let mut height = 0usize;
    let mut max = 0;
    for instr in program {
        let (pops, pushes) = instr.stack_effect();
        height = height.saturating_sub(pops) + pushes;
        max = max.max(height);
    }
    max
}

/// An expression parsed once and evaluated any number of times.
///
/// The expression owns one slot per bound variable. Updating a [`Variable`] pushes the
/// new value into its slot; [`CompiledExpression::evaluate`] only reads slots.
///
/// Closing the expression (explicitly or by dropping it) releases the program and
/// unbinds every variable, which can then be bound by another expression.
///
/// [`Variable`]: crate::Variable
pub struct CompiledExpression {
    source: String,
    program: Option<Vec<Instr>>,
    /// Value stack sized for the program, reused by every evaluation.
    stack: RefCell<Vec<Real>>,
    slots: SlotTable,
}

impl CompiledExpression {
    pub(crate) fn new(source: &str, program: Vec<Instr>, slots: SlotTable) -> Self {
        let height = stack_height(&program);
        debug!(
            "compiled '{}' into {} instructions with {} variables",
            source,
            program.len(),
            slots.len()
        );
        CompiledExpression {
            source: String::from(source),
            program: Some(program),
            stack: RefCell::new(Vec::with_capacity(height)),
            slots,
        }
    }

    /// Evaluate the expression with the current variable values.
    ///
    /// Fails with [`StateError::Disposed`] once closed, or with
    /// [`ExprError::Evaluation`] when a host function reports a failure.
    pub fn evaluate(&self) -> Result<Real> {
        let program = self.program.as_deref().ok_or(StateError::Disposed)?;
        match self.stack.try_borrow_mut() {
            Ok(mut stack) => run(program, &self.slots, &mut stack),
            // Re-entered from a host function.
            Err(_) => run(program, &self.slots, &mut Vec::new()),
        }
    }

    /// Release the program and unbind every variable. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.program.take().is_some() {
            *self.stack.get_mut() = Vec::new();
            self.slots.release();
            debug!("disposed '{}'", self.source);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.program.is_none()
    }

    /// The text the expression was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of variable slots, zero once closed.
    pub fn variable_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of instructions left after folding, zero once closed.
    pub fn node_count(&self) -> usize {
        self.program.as_ref().map_or(0, Vec::len)
    }

    /// Whether the whole expression folded to a single constant.
    pub fn is_constant(&self) -> bool {
        matches!(self.program.as_deref(), Some([Instr::Constant(_)]))
    }

    /// The compiled postfix program, `None` once closed.
    pub fn program(&self) -> Option<&[Instr]> {
        self.program.as_deref()
    }

    /// Rebuild infix text from the program, one string per pending operand.
    fn render(&self, program: &[Instr]) -> Option<String> {
        let mut operands: Vec<String> = Vec::new();
        for instr in program {
            let text = match instr {
                Instr::Constant(value) => format!("{}", value),
                Instr::Variable(slot) => match self.slots.name(*slot) {
                    Some(name) => String::from(name),
                    None => format!("${}", slot),
                },
                Instr::Unary(_) => format!("(-{})", operands.pop()?),
                Instr::Binary(op) => {
                    let right = operands.pop()?;
                    let left = operands.pop()?;
                    format!("({} {} {})", left, op, right)
                }
                Instr::Call { target, argc } => {
                    let start = operands.len().checked_sub(*argc)?;
                    let args = operands.split_off(start);
                    format!("{}({})", target.name(), args.join(", "))
                }
            };
            operands.push(text);
        }
        match operands.len() {
            1 => operands.pop(),
            _ => None,
        }
    }
}

impl Drop for CompiledExpression {
    fn drop(&mut self) {
        self.close();
    }
}

/// Prints the folded expression in infix form, with variables under their binding names.
impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.program {
            Some(program) => f.write_str(&self.render(program).ok_or(fmt::Error)?),
            None => f.write_str("<disposed>"),
        }
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("source", &self.source)
            .field("program", &self.program)
            .field("variables", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CompileOptions;
    use crate::parser::parse_expression;
    use crate::types::{Binding, Function, Operator};
    use crate::variable::Variable;
    use alloc::string::ToString;
    use bumpalo::Bump;
    use core::cell::Cell;

    fn lower_str(input: &str, symbols: &SymbolTable, fold: bool) -> Vec<Instr> {
        let arena = Bump::new();
        let ast = parse_expression(input, symbols, &CompileOptions::default(), &arena).unwrap();
        lower(&ast, symbols, fold).unwrap()
    }

    fn compile(input: &str, symbols: &SymbolTable) -> CompiledExpression {
        let slots = SlotTable::bind(symbols).unwrap();
        CompiledExpression::new(input, lower_str(input, symbols, true), slots)
    }

    #[test]
    fn test_constant_subtrees_fold() {
        let empty = SymbolTable::empty();
        let constants = |input: &str| -> Vec<Option<Real>> {
            lower_str(input, &empty, true).iter().map(Instr::as_constant).collect()
        };
        assert_eq!(constants("2 * 3 + 4"), [Some(10.0)]);
        assert_eq!(constants("-sqrt(16)"), [Some(-4.0)]);
        assert_eq!(lower_str("2 * 3 + 4", &empty, false).len(), 5);
    }

    #[test]
    fn test_partial_folding_display() {
        let x = Variable::new(1.0);
        let symbols = SymbolTable::new([Binding::variable("x", &x)]).unwrap();
        let expr = compile("2*3+x", &symbols);
        assert_eq!(expr.to_string(), "(6 + x)");
        assert_eq!(expr.node_count(), 3);
        assert!(!expr.is_constant());

        drop(expr);

        let expr = compile("-x + pow(2, 3)", &symbols);
        assert_eq!(expr.to_string(), "((-x) + 8)");
    }

    #[test]
    fn test_impure_calls_are_not_folded() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let symbols = SymbolTable::new([Binding::function(
            "tick",
            Function::unary(move |v| {
                counter.set(counter.get() + 1);
                v
            }),
        )])
        .unwrap();
        let program = lower_str("tick(1) + 1", &symbols, true);
        assert_eq!(calls.get(), 0);
        assert_eq!(program.len(), 4);
    }

    #[test]
    fn test_failing_pure_call_is_left_unfolded() {
        let symbols = SymbolTable::new([Binding::function(
            "bad",
            Function::fallible(1, |_| Err("bad input".to_string()))
                .unwrap()
                .pure(),
        )])
        .unwrap();
        let expr = compile("bad(1)", &symbols);
        assert!(!expr.is_constant());
        assert_eq!(
            expr.evaluate(),
            Err(ExprError::Evaluation {
                name: "bad".to_string(),
                message: "bad input".to_string()
            })
        );
    }

    #[test]
    fn test_close_is_idempotent_and_disposes() {
        let x = Variable::new(5.0);
        let symbols = SymbolTable::new([Binding::variable("x", &x)]).unwrap();
        let mut expr = compile("x + 1", &symbols);
        assert_eq!(expr.evaluate(), Ok(6.0));
        assert_eq!(expr.variable_count(), 1);

        expr.close();
        expr.close();
        assert!(expr.is_closed());
        assert!(!x.is_bound());
        assert_eq!(expr.node_count(), 0);
        assert_eq!(expr.to_string(), "<disposed>");
        assert_eq!(expr.evaluate(), Err(ExprError::State(StateError::Disposed)));
        assert_eq!(x.value(), 5.0);
    }

    #[test]
    fn test_postfix_order_and_folding_inside_calls() {
        let x = Variable::new(2.0);
        let symbols = SymbolTable::new([Binding::variable("x", &x)]).unwrap();
        let program = lower_str("atan2(x, 1 + 1) - 3", &symbols, true);
        assert!(matches!(
            program[..],
            [
                Instr::Variable(0),
                Instr::Constant(_),
                Instr::Call { argc: 2, .. },
                Instr::Constant(_),
                Instr::Binary(Operator::Sub),
            ]
        ));
        assert_eq!(program[1].as_constant(), Some(2.0));
        assert_eq!(stack_height(&program), 2);
    }

    #[test]
    fn test_long_chain_lowers_and_evaluates() {
        let x = Variable::new(1.0);
        let symbols = SymbolTable::new([Binding::variable("x", &x)]).unwrap();

        let chain = format!("x{}", "+1".repeat(4999));
        let expr = compile(&chain, &symbols);
        assert_eq!(expr.evaluate(), Ok(5000.0));
        assert_eq!(stack_height(expr.program().unwrap()), 2);
        drop(expr);

        // Leading constants fold into one, the rest stays a flat run of additions.
        let chain = format!("1{}+x", "+1".repeat(4998));
        let expr = compile(&chain, &symbols);
        let program = expr.program().unwrap();
        assert!(matches!(
            program,
            [Instr::Constant(_), Instr::Variable(0), Instr::Binary(_)]
        ));
        assert_eq!(program[0].as_constant(), Some(4999.0));
        assert_eq!(expr.evaluate(), Ok(5000.0));
    }
}
