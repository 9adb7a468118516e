//! Type definitions for the expression compiler.
//!
//! This module contains the core data structures used throughout the crate: tokens,
//! operators, the arena-allocated parse tree, the postfix program held by a compiled
//! expression, and the host function and binding types callers hand to `compile_with`.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use bitflags::bitflags;
use core::fmt;

use crate::Real;
use crate::error::{ExprError, Result};
use crate::functions::{self, Builtin};
use crate::variable::Variable;

/// Maximum number of arguments a function can take.
pub const MAX_ARITY: usize = 7;

/// Maximum length of a binding name, in bytes.
pub const MAX_NAME_LENGTH: usize = 64;

/// Maximum number of bindings accepted by a single compile call.
///
/// Must stay a power of two, it is the capacity of the symbol index.
pub const MAX_BINDINGS: usize = 64;

/// Fixed-capacity string used for binding names.
pub type HString = heapless::String<MAX_NAME_LENGTH>;

/// Stack buffer holding evaluated call arguments.
pub type ArgBuffer = heapless::Vec<Real, MAX_ARITY>;

/// Conversion of borrowed strings into heapless names.
pub trait TryIntoHeaplessString {
    fn try_into_heapless(&self) -> Result<HString>;
}

impl TryIntoHeaplessString for str {
    fn try_into_heapless(&self) -> Result<HString> {
        let mut s = HString::new();
        s.push_str(self).map_err(|_| ExprError::StringTooLong)?;
        Ok(s)
    }
}

/// Classifies the kind of token produced during lexical analysis.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum TokenKind {
    /// A numeric literal and its value.
    Number(Real),
    /// A name: variable, function or constant.
    Identifier,
    /// One of `+ - * / ^ %`.
    Operator(Operator),
    /// `(`
    Open,
    /// `)`
    Close,
    /// `,`
    Comma,
    /// End of the expression.
    End,
}

/// Binary arithmetic operators.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl Operator {
    pub fn from_char(c: char) -> Option<Operator> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            '%' => Some(Operator::Mod),
            '^' => Some(Operator::Pow),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Pow => "^",
        }
    }

    /// Apply the operator with the same kernels evaluation uses.
    pub fn apply(self, a: Real, b: Real) -> Real {
        match self {
            Operator::Add => functions::add(a, b),
            Operator::Sub => functions::sub(a, b),
            Operator::Mul => functions::mul(a, b),
            Operator::Div => functions::div(a, b),
            Operator::Mod => functions::fmod(a, b),
            Operator::Pow => functions::pow(a, b),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators. Unary `+` is dropped by the parser.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    Neg,
}

impl UnaryOp {
    pub fn apply(self, a: Real) -> Real {
        match self {
            UnaryOp::Neg => functions::neg(a, 0.0),
        }
    }
}

/// The function a parsed call refers to.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Callee {
    /// A built-in from the static table.
    Builtin(&'static Builtin),
    /// Index of a function binding in the symbol table.
    Host(usize),
}

/// Parse tree produced by the parser.
///
/// Nodes live in a `bumpalo::Bump` owned by the caller of the parser. Nothing in the tree
/// needs dropping, so releasing the arena releases the whole tree at once.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum AstExpr<'arena> {
    /// A literal numerical value.
    Constant(Real),
    /// A bound variable, identified by its slot.
    Variable { slot: usize },
    /// Unary negation.
    Unary {
        op: UnaryOp,
        operand: &'arena AstExpr<'arena>,
    },
    /// A binary arithmetic operation.
    Binary {
        op: Operator,
        left: &'arena AstExpr<'arena>,
        right: &'arena AstExpr<'arena>,
    },
    /// A function call with its arguments in source order.
    Call {
        callee: Callee,
        args: &'arena [AstExpr<'arena>],
    },
}

bitflags! {
    /// Properties of a callable function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionFlags: u8 {
        /// Same arguments always give the same result; calls may be folded.
        const PURE = 1 << 0;
        /// Part of the built-in table.
        const BUILTIN = 1 << 1;
    }
}

/// Host code behind a function binding, one variant per arity.
#[derive(Clone)]
pub enum Callable {
    Nullary(Rc<dyn Fn() -> Real>),
    Unary(Rc<dyn Fn(Real) -> Real>),
    Binary(Rc<dyn Fn(Real, Real) -> Real>),
    Ternary(Rc<dyn Fn(Real, Real, Real) -> Real>),
    Quaternary(Rc<dyn Fn(Real, Real, Real, Real) -> Real>),
    Quinary(Rc<dyn Fn(Real, Real, Real, Real, Real) -> Real>),
    Senary(Rc<dyn Fn(Real, Real, Real, Real, Real, Real) -> Real>),
    Septenary(Rc<dyn Fn(Real, Real, Real, Real, Real, Real, Real) -> Real>),
    /// Slice-based host code that may report a failure.
    Fallible {
        arity: usize,
        f: Rc<dyn Fn(&[Real]) -> core::result::Result<Real, String>>,
    },
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Nullary(_) => 0,
            Callable::Unary(_) => 1,
            Callable::Binary(_) => 2,
            Callable::Ternary(_) => 3,
            Callable::Quaternary(_) => 4,
            Callable::Quinary(_) => 5,
            Callable::Senary(_) => 6,
            Callable::Septenary(_) => 7,
            Callable::Fallible { arity, .. } => *arity,
        }
    }

    /// Invoke the host code. A wrong argument count is reported, never a panic.
    pub fn invoke(&self, args: &[Real]) -> core::result::Result<Real, String> {
        match (self, args) {
            (Callable::Nullary(f), []) => Ok(f()),
            (Callable::Unary(f), &[a]) => Ok(f(a)),
            (Callable::Binary(f), &[a, b]) => Ok(f(a, b)),
            (Callable::Ternary(f), &[a, b, c]) => Ok(f(a, b, c)),
            (Callable::Quaternary(f), &[a, b, c, d]) => Ok(f(a, b, c, d)),
            (Callable::Quinary(f), &[a, b, c, d, e]) => Ok(f(a, b, c, d, e)),
            (Callable::Senary(f), &[a, b, c, d, e, g]) => Ok(f(a, b, c, d, e, g)),
            (Callable::Septenary(f), &[a, b, c, d, e, g, h]) => Ok(f(a, b, c, d, e, g, h)),
            (Callable::Fallible { arity, f }, args) if args.len() == *arity => f(args),
            _ => Err(format!(
                "expected {} arguments, found {}",
                self.arity(),
                args.len()
            )),
        }
    }
}

/// A host function: callable code plus its flags.
///
/// Functions are impure unless marked with [`Function::pure`]; impure calls are evaluated
/// on every `evaluate` and never folded.
///
/// ```
/// use exprc::{Binding, Function, compile_with};
///
/// let cube = Function::unary(|x| x * x * x).pure();
/// let expr = compile_with("cube(3)", [Binding::function("cube", cube)]).unwrap();
/// assert_eq!(expr.evaluate().unwrap(), 27.0);
/// ```
#[derive(Clone)]
pub struct Function {
    callable: Callable,
    flags: FunctionFlags,
}

impl Function {
    fn from_callable(callable: Callable) -> Self {
        Function {
            callable,
            flags: FunctionFlags::empty(),
        }
    }

    pub fn nullary(f: impl Fn() -> Real + 'static) -> Self {
        Self::from_callable(Callable::Nullary(Rc::new(f)))
    }

    pub fn unary(f: impl Fn(Real) -> Real + 'static) -> Self {
        Self::from_callable(Callable::Unary(Rc::new(f)))
    }

    pub fn binary(f: impl Fn(Real, Real) -> Real + 'static) -> Self {
        Self::from_callable(Callable::Binary(Rc::new(f)))
    }

    pub fn ternary(f: impl Fn(Real, Real, Real) -> Real + 'static) -> Self {
        Self::from_callable(Callable::Ternary(Rc::new(f)))
    }

    pub fn quaternary(f: impl Fn(Real, Real, Real, Real) -> Real + 'static) -> Self {
        Self::from_callable(Callable::Quaternary(Rc::new(f)))
    }

    pub fn quinary(f: impl Fn(Real, Real, Real, Real, Real) -> Real + 'static) -> Self {
        Self::from_callable(Callable::Quinary(Rc::new(f)))
    }

    pub fn senary(f: impl Fn(Real, Real, Real, Real, Real, Real) -> Real + 'static) -> Self {
        Self::from_callable(Callable::Senary(Rc::new(f)))
    }

    pub fn septenary(
        f: impl Fn(Real, Real, Real, Real, Real, Real, Real) -> Real + 'static,
    ) -> Self {
        Self::from_callable(Callable::Septenary(Rc::new(f)))
    }

    /// Slice-based host code that can fail.
    ///
    /// The error message is reported as [`ExprError::Evaluation`] when the call fails.
    /// Returns [`ExprError::InvalidArity`] when `arity` exceeds [`MAX_ARITY`].
    pub fn fallible(
        arity: usize,
        f: impl Fn(&[Real]) -> core::result::Result<Real, String> + 'static,
    ) -> Result<Self> {
        if arity > MAX_ARITY {
            return Err(ExprError::InvalidArity {
                arity,
                max: MAX_ARITY,
            });
        }
        Ok(Self::from_callable(Callable::Fallible {
            arity,
            f: Rc::new(f),
        }))
    }

    /// Mark the function as pure.
    pub fn pure(mut self) -> Self {
        self.flags |= FunctionFlags::PURE;
        self
    }

    pub fn is_pure(&self) -> bool {
        self.flags.contains(FunctionFlags::PURE)
    }

    pub fn flags(&self) -> FunctionFlags {
        self.flags
    }

    pub fn arity(&self) -> usize {
        self.callable.arity()
    }

    pub fn call(&self, args: &[Real]) -> core::result::Result<Real, String> {
        self.callable.invoke(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("arity", &self.arity())
            .field("flags", &self.flags)
            .finish()
    }
}

/// A host function registered in a symbol table under its name.
pub struct BoundFunction {
    pub name: HString,
    pub function: Function,
}

impl BoundFunction {
    pub fn call(&self, args: &[Real]) -> Result<Real> {
        self.function
            .call(args)
            .map_err(|message| ExprError::Evaluation {
                name: self.name.as_str().to_string(),
                message,
            })
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFunction")
            .field("name", &self.name.as_str())
            .field("function", &self.function)
            .finish()
    }
}

/// The function a compiled call invokes.
#[derive(Clone, Debug)]
pub enum Target {
    Builtin(&'static Builtin),
    Host(Rc<BoundFunction>),
}

impl Target {
    pub fn name(&self) -> &str {
        match self {
            Target::Builtin(builtin) => builtin.name,
            Target::Host(bound) => bound.name.as_str(),
        }
    }

    pub fn flags(&self) -> FunctionFlags {
        match self {
            Target::Builtin(_) => FunctionFlags::PURE | FunctionFlags::BUILTIN,
            Target::Host(bound) => bound.function.flags(),
        }
    }

    pub fn is_pure(&self) -> bool {
        self.flags().contains(FunctionFlags::PURE)
    }

    pub fn call(&self, args: &[Real]) -> Result<Real> {
        match self {
            Target::Builtin(builtin) => Ok(builtin.call(args)),
            Target::Host(bound) => bound.call(args),
        }
    }
}

/// Instruction of a compiled expression, owned by its `CompiledExpression`.
///
/// A compiled expression is a flat postfix program: operands come before the instruction
/// that consumes them, so evaluating it only needs a value stack, and no part of it
/// nests however long the source was.
#[derive(Clone, Debug)]
pub enum Instr {
    /// Push a value.
    Constant(Real),
    /// Push the value of the slot with this index.
    Variable(usize),
    /// Replace the top value.
    Unary(UnaryOp),
    /// Replace the top two values, left operand below right.
    Binary(Operator),
    /// Replace the top `argc` values, first argument lowest.
    Call { target: Target, argc: usize },
}

impl Instr {
    pub fn as_constant(&self) -> Option<Real> {
        match self {
            Instr::Constant(value) => Some(*value),
            _ => None,
        }
    }

    /// Values taken from the stack and values pushed back.
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Instr::Constant(_) | Instr::Variable(_) => (0, 1),
            Instr::Unary(_) => (1, 1),
            Instr::Binary(_) => (2, 1),
            Instr::Call { argc, .. } => (*argc, 1),
        }
    }
}

/// What a binding name refers to.
#[derive(Clone)]
pub enum BindingValue {
    Variable(Variable),
    Function(Function),
}

/// A name plus the variable or function it stands for in an expression.
#[derive(Clone)]
pub struct Binding {
    pub name: String,
    pub value: BindingValue,
}

impl Binding {
    /// Bind `name` to a caller-owned variable. The handle is shared, not copied.
    pub fn variable(name: &str, variable: &Variable) -> Self {
        Binding {
            name: name.to_string(),
            value: BindingValue::Variable(variable.clone()),
        }
    }

    pub fn function(name: &str, function: Function) -> Self {
        Binding {
            name: name.to_string(),
            value: BindingValue::Function(function),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            BindingValue::Variable(variable) => f
                .debug_struct("Binding")
                .field("name", &self.name)
                .field("variable", variable)
                .finish(),
            BindingValue::Function(function) => f
                .debug_struct("Binding")
                .field("name", &self.name)
                .field("function", function)
                .finish(),
        }
    }
}
