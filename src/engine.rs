//! Public entry points: validation, one-shot interpretation and compilation.
//!
//! The free functions use [`CompileOptions::default`]. Use a [`Compiler`] to change the
//! options, for example when they come from a host configuration file:
//!
//! ```
//! use exprc::{CompileOptions, Compiler};
//!
//! let compiler = Compiler::with_options(CompileOptions {
//!     max_depth: 16,
//!     ..CompileOptions::default()
//! });
//! assert!(compiler.validate("(1 + 2) * 3"));
//! assert!(!compiler.validate("((((((((((((((((((1))))))))))))))))))"));
//! ```

use bumpalo::Bump;
use core::borrow::Borrow;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::Real;
use crate::compiler::{CompiledExpression, lower};
use crate::error::Result;
use crate::eval::eval_ast;
use crate::parser::parse_expression;
use crate::symbols::SymbolTable;
use crate::types::Binding;
use crate::variable::SlotTable;

/// Knobs for parsing and compilation.
///
/// Missing fields take their default when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Fold constant subtrees while compiling.
    pub fold_constants: bool,
    /// Maximum nesting of parentheses, argument lists, signs and powers.
    pub max_depth: usize,
    /// Maximum length of the expression text in bytes. Operand chains of any length
    /// within it compile and evaluate; only nesting is bounded by `max_depth`.
    pub max_length: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            fold_constants: true,
            max_depth: 256,
            max_length: 10_000,
        }
    }
}

/// Compiles expressions with a fixed set of [`CompileOptions`].
///
/// A compiler holds no other state and can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Compiler { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Whether `text` is a well-formed constant expression.
    pub fn validate(&self, text: &str) -> bool {
        let arena = Bump::new();
        parse_expression(text, &SymbolTable::empty(), &self.options, &arena).is_ok()
    }

    /// Whether `text` compiles with `bindings`.
    ///
    /// The expression is compiled and disposed right away, so the variables are left
    /// unbound either way.
    pub fn validate_with<I>(&self, text: &str, bindings: I) -> bool
    where
        I: IntoIterator,
        I::Item: Borrow<Binding>,
    {
        self.compile_with(text, bindings).is_ok()
    }

    /// Parse and evaluate a constant expression in one go.
    ///
    /// ```
    /// assert_eq!(exprc::interpret("((10 + 5) * 2) / (3 + 2)").unwrap(), 6.0);
    /// ```
    pub fn interpret(&self, text: &str) -> Result<Real> {
        let symbols = SymbolTable::empty();
        let arena = Bump::new();
        let ast = parse_expression(text, &symbols, &self.options, &arena)?;
        eval_ast(&ast, &symbols)
    }

    /// Compile a constant expression.
    pub fn compile(&self, text: &str) -> Result<CompiledExpression> {
        self.compile_with(text, core::iter::empty::<Binding>())
    }

    /// Compile `text` with caller bindings.
    ///
    /// Every variable binding is attached to a fresh slot of the new expression. If
    /// anything fails, every variable attached so far is released before the error is
    /// returned.
    pub fn compile_with<I>(&self, text: &str, bindings: I) -> Result<CompiledExpression>
    where
        I: IntoIterator,
        I::Item: Borrow<Binding>,
    {
        let symbols = SymbolTable::new(bindings)?;
        self.compile_symbols(text, &symbols)
            .inspect_err(|err| debug!("failed to compile '{}': {}", text, err))
    }

    fn compile_symbols(&self, text: &str, symbols: &SymbolTable) -> Result<CompiledExpression> {
        // Dropping `slots` on any error below releases the variables it attached.
        let slots = SlotTable::bind(symbols)?;
        let arena = Bump::new();
        let ast = parse_expression(text, symbols, &self.options, &arena)?;
        let program = lower(&ast, symbols, self.options.fold_constants)?;
        Ok(CompiledExpression::new(text, program, slots))
    }
}

/// [`Compiler::validate`] with default options.
pub fn validate(text: &str) -> bool {
    Compiler::new().validate(text)
}

/// [`Compiler::validate_with`] with default options.
pub fn validate_with<I>(text: &str, bindings: I) -> bool
where
    I: IntoIterator,
    I::Item: Borrow<Binding>,
{
    Compiler::new().validate_with(text, bindings)
}

/// [`Compiler::interpret`] with default options.
pub fn interpret(text: &str) -> Result<Real> {
    Compiler::new().interpret(text)
}

/// [`Compiler::compile`] with default options.
pub fn compile(text: &str) -> Result<CompiledExpression> {
    Compiler::new().compile(text)
}

/// [`Compiler::compile_with`] with default options.
pub fn compile_with<I>(text: &str, bindings: I) -> Result<CompiledExpression>
where
    I: IntoIterator,
    I::Item: Borrow<Binding>,
{
    Compiler::new().compile_with(text, bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExprError, StateError};
    use crate::types::Function;
    use crate::variable::Variable;

    #[test]
    fn test_validate() {
        assert!(validate("1 + 2"));
        assert!(validate("sin(pi / 2)"));
        assert!(!validate("1 +"));
        assert!(!validate("x + 1"));
        assert!(!validate(""));
    }

    #[test]
    fn test_validate_with_leaves_variables_unbound() {
        let x = Variable::new(1.0);
        assert!(validate_with("x * 2", [Binding::variable("x", &x)]));
        assert!(!x.is_bound());
        assert!(!validate_with("x * y", [Binding::variable("x", &x)]));
        assert!(!x.is_bound());
    }

    #[test]
    fn test_interpret() {
        assert_eq!(interpret("((10 + 5) * 2) / (3 + 2)"), Ok(6.0));
        assert!(matches!(
            interpret("2 + y"),
            Err(ExprError::UnknownSymbol { position: 4, .. })
        ));
    }

    #[test]
    fn test_compile_constant() {
        let expr = compile("2 ^ 10").unwrap();
        assert!(expr.is_constant());
        assert_eq!(expr.evaluate(), Ok(1024.0));
        assert_eq!(expr.source(), "2 ^ 10");
    }

    #[test]
    fn test_compile_without_folding() {
        let compiler = Compiler::with_options(CompileOptions {
            fold_constants: false,
            ..CompileOptions::default()
        });
        let expr = compiler.compile("2 * 3").unwrap();
        assert!(!expr.is_constant());
        assert_eq!(expr.node_count(), 3);
        assert_eq!(expr.evaluate(), Ok(6.0));
    }

    #[test]
    fn test_failed_compile_releases_variables() {
        let x = Variable::new(1.0);
        let err = compile_with("x +", [Binding::variable("x", &x)]).unwrap_err();
        assert!(matches!(err, ExprError::Syntax { position: 3, .. }));
        assert!(!x.is_bound());

        let expr = compile_with("x + 1", [Binding::variable("x", &x)]).unwrap();
        assert_eq!(expr.evaluate(), Ok(2.0));
    }

    #[test]
    fn test_same_variable_under_two_names() {
        let x = Variable::new(1.0);
        let err = compile_with(
            "a + b",
            [Binding::variable("a", &x), Binding::variable("b", &x)],
        )
        .unwrap_err();
        assert_eq!(err, ExprError::State(StateError::AlreadyBound));
        assert!(!x.is_bound());
    }

    #[test]
    fn test_bindings_by_reference() {
        let bindings = alloc::vec![
            Binding::variable("x", &Variable::new(3.0)),
            Binding::function("sq", Function::unary(|v| v * v).pure()),
        ];
        let expr = compile_with("sq(x)", &bindings).unwrap();
        assert_eq!(expr.evaluate(), Ok(9.0));
    }

    #[test]
    fn test_default_options() {
        let options = CompileOptions::default();
        assert!(options.fold_constants);
        assert_eq!(options.max_depth, 256);
        assert_eq!(options.max_length, 10_000);
        assert_eq!(Compiler::new().options(), &options);
    }
}
