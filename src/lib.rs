#![cfg_attr(not(test), no_std)]
#![doc = r#"
# exprc

A small, no_std-friendly arithmetic expression compiler for Rust.

## Overview

exprc parses expression strings such as `sqrt(x^2 + y^2) * scale` once into a compiled
form, then evaluates that form as often as needed while the inputs change. It is meant
for embedding: configuration formulas, calculators, spreadsheet-like cells. It is in the
spirit of [TinyExpr](https://github.com/codeplea/tinyexpr).

Key features:
- Configurable floating-point precision (`f32` feature, `f64` by default)
- Caller-owned [`Variable`]s that push updates straight into compiled expressions
- Host functions of arity 0 to 7, optionally marked pure so constant calls fold away
- Constant folding with the same kernels evaluation uses
- Positioned errors for every parse failure
- No global state; all math through `libm`

## Quick Start

```rust
use exprc::interpret;

let result = interpret("2 + 3 * 4").unwrap();
assert_eq!(result, 14.0);

let result = interpret("sin(pi/4)^2 + cos(pi/4)^2").unwrap();
assert!((result - 1.0).abs() < 1e-9);
```

## Variables and Host Functions

```rust
use exprc::{Binding, Function, Variable, compile_with};

let x = Variable::new(3.0);
let y = Variable::new(4.0);
let scale = Function::unary(|v| v * 10.0).pure();

let expr = compile_with(
    "scale(sqrt(x^2 + y^2))",
    [
        Binding::variable("x", &x),
        Binding::variable("y", &y),
        Binding::function("scale", scale),
    ],
)
.unwrap();
assert_eq!(expr.evaluate().unwrap(), 50.0);

x.update(6.0).unwrap();
y.update(8.0).unwrap();
assert_eq!(expr.evaluate().unwrap(), 100.0);
```

A variable feeds at most one live expression. Dropping (or closing) the expression
unbinds it so another expression can use it.

## Error Handling

```rust
use exprc::{ExprError, compile};

match compile("1 + 2 *") {
    Err(ExprError::Syntax { position, .. }) => assert_eq!(position, 7),
    other => panic!("unexpected result: {:?}", other),
}

// IEEE-754 results are not errors.
assert!(exprc::interpret("1 / 0").unwrap().is_infinite());
```

## Grammar

From lowest to highest precedence:

| Operators       | Associativity |
|-----------------|---------------|
| `+` `-`         | Left          |
| `*` `/` `%`     | Left          |
| unary `-` `+`   | Right         |
| `^`             | Right         |

so `-2^2` is `-4`, `2^-2` is `0.25` and `2^3^2` is `512`.

### Built-in Functions

- Trigonometric: `sin`, `cos`, `tan`, `asin`, `acos`, `atan`, `atan2`
- Hyperbolic: `sinh`, `cosh`, `tanh`
- Exponential/Logarithmic: `exp`, `ln`, `log` (base 10), `log10`
- Power/Root: `sqrt`, `pow`
- Rounding: `ceil`, `floor`
- Misc: `abs`
- Constants: `pi`, `e` (written bare or as `pi()`, `e()`)

A caller binding with the same name as a built-in takes precedence.

## Feature Flags

- `f32`: Use 32-bit floating point (single precision) for calculations
"#]

extern crate alloc;

pub mod compiler;
pub mod engine;
pub mod error;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod symbols;
pub mod types;
pub mod variable;

pub use compiler::CompiledExpression;
pub use engine::*;
pub use error::{ExprError, StateError};
pub use functions::Builtin;
pub use types::*;
pub use variable::Variable;

/// Define the floating-point type based on feature flags
#[cfg(feature = "f32")]
pub type Real = f32;

#[cfg(not(feature = "f32"))]
pub type Real = f64;

pub mod constants {
    use super::Real;

    #[cfg(feature = "f32")]
    pub const PI: Real = core::f32::consts::PI;
    #[cfg(feature = "f32")]
    pub const E: Real = core::f32::consts::E;
    #[cfg(feature = "f32")]
    pub const TEST_PRECISION: Real = 1e-6;

    #[cfg(not(feature = "f32"))]
    pub const PI: Real = core::f64::consts::PI;
    #[cfg(not(feature = "f32"))]
    pub const E: Real = core::f64::consts::E;
    #[cfg(not(feature = "f32"))]
    pub const TEST_PRECISION: Real = 1e-10;
}

/// Utility macro to check if two floating point values are approximately equal
/// within a specified epsilon. Supports optional format arguments like assert_eq!.
#[macro_export]
macro_rules! assert_approx_eq {
    // assert_approx_eq!(left, right) -> use default epsilon
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, $crate::constants::TEST_PRECISION)
    };
    // assert_approx_eq!(left, right, epsilon)
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let left_val: $crate::Real = $left;
        let right_val: $crate::Real = $right;
        let eps: $crate::Real = $epsilon;
        $crate::assert_approx_eq!(
            left_val,
            right_val,
            eps,
            "assertion failed: `(left ≈ right)` (left: `{}`, right: `{}`, epsilon: `{}`)",
            left_val,
            right_val,
            eps
        )
    }};
    // assert_approx_eq!(left, right, epsilon, "format message", args...)
    ($left:expr, $right:expr, $epsilon:expr, $($arg:tt)+) => {{
        let left_val: $crate::Real = $left;
        let right_val: $crate::Real = $right;
        let eps: $crate::Real = $epsilon;

        if left_val.is_nan() && right_val.is_nan() {
            // NaN == NaN for our purposes
        } else if left_val.is_infinite()
            && right_val.is_infinite()
            && left_val.signum() == right_val.signum()
        {
            // Same-signed infinities are equal
        } else {
            assert!((left_val - right_val).abs() < eps, $($arg)+);
        }
    }};
}
