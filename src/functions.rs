//! Built-in mathematical functions and arithmetic kernels.
//!
//! This module provides every function an expression can call without a caller binding,
//! plus the kernels behind the arithmetic operators. Constant folding and evaluation both
//! go through these kernels, so a folded subtree produces exactly the value evaluation
//! would have produced.
//!
//! Numeric edge cases follow IEEE-754: `1/0` is infinity, `sqrt(-1)` and `(-8)^(1/3)` are
//! NaN, `ln(0)` is negative infinity. Nothing here reports an error.
//!
//! All functions use the `libm` crate, which keeps the crate usable in no_std builds.
//! Depending on the selected floating-point precision (f32 or f64, controlled by the "f32"
//! feature), different versions of the math functions are used.

#[cfg(feature = "f32")]
use libm::{
    acosf as libm_acos, asinf as libm_asin, atan2f as libm_atan2, atanf as libm_atan,
    ceilf as libm_ceil, cosf as libm_cos, coshf as libm_cosh, expf as libm_exp,
    fabsf as libm_fabs, floorf as libm_floor, fmodf as libm_fmod, log10f as libm_log10,
    logf as libm_ln, powf as libm_pow, sinf as libm_sin, sinhf as libm_sinh,
    sqrtf as libm_sqrt, tanf as libm_tan, tanhf as libm_tanh,
};

#[cfg(not(feature = "f32"))]
use libm::{
    acos as libm_acos, asin as libm_asin, atan as libm_atan, atan2 as libm_atan2,
    ceil as libm_ceil, cos as libm_cos, cosh as libm_cosh, exp as libm_exp, fabs as libm_fabs,
    floor as libm_floor, fmod as libm_fmod, log as libm_ln, log10 as libm_log10, pow as libm_pow,
    sin as libm_sin, sinh as libm_sinh, sqrt as libm_sqrt, tan as libm_tan, tanh as libm_tanh,
};

use crate::Real;
use core::fmt;

/// Signature shared by every built-in and operator kernel.
///
/// Single-argument functions ignore the second parameter and nullary constants ignore both,
/// which lets one table hold every built-in regardless of arity.
pub type BuiltinFn = fn(Real, Real) -> Real;

/// A function available to every expression without a caller binding.
///
/// Built-ins are always pure: calls with constant arguments are folded at compile time.
pub struct Builtin {
    /// The name used in expressions.
    pub name: &'static str,
    /// Number of arguments the function takes (0, 1 or 2).
    pub arity: usize,
    /// The implementation.
    pub eval: BuiltinFn,
}

impl Builtin {
    /// Apply the built-in to already evaluated arguments.
    ///
    /// Missing trailing arguments are passed as `0.0`; the parser guarantees the
    /// argument count matches `arity` before a call is ever built.
    pub fn call(&self, args: &[Real]) -> Real {
        let a = args.first().copied().unwrap_or(0.0);
        let b = args.get(1).copied().unwrap_or(0.0);
        (self.eval)(a, b)
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arity == other.arity
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// The built-in table, sorted by name.
pub static BUILTINS: &[Builtin] = &[
    Builtin { name: "abs", arity: 1, eval: abs },
    Builtin { name: "acos", arity: 1, eval: acos },
    Builtin { name: "asin", arity: 1, eval: asin },
    Builtin { name: "atan", arity: 1, eval: atan },
    Builtin { name: "atan2", arity: 2, eval: atan2 },
    Builtin { name: "ceil", arity: 1, eval: ceil },
    Builtin { name: "cos", arity: 1, eval: cos },
    Builtin { name: "cosh", arity: 1, eval: cosh },
    Builtin { name: "e", arity: 0, eval: e },
    Builtin { name: "exp", arity: 1, eval: exp },
    Builtin { name: "floor", arity: 1, eval: floor },
    Builtin { name: "ln", arity: 1, eval: ln },
    Builtin { name: "log", arity: 1, eval: log },
    Builtin { name: "log10", arity: 1, eval: log10 },
    Builtin { name: "pi", arity: 0, eval: pi },
    Builtin { name: "pow", arity: 2, eval: pow },
    Builtin { name: "sin", arity: 1, eval: sin },
    Builtin { name: "sinh", arity: 1, eval: sinh },
    Builtin { name: "sqrt", arity: 1, eval: sqrt },
    Builtin { name: "tan", arity: 1, eval: tan },
    Builtin { name: "tanh", arity: 1, eval: tanh },
];

/// Look up a built-in by its exact (case-sensitive) name.
pub fn find_builtin(name: &str) -> Option<&'static Builtin> {
    BUILTINS
        .binary_search_by(|builtin| builtin.name.cmp(name))
        .ok()
        .map(|idx| &BUILTINS[idx])
}

/// Adds two values.
pub fn add(a: Real, b: Real) -> Real {
    a + b
}

/// Subtracts the second value from the first.
pub fn sub(a: Real, b: Real) -> Real {
    a - b
}

/// Multiplies two values.
pub fn mul(a: Real, b: Real) -> Real {
    a * b
}

/// Divides the first value by the second.
///
/// Division by zero is not special-cased: `x/0` is a signed infinity and `0/0` is NaN.
pub fn div(a: Real, b: Real) -> Real {
    a / b
}

/// Floating remainder with the sign of the dividend (truncating division).
///
/// `7 % 4 = 3`, `-7 % 4 = -3`, `7 % -4 = 3`.
pub fn fmod(a: Real, b: Real) -> Real {
    libm_fmod(a, b)
}

pub fn neg(a: Real, _: Real) -> Real {
    -a
}

/// Raises `a` to the power `b`.
///
/// A negative base with a fractional exponent is NaN, `0^0` is 1.
pub fn pow(a: Real, b: Real) -> Real {
    libm_pow(a, b)
}

pub fn abs(a: Real, _: Real) -> Real {
    libm_fabs(a)
}
pub fn acos(a: Real, _: Real) -> Real {
    libm_acos(a)
}
pub fn asin(a: Real, _: Real) -> Real {
    libm_asin(a)
}
pub fn atan(a: Real, _: Real) -> Real {
    libm_atan(a)
}
/// Two-argument arctangent in `(y, x)` order.
pub fn atan2(a: Real, b: Real) -> Real {
    libm_atan2(a, b)
}
pub fn ceil(a: Real, _: Real) -> Real {
    libm_ceil(a)
}
pub fn cos(a: Real, _: Real) -> Real {
    libm_cos(a)
}
pub fn cosh(a: Real, _: Real) -> Real {
    libm_cosh(a)
}
pub fn e(_: Real, _: Real) -> Real {
    crate::constants::E
}
pub fn exp(a: Real, _: Real) -> Real {
    libm_exp(a)
}
pub fn floor(a: Real, _: Real) -> Real {
    libm_floor(a)
}
/// Natural logarithm.
pub fn ln(a: Real, _: Real) -> Real {
    libm_ln(a)
}
/// `log` is the base-10 logarithm, the same as `log10`.
pub fn log(a: Real, _: Real) -> Real {
    libm_log10(a)
}
pub fn log10(a: Real, _: Real) -> Real {
    libm_log10(a)
}
pub fn pi(_: Real, _: Real) -> Real {
    crate::constants::PI
}
pub fn sin(a: Real, _: Real) -> Real {
    libm_sin(a)
}
pub fn sinh(a: Real, _: Real) -> Real {
    libm_sinh(a)
}
pub fn sqrt(a: Real, _: Real) -> Real {
    libm_sqrt(a)
}
pub fn tan(a: Real, _: Real) -> Real {
    libm_tan(a)
}
pub fn tanh(a: Real, _: Real) -> Real {
    libm_tanh(a)
}
