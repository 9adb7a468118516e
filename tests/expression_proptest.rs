//! Property-based tests for interpretation, compilation and variable updates.

use exprc::{
    Binding, CompileOptions, Compiler, Real, Variable, assert_approx_eq, compile, compile_with,
    interpret,
};
use proptest::prelude::*;

/// Generate arithmetic-only constant expressions without division.
fn constant_expr_strategy() -> impl Strategy<Value = String> {
    let leaf = (-50i32..50).prop_map(|n| {
        if n < 0 {
            format!("({})", n)
        } else {
            n.to_string()
        }
    });
    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} + {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} - {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} * {}", a, b)),
            inner.clone().prop_map(|a| format!("-{}", a)),
            inner.prop_map(|a| format!("abs({})", a)),
        ]
    })
}

/// Generate expressions over `x` and `y`.
fn variable_expr_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("x".to_string()),
        Just("x + 1".to_string()),
        Just("x * 2 - y".to_string()),
        Just("x * x + y * y".to_string()),
        Just("abs(x - y) + 3 * 4".to_string()),
        Just("pow(x, 2) + 2 * x * y + y ^ 2".to_string()),
    ]
}

fn reference(expr: &str, x: Real, y: Real) -> Real {
    match expr {
        "x" => x,
        "x + 1" => x + 1.0,
        "x * 2 - y" => x * 2.0 - y,
        "x * x + y * y" => x * x + y * y,
        "abs(x - y) + 3 * 4" => (x - y).abs() + 12.0,
        "pow(x, 2) + 2 * x * y + y ^ 2" => (x + y) * (x + y),
        _ => unreachable!("unknown expression {}", expr),
    }
}

proptest! {
    /// Interpreting and compiling a constant expression agree.
    #[test]
    fn prop_interpret_matches_compile(expr in constant_expr_strategy()) {
        let interpreted = interpret(&expr).unwrap();
        let compiled = compile(&expr).unwrap();
        prop_assert_eq!(interpreted, compiled.evaluate().unwrap());
        prop_assert!(compiled.is_constant());
    }

    /// Folding never changes the result.
    #[test]
    fn prop_folding_preserves_value(expr in constant_expr_strategy()) {
        let unfolded = Compiler::with_options(CompileOptions {
            fold_constants: false,
            ..CompileOptions::default()
        });
        let folded = compile(&expr).unwrap().evaluate().unwrap();
        prop_assert_eq!(folded, unfolded.compile(&expr).unwrap().evaluate().unwrap());
    }

    /// Evaluating twice without updates gives the same value.
    #[test]
    fn prop_evaluate_is_idempotent(
        expr in variable_expr_strategy(),
        x in -100.0..100.0 as Real,
        y in -100.0..100.0 as Real,
    ) {
        let vx = Variable::new(x);
        let vy = Variable::new(y);
        let compiled = compile_with(
            &expr,
            [Binding::variable("x", &vx), Binding::variable("y", &vy)],
        )
        .unwrap();
        let first = compiled.evaluate().unwrap();
        prop_assert_eq!(first, compiled.evaluate().unwrap());
        assert_approx_eq!(first, reference(&expr, x, y), 1e-6);
    }

    /// Updates reach the next evaluation without recompiling.
    #[test]
    fn prop_updates_are_observed(
        expr in variable_expr_strategy(),
        values in prop::collection::vec((-100.0..100.0 as Real, -100.0..100.0 as Real), 1..8),
    ) {
        let vx = Variable::new(0.0);
        let vy = Variable::new(0.0);
        let compiled = compile_with(
            &expr,
            [Binding::variable("x", &vx), Binding::variable("y", &vy)],
        )
        .unwrap();
        for (x, y) in values {
            vx.update(x).unwrap();
            vy.update(y).unwrap();
            assert_approx_eq!(compiled.evaluate().unwrap(), reference(&expr, x, y), 1e-6);
        }
    }

    /// Long sums of products evaluate exactly, folded or not.
    #[test]
    fn prop_long_sum_of_products(terms in prop::collection::vec((0i32..10, 0i32..10), 1..2000)) {
        let expr = terms
            .iter()
            .map(|(a, b)| format!("{}*{}", a, b))
            .collect::<Vec<_>>()
            .join("+");
        let expected = terms.iter().map(|(a, b)| a * b).sum::<i32>() as Real;

        prop_assert_eq!(interpret(&expr).unwrap(), expected);
        let unfolded = Compiler::with_options(CompileOptions {
            fold_constants: false,
            ..CompileOptions::default()
        });
        let compiled = unfolded.compile(&expr).unwrap();
        prop_assert_eq!(compiled.node_count(), terms.len() * 4 - 1);
        prop_assert_eq!(compiled.evaluate().unwrap(), expected);
    }

    /// Text that only contains digits and operators never panics the parser.
    #[test]
    fn prop_parser_never_panics(text in "[0-9a-z+*/^%(),. -]{0,24}") {
        let _ = interpret(&text);
        let _ = exprc::validate(&text);
    }
}
