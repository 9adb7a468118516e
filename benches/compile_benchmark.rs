use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use exprc::{Binding, Function, Real, Variable, compile_with, interpret};

const EXPRESSIONS: &[(&str, &str)] = &[
    ("simple", "x * 2 + 1"),
    ("trig", "sin(x) * cos(x / 2) + atan2(x, 3)"),
    ("poly", "x^4 - 3*x^3 + 2*x^2 - x + 7"),
    ("nested", "sqrt((x - 1)^2 + (x + 2)^2) / (1 + abs(x))"),
];

/// Substitute the value into the text, the only way to feed `interpret`.
fn inline(expr: &str, x: Real) -> String {
    expr.replace('x', &format!("({})", x))
}

fn bench_interpret_vs_compiled(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpret_vs_compiled");

    for (name, expr) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::new("interpret", name), expr, |b, expr| {
            let mut x: Real = 0.0;
            b.iter(|| {
                x += 0.001;
                black_box(interpret(&inline(expr, x)).unwrap())
            })
        });

        group.bench_with_input(BenchmarkId::new("compiled", name), expr, |b, expr| {
            let x = Variable::new(0.0);
            let compiled = compile_with(expr, [Binding::variable("x", &x)]).unwrap();
            b.iter(|| {
                x.increment().unwrap();
                black_box(compiled.evaluate().unwrap())
            })
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for (name, expr) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::from_parameter(name), expr, |b, expr| {
            let x = Variable::new(1.0);
            b.iter(|| {
                // Dropping the expression unbinds `x` for the next iteration.
                let compiled = compile_with(expr, [Binding::variable("x", &x)]).unwrap();
                black_box(compiled.node_count())
            })
        });
    }

    group.finish();
}

fn bench_folding(c: &mut Criterion) {
    let scale = Function::unary(|v| v * 1.5).pure();
    let x = Variable::new(2.0);
    let compiled = compile_with(
        "scale(2) * scale(4) + pi * e + x",
        [
            Binding::variable("x", &x),
            Binding::function("scale", scale),
        ],
    )
    .unwrap();

    c.bench_function("folded_evaluate", |b| {
        b.iter(|| black_box(compiled.evaluate().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_interpret_vs_compiled,
    bench_compile,
    bench_folding
);
criterion_main!(benches);
