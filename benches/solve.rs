//! Solver Benchmarks
//!
//! Measures the two hot paths of the crate:
//!
//! 1. **Batched linear solve** (`linear_solve_batched`): one small equation
//!    system solved independently across a large array of broadcast slices,
//!    the calibration-pipeline shape the crate is built for. Construction
//!    (parsing and resolution) is excluded from the measurement; assembly
//!    and the per-slice least-squares solves are included.
//!
//! 2. **Gauss-Newton iteration** (`gauss_newton`): a full
//!    `solve_iteratively` run on a sums-of-products system, covering
//!    repeated linearization, assembly, and solving.
//!
//! Run with: `cargo bench --bench solve`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;

use eqsolve::{Constants, IterOptions, LinProductSolver, LinearSolver, Solution, Value, Weights};

fn bench_linear_solve_batched(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_solve_batched");
    for nslices in [100usize, 10_000] {
        let x = Array1::from_shape_fn(nslices, |i| (i % 97) as f64);
        let y = Array1::from_shape_fn(nslices, |i| (i % 89) as f64 + 1.0);
        let data = vec![
            ("2*x+y".to_string(), Value::from(&x * 2.0 + &y)),
            ("-1*x+3*y".to_string(), Value::from(&y * 3.0 - &x)),
        ];
        let solver = LinearSolver::new(data, &Weights::new(), &Constants::new()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(nslices), &solver, |b, solver| {
            b.iter(|| black_box(solver.solve().unwrap()))
        });
    }
    group.finish();
}

fn bench_gauss_newton(c: &mut Criterion) {
    let (x, y, z) = (1.0, 2.0, 3.0);
    let data = vec![
        ("x*y".to_string(), Value::from(x * y)),
        ("x*z".to_string(), Value::from(x * z)),
        ("y*z".to_string(), Value::from(y * z)),
    ];
    let mut sol0 = Solution::new();
    sol0.insert("x".to_string(), Value::from(x * 1.1));
    sol0.insert("y".to_string(), Value::from(y * 0.9));
    sol0.insert("z".to_string(), Value::from(z * 1.1));
    let solver = LinProductSolver::new(data, sol0, &Weights::new(), &Constants::new()).unwrap();

    c.bench_function("gauss_newton", |b| {
        b.iter(|| black_box(solver.solve_iteratively(IterOptions::default()).unwrap()))
    });
}

criterion_group!(benches, bench_linear_solve_batched, bench_gauss_newton);
criterion_main!(benches);
