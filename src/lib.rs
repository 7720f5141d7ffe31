//! Symbolic-to-numeric weighted least squares.
//!
//! This crate turns systems of equation strings — expressions of named
//! unknowns equated to measured values — into numeric least-squares problems
//! and solves them, batched over arbitrarily shaped arrays of independent
//! measurements. It is built for the repeated-measurement-equation pattern
//! of calibration pipelines: state the model once as strings, hand over the
//! data, and recover every unknown across millions of "pixels" without
//! hand-building a single matrix.
//!
//! # Features
//!
//! - Automatic unknown discovery: any name not bound as a constant is solved
//!   for
//! - Numpy-style broadcasting of scalar and array data, weights, and
//!   constants
//! - Complex measurements with anti-linear conjugation (`x_` denotes the
//!   conjugate of `x`), handled through a real/imaginary decomposition
//! - Three solvers sharing one pipeline: [`LinearSolver`] for linear
//!   systems, [`LogProductSolver`] for pure products via logarithms, and
//!   [`LinProductSolver`] for sums of products via Gauss-Newton iteration
//!
//! # Example
//!
//! ```
//! use eqsolve::{Constants, LinearSolver, Value, Weights};
//!
//! let data = vec![
//!     ("3*x+4*y".to_string(), Value::from(11.0)),
//!     ("-1*x-3*y".to_string(), Value::from(-7.0)),
//! ];
//! let solver = LinearSolver::new(data, &Weights::new(), &Constants::new()).unwrap();
//! let sol = solver.solve().unwrap();
//! assert!((sol["x"].as_real_scalar().unwrap() - 1.0).abs() < 1e-9);
//! assert!((sol["y"].as_real_scalar().unwrap() - 2.0).abs() < 1e-9);
//! ```

pub use equation::{Constants, Equation, Solution};
pub use errors::{ParseError, SolveError};
pub use linear::{LinearSolver, Weights};
pub use linprod::{IterOptions, IterationMeta, LinProductSolver};
pub use logprod::LogProductSolver;
pub use value::{Value, C64};

pub mod prelude {
    pub use crate::equation::{Constants, Equation, Solution};
    pub use crate::linear::{LinearSolver, Weights};
    pub use crate::linprod::{IterOptions, IterationMeta, LinProductSolver};
    pub use crate::logprod::LogProductSolver;
    pub use crate::value::{Value, C64};
}

/// Equation strings parsed into sums of product terms
pub mod parse;
/// Scalar-or-array values and broadcasting rules
pub mod value;
/// Error types for the various failure modes
pub mod errors;
/// Equations resolved against caller-supplied constants
pub mod equation;
/// Assembly and solution of batched weighted linear systems
mod system;
/// Linear least-squares solving of equation systems
pub mod linear;
/// Logarithmic linearization of pure-product systems
pub mod logprod;
/// Gauss-Newton iteration for sums-of-products systems
pub mod linprod;
