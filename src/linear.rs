//! Linear least-squares solving of equation-string systems.
//!
//! [`LinearSolver`] is the front door of the crate: it takes a set of
//! `(equation, data)` pairs — each equation a sum of terms with at most one
//! unknown factor — plus optional per-equation weights and named constants,
//! and solves the resulting weighted least-squares problem for every
//! unknown, batched over all broadcast slices.
//!
//! Weights follow the convention that the solve minimizes
//! `Σ_e w_e·|data_e − model_e|²`; [`LinearSolver::chisq`] reports that same
//! quantity at a candidate solution. An omitted weights map means unit
//! weights everywhere.
//!
//! # Example
//!
//! ```
//! use eqsolve::{Constants, LinearSolver, Value, Weights};
//!
//! let data = vec![
//!     ("3*x+4*y".to_string(), Value::from(11.0)),
//!     ("-x-3*y".to_string(), Value::from(-7.0)),
//! ];
//! let solver = LinearSolver::new(data, &Weights::new(), &Constants::new()).unwrap();
//! let sol = solver.solve().unwrap();
//! assert!((sol["x"].as_real_scalar().unwrap() - 1.0).abs() < 1e-9);
//! assert!((sol["y"].as_real_scalar().unwrap() - 2.0).abs() < 1e-9);
//! ```

use std::collections::HashMap;
use std::fmt;

use colored::Colorize;
use itertools::izip;
use ndarray::ArrayD;

use crate::equation::{Constants, Equation, Solution};
use crate::errors::SolveError;
use crate::system::LinearSystem;
use crate::value::{badd_real, bmul_real, bsub, Value};

/// Per-equation weights, keyed by equation string.
pub type Weights = HashMap<String, Value>;

/// Solves systems of linear measurement equations by weighted least squares.
pub struct LinearSolver {
    keys: Vec<String>,
    eqs: Vec<Equation>,
    data: Vec<Value>,
    wgts: Vec<Value>,
    unknowns: Vec<String>,
}

impl LinearSolver {
    /// Creates a solver from `(equation, data)` pairs.
    ///
    /// Equations are parsed and resolved against `consts` immediately; every
    /// name not found among the constants is registered as an unknown, in
    /// first-seen order across the pairs. Each term may keep at most one
    /// unknown factor.
    ///
    /// # Arguments
    /// * `data` - Ordered `(equation, data value)` pairs
    /// * `wgts` - Per-equation weights; an empty map means unit weights
    /// * `consts` - Named constant values, foldable into coefficients
    ///
    /// # Errors
    /// Returns [`SolveError::Parse`] / [`SolveError::NonLinearTerm`] for bad
    /// equations, [`SolveError::MissingWeight`] when a non-empty weights map
    /// does not cover every equation, and [`SolveError::ComplexWeight`] for
    /// non-real weights.
    pub fn new<I>(data: I, wgts: &Weights, consts: &Constants) -> Result<Self, SolveError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let (keys, values): (Vec<String>, Vec<Value>) = data.into_iter().unzip();
        let eqs = keys
            .iter()
            .map(|k| Equation::new(k, consts, 1))
            .collect::<Result<Vec<_>, _>>()?;
        let wgts = verify_weights(wgts, &keys)?;
        Self::from_equations(keys, eqs, values, wgts)
    }

    /// Assembles a solver from already-resolved equations.
    ///
    /// The nonlinear solvers use this to feed synthesized systems into the
    /// shared pipeline without a round-trip through strings.
    pub(crate) fn from_equations(
        keys: Vec<String>,
        eqs: Vec<Equation>,
        data: Vec<Value>,
        wgts: Vec<Value>,
    ) -> Result<Self, SolveError> {
        let mut unknowns: Vec<String> = Vec::new();
        for eq in &eqs {
            for name in eq.unknowns() {
                if !unknowns.iter().any(|u| u == name) {
                    unknowns.push(name.clone());
                }
            }
        }
        Ok(Self {
            keys,
            eqs,
            data,
            wgts,
            unknowns,
        })
    }

    /// Returns the discovered unknowns in column order.
    pub fn unknowns(&self) -> &[String] {
        &self.unknowns
    }

    /// Returns the equation strings in row order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Solves the system for every unknown across all broadcast slices.
    ///
    /// # Errors
    /// Returns [`SolveError::ShapeMismatch`] when the inputs share no common
    /// broadcast shape and [`SolveError::Numeric`] when the dense backend
    /// fails.
    pub fn solve(&self) -> Result<Solution, SolveError> {
        LinearSystem::build(&self.eqs, &self.data, &self.wgts, &self.unknowns)?.solve()
    }

    /// Evaluates every equation's model value at a candidate solution.
    ///
    /// Returns a map from equation string to model value; for a solution
    /// produced by [`solve`](Self::solve) on consistent data these match the
    /// input data up to the residual.
    pub fn eval(&self, sol: &Solution) -> Result<HashMap<String, Value>, SolveError> {
        let mut out = HashMap::with_capacity(self.keys.len());
        for (key, eq) in self.keys.iter().zip(&self.eqs) {
            out.insert(key.clone(), eq.eval(sol)?);
        }
        Ok(out)
    }

    /// Computes χ² = Σ_e w_e·|data_e − model_e|² at a candidate solution.
    ///
    /// The sum runs over equations, elementwise over the broadcast shape.
    /// This is the same quantity the solve minimizes; it is exposed as a
    /// diagnostic and never consulted internally by the one-shot solver.
    pub fn chisq(&self, sol: &Solution) -> Result<Value, SolveError> {
        chisq_of(&self.eqs, &self.data, &self.wgts, sol)
    }
}

impl fmt::Debug for LinearSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "    {}: {:?}", "Equations".cyan(), self.keys)?;
        writeln!(f, "    {}: {:?}", "Unknowns".cyan(), self.unknowns)?;
        write!(f, "}}")
    }
}

/// Expands a weights map into per-equation values.
///
/// An empty map yields unit weights. A non-empty map must cover every
/// equation, and every weight must be real.
pub(crate) fn verify_weights(wgts: &Weights, keys: &[String]) -> Result<Vec<Value>, SolveError> {
    if wgts.is_empty() {
        return Ok(vec![Value::from(1.0); keys.len()]);
    }
    keys.iter()
        .map(|key| {
            let w = wgts
                .get(key)
                .ok_or_else(|| SolveError::MissingWeight(key.clone()))?;
            if w.is_complex() {
                return Err(SolveError::ComplexWeight(key.clone()));
            }
            Ok(w.clone())
        })
        .collect()
}

/// Shared χ² implementation: Σ_e w_e·|data_e − model_e|².
pub(crate) fn chisq_of(
    eqs: &[Equation],
    data: &[Value],
    wgts: &[Value],
    sol: &Solution,
) -> Result<Value, SolveError> {
    let mut acc: Option<ArrayD<f64>> = None;
    for (eq, d, w) in izip!(eqs, data, wgts) {
        let model = eq.eval(sol)?;
        let res = bsub(&d.to_complex(), &model.to_complex())?;
        let weighted = bmul_real(&res.mapv(|z| z.norm_sqr()), &w.re())?;
        acc = Some(match acc {
            None => weighted,
            Some(sum) => badd_real(&sum, &weighted)?,
        });
    }
    Ok(Value::Real(acc.unwrap_or_else(|| {
        ArrayD::zeros(ndarray::IxDyn(&[]))
    })))
}
