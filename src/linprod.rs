//! Gauss-Newton solving of sums-of-products equation systems.
//!
//! [`LinProductSolver`] handles equations whose terms are products of one or
//! two unknowns (e.g. `x*y + z*w = d`), which a single log-transform cannot
//! linearize. Around a current estimate it builds the first-order Taylor
//! expansion of every term — for `u*v` the differential contribution is
//! `v0*Δu + u0*Δv`, with the zeroth-order `u0*v0` folded into the residual —
//! and solves the purely linear differential system for the corrections
//! through the shared [`LinearSolver`] pipeline. Each correction replaces
//! the estimate wholesale; no estimate is ever mutated in place.
//!
//! [`solve`](LinProductSolver::solve) runs a single
//! linearize-solve-update step, for callers driving their own loop.
//! [`solve_iteratively`](LinProductSolver::solve_iteratively) loops
//! internally until the per-slice correction ratio ‖Δ‖/‖sol‖ drops below
//! `conv_crit` or `maxiter` is reached; hitting the iteration cap is not an
//! error but reported through [`IterationMeta`].
//!
//! Differential unknowns are named by prefixing `d` to the original name. A
//! system whose unknowns or constants already contain such a name would be
//! ambiguous and is rejected at construction.

use std::fmt;

use colored::Colorize;
use ndarray::ArrayD;

use crate::equation::{Constants, Equation, ResolvedTerm, Solution, VarFactor};
use crate::errors::SolveError;
use crate::linear::{chisq_of, verify_weights, LinearSolver, Weights};
use crate::value::{badd, badd_real, bmul, Value};

/// Prefix applied to an unknown's name to form its differential unknown.
const DIFF_PREFIX: &str = "d";

/// Termination controls for [`LinProductSolver::solve_iteratively`].
#[derive(Debug, Clone, Copy)]
pub struct IterOptions {
    /// Convergence threshold on the per-slice ratio ‖Δ‖₂/‖sol‖₂
    pub conv_crit: f64,
    /// Maximum number of Gauss-Newton iterations
    pub maxiter: usize,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            conv_crit: 1e-10,
            maxiter: 50,
        }
    }
}

/// Outcome metadata of an iterative solve.
#[derive(Debug, Clone)]
pub struct IterationMeta {
    /// The convergence threshold the run was configured with
    pub conv_crit: f64,
    /// χ² of the original equations at the final estimate
    pub chisq: Value,
    /// Iterations actually run; equal to `maxiter` when not converged
    pub iter: usize,
}

/// Solves sums-of-products systems by iterated re-linearization.
pub struct LinProductSolver {
    keys: Vec<String>,
    eqs: Vec<Equation>,
    data: Vec<Value>,
    wgts: Vec<Value>,
    sol0: Solution,
    unknowns: Vec<String>,
}

impl LinProductSolver {
    /// Creates a solver from `(equation, data)` pairs and an initial
    /// estimate.
    ///
    /// Every unknown appearing in the equations needs an entry in `sol0`,
    /// and every `sol0` entry must correspond to an unknown; terms may carry
    /// at most two unknown factors.
    ///
    /// # Arguments
    /// * `data` - Ordered `(equation, data value)` pairs
    /// * `sol0` - Initial estimate, one value per unknown
    /// * `wgts` - Per-equation weights; an empty map means unit weights
    /// * `consts` - Named constant values
    ///
    /// # Errors
    /// Returns [`SolveError::NonLinearTerm`] for terms with more than two
    /// unknown factors, [`SolveError::UnsupportedUnknown`] for a missing or
    /// stray estimate, and [`SolveError::NamingCollision`] when a
    /// differential name `d<unknown>` is already taken by another unknown or
    /// a constant.
    pub fn new<I>(
        data: I,
        sol0: Solution,
        wgts: &Weights,
        consts: &Constants,
    ) -> Result<Self, SolveError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let (keys, values): (Vec<String>, Vec<Value>) = data.into_iter().unzip();
        let eqs = keys
            .iter()
            .map(|k| Equation::new(k, consts, 2))
            .collect::<Result<Vec<_>, _>>()?;
        let wgts = verify_weights(wgts, &keys)?;

        let mut unknowns: Vec<String> = Vec::new();
        for eq in &eqs {
            for name in eq.unknowns() {
                if !unknowns.iter().any(|u| u == name) {
                    unknowns.push(name.clone());
                }
            }
        }
        for name in &unknowns {
            if !sol0.contains_key(name) {
                return Err(SolveError::UnsupportedUnknown(name.clone()));
            }
        }
        for name in sol0.keys() {
            if !unknowns.iter().any(|u| u == name) {
                return Err(SolveError::UnsupportedUnknown(name.clone()));
            }
        }
        for name in &unknowns {
            let diff = format!("{DIFF_PREFIX}{name}");
            if unknowns.iter().any(|u| u == &diff) || consts.contains_key(&diff) {
                return Err(SolveError::NamingCollision(diff));
            }
        }

        Ok(Self {
            keys,
            eqs,
            data: values,
            wgts,
            sol0,
            unknowns,
        })
    }

    /// Returns the unknowns of the system, in first-seen order.
    pub fn unknowns(&self) -> &[String] {
        &self.unknowns
    }

    /// Runs one linearize-solve-update step from the initial estimate.
    ///
    /// Returns the updated estimate; callers iterating manually feed it back
    /// in as the next `sol0`.
    pub fn solve(&self) -> Result<Solution, SolveError> {
        Ok(self.step(&self.sol0)?.0)
    }

    /// Iterates Gauss-Newton steps until convergence or the iteration cap.
    ///
    /// Convergence is reached when, for every broadcast slice, the ratio of
    /// the 2-norm of the correction vector to the 2-norm of the updated
    /// solution vector falls below `opts.conv_crit`. Reaching `opts.maxiter`
    /// first is not an error; the best estimate so far is returned and
    /// `meta.iter == opts.maxiter` lets the caller inspect the outcome.
    ///
    /// # Example
    /// ```
    /// use eqsolve::{Constants, IterOptions, LinProductSolver, Solution, Value, Weights};
    ///
    /// let data = vec![
    ///     ("x*y".to_string(), Value::from(2.0)),
    ///     ("x*z".to_string(), Value::from(3.0)),
    ///     ("y*z".to_string(), Value::from(6.0)),
    /// ];
    /// let mut sol0 = Solution::new();
    /// sol0.insert("x".to_string(), Value::from(1.1));
    /// sol0.insert("y".to_string(), Value::from(2.1));
    /// sol0.insert("z".to_string(), Value::from(2.9));
    /// let solver = LinProductSolver::new(data, sol0, &Weights::new(), &Constants::new()).unwrap();
    /// let (meta, sol) = solver.solve_iteratively(IterOptions::default()).unwrap();
    /// assert!(meta.iter < 50);
    /// assert!((sol["x"].as_real_scalar().unwrap() - 1.0).abs() < 1e-6);
    /// ```
    pub fn solve_iteratively(
        &self,
        opts: IterOptions,
    ) -> Result<(IterationMeta, Solution), SolveError> {
        let mut sol = self.sol0.clone();
        let mut iter = 0;
        for i in 1..=opts.maxiter {
            let (new_sol, conv) = self.step(&sol)?;
            sol = new_sol;
            iter = i;
            if conv < opts.conv_crit {
                break;
            }
        }
        let chisq = chisq_of(&self.eqs, &self.data, &self.wgts, &sol)?;
        Ok((
            IterationMeta {
                conv_crit: opts.conv_crit,
                chisq,
                iter,
            },
            sol,
        ))
    }

    /// Evaluates every original equation's model value at a candidate
    /// solution.
    pub fn eval(&self, sol: &Solution) -> Result<std::collections::HashMap<String, Value>, SolveError> {
        let mut out = std::collections::HashMap::with_capacity(self.keys.len());
        for (key, eq) in self.keys.iter().zip(&self.eqs) {
            out.insert(key.clone(), eq.eval(sol)?);
        }
        Ok(out)
    }

    /// Computes χ² of the original equations at a candidate solution.
    pub fn chisq(&self, sol: &Solution) -> Result<Value, SolveError> {
        chisq_of(&self.eqs, &self.data, &self.wgts, sol)
    }

    /// One Gauss-Newton step: solve the differential system around `sol`
    /// and return the replacement estimate plus the worst per-slice
    /// convergence ratio.
    fn step(&self, sol: &Solution) -> Result<(Solution, f64), SolveError> {
        let dsol = self.linearized(sol)?.solve()?;

        let mut new_sol = Solution::with_capacity(self.unknowns.len());
        let mut num: Option<ArrayD<f64>> = None;
        let mut den: Option<ArrayD<f64>> = None;
        for name in &self.unknowns {
            let diff = format!("{DIFF_PREFIX}{name}");
            let delta = dsol
                .get(&diff)
                .ok_or_else(|| SolveError::UnsupportedUnknown(diff.clone()))?;
            let current = sol
                .get(name)
                .ok_or_else(|| SolveError::UnsupportedUnknown(name.clone()))?;
            let updated = badd(&current.to_complex(), &delta.to_complex())?;
            let real = !current.is_complex() && !delta.is_complex();

            let dsq = delta.to_complex().mapv(|z| z.norm_sqr());
            let usq = updated.mapv(|z| z.norm_sqr());
            num = Some(match num {
                None => dsq,
                Some(acc) => badd_real(&acc, &dsq)?,
            });
            den = Some(match den {
                None => usq,
                Some(acc) => badd_real(&acc, &usq)?,
            });
            new_sol.insert(name.clone(), Value::from_parts(updated, real));
        }

        let conv = match (num, den) {
            (Some(num), Some(den)) => num
                .iter()
                .zip(den.iter())
                .map(|(&n, &d)| (n / d).sqrt())
                .fold(0.0_f64, f64::max),
            _ => 0.0,
        };
        Ok((new_sol, conv))
    }

    /// Builds the differential linear system around `sol`.
    ///
    /// Every name in `sol` acts as a constant at its current value; each
    /// term contributes its zeroth-order value (an all-constant term, which
    /// the builder folds into the residual) plus one differential term per
    /// unknown factor. Conjugated factors keep their conjugation on both
    /// the current value and the differential unknown.
    fn linearized(&self, sol: &Solution) -> Result<LinearSolver, SolveError> {
        let mut eqs = Vec::with_capacity(self.eqs.len());
        for eq in &self.eqs {
            let mut terms = Vec::new();
            for term in eq.terms() {
                let mut vals = Vec::with_capacity(term.vars.len());
                let mut reals = Vec::with_capacity(term.vars.len());
                for var in &term.vars {
                    let value = sol
                        .get(&var.name)
                        .ok_or_else(|| SolveError::UnsupportedUnknown(var.name.clone()))?;
                    let mut c = value.to_complex();
                    if var.conj {
                        c.mapv_inplace(|z| z.conj());
                    }
                    reals.push(!value.is_complex());
                    vals.push(c);
                }

                // zeroth order: the whole term at the current estimate
                let mut c0 = term.coeff.clone();
                for v in &vals {
                    c0 = bmul(&c0, v)?;
                }
                terms.push(ResolvedTerm {
                    coeff: c0,
                    coeff_real: term.coeff_real && reals.iter().all(|&r| r),
                    vars: Vec::new(),
                });

                // first order: one differential unknown per factor
                for (i, var) in term.vars.iter().enumerate() {
                    let mut ci = term.coeff.clone();
                    let mut ci_real = term.coeff_real;
                    for (k, v) in vals.iter().enumerate() {
                        if k != i {
                            ci = bmul(&ci, v)?;
                            ci_real &= reals[k];
                        }
                    }
                    terms.push(ResolvedTerm {
                        coeff: ci,
                        coeff_real: ci_real,
                        vars: vec![VarFactor {
                            name: format!("{DIFF_PREFIX}{}", var.name),
                            conj: var.conj,
                        }],
                    });
                }
            }
            eqs.push(Equation::from_terms(eq.expr().to_string(), terms));
        }
        LinearSolver::from_equations(
            self.keys.clone(),
            eqs,
            self.data.clone(),
            self.wgts.clone(),
        )
    }
}

impl fmt::Debug for LinProductSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "    {}: {:?}", "Equations".cyan(), self.keys)?;
        writeln!(f, "    {}: {:?}", "Unknowns".cyan(), self.unknowns)?;
        write!(f, "}}")
    }
}
