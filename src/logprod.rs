//! Logarithmic linearization of pure-product equation systems.
//!
//! A system whose every equation is a single product — `a*b = 2`,
//! `x*y_ = d` — turns linear under a logarithm: `log(a) + log(b) = log(2)`.
//! [`LogProductSolver`] applies that transform and delegates to the shared
//! linear pipeline.
//!
//! Complex data needs a branch-consistent complex logarithm, which splits
//! naturally into two real systems solved side by side: an *amplitude*
//! system in `ln|·|`, where conjugation is invisible (`|z̄| = |z|`), and a
//! *phase* system in `arg(·)`, where a conjugated factor enters with
//! coefficient −1. Constant factors contribute their own log to the
//! right-hand side of both systems. The per-unknown solutions recombine as
//! `exp(amp + i·phase)`.
//!
//! Log-linearization is biased for overdetermined noisy systems (the
//! logarithm does not commute with averaging) and phases are only recovered
//! up to the branch of the logarithm; both are accepted limitations of this
//! method, whose main job is producing the initial estimate for
//! [`LinProductSolver`](crate::LinProductSolver).

use ndarray::ArrayD;

use crate::equation::{Constants, Equation, ResolvedTerm, Solution, VarFactor};
use crate::errors::SolveError;
use crate::linear::{verify_weights, LinearSolver, Weights};
use crate::value::{C64, Value};

/// Solves pure-product equation systems by taking logarithms.
#[derive(Debug)]
pub struct LogProductSolver {
    ls_amp: LinearSolver,
    ls_phs: LinearSolver,
    all_real: bool,
}

impl LogProductSolver {
    /// Creates a solver from `(equation, data)` pairs.
    ///
    /// Every equation must consist of exactly one product term; sums fail
    /// with [`SolveError::NonProductEquation`]. Constants fold into the
    /// right-hand side of both derived systems; any number of variable
    /// factors per product is fine, since each contributes its own linear
    /// log-term.
    ///
    /// # Arguments
    /// * `data` - Ordered `(equation, data value)` pairs
    /// * `wgts` - Per-equation weights, shared by both derived systems
    /// * `consts` - Named constant values
    ///
    /// # Example
    /// ```
    /// use eqsolve::{Constants, LogProductSolver, Value, Weights};
    ///
    /// let data = vec![
    ///     ("a*b".to_string(), Value::from(2.0)),
    ///     ("b*c".to_string(), Value::from(1.0)),
    ///     ("a*c".to_string(), Value::from(2.0)),
    /// ];
    /// let solver = LogProductSolver::new(data, &Weights::new(), &Constants::new()).unwrap();
    /// let sol = solver.solve().unwrap();
    /// assert!((sol["a"].as_real_scalar().unwrap() - 2.0).abs() < 1e-9);
    /// assert!((sol["b"].as_real_scalar().unwrap() - 1.0).abs() < 1e-9);
    /// ```
    pub fn new<I>(data: I, wgts: &Weights, consts: &Constants) -> Result<Self, SolveError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let (keys, values): (Vec<String>, Vec<Value>) = data.into_iter().unzip();
        let wvec = verify_weights(wgts, &keys)?;

        let mut amp_keys = Vec::with_capacity(keys.len());
        let mut phs_keys = Vec::with_capacity(keys.len());
        let mut amp_eqs = Vec::with_capacity(keys.len());
        let mut phs_eqs = Vec::with_capacity(keys.len());
        let mut amp_data = Vec::with_capacity(keys.len());
        let mut phs_data = Vec::with_capacity(keys.len());
        let mut all_real = true;

        for (key, value) in keys.iter().zip(&values) {
            // no arity limit here: the log transform linearizes every factor
            let eq = Equation::new(key, consts, usize::MAX)?;
            if eq.terms().len() != 1 {
                return Err(SolveError::NonProductEquation(key.clone()));
            }
            let term = &eq.terms()[0];
            all_real &= !value.is_complex() && term.coeff_real;

            // log of the constant coefficient moves to the right-hand side
            let logc = term.coeff.mapv(C64::ln);
            let logd = value.to_complex().mapv(C64::ln);

            amp_data.push(Value::Real(diff_part(&logd, &logc, |z| z.re)?));
            phs_data.push(Value::Real(diff_part(&logd, &logc, |z| z.im)?));

            let (amp_terms, amp_key) = log_terms(term, LogChannel::Amplitude);
            let (phs_terms, phs_key) = log_terms(term, LogChannel::Phase);
            amp_eqs.push(Equation::from_terms(amp_key.clone(), amp_terms));
            phs_eqs.push(Equation::from_terms(phs_key.clone(), phs_terms));
            amp_keys.push(amp_key);
            phs_keys.push(phs_key);
        }

        Ok(Self {
            ls_amp: LinearSolver::from_equations(amp_keys, amp_eqs, amp_data, wvec.clone())?,
            ls_phs: LinearSolver::from_equations(phs_keys, phs_eqs, phs_data, wvec)?,
            all_real,
        })
    }

    /// Returns the unknowns of the system, in first-seen order.
    pub fn unknowns(&self) -> &[String] {
        self.ls_amp.unknowns()
    }

    /// Solves the amplitude and phase systems and recombines the results.
    ///
    /// Unknowns come back as `exp(amp + i·phase)`; when every input was
    /// real, the real part `exp(amp)·cos(phase)` is returned instead, which
    /// also restores the sign of negative real products.
    pub fn solve(&self) -> Result<Solution, SolveError> {
        let amp = self.ls_amp.solve()?;
        let phs = self.ls_phs.solve()?;
        let mut sol = Solution::with_capacity(amp.len());
        for name in self.ls_amp.unknowns() {
            let a = amp[name].re();
            let p = phs[name].re();
            let mut out = ArrayD::<C64>::zeros(a.raw_dim());
            ndarray::Zip::from(&mut out)
                .and(&a)
                .and(&p)
                .for_each(|o, &a, &p| *o = C64::from_polar(a.exp(), p));
            sol.insert(name.clone(), Value::from_parts(out, self.all_real));
        }
        Ok(sol)
    }
}

/// Which of the two derived real systems a term is generated for.
enum LogChannel {
    Amplitude,
    Phase,
}

/// Builds the derived linear terms for one product equation, along with a
/// printable key in the derived system's variables.
///
/// In the amplitude channel every factor enters with coefficient +1; in the
/// phase channel conjugated factors flip to −1. Conjugated factors keep a
/// `1*`/`-1*` prefix in the key so that equations differing only in
/// conjugation stay distinguishable.
fn log_terms(term: &ResolvedTerm, channel: LogChannel) -> (Vec<ResolvedTerm>, String) {
    let mut terms = Vec::with_capacity(term.vars.len());
    let mut key = String::new();
    for var in &term.vars {
        let sign = match (&channel, var.conj) {
            (LogChannel::Phase, true) => -1.0,
            _ => 1.0,
        };
        if !key.is_empty() {
            key.push('+');
        }
        if var.conj {
            key.push_str(if sign < 0.0 { "-1*" } else { "1*" });
        }
        key.push_str(&var.name);
        terms.push(ResolvedTerm {
            coeff: ndarray::arr0(C64::new(sign, 0.0)).into_dyn(),
            coeff_real: true,
            vars: vec![VarFactor {
                name: var.name.clone(),
                conj: false,
            }],
        });
    }
    (terms, key)
}

/// Elementwise `part(logd) − part(logc)` with broadcasting.
fn diff_part(
    logd: &ArrayD<C64>,
    logc: &ArrayD<C64>,
    part: impl Fn(C64) -> f64,
) -> Result<ArrayD<f64>, SolveError> {
    let diff = crate::value::bsub(logd, logc)?;
    Ok(diff.mapv(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, Value)]) -> Vec<(String, Value)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    #[test]
    fn test_product_chain_recovery() {
        let (x, y, z) = (1.0_f64.exp(), 2.0_f64.exp(), 3.0_f64.exp());
        let solver = LogProductSolver::new(
            pairs(&[
                ("x*y*z", Value::from(x * y * z)),
                ("x*y", Value::from(x * y)),
                ("y*z", Value::from(y * z)),
            ]),
            &Weights::new(),
            &Constants::new(),
        )
        .unwrap();
        let sol = solver.solve().unwrap();
        assert!(close(sol["x"].as_real_scalar().unwrap(), x));
        assert!(close(sol["y"].as_real_scalar().unwrap(), y));
        assert!(close(sol["z"].as_real_scalar().unwrap(), z));
    }

    #[test]
    fn test_numeric_coefficient_moves_to_rhs() {
        let z = 3.0;
        let solver = LogProductSolver::new(
            pairs(&[("2*z", Value::from(2.0 * z)), ("z*z", Value::from(z * z))]),
            &Weights::new(),
            &Constants::new(),
        )
        .unwrap();
        let sol = solver.solve().unwrap();
        assert!(close(sol["z"].as_real_scalar().unwrap(), z));
    }

    #[test]
    fn test_sum_rejected() {
        let err = LogProductSolver::new(
            pairs(&[("a*b+c", Value::from(2.0))]),
            &Weights::new(),
            &Constants::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SolveError::NonProductEquation(k) if k == "a*b+c"));
    }

    #[test]
    fn test_conjugation_splits_amp_and_phase() {
        let x = C64::new(1.0, 1.0);
        let y = C64::new(2.0, 2.0);
        let solver = LogProductSolver::new(
            pairs(&[
                ("x*y_", Value::from(x * y.conj())),
                ("x_*y", Value::from(x.conj() * y)),
                ("x*y", Value::from(x * y)),
                ("x_*y_", Value::from(x.conj() * y.conj())),
            ]),
            &Weights::new(),
            &Constants::new(),
        )
        .unwrap();
        // four distinct rows in both derived systems
        assert_eq!(solver.ls_amp.keys().len(), 4);
        let amp_keys: std::collections::HashSet<_> =
            solver.ls_amp.keys().iter().cloned().collect();
        assert_eq!(amp_keys.len(), 4);
        // amplitude keys map onto phase keys by flipping the conjugated signs
        for key in solver.ls_amp.keys() {
            let flipped = key.replace("1*", "-1*");
            assert!(solver.ls_phs.keys().contains(&flipped) || !key.contains("1*"));
        }
    }

    #[test]
    fn test_conjugated_complex_solve() {
        let x = C64::from_polar(1.0_f64.exp(), 0.0);
        let y = C64::from_polar(2.0_f64.exp(), 1.0);
        let solver = LogProductSolver::new(
            pairs(&[
                ("x*y_", Value::from(x * y.conj())),
                ("x", Value::from(x)),
            ]),
            &Weights::new(),
            &Constants::new(),
        )
        .unwrap();
        let sol = solver.solve().unwrap();
        let sx = sol["x"].as_complex_scalar().unwrap();
        let sy = sol["y"].as_complex_scalar().unwrap();
        assert!((sx - x).norm() < 1e-8);
        assert!((sy - y).norm() < 1e-8);
    }

    #[test]
    fn test_degenerate_phase_projects_to_zero() {
        // data with zero relative phases: least-norm solve spreads nothing
        let (x, y, z) = (C64::new(1.0, 1.0), C64::new(2.0, 2.0), C64::new(3.0, 3.0));
        let solver = LogProductSolver::new(
            pairs(&[
                ("x*y_", Value::from(x * y.conj())),
                ("x*z_", Value::from(x * z.conj())),
                ("y*z_", Value::from(y * z.conj())),
            ]),
            &Weights::new(),
            &Constants::new(),
        )
        .unwrap();
        let sol = solver.solve().unwrap();
        let sx = sol["x"].as_complex_scalar().unwrap();
        let sy = sol["y"].as_complex_scalar().unwrap();
        let sz = sol["z"].as_complex_scalar().unwrap();
        assert!(close((sx * sy.conj()).arg(), 0.0));
        assert!(close((sx * sz.conj()).arg(), 0.0));
        assert!(close(sx.arg(), 0.0));
        assert!(close(sy.arg(), 0.0));
        assert!(close(sz.arg(), 0.0));
    }
}
