//! Assembly and solution of batched weighted linear systems.
//!
//! [`LinearSystem`] is the numeric core shared by every solver in the crate.
//! It takes a set of resolved equations with their data and weights, works
//! out the common broadcast shape of all inputs, and materializes — per
//! broadcast slice — the design matrix A, data vector b, and weight vector w
//! of the weighted least-squares problem min ‖√W·(Ax − b)‖². All slices are
//! solved in one call; a shape or solvability failure aborts the whole
//! batch.
//!
//! Complex unknowns that appear in conjugated form make the system
//! anti-linear, so it cannot be solved as a complex-linear problem. Whenever
//! any input is complex, the builder therefore splits each unknown
//! `x = u + i·v` into its real pair and each equation into its real and
//! imaginary rows. An unconjugated occurrence with coefficient `c`
//! contributes the block `[Re c, −Im c; Im c, Re c]` to the `(u, v)`
//! columns; a conjugated occurrence contributes `[Re c, Im c; Im c, −Re c]`.
//! The doubled real system is linear again, and the solved pairs recombine
//! into complex solutions.
//!
//! Each slice is solved through an SVD, which degrades gracefully: an
//! exactly-determined system gets its exact solution, an overdetermined one
//! its least-squares solution, and a rank-deficient one the least-norm
//! member of the solution family.

use std::collections::HashMap;

use itertools::izip;
use nalgebra::{DMatrix, DVector};
use ndarray::{ArrayD, IxDyn};

use crate::equation::{Equation, Solution};
use crate::errors::SolveError;
use crate::value::{broadcast_flat, broadcast_flat_real, fold_shape, C64, Value};

/// One equation's contribution: flattened rhs, weight, and matrix entries.
#[derive(Debug)]
struct Row {
    rhs: Vec<C64>,
    wgt: Vec<f64>,
    entries: Vec<Entry>,
}

/// A coefficient stream for one (column, conjugation) pair of a row.
#[derive(Debug)]
struct Entry {
    col: usize,
    conj: bool,
    coeff: Vec<C64>,
}

/// A fully assembled batch of per-slice weighted linear systems.
#[derive(Debug)]
pub(crate) struct LinearSystem {
    unknowns: Vec<String>,
    shape: Vec<usize>,
    nslices: usize,
    complex: bool,
    rows: Vec<Row>,
}

impl LinearSystem {
    /// Assembles the batched system from resolved equations.
    ///
    /// `unknowns` fixes the column order (first-seen order across the
    /// caller's equations). Terms with no unknown factor move to the
    /// right-hand side; multiple occurrences of the same unknown in one
    /// equation sum into a single coefficient.
    ///
    /// # Errors
    /// Returns [`SolveError::ShapeMismatch`] when data, weights, and
    /// coefficients share no common broadcast shape, and
    /// [`SolveError::UnsupportedUnknown`] when a column would end up with no
    /// support from any equation.
    pub fn build(
        eqs: &[Equation],
        data: &[Value],
        wgts: &[Value],
        unknowns: &[String],
    ) -> Result<Self, SolveError> {
        let index: HashMap<&str, usize> = unknowns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        // common broadcast shape over every input value
        let mut shape: Vec<usize> = Vec::new();
        for value in data.iter().chain(wgts.iter()) {
            shape = fold_shape(&shape, value.shape())?;
        }
        for eq in eqs {
            for term in eq.terms() {
                shape = fold_shape(&shape, term.coeff.shape())?;
            }
        }
        let nslices = shape.iter().product::<usize>();

        let complex = data.iter().any(Value::is_complex)
            || eqs
                .iter()
                .any(|eq| eq.terms().iter().any(|t| !t.coeff_real));

        let mut rows = Vec::with_capacity(eqs.len());
        for (eq, d, w) in izip!(eqs, data, wgts) {
            let mut rhs = broadcast_flat(&d.to_complex(), &shape)?;
            let wgt = broadcast_flat_real(&w.re(), &shape)?;
            let mut entries: Vec<Entry> = Vec::new();
            for term in eq.terms() {
                let coeff = broadcast_flat(&term.coeff, &shape)?;
                match term.vars.as_slice() {
                    // all-constant terms belong to the right-hand side
                    [] => {
                        for (r, c) in rhs.iter_mut().zip(&coeff) {
                            *r -= c;
                        }
                    }
                    [var] => {
                        let col = index[var.name.as_str()];
                        match entries
                            .iter_mut()
                            .find(|e| e.col == col && e.conj == var.conj)
                        {
                            Some(entry) => {
                                for (a, c) in entry.coeff.iter_mut().zip(&coeff) {
                                    *a += c;
                                }
                            }
                            None => entries.push(Entry {
                                col,
                                conj: var.conj,
                                coeff,
                            }),
                        }
                    }
                    more => {
                        return Err(SolveError::NonLinearTerm {
                            equation: eq.expr().to_string(),
                            found: more.len(),
                            limit: 1,
                        })
                    }
                }
            }
            rows.push(Row { rhs, wgt, entries });
        }

        // every column needs support from at least one equation
        let mut used = vec![false; unknowns.len()];
        for row in &rows {
            for entry in &row.entries {
                used[entry.col] = true;
            }
        }
        if let Some(i) = used.iter().position(|&u| !u) {
            return Err(SolveError::UnsupportedUnknown(unknowns[i].clone()));
        }

        Ok(Self {
            unknowns: unknowns.to_vec(),
            shape,
            nslices,
            complex,
            rows,
        })
    }

    /// Solves every broadcast slice and maps unknowns to their values.
    ///
    /// Real systems solve at their natural size; complex ones through the
    /// doubled real representation described at module level. Solutions come
    /// back as `Real` values exactly when the assembly was real.
    pub fn solve(&self) -> Result<Solution, SolveError> {
        let n = self.unknowns.len();
        let mut columns: Vec<Vec<C64>> = vec![vec![C64::new(0.0, 0.0); self.nslices]; n];
        for slice in 0..self.nslices {
            let x = if self.complex {
                self.solve_slice_complex(slice)?
            } else {
                self.solve_slice_real(slice)?
            };
            for (j, column) in columns.iter_mut().enumerate() {
                column[slice] = x[j];
            }
        }

        let mut sol = Solution::with_capacity(n);
        for (name, column) in self.unknowns.iter().zip(columns) {
            let arr = ArrayD::from_shape_vec(IxDyn(&self.shape), column)
                .map_err(|e| SolveError::Numeric(e.to_string()))?;
            sol.insert(name.clone(), Value::from_parts(arr, !self.complex));
        }
        Ok(sol)
    }

    /// Assembles and solves one all-real slice.
    fn solve_slice_real(&self, slice: usize) -> Result<Vec<C64>, SolveError> {
        let (m, n) = (self.rows.len(), self.unknowns.len());
        let mut a = DMatrix::<f64>::zeros(m, n);
        let mut b = DVector::<f64>::zeros(m);
        for (i, row) in self.rows.iter().enumerate() {
            let sw = row.wgt[slice].sqrt();
            for entry in &row.entries {
                a[(i, entry.col)] += entry.coeff[slice].re;
            }
            b[i] = row.rhs[slice].re;
            for j in 0..n {
                a[(i, j)] *= sw;
            }
            b[i] *= sw;
        }
        let x = lstsq(a, b)?;
        Ok((0..n).map(|j| C64::new(x[j], 0.0)).collect())
    }

    /// Assembles and solves one slice in the doubled real representation.
    fn solve_slice_complex(&self, slice: usize) -> Result<Vec<C64>, SolveError> {
        let (m, n) = (self.rows.len(), self.unknowns.len());
        let mut a = DMatrix::<f64>::zeros(2 * m, 2 * n);
        let mut b = DVector::<f64>::zeros(2 * m);
        for (i, row) in self.rows.iter().enumerate() {
            let sw = row.wgt[slice].sqrt();
            for entry in &row.entries {
                let c = entry.coeff[slice];
                let (re, im) = (c.re, c.im);
                if entry.conj {
                    a[(2 * i, entry.col)] += re;
                    a[(2 * i, n + entry.col)] += im;
                    a[(2 * i + 1, entry.col)] += im;
                    a[(2 * i + 1, n + entry.col)] -= re;
                } else {
                    a[(2 * i, entry.col)] += re;
                    a[(2 * i, n + entry.col)] -= im;
                    a[(2 * i + 1, entry.col)] += im;
                    a[(2 * i + 1, n + entry.col)] += re;
                }
            }
            b[2 * i] = row.rhs[slice].re;
            b[2 * i + 1] = row.rhs[slice].im;
            for j in 0..2 * n {
                a[(2 * i, j)] *= sw;
                a[(2 * i + 1, j)] *= sw;
            }
            b[2 * i] *= sw;
            b[2 * i + 1] *= sw;
        }
        let x = lstsq(a, b)?;
        Ok((0..n).map(|j| C64::new(x[j], x[n + j])).collect())
    }
}

/// SVD-based least-squares solve of one dense system.
///
/// Singular values below a scale-relative threshold are treated as zero,
/// which turns rank deficiency into a least-norm solution instead of a
/// failure.
fn lstsq(a: DMatrix<f64>, b: DVector<f64>) -> Result<DVector<f64>, SolveError> {
    let (m, n) = a.shape();
    let svd = a.svd(true, true);
    let smax = svd
        .singular_values
        .iter()
        .cloned()
        .fold(0.0_f64, f64::max);
    let eps = (smax * m.max(n) as f64 * f64::EPSILON).max(f64::MIN_POSITIVE);
    svd.solve(&b, eps)
        .map(|x| x.column(0).into_owned())
        .map_err(|e| SolveError::Numeric(e.to_string()))
}
