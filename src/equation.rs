//! Equations: parsed terms resolved against caller-supplied constants.
//!
//! An [`Equation`] owns one equation string together with its resolved form:
//! every additive term is reduced to a single (possibly array-valued)
//! coefficient — the product of its numeric literals and constant factors —
//! times an ordered list of remaining variable factors. Names are classified
//! by lookup: a factor whose base name appears in the constants map is folded
//! into the coefficient (conjugated first when it carried the marker), and
//! every other name is an unknown. This lookup is the only declaration step
//! unknowns ever get; the set of unknowns is discovered from the equations
//! themselves.
//!
//! The resolver also enforces the active solver's term-arity limit: a linear
//! system tolerates at most one unknown factor per term, the product
//! linearizer at most two. Exceeding the limit fails fast with
//! [`SolveError::NonLinearTerm`].

use std::collections::HashMap;

use ndarray::{arr0, ArrayD};

use crate::errors::SolveError;
use crate::parse::{parse_terms, Factor};
use crate::value::{badd, bmul, C64, Value};

/// Caller-supplied named constants.
pub type Constants = HashMap<String, Value>;

/// A solution or estimate: one value per unknown.
pub type Solution = HashMap<String, Value>;

/// A reference to an unknown inside a term.
#[derive(Debug, Clone, PartialEq)]
pub struct VarFactor {
    /// Base name of the unknown
    pub name: String,
    /// True when this occurrence is conjugated
    pub conj: bool,
}

/// One additive term after constant resolution: coefficient × unknowns.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedTerm {
    /// Product of all numeric and constant factors
    pub coeff: ArrayD<C64>,
    /// True when every folded factor was real
    pub coeff_real: bool,
    /// Remaining unknown factors, in source order
    pub vars: Vec<VarFactor>,
}

/// An equation string together with its constant-resolved terms.
#[derive(Debug, Clone)]
pub struct Equation {
    expr: String,
    terms: Vec<ResolvedTerm>,
    unknowns: Vec<String>,
}

impl Equation {
    /// Parses `expr` and resolves it against `consts`.
    ///
    /// # Arguments
    /// * `expr` - The equation's expression string
    /// * `consts` - Named constants to fold into term coefficients
    /// * `max_vars` - Maximum number of unknown factors tolerated per term
    ///
    /// # Errors
    /// Returns [`SolveError::Parse`] for grammar violations,
    /// [`SolveError::NonLinearTerm`] when a term keeps more than `max_vars`
    /// unknown factors after resolution, and [`SolveError::ShapeMismatch`]
    /// when constant factors cannot broadcast against each other.
    ///
    /// # Example
    /// ```
    /// # use eqsolve::equation::Equation;
    /// # use eqsolve::{Constants, Value};
    /// let mut consts = Constants::new();
    /// consts.insert("a".to_string(), Value::from(2.0));
    /// let eq = Equation::new("a*x - y", &consts, 1).unwrap();
    /// assert_eq!(eq.unknowns(), ["x", "y"]);
    /// ```
    pub fn new(expr: &str, consts: &Constants, max_vars: usize) -> Result<Self, SolveError> {
        let parsed = parse_terms(expr)?;
        let mut terms = Vec::with_capacity(parsed.len());
        for term in parsed {
            let mut coeff = arr0(C64::new(1.0, 0.0)).into_dyn();
            let mut coeff_real = true;
            let mut vars = Vec::new();
            for factor in term.factors {
                match factor {
                    Factor::Number(n) => {
                        coeff = bmul(&coeff, &arr0(n).into_dyn())?;
                        coeff_real &= n.im == 0.0;
                    }
                    Factor::Name { name, conj } => match consts.get(&name) {
                        Some(value) => {
                            let mut c = value.to_complex();
                            if conj {
                                c.mapv_inplace(|z| z.conj());
                            }
                            coeff = bmul(&coeff, &c)?;
                            coeff_real &= !value.is_complex();
                        }
                        None => vars.push(VarFactor { name, conj }),
                    },
                }
            }
            if vars.len() > max_vars {
                return Err(SolveError::NonLinearTerm {
                    equation: expr.to_string(),
                    found: vars.len(),
                    limit: max_vars,
                });
            }
            terms.push(ResolvedTerm {
                coeff,
                coeff_real,
                vars,
            });
        }
        Ok(Self::from_terms(expr.to_string(), terms))
    }

    /// Builds an equation directly from resolved terms.
    ///
    /// Used by the nonlinear solvers, which synthesize derived systems
    /// programmatically rather than through the string grammar.
    pub(crate) fn from_terms(expr: String, terms: Vec<ResolvedTerm>) -> Self {
        let mut unknowns: Vec<String> = Vec::new();
        for term in &terms {
            for var in &term.vars {
                if !unknowns.iter().any(|u| u == &var.name) {
                    unknowns.push(var.name.clone());
                }
            }
        }
        Self {
            expr,
            terms,
            unknowns,
        }
    }

    /// Returns the expression string this equation was built from.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Returns the unknowns of this equation, in first-seen order.
    pub fn unknowns(&self) -> &[String] {
        &self.unknowns
    }

    pub(crate) fn terms(&self) -> &[ResolvedTerm] {
        &self.terms
    }

    /// Evaluates the model value of this equation at a candidate solution.
    ///
    /// Conjugated occurrences use the conjugate of the solution value. The
    /// result is real exactly when every coefficient and every referenced
    /// value is real.
    ///
    /// # Errors
    /// Returns [`SolveError::UnsupportedUnknown`] when `sol` lacks a value
    /// for one of the equation's unknowns, or [`SolveError::ShapeMismatch`]
    /// when values cannot broadcast.
    ///
    /// # Example
    /// ```
    /// # use eqsolve::equation::Equation;
    /// # use eqsolve::{Constants, Solution, Value};
    /// let mut consts = Constants::new();
    /// consts.insert("a".to_string(), Value::from(2.0));
    /// consts.insert("b".to_string(), Value::from(4.0));
    /// let eq = Equation::new("a*x - b*y", &consts, 1).unwrap();
    ///
    /// let mut sol = Solution::new();
    /// sol.insert("x".to_string(), Value::from(3.0));
    /// sol.insert("y".to_string(), Value::from(7.0));
    /// assert_eq!(eq.eval(&sol).unwrap().as_real_scalar(), Some(2.0 * 3.0 - 4.0 * 7.0));
    /// ```
    pub fn eval(&self, sol: &Solution) -> Result<Value, SolveError> {
        let mut acc: Option<ArrayD<C64>> = None;
        let mut real = true;
        for term in &self.terms {
            let mut model = term.coeff.clone();
            real &= term.coeff_real;
            for var in &term.vars {
                let value = sol
                    .get(&var.name)
                    .ok_or_else(|| SolveError::UnsupportedUnknown(var.name.clone()))?;
                let mut c = value.to_complex();
                if var.conj {
                    c.mapv_inplace(|z| z.conj());
                }
                real &= !value.is_complex();
                model = bmul(&model, &c)?;
            }
            acc = Some(match acc {
                None => model,
                Some(sum) => badd(&sum, &model)?,
            });
        }
        // the grammar guarantees at least one term
        let total = acc.unwrap_or_else(|| arr0(C64::new(0.0, 0.0)).into_dyn());
        Ok(Value::from_parts(total, real))
    }
}
