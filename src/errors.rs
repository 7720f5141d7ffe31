//! Error types for the eqsolve crate.
//!
//! This module defines the error types that can occur while parsing equation
//! strings and while building and solving the numeric systems derived from
//! them. The main error types are:
//!
//! - `ParseError`: Errors in the equation-string grammar itself
//! - `SolveError`: Errors while resolving constants, assembling a linear
//!   system, or solving it
//!
//! Each error type implements the standard Error trait and provides detailed
//! error messages.

use thiserror::Error;

/// Errors that can occur while parsing an equation string.
///
/// The grammar is deliberately small: a sum of products of numeric literals
/// and names. Anything outside that grammar is rejected here rather than
/// silently accepted and misinterpreted downstream.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The expression contains no terms at all
    #[error("empty expression")]
    Empty,
    /// Error when encountering an operator that is not part of the grammar
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// Error when encountering a character that cannot start any token
    #[error("unexpected character {0:?} at position {1}")]
    UnexpectedCharacter(char, usize),
    /// Error when a numeric literal fails to parse as a float
    #[error("invalid numeric literal: {0}")]
    InvalidNumber(String),
    /// A term ended where a factor was required (e.g. `x+` or `2*`)
    #[error("expected a factor at position {0}")]
    ExpectedFactor(usize),
    /// Two factors appeared without an operator between them (e.g. `2 x`)
    #[error("expected an operator at position {0}")]
    ExpectedOperator(usize),
}

/// Errors that can occur while building or solving an equation system.
///
/// These cover the resolution of parsed terms against supplied constants,
/// validation of weights and initial estimates, broadcast-shape checking,
/// and the numeric solve itself. All of them surface synchronously from the
/// constructing or solving call; no partially built system is ever returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    /// Error when parsing an equation string
    #[error("failed to parse equation: {0}")]
    Parse(#[from] ParseError),
    /// A term carries more unknown factors than the active solver supports
    #[error("term in '{equation}' has {found} unknown factors (limit is {limit})")]
    NonLinearTerm {
        equation: String,
        found: usize,
        limit: usize,
    },
    /// Two values cannot be broadcast against each other
    #[error("incompatible broadcast shapes {lhs:?} and {rhs:?}")]
    ShapeMismatch { lhs: Vec<usize>, rhs: Vec<usize> },
    /// An unknown is not usable: no equation references it, or no value was
    /// supplied for it where one is required (initial estimate, evaluation)
    #[error("unknown '{0}' never appears in the system or has no supplied value")]
    UnsupportedUnknown(String),
    /// A differential name collides with an existing unknown or constant
    #[error("differential name '{0}' collides with an existing name")]
    NamingCollision(String),
    /// Weights must be real-valued
    #[error("weight for equation '{0}' must be real")]
    ComplexWeight(String),
    /// A weights map was supplied but does not cover every equation
    #[error("missing weight for equation '{0}'")]
    MissingWeight(String),
    /// The log-product solver requires every equation to be a single product
    #[error("equation '{0}' is not a pure product of factors")]
    NonProductEquation(String),
    /// The dense least-squares backend reported a failure
    #[error("linear algebra failure: {0}")]
    Numeric(String),
}

impl SolveError {
    /// Builds a `ShapeMismatch` from two offending shapes.
    pub(crate) fn shape_mismatch(lhs: &[usize], rhs: &[usize]) -> Self {
        SolveError::ShapeMismatch {
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        }
    }
}
