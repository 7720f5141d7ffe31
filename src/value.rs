//! Scalar-or-array values with numpy-style broadcasting.
//!
//! Every quantity flowing through a solver — measured data, weights,
//! constants, solved unknowns — is a [`Value`]: a real or complex array of
//! arbitrary rank, where a scalar is simply a rank-0 array. Values broadcast
//! against each other the way numeric-array libraries do: shapes are aligned
//! at their trailing axes and axes of extent 1 stretch to match.
//!
//! Internally the solvers assemble everything in `Complex<f64>`; the
//! real/complex distinction carried by `Value` records whether the result of
//! a solve can be handed back as purely real.
//!
//! # Example
//!
//! ```
//! use eqsolve::Value;
//! use ndarray::array;
//!
//! let scalar = Value::from(2.0);
//! let arr = Value::from(array![1.0, 2.0, 3.0]);
//! assert_eq!(scalar.shape(), &[] as &[usize]);
//! assert_eq!(arr.shape(), &[3]);
//! assert!(!arr.is_complex());
//! ```

use ndarray::{arr0, ArrayD, IxDyn};
use num_complex::Complex;

use crate::errors::SolveError;

/// Complex number type used throughout the crate.
pub type C64 = Complex<f64>;

/// A real or complex numeric value of arbitrary rank.
///
/// Scalars are rank-0 arrays; higher ranks represent independent broadcast
/// slices ("pixels") solved in one batched call. Two `Value`s combine under
/// numpy broadcast rules, and mixing real with complex promotes to complex.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Purely real data
    Real(ArrayD<f64>),
    /// Complex data
    Complex(ArrayD<C64>),
}

impl Value {
    /// Returns the shape of the underlying array (empty for scalars).
    pub fn shape(&self) -> &[usize] {
        match self {
            Value::Real(a) => a.shape(),
            Value::Complex(a) => a.shape(),
        }
    }

    /// Returns true if the value carries an imaginary part.
    pub fn is_complex(&self) -> bool {
        matches!(self, Value::Complex(_))
    }

    /// Returns the underlying array promoted to complex.
    pub fn to_complex(&self) -> ArrayD<C64> {
        match self {
            Value::Real(a) => a.mapv(|x| C64::new(x, 0.0)),
            Value::Complex(a) => a.clone(),
        }
    }

    /// Returns the real part of the underlying array.
    pub fn re(&self) -> ArrayD<f64> {
        match self {
            Value::Real(a) => a.clone(),
            Value::Complex(a) => a.mapv(|z| z.re),
        }
    }

    /// Returns the real array if this value is real.
    pub fn as_real(&self) -> Option<&ArrayD<f64>> {
        match self {
            Value::Real(a) => Some(a),
            Value::Complex(_) => None,
        }
    }

    /// Returns the single element of a one-element real value.
    pub fn as_real_scalar(&self) -> Option<f64> {
        match self {
            Value::Real(a) if a.len() == 1 => a.iter().next().copied(),
            _ => None,
        }
    }

    /// Returns the single element of a one-element value, promoted to complex.
    pub fn as_complex_scalar(&self) -> Option<C64> {
        if self.shape().iter().product::<usize>() != 1 {
            return None;
        }
        match self {
            Value::Real(a) => a.iter().next().map(|&x| C64::new(x, 0.0)),
            Value::Complex(a) => a.iter().next().copied(),
        }
    }

    /// Wraps a complex array, demoting to `Real` when `real` is set.
    ///
    /// The solvers track on the side whether every input to a computation was
    /// real; when so, the imaginary parts of the result are identically zero
    /// (up to rounding) and are dropped here.
    pub(crate) fn from_parts(arr: ArrayD<C64>, real: bool) -> Value {
        if real {
            Value::Real(arr.mapv(|z| z.re))
        } else {
            Value::Complex(arr)
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(arr0(x).into_dyn())
    }
}

impl From<C64> for Value {
    fn from(z: C64) -> Self {
        Value::Complex(arr0(z).into_dyn())
    }
}

impl<D: ndarray::Dimension> From<ndarray::Array<f64, D>> for Value {
    fn from(a: ndarray::Array<f64, D>) -> Self {
        Value::Real(a.into_dyn())
    }
}

impl<D: ndarray::Dimension> From<ndarray::Array<C64, D>> for Value {
    fn from(a: ndarray::Array<C64, D>) -> Self {
        Value::Complex(a.into_dyn())
    }
}

/// Computes the common broadcast shape of two shapes under numpy rules.
///
/// Shapes are right-aligned; missing leading axes count as extent 1, and an
/// axis of extent 1 stretches to the other operand's extent. Returns `None`
/// when the shapes are incompatible.
///
/// # Example
/// ```
/// # use eqsolve::value::broadcast_shapes;
/// assert_eq!(broadcast_shapes(&[3, 1], &[4]), Some(vec![3, 4]));
/// assert_eq!(broadcast_shapes(&[], &[2, 5]), Some(vec![2, 5]));
/// assert_eq!(broadcast_shapes(&[3], &[4]), None);
/// ```
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = Vec::with_capacity(ndim);
    for i in 0..ndim {
        let da = if i < ndim - a.len() {
            1
        } else {
            a[i - (ndim - a.len())]
        };
        let db = if i < ndim - b.len() {
            1
        } else {
            b[i - (ndim - b.len())]
        };
        if da == db {
            out.push(da);
        } else if da == 1 {
            out.push(db);
        } else if db == 1 {
            out.push(da);
        } else {
            return None;
        }
    }
    Some(out)
}

/// Folds a value's shape into a running broadcast shape.
pub(crate) fn fold_shape(acc: &[usize], shape: &[usize]) -> Result<Vec<usize>, SolveError> {
    broadcast_shapes(acc, shape).ok_or_else(|| SolveError::shape_mismatch(acc, shape))
}

/// Broadcasts an array to `shape` and returns its elements flattened in
/// logical (row-major) order.
pub(crate) fn broadcast_flat(arr: &ArrayD<C64>, shape: &[usize]) -> Result<Vec<C64>, SolveError> {
    let view = arr
        .broadcast(IxDyn(shape))
        .ok_or_else(|| SolveError::shape_mismatch(arr.shape(), shape))?;
    Ok(view.iter().copied().collect())
}

/// Broadcasts a real array to `shape`, flattened as in [`broadcast_flat`].
pub(crate) fn broadcast_flat_real(
    arr: &ArrayD<f64>,
    shape: &[usize],
) -> Result<Vec<f64>, SolveError> {
    let view = arr
        .broadcast(IxDyn(shape))
        .ok_or_else(|| SolveError::shape_mismatch(arr.shape(), shape))?;
    Ok(view.iter().copied().collect())
}

/// Elementwise product of two complex arrays with broadcasting.
pub(crate) fn bmul(a: &ArrayD<C64>, b: &ArrayD<C64>) -> Result<ArrayD<C64>, SolveError> {
    bzip(a, b, |x, y| x * y)
}

/// Elementwise sum of two complex arrays with broadcasting.
pub(crate) fn badd(a: &ArrayD<C64>, b: &ArrayD<C64>) -> Result<ArrayD<C64>, SolveError> {
    bzip(a, b, |x, y| x + y)
}

/// Elementwise difference of two complex arrays with broadcasting.
pub(crate) fn bsub(a: &ArrayD<C64>, b: &ArrayD<C64>) -> Result<ArrayD<C64>, SolveError> {
    bzip(a, b, |x, y| x - y)
}

fn bzip(
    a: &ArrayD<C64>,
    b: &ArrayD<C64>,
    f: impl Fn(C64, C64) -> C64,
) -> Result<ArrayD<C64>, SolveError> {
    let shape =
        broadcast_shapes(a.shape(), b.shape()).ok_or_else(|| SolveError::shape_mismatch(a.shape(), b.shape()))?;
    let va = a
        .broadcast(IxDyn(&shape))
        .ok_or_else(|| SolveError::shape_mismatch(a.shape(), &shape))?;
    let vb = b
        .broadcast(IxDyn(&shape))
        .ok_or_else(|| SolveError::shape_mismatch(b.shape(), &shape))?;
    let mut out = ArrayD::<C64>::zeros(IxDyn(&shape));
    ndarray::Zip::from(&mut out)
        .and(&va)
        .and(&vb)
        .for_each(|o, &x, &y| *o = f(x, y));
    Ok(out)
}

/// Elementwise product of two real arrays with broadcasting.
pub(crate) fn bmul_real(a: &ArrayD<f64>, b: &ArrayD<f64>) -> Result<ArrayD<f64>, SolveError> {
    bzip_real(a, b, |x, y| x * y)
}

/// Elementwise sum of two real arrays with broadcasting.
pub(crate) fn badd_real(a: &ArrayD<f64>, b: &ArrayD<f64>) -> Result<ArrayD<f64>, SolveError> {
    bzip_real(a, b, |x, y| x + y)
}

fn bzip_real(
    a: &ArrayD<f64>,
    b: &ArrayD<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<ArrayD<f64>, SolveError> {
    let shape =
        broadcast_shapes(a.shape(), b.shape()).ok_or_else(|| SolveError::shape_mismatch(a.shape(), b.shape()))?;
    let va = a
        .broadcast(IxDyn(&shape))
        .ok_or_else(|| SolveError::shape_mismatch(a.shape(), &shape))?;
    let vb = b
        .broadcast(IxDyn(&shape))
        .ok_or_else(|| SolveError::shape_mismatch(b.shape(), &shape))?;
    let mut out = ArrayD::<f64>::zeros(IxDyn(&shape));
    ndarray::Zip::from(&mut out)
        .and(&va)
        .and(&vb)
        .for_each(|o, &x, &y| *o = f(x, y));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scalar_shapes() {
        let v = Value::from(3.0);
        assert_eq!(v.shape(), &[] as &[usize]);
        assert_eq!(v.as_real_scalar(), Some(3.0));
        assert_eq!(v.as_complex_scalar(), Some(C64::new(3.0, 0.0)));
    }

    #[test]
    fn test_complex_promotion() {
        let v = Value::from(C64::new(1.0, 2.0));
        assert!(v.is_complex());
        assert_eq!(v.as_real_scalar(), None);
        assert_eq!(v.as_complex_scalar(), Some(C64::new(1.0, 2.0)));
    }

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[], &[]), Some(vec![]));
        assert_eq!(broadcast_shapes(&[], &[3]), Some(vec![3]));
        assert_eq!(broadcast_shapes(&[2, 1], &[1, 4]), Some(vec![2, 4]));
        assert_eq!(broadcast_shapes(&[10], &[1, 10]), Some(vec![1, 10]));
        assert_eq!(broadcast_shapes(&[3], &[4]), None);
    }

    #[test]
    fn test_broadcast_flat_scalar() {
        let a = arr0(C64::new(2.0, 0.0)).into_dyn();
        let flat = broadcast_flat(&a, &[2, 2]).unwrap();
        assert_eq!(flat.len(), 4);
        assert!(flat.iter().all(|&z| z == C64::new(2.0, 0.0)));
    }

    #[test]
    fn test_broadcast_flat_mismatch() {
        let a = array![C64::new(1.0, 0.0), C64::new(2.0, 0.0)].into_dyn();
        assert!(broadcast_flat(&a, &[3]).is_err());
    }

    #[test]
    fn test_bmul_broadcasting() {
        let col = array![[C64::new(1.0, 0.0)], [C64::new(2.0, 0.0)]].into_dyn();
        let row = array![C64::new(3.0, 0.0), C64::new(4.0, 0.0)].into_dyn();
        let prod = bmul(&col, &row).unwrap();
        assert_eq!(prod.shape(), &[2, 2]);
        assert_eq!(prod[[1, 1]], C64::new(8.0, 0.0));
    }

    #[test]
    fn test_from_parts_drops_imag() {
        let a = array![C64::new(1.0, 1e-30)].into_dyn();
        match Value::from_parts(a.clone(), true) {
            Value::Real(r) => assert_eq!(r[[0]], 1.0),
            Value::Complex(_) => panic!("expected real value"),
        }
        assert!(Value::from_parts(a, false).is_complex());
    }
}
