//! Array conversion and comparison helpers shared by the atmosphere modules

use ndarray::{arr0, Array1, ArrayBase, Data, Dimension};

use crate::imports::*;

pub mod shape;
pub use shape::*;

/// Conversion of user-supplied altitudes and speed values into the dynamic
/// dimension arrays used throughout the crate.
///
/// A plain `f64` becomes a 0-D array, sequences become 1-D arrays and
/// `ndarray` arrays keep their shape.
pub trait IntoArrayD {
    fn into_array_d(self) -> ArrayD<f64>;
}

impl IntoArrayD for f64 {
    fn into_array_d(self) -> ArrayD<f64> {
        arr0(self).into_dyn()
    }
}

impl IntoArrayD for Vec<f64> {
    fn into_array_d(self) -> ArrayD<f64> {
        Array1::from(self).into_dyn()
    }
}

impl IntoArrayD for &[f64] {
    fn into_array_d(self) -> ArrayD<f64> {
        Array1::from(self.to_vec()).into_dyn()
    }
}

impl<const N: usize> IntoArrayD for [f64; N] {
    fn into_array_d(self) -> ArrayD<f64> {
        Array1::from(self.to_vec()).into_dyn()
    }
}

impl<S, D> IntoArrayD for ArrayBase<S, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    fn into_array_d(self) -> ArrayD<f64> {
        self.into_owned().into_dyn()
    }
}

impl<S, D> IntoArrayD for &ArrayBase<S, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    fn into_array_d(self) -> ArrayD<f64> {
        self.to_owned().into_dyn()
    }
}

/// Convenience accessors for computed quantities
pub trait ArrayExt {
    /// Returns the value if the array holds exactly one element
    fn as_scalar(&self) -> Option<f64>;
    /// Returns all elements in row-major (logical) order
    fn to_flat_vec(&self) -> Vec<f64>;
}

impl ArrayExt for ArrayD<f64> {
    fn as_scalar(&self) -> Option<f64> {
        if self.len() == 1 {
            self.iter().next().copied()
        } else {
            None
        }
    }

    fn to_flat_vec(&self) -> Vec<f64> {
        self.iter().copied().collect()
    }
}

/// Returns true if `val1` and `val2` are within a relative/absolute `epsilon` of each other,
/// depending on magnitude.
pub fn almost_eq(val1: f64, val2: f64, epsilon: Option<f64>) -> bool {
    let epsilon = epsilon.unwrap_or(1e-8);
    ((val2 - val1) / (val1 + val2)).abs() < epsilon || (val2 - val1).abs() < epsilon
}

/// Element-wise [almost_eq] over two arrays of identical shape
pub fn almost_eq_arrays(val1: &ArrayD<f64>, val2: &ArrayD<f64>, epsilon: Option<f64>) -> bool {
    val1.shape() == val2.shape()
        && val1
            .iter()
            .zip(val2.iter())
            .all(|(v1, v2)| almost_eq(*v1, *v2, epsilon))
}
