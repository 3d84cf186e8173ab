//! Numpy-style broadcasting with explicit failure instead of panics

use crate::imports::*;

/// Resulting shape when broadcasting `a` against `b`.
///
/// Trailing dimensions are compared pairwise; they are compatible when equal
/// or when either is 1.  A 0-D shape broadcasts against anything.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, AtmosphereError> {
    let ndim = a.len().max(b.len());
    let mut shape = vec![0; ndim];
    for i in 0..ndim {
        // walk from the trailing axis, treating missing leading axes as 1
        let dim_a = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let dim_b = if i < b.len() { b[b.len() - 1 - i] } else { 1 };
        shape[ndim - 1 - i] = match (dim_a, dim_b) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return Err(AtmosphereError::shape_mismatch(a, b)),
        };
    }
    Ok(shape)
}

/// Broadcasts `value` to `shape`, returning an owned array
pub fn broadcast_to(value: &ArrayD<f64>, shape: &[usize]) -> Result<ArrayD<f64>, AtmosphereError> {
    if value.shape() == shape {
        return Ok(value.clone());
    }
    value
        .broadcast(IxDyn(shape))
        .map(|view| view.to_owned())
        .ok_or_else(|| AtmosphereError::shape_mismatch(value.shape(), shape))
}

/// Applies `f` element-wise over `a` and `b` broadcast against each other
pub fn zip_broadcast<F>(
    a: &ArrayD<f64>,
    b: &ArrayD<f64>,
    f: F,
) -> Result<ArrayD<f64>, AtmosphereError>
where
    F: Fn(f64, f64) -> f64,
{
    let shape = broadcast_shape(a.shape(), b.shape())?;
    let a_view = a
        .broadcast(IxDyn(&shape))
        .ok_or_else(|| AtmosphereError::shape_mismatch(a.shape(), &shape))?;
    let b_view = b
        .broadcast(IxDyn(&shape))
        .ok_or_else(|| AtmosphereError::shape_mismatch(b.shape(), &shape))?;
    Ok(Zip::from(&a_view)
        .and(&b_view)
        .map_collect(|&x, &y| f(x, y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, array};

    #[test]
    fn test_broadcast_shape() {
        assert_eq!(broadcast_shape(&[3], &[]).unwrap(), vec![3]);
        assert_eq!(broadcast_shape(&[], &[]).unwrap(), Vec::<usize>::new());
        assert_eq!(broadcast_shape(&[2, 3], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shape(&[2, 1], &[1, 4]).unwrap(), vec![2, 4]);
        assert_eq!(broadcast_shape(&[1], &[5]).unwrap(), vec![5]);
        assert_eq!(
            broadcast_shape(&[3], &[2]).unwrap_err(),
            AtmosphereError::ShapeMismatch {
                value: vec![3],
                altitude: vec![2]
            }
        );
        assert!(broadcast_shape(&[2, 3], &[2]).is_err());
    }

    #[test]
    fn test_broadcast_to() {
        let row = array![1., 2., 3.].into_dyn();
        let out = broadcast_to(&row, &[2, 3]).unwrap();
        assert_eq!(out, array![[1., 2., 3.], [1., 2., 3.]].into_dyn());
        assert!(broadcast_to(&row, &[2]).is_err());
    }

    #[test]
    fn test_zip_broadcast() {
        let a = array![[1., 2., 3.], [4., 5., 6.]].into_dyn();
        let b = array![10., 20., 30.].into_dyn();
        let c = zip_broadcast(&a, &b, |x, y| x * y).unwrap();
        assert_eq!(c, array![[10., 40., 90.], [40., 100., 180.]].into_dyn());

        let s = arr0(2.).into_dyn();
        let d = zip_broadcast(&s, &b, |x, y| x + y).unwrap();
        assert_eq!(d, array![12., 22., 32.].into_dyn());

        let bad = array![1., 2.].into_dyn();
        assert!(matches!(
            zip_broadcast(&bad, &b, |x, _| x),
            Err(AtmosphereError::ShapeMismatch { .. })
        ));
    }
}
