use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AtmosphereError {
    /// Provided value cannot be broadcast against the altitude array
    #[error("Shape of provided value {value:?} is not compatible with shape of altitude {altitude:?}")]
    ShapeMismatch {
        value: Vec<usize>,
        altitude: Vec<usize>,
    },
    /// Iterative solve did not reach tolerance for some elements.
    /// `indices` are flat (row-major) positions and `residuals` the last
    /// residual of each failing element.
    #[error("Solver did not converge after {iterations} iterations for elements {indices:?} (last residuals: {residuals:?})")]
    ConvergenceFailure {
        indices: Vec<usize>,
        residuals: Vec<f64>,
        iterations: u32,
    },
    #[error("{0}")]
    Other(String),
}

impl AtmosphereError {
    pub(crate) fn shape_mismatch(value: &[usize], altitude: &[usize]) -> Self {
        Self::ShapeMismatch {
            value: value.to_vec(),
            altitude: altitude.to_vec(),
        }
    }
}
