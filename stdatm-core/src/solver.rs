//! Element-wise secant root finder used to invert airspeed relations that
//! have no closed-form inverse

use crate::imports::*;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[non_exhaustive]
/// Solver parameters
pub struct SolverParams {
    #[serde(default = "SolverParams::def_max_iter")]
    /// max number of secant iterations before giving up
    pub max_iter: u32,
    #[serde(default = "SolverParams::def_xtol")]
    /// relative tolerance on the step between two iterates
    pub xtol: f64,
    #[serde(default = "SolverParams::def_initial_true_airspeed")]
    /// initial guess \[m/s\] when inverting a quantity back to true airspeed
    pub initial_true_airspeed: f64,
}

impl SolverParams {
    fn def_max_iter() -> u32 {
        Self::default().max_iter
    }
    fn def_xtol() -> f64 {
        Self::default().xtol
    }
    fn def_initial_true_airspeed() -> f64 {
        Self::default().initial_true_airspeed
    }
}

impl SerdeAPI for SolverParams {}
impl Init for SolverParams {
    fn init(&mut self) -> anyhow::Result<()> {
        ensure!(self.max_iter > 0, format_dbg!(self.max_iter));
        ensure!(
            self.xtol.is_finite() && self.xtol > 0.0,
            format_dbg!(self.xtol)
        );
        ensure!(
            self.initial_true_airspeed.is_finite() && self.initial_true_airspeed > 0.0,
            format_dbg!(self.initial_true_airspeed)
        );
        Ok(())
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iter: 100,
            xtol: 1.49012e-8,
            initial_true_airspeed: 500.0,
        }
    }
}

impl SolverParams {
    /// Finds, for every element `i`, `x[i]` such that `residual(x)[i] == 0`.
    ///
    /// Elements are assumed independent: `residual(x)[i]` may only depend on
    /// `x[i]`.  All elements are evaluated in a single call per iteration so
    /// that `residual` can run vectorized array code.
    ///
    /// # Arguments
    /// - `residual`: returns one residual per element of its argument
    /// - `x0`: initial guess per element
    /// - `lower_bound`: iterates are kept strictly above this value
    pub fn solve<F>(
        &self,
        mut residual: F,
        x0: &[f64],
        lower_bound: f64,
    ) -> Result<Vec<f64>, AtmosphereError>
    where
        F: FnMut(&[f64]) -> Result<Vec<f64>, AtmosphereError>,
    {
        let n = x0.len();
        let mut eval = |x: &[f64]| -> Result<Vec<f64>, AtmosphereError> {
            let f = residual(x)?;
            if f.len() != n {
                return Err(AtmosphereError::Other(format!(
                    "residual returned {} values for {} unknowns",
                    f.len(),
                    n
                )));
            }
            Ok(f)
        };

        // last iterate with a finite residual, used as the secant anchor
        let mut x_prev = x0.to_vec();
        let mut f_prev = eval(&x_prev)?;
        let mut status: Vec<Status> = f_prev
            .iter()
            .map(|f| if *f == 0.0 { Status::Converged } else { Status::Running })
            .collect();
        let mut x: Vec<f64> = x_prev
            .iter()
            .zip(&status)
            .map(|(x, s)| match s {
                Status::Converged => *x,
                _ if *x == 0.0 => 1e-4,
                _ => x * (1.0 + 1e-4),
            })
            .collect();
        let mut last_residual = f_prev.clone();

        let mut iterations = 0;
        while iterations < self.max_iter && status.iter().any(|s| *s == Status::Running) {
            iterations += 1;
            let f = eval(&x)?;
            for i in 0..n {
                if status[i] != Status::Running {
                    continue;
                }
                if !f[i].is_finite() {
                    // step went somewhere the relation is undefined, back off
                    x[i] = 0.5 * (x[i] + x_prev[i]);
                    continue;
                }
                last_residual[i] = f[i];
                if f[i] == 0.0 {
                    status[i] = Status::Converged;
                    continue;
                }
                let df = f[i] - f_prev[i];
                if df == 0.0 || !df.is_finite() {
                    status[i] = Status::Stalled;
                    continue;
                }
                let mut x_next = x[i] - f[i] * (x[i] - x_prev[i]) / df;
                if !x_next.is_finite() {
                    status[i] = Status::Stalled;
                    continue;
                }
                if x_next <= lower_bound {
                    x_next = 0.5 * (x[i] + lower_bound);
                }
                x_prev[i] = x[i];
                f_prev[i] = f[i];
                if (x_next - x[i]).abs() <= self.xtol * (1.0 + x_next.abs()) {
                    status[i] = Status::Converged;
                }
                x[i] = x_next;
            }
            tracing::trace!(
                iterations,
                remaining = status.iter().filter(|s| **s == Status::Running).count(),
                "secant iteration"
            );
        }

        let (indices, residuals): (Vec<usize>, Vec<f64>) = status
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != Status::Converged)
            .map(|(i, _)| (i, last_residual[i]))
            .unzip();
        if !indices.is_empty() {
            tracing::warn!(
                iterations,
                failed = indices.len(),
                total = n,
                "secant solver did not converge"
            );
            return Err(AtmosphereError::ConvergenceFailure {
                indices,
                residuals,
                iterations,
            });
        }
        Ok(x)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Running,
    Converged,
    Stalled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::almost_eq;

    #[test]
    fn test_default_params_deserialize() {
        let params = SolverParams::from_json("{}").unwrap();
        assert_eq!(params, SolverParams::default());
        let params = SolverParams::from_json(r#"{"max_iter": 20}"#).unwrap();
        assert_eq!(params.max_iter, 20);
        assert_eq!(params.xtol, SolverParams::default().xtol);
    }

    #[test]
    fn test_invalid_params() {
        assert!(SolverParams::from_json(r#"{"max_iter": 0}"#).is_err());
        assert!(SolverParams::from_json(r#"{"xtol": -1.0}"#).is_err());
        assert!(SolverParams::from_json(r#"{"initial_true_airspeed": 0.0}"#).is_err());
    }

    #[test]
    fn test_params_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("stdatm-solver-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("solver.json");
        let params = SolverParams {
            max_iter: 42,
            ..Default::default()
        };
        params.to_file(&path).unwrap();
        assert_eq!(SolverParams::from_file(&path).unwrap(), params);
        assert!(SolverParams::from_file(dir.join("solver.yaml")).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_solve_square_roots() {
        let targets = [2.0, 9.0, 100.0, 0.25];
        let root = SolverParams::default()
            .solve(
                |x| Ok(x.iter().zip(&targets).map(|(x, t)| x * x - t).collect()),
                &[500.0; 4],
                0.0,
            )
            .unwrap();
        for (r, t) in root.iter().zip(&targets) {
            assert!(almost_eq(*r, t.sqrt(), Some(1e-9)));
        }
    }

    #[test]
    fn test_solve_already_at_root() {
        let root = SolverParams::default()
            .solve(|x| Ok(x.iter().map(|x| x - 3.0).collect()), &[3.0], 0.0)
            .unwrap();
        assert_eq!(root, vec![3.0]);
    }

    #[test]
    fn test_lower_bound_selects_positive_root() {
        let root = SolverParams::default()
            .solve(|x| Ok(x.iter().map(|x| x * x - 0.01).collect()), &[1.0], 0.0)
            .unwrap();
        assert!(almost_eq(root[0], 0.1, Some(1e-9)));
    }

    #[test]
    fn test_reports_failing_elements() {
        // second element does not depend on its unknown at all
        let err = SolverParams::default()
            .solve(|x| Ok(vec![x[0] - 4.0, 1.0]), &[1.0, 1.0], f64::NEG_INFINITY)
            .unwrap_err();
        match err {
            AtmosphereError::ConvergenceFailure {
                indices, residuals, ..
            } => {
                assert_eq!(indices, vec![1]);
                assert_eq!(residuals.len(), 1);
                assert_eq!(residuals[0], 1.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_max_iter_is_honored() {
        let params = SolverParams {
            max_iter: 1,
            ..Default::default()
        };
        let err = params
            .solve(|x| Ok(x.iter().map(|x| x.powi(3) - 7.0).collect()), &[500.0], 0.0)
            .unwrap_err();
        assert!(matches!(
            err,
            AtmosphereError::ConvergenceFailure { iterations: 1, .. }
        ));
    }

    #[test]
    fn test_residual_length_checked() {
        let err = SolverParams::default()
            .solve(|_| Ok(vec![1.0]), &[1.0, 2.0], 0.0)
            .unwrap_err();
        assert!(matches!(err, AtmosphereError::Other(_)));
    }
}
