//! User-facing entry point combining an atmospheric profile with speed
//! resolution

use crate::imports::*;
use crate::profile::AtmosphericProfile;
use crate::solver::SolverParams;
use crate::speed::SpeedResolver;
use std::ops::{Deref, DerefMut};

/// Length of one foot \[m\]
pub const FOOT: f64 = 0.3048;

/// Unit of the altitude given to, or read back from, an [Atmosphere]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AltitudeUnit {
    #[default]
    Feet,
    Meters,
}

impl AltitudeUnit {
    /// Length of one unit \[m\]
    pub fn in_meters(self) -> f64 {
        match self {
            Self::Feet => FOOT,
            Self::Meters => 1.0,
        }
    }
}

/// ISA atmosphere at one or several altitudes, with optional temperature
/// increment.
///
/// All [SpeedResolver] getters and setters are available through `Deref`.
///
/// # Example
/// ```
/// use stdatm_core::prelude::*;
///
/// let mut atm = Atmosphere::new(vec![0.0, 1_000.0, 35_000.0], 0.0, AltitudeUnit::Feet);
/// atm.set_mach(vec![1.0, 1.5, 2.0]).unwrap();
/// let tas = atm.true_airspeed().unwrap().unwrap();
/// assert!((tas[[2]] - 593.073).abs() < 1e-3);
/// ```
#[derive(Clone, Debug)]
pub struct Atmosphere {
    resolver: SpeedResolver,
}

impl Atmosphere {
    /// # Arguments
    /// - `altitude`: altitude, scalar or array, in `unit`
    /// - `delta_t`: temperature increment \[K\] applied to ISA temperature
    /// - `unit`: unit of `altitude`
    pub fn new<A: IntoArrayD>(altitude: A, delta_t: f64, unit: AltitudeUnit) -> Self {
        let altitude = altitude.into_array_d() * unit.in_meters();
        Self {
            resolver: SpeedResolver::new(Arc::new(AtmosphericProfile::new(altitude, delta_t))),
        }
    }

    /// Same as [Atmosphere::new] with altitude in meters
    pub fn si<A: IntoArrayD>(altitude: A, delta_t: f64) -> Self {
        Self::new(altitude, delta_t, AltitudeUnit::Meters)
    }

    pub fn with_solver_params(mut self, solver_params: SolverParams) -> Self {
        self.resolver = self.resolver.with_solver_params(solver_params);
        self
    }

    /// Altitude expressed in `unit`
    pub fn altitude(&self, unit: AltitudeUnit) -> ArrayD<f64> {
        self.resolver.altitude() / unit.in_meters()
    }

    /// Temperature increment \[K\]
    pub fn delta_t(&self) -> f64 {
        self.resolver.delta_t()
    }

    pub fn into_resolver(self) -> SpeedResolver {
        self.resolver
    }
}

impl Deref for Atmosphere {
    type Target = SpeedResolver;

    fn deref(&self) -> &Self::Target {
        &self.resolver
    }
}

impl DerefMut for Atmosphere {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.resolver
    }
}

impl fmt::Display for Atmosphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Atmosphere(altitude = {} m, delta_t = {} K",
            self.resolver.altitude(),
            self.delta_t()
        )?;
        if let Some(parameter) = self.authoritative() {
            write!(f, ", {parameter} set")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speed::SpeedParameter;
    use crate::utils::{almost_eq, almost_eq_arrays, ArrayExt};
    use ndarray::array;

    #[test]
    fn test_altitude_units() {
        let atm = Atmosphere::new(vec![0.0, 1_000.0, 35_000.0], 0.0, AltitudeUnit::default());
        assert!(almost_eq_arrays(
            &atm.altitude(AltitudeUnit::Meters),
            &array![0.0, 304.8, 10_668.0].into_dyn(),
            Some(1e-12)
        ));
        assert!(almost_eq_arrays(
            &atm.altitude(AltitudeUnit::Feet),
            &array![0.0, 1_000.0, 35_000.0].into_dyn(),
            Some(1e-12)
        ));
        let si = Atmosphere::si(3_048.0, 0.0);
        assert!(almost_eq(
            si.pressure().as_scalar().unwrap(),
            69_681.66657158,
            Some(1e-9)
        ));
    }

    #[test]
    fn test_delta_t() {
        let atm = Atmosphere::new(5_000.0, 10.0, AltitudeUnit::Feet);
        assert_eq!(atm.delta_t(), 10.0);
        assert!(almost_eq(
            atm.density().as_scalar().unwrap(),
            1.018918970166712,
            Some(1e-10)
        ));
    }

    #[test]
    fn test_mach_from_true_airspeed() {
        let mut atm = Atmosphere::new(30_000.0, 0.0, AltitudeUnit::Feet);
        atm.set_true_airspeed(vec![100.0, 250.0]).unwrap();
        let mach = atm.mach().unwrap().unwrap();
        assert!(almost_eq_arrays(
            &mach,
            &array![0.32984282, 0.82460705].into_dyn(),
            Some(1e-7)
        ));
    }

    #[test]
    fn test_true_airspeed_from_mach_and_equivalent_airspeed() {
        let mut atm = Atmosphere::new(vec![0.0, 1_000.0, 35_000.0], 0.0, AltitudeUnit::Feet);
        atm.set_mach(vec![1.0, 1.5, 2.0]).unwrap();
        assert!(almost_eq_arrays(
            &atm.true_airspeed().unwrap().unwrap(),
            &array![340.29526405, 508.68507243, 593.0730464].into_dyn(),
            Some(1e-8)
        ));

        atm.set_equivalent_airspeed(array![[300.0, 200.0, 100.0], [50.0, 100.0, 150.0]])
            .unwrap();
        assert!(almost_eq_arrays(
            &atm.true_airspeed().unwrap().unwrap(),
            &array![
                [300.0, 202.95792913, 179.64141026],
                [50.0, 101.47896457, 269.46211539]
            ]
            .into_dyn(),
            Some(1e-8)
        ));
    }

    #[test]
    fn test_solver_params_are_used() {
        let params = SolverParams::from_json(r#"{"max_iter": 1}"#).unwrap();
        let mut atm = Atmosphere::si(0.0, 0.0).with_solver_params(params);
        assert_eq!(atm.solver_params().max_iter, 1);
        atm.set_calibrated_airspeed(100.0).unwrap();
        assert!(matches!(
            atm.true_airspeed(),
            Err(AtmosphereError::ConvergenceFailure { .. })
        ));
    }

    #[test]
    fn test_display() {
        let mut atm = Atmosphere::si(0.0, 0.0);
        let shown = format!("{atm}");
        assert!(shown.starts_with("Atmosphere(altitude = "));
        assert!(shown.ends_with("delta_t = 0 K)"));
        atm.set(SpeedParameter::Mach, 0.5).unwrap();
        assert!(format!("{atm}").ends_with("mach set)"));
        let resolver = atm.into_resolver();
        assert_eq!(resolver.authoritative(), Some(SpeedParameter::Mach));
    }
}
