//! International Standard Atmosphere profile for the troposphere and the
//! lower stratosphere.

use crate::imports::*;
use crate::utils::ArrayExt;

/// molar mass of dry air \[kg/mol\]
pub const AIR_MOLAR_MASS: f64 = 28.9647e-3;
/// universal gas constant \[J/(mol*K)\]
pub const R_UNIVERSAL: f64 = 8.314462618;
/// specific gas constant of dry air \[J/(kg*K)\]
pub const AIR_GAS_CONSTANT: f64 = R_UNIVERSAL / AIR_MOLAR_MASS;
/// ratio of specific heats of dry air
pub const GAMMA_AIR: f64 = 1.4;
/// standard atmosphere \[Pa\]
pub const SEA_LEVEL_PRESSURE: f64 = 101_325.0;
/// \[K\]
pub const SEA_LEVEL_TEMPERATURE: f64 = 288.15;
/// altitude \[m\] of the tropopause, above which temperature is constant
pub const TROPOPAUSE: f64 = 11_000.0;
/// temperature lapse rate in the troposphere \[K/m\]
pub const TROPOSPHERE_LAPSE_RATE: f64 = 0.0065;
/// temperature \[K\] of the lower stratosphere for a null offset
pub const STRATOSPHERE_TEMPERATURE: f64 = 216.65;

lazy_static! {
    /// Atmosphere at zero altitude with no temperature offset, used as
    /// reference for equivalent and calibrated airspeeds
    pub static ref SEA_LEVEL_ATMOSPHERE: AtmosphericProfile = AtmosphericProfile::new(0.0, 0.0);
}

/// Returns temperature \[K\]
/// # Arguments
/// - `altitude`: geometric altitude \[m\]
/// - `delta_t`: temperature increment \[K\] applied to the whole profile
pub fn compute_temperature(altitude: f64, delta_t: f64) -> f64 {
    if altitude < TROPOPAUSE {
        SEA_LEVEL_TEMPERATURE - TROPOSPHERE_LAPSE_RATE * altitude + delta_t
    } else {
        STRATOSPHERE_TEMPERATURE + delta_t
    }
}

/// Returns static pressure \[Pa\]
///
/// # Equations used
/// - troposphere: p = 101325 * (1 - h / 44330.78) ^ 5.25587611
/// - stratosphere: p = 22632 * exp(1.7345725 - 0.0001576883 * h)
///
/// # Arguments
/// - `altitude`: geometric altitude \[m\]
pub fn compute_pressure(altitude: f64) -> f64 {
    if altitude < TROPOPAUSE {
        SEA_LEVEL_PRESSURE * (1.0 - altitude / 44_330.78).powf(5.25587611)
    } else {
        22_632.0 * (1.7345725 - 0.0001576883 * altitude).exp()
    }
}

/// Returns density \[kg/m^3\] of air from the ideal gas law
pub fn compute_density(pressure: f64, temperature: f64) -> f64 {
    pressure / AIR_GAS_CONSTANT / temperature
}

/// Returns speed of sound \[m/s\] in dry air
pub fn compute_speed_of_sound(temperature: f64) -> f64 {
    (GAMMA_AIR * AIR_GAS_CONSTANT * temperature).sqrt()
}

/// Returns dynamic viscosity \[Pa*s\] of air using Sutherland's law
pub fn compute_dynamic_viscosity(temperature: f64) -> f64 {
    1.7894e-5
        * (temperature / SEA_LEVEL_TEMPERATURE).powf(1.5)
        * ((SEA_LEVEL_TEMPERATURE + 110.4) / (temperature + 110.4))
}

/// Returns kinematic viscosity \[m^2/s\]
pub fn compute_kinematic_viscosity(dynamic_viscosity: f64, density: f64) -> f64 {
    dynamic_viscosity / density
}

/// Altitudes and temperature offset an [AtmosphericProfile] is evaluated at.
/// Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct AtmosphericState {
    /// geometric altitude \[m\]
    altitude: ArrayD<f64>,
    /// temperature increment \[K\]
    delta_t: f64,
}

impl AtmosphericState {
    pub fn new<A: IntoArrayD>(altitude: A, delta_t: f64) -> Self {
        Self {
            altitude: altitude.into_array_d(),
            delta_t,
        }
    }

    /// Altitude \[m\]
    pub fn altitude(&self) -> &ArrayD<f64> {
        &self.altitude
    }

    /// Temperature increment \[K\]
    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    pub fn shape(&self) -> &[usize] {
        self.altitude.shape()
    }
}

/// ISA properties over an altitude array.
///
/// Every property has the shape of the altitude array and is computed at
/// most once per instance.  Memo cells are `OnceLock`, so a profile can be
/// shared between threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct AtmosphericProfile {
    state: AtmosphericState,
    temperature: OnceLock<ArrayD<f64>>,
    pressure: OnceLock<ArrayD<f64>>,
    density: OnceLock<ArrayD<f64>>,
    speed_of_sound: OnceLock<ArrayD<f64>>,
    dynamic_viscosity: OnceLock<ArrayD<f64>>,
    kinematic_viscosity: OnceLock<ArrayD<f64>>,
}

impl Default for AtmosphericState {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Clone for AtmosphericProfile {
    /// Clones the state only; memoized properties are recomputed on demand
    fn clone(&self) -> Self {
        Self::from_state(self.state.clone())
    }
}

impl AtmosphericProfile {
    /// # Arguments
    /// - `altitude`: geometric altitude \[m\]
    /// - `delta_t`: temperature increment \[K\] applied to the whole profile
    pub fn new<A: IntoArrayD>(altitude: A, delta_t: f64) -> Self {
        Self::from_state(AtmosphericState::new(altitude, delta_t))
    }

    pub fn from_state(state: AtmosphericState) -> Self {
        Self {
            state,
            temperature: OnceLock::new(),
            pressure: OnceLock::new(),
            density: OnceLock::new(),
            speed_of_sound: OnceLock::new(),
            dynamic_viscosity: OnceLock::new(),
            kinematic_viscosity: OnceLock::new(),
        }
    }

    pub fn state(&self) -> &AtmosphericState {
        &self.state
    }

    /// Altitude \[m\]
    pub fn altitude(&self) -> &ArrayD<f64> {
        self.state.altitude()
    }

    /// Temperature increment \[K\]
    pub fn delta_t(&self) -> f64 {
        self.state.delta_t()
    }

    pub fn shape(&self) -> &[usize] {
        self.state.shape()
    }

    /// Temperature \[K\]
    pub fn temperature(&self) -> &ArrayD<f64> {
        self.temperature.get_or_init(|| {
            let delta_t = self.delta_t();
            self.altitude()
                .mapv(|altitude| compute_temperature(altitude, delta_t))
        })
    }

    /// Static pressure \[Pa\]
    pub fn pressure(&self) -> &ArrayD<f64> {
        self.pressure
            .get_or_init(|| self.altitude().mapv(compute_pressure))
    }

    /// Density \[kg/m^3\]
    pub fn density(&self) -> &ArrayD<f64> {
        self.density.get_or_init(|| {
            Zip::from(self.pressure())
                .and(self.temperature())
                .map_collect(|&p, &t| compute_density(p, t))
        })
    }

    /// Speed of sound \[m/s\]
    pub fn speed_of_sound(&self) -> &ArrayD<f64> {
        self.speed_of_sound
            .get_or_init(|| self.temperature().mapv(compute_speed_of_sound))
    }

    /// Dynamic viscosity \[Pa*s\]
    pub fn dynamic_viscosity(&self) -> &ArrayD<f64> {
        self.dynamic_viscosity
            .get_or_init(|| self.temperature().mapv(compute_dynamic_viscosity))
    }

    /// Kinematic viscosity \[m^2/s\]
    pub fn kinematic_viscosity(&self) -> &ArrayD<f64> {
        self.kinematic_viscosity.get_or_init(|| {
            Zip::from(self.dynamic_viscosity())
                .and(self.density())
                .map_collect(|&mu, &rho| compute_kinematic_viscosity(mu, rho))
        })
    }
}

/// Scalar properties of [static@SEA_LEVEL_ATMOSPHERE]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SeaLevel {
    pub pressure: f64,
    pub density: f64,
    pub speed_of_sound: f64,
}

impl SeaLevel {
    pub fn get() -> Result<Self, AtmosphereError> {
        let scalar = |values: &ArrayD<f64>| {
            values.as_scalar().ok_or_else(|| {
                AtmosphereError::Other(format!(
                    "sea level reference must hold a single value, got shape {:?}",
                    values.shape()
                ))
            })
        };
        Ok(Self {
            pressure: scalar(SEA_LEVEL_ATMOSPHERE.pressure())?,
            density: scalar(SEA_LEVEL_ATMOSPHERE.density())?,
            speed_of_sound: scalar(SEA_LEVEL_ATMOSPHERE.speed_of_sound())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::almost_eq;
    use ndarray::array;

    #[test]
    fn test_sea_level_reference() {
        let sl = &*SEA_LEVEL_ATMOSPHERE;
        assert!(sl.altitude().shape().is_empty());
        assert_eq!(sl.pressure().as_scalar(), Some(101_325.0));
        assert_eq!(sl.temperature().as_scalar(), Some(288.15));
        assert!(almost_eq(sl.density().as_scalar().unwrap(), 1.2249908312, Some(1e-9)));
        assert!(almost_eq(
            sl.speed_of_sound().as_scalar().unwrap(),
            340.2952640506,
            Some(1e-9)
        ));
        assert!(almost_eq(
            sl.kinematic_viscosity().as_scalar().unwrap(),
            1.46074563e-05,
            Some(1e-8)
        ));
    }

    #[test]
    fn test_profile_values() {
        let feet = 0.3048;
        let atm = AtmosphericProfile::new(vec![0.0, 10_000.0 * feet, 30_000.0 * feet], 0.0);
        let expected_pressure = [101_325.0, 69_681.66657158, 30_089.59825871];
        let expected_nu = [1.46074563e-05, 1.87057660e-05, 3.24486943e-05];
        for i in 0..3 {
            assert!(almost_eq(atm.pressure()[[i]], expected_pressure[i], Some(1e-9)));
            assert!(almost_eq(atm.kinematic_viscosity()[[i]], expected_nu[i], Some(1e-8)));
        }
    }

    #[test]
    fn test_temperature_offset() {
        let hot = AtmosphericProfile::new(5_000.0 * 0.3048, 10.0);
        let std = AtmosphericProfile::new(5_000.0 * 0.3048, 0.0);
        assert!(almost_eq(
            hot.temperature().as_scalar().unwrap() - std.temperature().as_scalar().unwrap(),
            10.0,
            Some(1e-9)
        ));
        // pressure does not depend on the offset
        assert_eq!(hot.pressure(), std.pressure());
        assert!(almost_eq(hot.density().as_scalar().unwrap(), 1.01891897, Some(1e-7)));
    }

    #[test]
    fn test_tropopause() {
        let atm = AtmosphericProfile::new(vec![TROPOPAUSE - 1e-6, TROPOPAUSE, 12_000.0], 0.0);
        let temperature = atm.temperature();
        assert!(almost_eq(temperature[[0]], STRATOSPHERE_TEMPERATURE, Some(1e-6)));
        assert_eq!(temperature[[1]], STRATOSPHERE_TEMPERATURE);
        assert_eq!(temperature[[2]], STRATOSPHERE_TEMPERATURE);
        // both pressure laws agree at the tropopause
        let pressure = atm.pressure();
        assert!(almost_eq(pressure[[0]], pressure[[1]], Some(1e-5)));
        assert!(almost_eq(pressure[[2]], 19_330.3757939, Some(1e-9)));
        assert!(almost_eq(atm.speed_of_sound()[[2]], 295.0705999521, Some(1e-9)));
    }

    #[test]
    fn test_shape_is_kept() {
        let atm = AtmosphericProfile::new(array![[0.0, 1_000.0], [5_000.0, 12_000.0]], 0.0);
        assert_eq!(atm.temperature().shape(), &[2, 2]);
        assert_eq!(atm.density().shape(), &[2, 2]);
        assert_eq!(atm.kinematic_viscosity().shape(), &[2, 2]);
        let scalar = AtmosphericProfile::new(1_000.0, 0.0);
        assert!(scalar.pressure().shape().is_empty());
    }

    #[test]
    fn test_memoized() {
        let atm = AtmosphericProfile::new(vec![0.0, 1_000.0], 0.0);
        assert!(std::ptr::eq(atm.density(), atm.density()));
        let cloned = atm.clone();
        assert_eq!(cloned.state(), atm.state());
        assert_eq!(cloned.density(), atm.density());
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AtmosphericProfile>();
    }
}
