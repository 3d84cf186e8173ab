//! Resolution of speed parameters.
//!
//! Exactly one speed parameter is set at a time.  Every other one is derived
//! on demand through true airspeed:
//!
//! ```text
//!   mach ──┐                        ┌── mach
//!   EAS ───┤                        ├── EAS
//!   Re/l ──┼──► true airspeed ──────┼── Re/l
//!   q ─────┤                        ├── q
//!   qc ────┤ (solver)               ├── qc ── CAS
//!   CAS ───┘ (solver)               └──
//! ```

use crate::imports::*;
use crate::profile::{AtmosphericProfile, SeaLevel};
use crate::solver::SolverParams;
use crate::utils::ArrayExt;

/// gamma / 2 for air, used in dynamic pressure
const HALF_GAMMA: f64 = 0.7;
/// Rayleigh pitot tube formula coefficient for supersonic impact pressure
const RAYLEIGH_COEFFICIENT: f64 = 166.92158;

lazy_static! {
    /// 6^2.5 * 1.2^3.5, from the supersonic calibrated airspeed relation
    static ref GRACEY_COEFFICIENT: f64 = 6f64.powf(2.5) * 1.2f64.powf(3.5);
}

/// Speed-like quantities that can be set on, or derived from, a [SpeedResolver]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedParameter {
    /// Mach number
    Mach,
    /// true airspeed \[m/s\]
    TrueAirspeed,
    /// equivalent airspeed \[m/s\]
    EquivalentAirspeed,
    /// unitary Reynolds number \[1/m\]
    UnitaryReynolds,
    /// theoretical (incompressible) dynamic pressure \[Pa\]
    DynamicPressure,
    /// compressible dynamic pressure \[Pa\]
    ImpactPressure,
    /// calibrated airspeed \[m/s\]
    CalibratedAirspeed,
}

impl SpeedParameter {
    pub const ALL: [SpeedParameter; 7] = [
        Self::Mach,
        Self::TrueAirspeed,
        Self::EquivalentAirspeed,
        Self::UnitaryReynolds,
        Self::DynamicPressure,
        Self::ImpactPressure,
        Self::CalibratedAirspeed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mach => "mach",
            Self::TrueAirspeed => "true_airspeed",
            Self::EquivalentAirspeed => "equivalent_airspeed",
            Self::UnitaryReynolds => "unitary_reynolds",
            Self::DynamicPressure => "dynamic_pressure",
            Self::ImpactPressure => "impact_pressure",
            Self::CalibratedAirspeed => "calibrated_airspeed",
        }
    }

    /// Whether true airspeed can only be recovered from this parameter
    /// iteratively
    pub fn needs_inversion(&self) -> bool {
        matches!(self, Self::ImpactPressure | Self::CalibratedAirspeed)
    }
}

impl fmt::Display for SpeedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The directly set speed parameter, if any
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SpeedState {
    #[default]
    Unset,
    Set {
        parameter: SpeedParameter,
        value: ArrayD<f64>,
    },
}

impl SpeedState {
    pub fn parameter(&self) -> Option<SpeedParameter> {
        match self {
            Self::Unset => None,
            Self::Set { parameter, .. } => Some(*parameter),
        }
    }

    pub fn value(&self) -> Option<&ArrayD<f64>> {
        match self {
            Self::Unset => None,
            Self::Set { value, .. } => Some(value),
        }
    }

    /// Value of `parameter` if it is the one that was set
    fn value_of(&self, parameter: SpeedParameter) -> Option<&ArrayD<f64>> {
        match self {
            Self::Set { parameter: p, value } if *p == parameter => Some(value),
            _ => None,
        }
    }
}

/// Derives all speed parameters from the single one that was set.
///
/// Getters need `&mut self` because derived values are cached until the next
/// call to a setter.  A getter returns `Ok(None)` while no speed parameter is
/// set.
#[derive(Clone, Debug)]
pub struct SpeedResolver {
    profile: Arc<AtmosphericProfile>,
    state: SpeedState,
    derived: HashMap<SpeedParameter, ArrayD<f64>>,
    solver_params: SolverParams,
}

impl SpeedResolver {
    pub fn new(profile: Arc<AtmosphericProfile>) -> Self {
        Self {
            profile,
            state: SpeedState::Unset,
            derived: HashMap::new(),
            solver_params: SolverParams::default(),
        }
    }

    pub fn with_solver_params(mut self, solver_params: SolverParams) -> Self {
        self.solver_params = solver_params;
        self
    }

    pub fn profile(&self) -> &Arc<AtmosphericProfile> {
        &self.profile
    }

    pub fn solver_params(&self) -> &SolverParams {
        &self.solver_params
    }

    pub fn state(&self) -> &SpeedState {
        &self.state
    }

    /// Parameter that was set last, if any
    pub fn authoritative(&self) -> Option<SpeedParameter> {
        self.state.parameter()
    }

    /// Altitude \[m\]
    pub fn altitude(&self) -> &ArrayD<f64> {
        self.profile.altitude()
    }
    /// Temperature increment \[K\]
    pub fn delta_t(&self) -> f64 {
        self.profile.delta_t()
    }
    /// Temperature \[K\]
    pub fn temperature(&self) -> &ArrayD<f64> {
        self.profile.temperature()
    }
    /// Static pressure \[Pa\]
    pub fn pressure(&self) -> &ArrayD<f64> {
        self.profile.pressure()
    }
    /// Density \[kg/m^3\]
    pub fn density(&self) -> &ArrayD<f64> {
        self.profile.density()
    }
    /// Speed of sound \[m/s\]
    pub fn speed_of_sound(&self) -> &ArrayD<f64> {
        self.profile.speed_of_sound()
    }
    /// Dynamic viscosity \[Pa*s\]
    pub fn dynamic_viscosity(&self) -> &ArrayD<f64> {
        self.profile.dynamic_viscosity()
    }
    /// Kinematic viscosity \[m^2/s\]
    pub fn kinematic_viscosity(&self) -> &ArrayD<f64> {
        self.profile.kinematic_viscosity()
    }

    /// Sets `parameter`, discarding any previously set or derived speed value.
    ///
    /// Values with more than one element must broadcast against the altitude
    /// array and are stored with the broadcast shape.  On error, the resolver
    /// is left unchanged.
    pub fn set<V: IntoArrayD>(
        &mut self,
        parameter: SpeedParameter,
        value: V,
    ) -> Result<(), AtmosphereError> {
        let value = self.adapt_shape(value.into_array_d())?;
        self.derived.clear();
        self.state = SpeedState::Set { parameter, value };
        Ok(())
    }

    /// Resets all speed parameters
    pub fn clear_speeds(&mut self) {
        self.derived.clear();
        self.state = SpeedState::Unset;
    }

    pub fn set_mach<V: IntoArrayD>(&mut self, value: V) -> Result<(), AtmosphereError> {
        self.set(SpeedParameter::Mach, value)
    }
    /// # Arguments
    /// - `value`: true airspeed \[m/s\]
    pub fn set_true_airspeed<V: IntoArrayD>(&mut self, value: V) -> Result<(), AtmosphereError> {
        self.set(SpeedParameter::TrueAirspeed, value)
    }
    /// # Arguments
    /// - `value`: equivalent airspeed \[m/s\]
    pub fn set_equivalent_airspeed<V: IntoArrayD>(
        &mut self,
        value: V,
    ) -> Result<(), AtmosphereError> {
        self.set(SpeedParameter::EquivalentAirspeed, value)
    }
    /// # Arguments
    /// - `value`: unitary Reynolds number \[1/m\]
    pub fn set_unitary_reynolds<V: IntoArrayD>(&mut self, value: V) -> Result<(), AtmosphereError> {
        self.set(SpeedParameter::UnitaryReynolds, value)
    }
    /// # Arguments
    /// - `value`: dynamic pressure \[Pa\]
    pub fn set_dynamic_pressure<V: IntoArrayD>(&mut self, value: V) -> Result<(), AtmosphereError> {
        self.set(SpeedParameter::DynamicPressure, value)
    }
    /// # Arguments
    /// - `value`: impact pressure \[Pa\]
    pub fn set_impact_pressure<V: IntoArrayD>(&mut self, value: V) -> Result<(), AtmosphereError> {
        self.set(SpeedParameter::ImpactPressure, value)
    }
    /// # Arguments
    /// - `value`: calibrated airspeed \[m/s\]
    pub fn set_calibrated_airspeed<V: IntoArrayD>(
        &mut self,
        value: V,
    ) -> Result<(), AtmosphereError> {
        self.set(SpeedParameter::CalibratedAirspeed, value)
    }

    /// Mach number
    pub fn mach(&mut self) -> Result<Option<ArrayD<f64>>, AtmosphereError> {
        self.get(SpeedParameter::Mach)
    }
    /// True airspeed \[m/s\]
    pub fn true_airspeed(&mut self) -> Result<Option<ArrayD<f64>>, AtmosphereError> {
        self.get(SpeedParameter::TrueAirspeed)
    }
    /// Equivalent airspeed \[m/s\]
    pub fn equivalent_airspeed(&mut self) -> Result<Option<ArrayD<f64>>, AtmosphereError> {
        self.get(SpeedParameter::EquivalentAirspeed)
    }
    /// Unitary Reynolds number \[1/m\]
    pub fn unitary_reynolds(&mut self) -> Result<Option<ArrayD<f64>>, AtmosphereError> {
        self.get(SpeedParameter::UnitaryReynolds)
    }
    /// Theoretical dynamic pressure \[Pa\], q = 0.5 * gamma * mach^2 * p.
    /// Always recomputed from Mach number when it can be resolved.
    pub fn dynamic_pressure(&mut self) -> Result<Option<ArrayD<f64>>, AtmosphereError> {
        self.get(SpeedParameter::DynamicPressure)
    }
    /// Impact (compressible dynamic) pressure \[Pa\]
    pub fn impact_pressure(&mut self) -> Result<Option<ArrayD<f64>>, AtmosphereError> {
        self.get(SpeedParameter::ImpactPressure)
    }
    /// Calibrated airspeed \[m/s\]
    pub fn calibrated_airspeed(&mut self) -> Result<Option<ArrayD<f64>>, AtmosphereError> {
        self.get(SpeedParameter::CalibratedAirspeed)
    }

    /// Returns the value of `parameter`, deriving it from the set parameter
    /// if needed
    pub fn get(
        &mut self,
        parameter: SpeedParameter,
    ) -> Result<Option<ArrayD<f64>>, AtmosphereError> {
        use SpeedParameter::*;

        // dynamic pressure is never cached, it follows mach whenever mach resolves
        let cached = parameter != DynamicPressure;
        if cached {
            if let Some(value) = self.state.value_of(parameter) {
                return Ok(Some(value.clone()));
            }
            if let Some(value) = self.derived.get(&parameter) {
                return Ok(Some(value.clone()));
            }
        }

        let value = match parameter {
            TrueAirspeed => self.resolve_true_airspeed()?,
            Mach => self
                .get(TrueAirspeed)?
                .map(|tas| zip_broadcast(&tas, self.speed_of_sound(), |v, a| v / a))
                .transpose()?,
            EquivalentAirspeed => match self.get(TrueAirspeed)? {
                Some(tas) => {
                    let rho0 = SeaLevel::get()?.density;
                    Some(zip_broadcast(&tas, self.density(), |v, rho| {
                        v * (rho / rho0).sqrt()
                    })?)
                }
                None => None,
            },
            UnitaryReynolds => self
                .get(TrueAirspeed)?
                .map(|tas| zip_broadcast(&tas, self.kinematic_viscosity(), |v, nu| v / nu))
                .transpose()?,
            ImpactPressure => self
                .get(Mach)?
                .map(|mach| self.impact_pressure_from_mach(&mach))
                .transpose()?,
            CalibratedAirspeed => self
                .get(ImpactPressure)?
                .map(|impact| self.calibrated_airspeed_from_impact(&impact))
                .transpose()?,
            DynamicPressure => match self.get(Mach)? {
                Some(mach) => Some(self.dynamic_pressure_from_mach(&mach)?),
                None => self.state.value_of(DynamicPressure).cloned(),
            },
        };
        match &value {
            Some(value) if cached => {
                self.derived.insert(parameter, value.clone());
            }
            _ => {}
        }
        Ok(value)
    }

    fn adapt_shape(&self, value: ArrayD<f64>) -> Result<ArrayD<f64>, AtmosphereError> {
        if value.len() == 1 {
            return Ok(value);
        }
        let shape = broadcast_shape(value.shape(), self.profile.shape())?;
        broadcast_to(&value, &shape)
    }

    /// True airspeed from whichever parameter was set
    fn resolve_true_airspeed(&self) -> Result<Option<ArrayD<f64>>, AtmosphereError> {
        use SpeedParameter::*;

        let SpeedState::Set { parameter, value } = &self.state else {
            return Ok(None);
        };
        let tas = match parameter {
            TrueAirspeed => value.clone(),
            Mach => zip_broadcast(value, self.speed_of_sound(), |m, a| m * a)?,
            EquivalentAirspeed => {
                let rho0 = SeaLevel::get()?.density;
                zip_broadcast(value, self.density(), |eas, rho| eas * (rho0 / rho).sqrt())?
            }
            UnitaryReynolds => {
                zip_broadcast(value, self.kinematic_viscosity(), |re, nu| re * nu)?
            }
            DynamicPressure => {
                let mach = zip_broadcast(value, self.pressure(), |q, p| {
                    (q / HALF_GAMMA / p).sqrt()
                })?;
                zip_broadcast(&mach, self.speed_of_sound(), |m, a| m * a)?
            }
            ImpactPressure | CalibratedAirspeed => {
                self.invert_to_true_airspeed(*parameter, value)?
            }
        };
        Ok(Some(tas))
    }

    fn dynamic_pressure_from_mach(
        &self,
        mach: &ArrayD<f64>,
    ) -> Result<ArrayD<f64>, AtmosphereError> {
        zip_broadcast(mach, self.pressure(), |m, p| HALF_GAMMA * m.powi(2) * p)
    }

    /// Impact pressure with the subsonic isentropic relation for Mach <= 1 and
    /// the Rayleigh pitot formula above
    fn impact_pressure_from_mach(
        &self,
        mach: &ArrayD<f64>,
    ) -> Result<ArrayD<f64>, AtmosphereError> {
        zip_broadcast(mach, self.pressure(), |m, p| {
            if m <= 1.0 {
                subsonic_impact_pressure(m, p)
            } else {
                supersonic_impact_pressure(m, p)
            }
        })
    }

    /// Calibrated airspeed from impact pressure.
    ///
    /// Computation follows Eq. 3.16 and 3.17 from Gracey, William (1980),
    /// "Measurement of Aircraft Speed and Altitude", NASA Reference
    /// Publication 1046: the closed-form subsonic relation is used first, and
    /// elements faster than sea-level speed of sound are solved again with
    /// the implicit supersonic relation.
    fn calibrated_airspeed_from_impact(
        &self,
        impact: &ArrayD<f64>,
    ) -> Result<ArrayD<f64>, AtmosphereError> {
        let sl = SeaLevel::get()?;
        let mut cas = impact.mapv(|qc| low_speed_calibrated_airspeed(qc, &sl));

        let low_speed_cas = cas.to_flat_vec();
        let high_speed: Vec<usize> = low_speed_cas
            .iter()
            .enumerate()
            .filter(|(_, cas)| **cas > sl.speed_of_sound)
            .map(|(i, _)| i)
            .collect();
        if high_speed.is_empty() {
            return Ok(cas);
        }

        let impact_flat = impact.to_flat_vec();
        let qc: Vec<f64> = high_speed.iter().map(|i| impact_flat[*i]).collect();
        let x0: Vec<f64> = high_speed.iter().map(|i| low_speed_cas[*i]).collect();
        tracing::debug!(
            elements = high_speed.len(),
            "solving supersonic calibrated airspeed"
        );
        let root = self
            .solver_params
            .solve(
                |x| {
                    Ok(x.iter()
                        .zip(&qc)
                        .map(|(cas, qc)| supersonic_calibrated_airspeed_residual(*cas, *qc, &sl))
                        .collect())
                },
                &x0,
                // (7 (cas / a0)^2 - 1) must stay positive
                sl.speed_of_sound / 7f64.sqrt(),
            )
            .map_err(|err| match err {
                AtmosphereError::ConvergenceFailure {
                    indices,
                    residuals,
                    iterations,
                } => AtmosphereError::ConvergenceFailure {
                    indices: indices.iter().map(|k| high_speed[*k]).collect(),
                    residuals,
                    iterations,
                },
                other => other,
            })?;

        let mut solved = high_speed.iter().zip(root).peekable();
        for (i, cas) in cas.iter_mut().enumerate() {
            if let Some((_, root)) = solved.next_if(|(j, _)| **j == i) {
                *cas = root;
            }
        }
        Ok(cas)
    }

    /// Fresh resolver sharing this one's profile, with no speed set
    fn working_copy(&self) -> Self {
        Self::new(Arc::clone(&self.profile)).with_solver_params(self.solver_params.clone())
    }

    /// Finds the true airspeed for which `parameter` equals `target` by
    /// repeatedly setting true airspeed on a working copy and reading
    /// `parameter` back.  Works for any parameter derived from true airspeed.
    fn invert_to_true_airspeed(
        &self,
        parameter: SpeedParameter,
        target: &ArrayD<f64>,
    ) -> Result<ArrayD<f64>, AtmosphereError> {
        let shape = broadcast_shape(target.shape(), self.profile.shape())?;
        let target = broadcast_to(target, &shape)?.to_flat_vec();
        let mut working = self.working_copy();
        tracing::debug!(
            %parameter,
            elements = target.len(),
            "inverting to true airspeed"
        );

        let x0 = vec![self.solver_params.initial_true_airspeed; target.len()];
        let root = self.solver_params.solve(
            |tas| {
                working.set(SpeedParameter::TrueAirspeed, reshape(tas.to_vec(), &shape)?)?;
                let value = working.get(parameter)?.ok_or_else(|| {
                    AtmosphereError::Other(format!(
                        "{parameter} could not be derived from true airspeed"
                    ))
                })?;
                Ok(target.iter().zip(value.iter()).map(|(t, v)| t - v).collect())
            },
            &x0,
            0.0,
        )?;
        reshape(root, &shape)
    }
}

fn reshape(values: Vec<f64>, shape: &[usize]) -> Result<ArrayD<f64>, AtmosphereError> {
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|err| AtmosphereError::Other(err.to_string()))
}

fn subsonic_impact_pressure(mach: f64, pressure: f64) -> f64 {
    pressure * ((1.0 + 0.2 * mach.powi(2)).powf(3.5) - 1.0)
}

/// Rayleigh pitot tube formula
fn supersonic_impact_pressure(mach: f64, pressure: f64) -> f64 {
    pressure * (RAYLEIGH_COEFFICIENT * mach.powi(7) / (7.0 * mach.powi(2) - 1.0).powf(2.5) - 1.0)
}

fn low_speed_calibrated_airspeed(impact_pressure: f64, sl: &SeaLevel) -> f64 {
    sl.speed_of_sound * (5.0 * ((impact_pressure / sl.pressure + 1.0).powf(1.0 / 3.5) - 1.0)).sqrt()
}

fn supersonic_calibrated_airspeed_residual(cas: f64, impact_pressure: f64, sl: &SeaLevel) -> f64 {
    cas - sl.speed_of_sound
        * ((impact_pressure / sl.pressure + 1.0)
            * (7.0 * (cas / sl.speed_of_sound).powi(2) - 1.0).powf(2.5)
            / *GRACEY_COEFFICIENT)
            .powf(1.0 / 7.0)
}
