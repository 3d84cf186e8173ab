//! Convenience module for exposing commonly used structs

pub use crate::atmosphere::{AltitudeUnit, Atmosphere, FOOT};
pub use crate::error::AtmosphereError;
pub use crate::profile::{AtmosphericProfile, AtmosphericState, SEA_LEVEL_ATMOSPHERE};
pub use crate::solver::SolverParams;
pub use crate::speed::{SpeedParameter, SpeedResolver, SpeedState};
pub use crate::traits::{Init, SerdeAPI};
pub use crate::utils::{ArrayExt, IntoArrayD};
