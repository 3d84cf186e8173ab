pub(crate) use anyhow::{bail, ensure, Context};
pub(crate) use lazy_static::lazy_static;
pub(crate) use ndarray::{ArrayD, IxDyn, Zip};
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use std::collections::HashMap;
pub(crate) use std::fmt;
pub(crate) use std::path::Path;
pub(crate) use std::sync::{Arc, OnceLock};

pub(crate) use crate::error::AtmosphereError;
pub(crate) use crate::traits::*;
pub(crate) use crate::utils::{broadcast_shape, broadcast_to, zip_broadcast, IntoArrayD};
