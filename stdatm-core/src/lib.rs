//! Core crate for International Standard Atmosphere (ISA) calculations and
//! airspeed conversions.
//!
//! # Crate Specific Coding Practices
//! - Every value is an [`ndarray::ArrayD<f64>`]. Scalar inputs become 0-D
//!   arrays and keep that shape through every derived quantity.
//! - `true_airspeed` is the hub: any speed quantity is converted to true
//!   airspeed first, then mapped forward to the requested one.
//! - Structs that can be loaded from files implement [`traits::Init`] so that
//!   validation happens right after deserialization.
//!
//! # Example
//! ```
//! use stdatm_core::prelude::*;
//!
//! let mut atm = Atmosphere::new(30_000.0, 0.0, AltitudeUnit::Feet);
//! atm.set_true_airspeed(vec![100.0, 250.0]).unwrap();
//! let mach = atm.mach().unwrap().unwrap();
//! assert!((mach[[0]] - 0.3298).abs() < 1e-3);
//! assert!((mach[[1]] - 0.8246).abs() < 1e-3);
//! ```

#[macro_use]
pub mod macros;

pub mod atmosphere;
pub mod error;
pub mod imports;
pub mod prelude;
pub mod profile;
pub mod solver;
pub mod speed;
pub mod traits;
pub mod utils;
