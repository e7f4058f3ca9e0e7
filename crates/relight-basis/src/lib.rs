//! Relightable image metadata and light-weight reconstruction.
//!
//! An RTI dataset stores, per pixel, a handful of coefficients that are
//! combined with a light-dependent weight vector at view time. This crate
//! parses the dataset description (`info.json`), decodes the optional
//! per-material basis tensor, and turns a light direction into the weight
//! vector expected by the shading program.

mod error;
mod info;
mod model;
pub mod weights;

pub use error::BasisError;
pub use info::{BasisKind, Colorspace, MaterialInfo, RtiInfo, jpeg_count};
pub use model::{BasisModel, LightWeights, NORMAL_CALIBRATION_LIGHTS, WeightLayout};
pub use weights::rotate_light;
