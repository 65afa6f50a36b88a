#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for the calibration module.
pub mod error;

/// Parser for the `KEY: f0 f1 ...` calibration text format.
pub mod key_value;

/// Canonical calibration matrices and the composite LIDAR-to-image operator.
pub mod matrices;

/// Loaders that collapse every supported calibration source into one shape.
pub mod store;

pub use error::CalibrationError;
pub use matrices::{CalibrationMatrices, Matrix3, Matrix3x4, RectifiedIntrinsics};
pub use store::{CalibrationFormat, CalibrationSource, CalibrationStore};
