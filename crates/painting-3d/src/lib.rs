#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Point types in the LIDAR and image frames.
pub mod pointcloud;

/// Batch projection of LIDAR points into the image plane.
pub mod projection;

/// Flat little-endian point-cloud buffers.
pub mod wire;

pub use pointcloud::{ProjectedPoint, RawPoint};
pub use projection::{project_points, Projector, DEPTH_EPSILON};
pub use wire::{PointCloudMessage, PointField, PointFieldType, WireError};
