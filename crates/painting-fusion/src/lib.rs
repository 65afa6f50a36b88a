#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Configuration surface of the painting pipeline.
pub mod config;

/// Error types for painting and frame processing.
pub mod error;

/// Camera images and semantic masks.
pub mod mask;

/// Sampling semantic labels onto projected points.
pub mod painter;

/// One processing cycle: segment, project, paint.
pub mod pipeline;

/// Latest-observation slots and the locking discipline around them.
pub mod sync;

pub use config::PaintingConfig;
pub use error::{ConfigError, FrameError, PaintError};
pub use mask::{CameraImage, ImageSize, SemanticMask};
pub use painter::{
    PaintMode, PaintedCloud, PaintedPoint, Painter, PainterConfig, SamplingPolicy, PAINTED_FRAME_ID,
    UNKNOWN_LABEL,
};
pub use pipeline::{Frame, Segmenter};
pub use sync::{BackpressurePolicy, CycleOutcome, FrameSynchronizer, PaintedCloudSink, SyncConfig};
