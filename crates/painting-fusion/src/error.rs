use painting_3d::WireError;
use painting_calib::CalibrationError;

/// An error type for the painter and its inputs.
#[derive(Debug, thiserror::Error)]
pub enum PaintError {
    /// The projected and raw point sequences are not index-aligned.
    #[error("Projected points ({0}) and raw points ({1}) differ in length")]
    LengthMismatch(usize, usize),

    /// An image or mask with zero width or height.
    #[error("Image or mask has zero size")]
    EmptyImage,

    /// Pixel data length does not match the declared size.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidDataLength(usize, usize),

    /// The mask resolution differs from the image it was computed from.
    #[error("Mask size {mask} does not match image size {image}")]
    MaskSizeMismatch {
        /// Mask size.
        mask: String,
        /// Image size.
        image: String,
    },

    /// Score painting requested on a mask without per-class scores.
    #[error("Softmax score painting requires a score mask")]
    ModeRequiresScores,

    /// The class count of the mask differs from the configured one.
    #[error("Mask has {mask} classes, painter expects {expected}")]
    ClassCountMismatch {
        /// Classes in the mask.
        mask: usize,
        /// Classes configured on the painter.
        expected: usize,
    },

    /// Vector modes need at least one class.
    #[error("Invalid number of classes: {0}")]
    InvalidNumClasses(usize),
}

/// A per-frame error. The frame is dropped and the pipeline keeps running.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The point-cloud buffer is malformed.
    #[error("Invalid point cloud buffer")]
    Wire(#[from] WireError),

    /// The mask, image or painter inputs are inconsistent.
    #[error("Painting failed")]
    Paint(#[from] PaintError),

    /// The external segmentation model failed.
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// The cycle exceeded its soft timeout and its result was abandoned.
    #[error("Processing cycle exceeded {0:?}")]
    Timeout(std::time::Duration),

    /// A thread panicked while holding the observation lock.
    #[error("Observation lock poisoned")]
    LockPoisoned,
}

/// An error loading the pipeline configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration document.
    #[error("Failed to parse configuration")]
    Json(#[from] serde_json::Error),

    /// The structured calibration format needs intrinsics from the camera stream.
    #[error("Structured calibration requires intrinsics from the camera stream")]
    MissingIntrinsics,

    /// The calibration source could not be loaded.
    #[error("Failed to load calibration")]
    Calibration(#[from] CalibrationError),

    /// The painter settings are invalid.
    #[error("Invalid painter settings")]
    Paint(#[from] PaintError),
}
