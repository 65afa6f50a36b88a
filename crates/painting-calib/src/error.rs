/// An error type for the calibration module.
///
/// Any of these variants is fatal to the calibration epoch being loaded; no
/// projection should be attempted until a valid calibration replaces it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CalibrationError {
    /// Failed to read a calibration file.
    #[error("Failed to read calibration file")]
    Io(#[from] std::io::Error),

    /// Failed to parse a structured calibration document.
    #[error("Failed to parse structured calibration")]
    Json(#[from] serde_json::Error),

    /// A required matrix key is absent from the source.
    #[error("Missing calibration key: {0}")]
    MissingKey(String),

    /// A matrix has the wrong number of elements for its expected shape.
    #[error("Invalid shape for {key}: expected {expected} values, got {got}")]
    InvalidShape {
        /// The key of the offending matrix.
        key: String,
        /// The expected number of elements (or a description of them).
        expected: String,
        /// The number of elements found.
        got: usize,
    },

    /// A nested field of the structured format is absent or has the wrong type.
    #[error("Missing or invalid field: {0}")]
    MissingField(String),

    /// The requested camera index is not one of the four rectified cameras.
    #[error("Invalid camera index {0}, expected 0..=3")]
    InvalidCamera(u8),
}
