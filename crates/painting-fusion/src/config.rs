use std::path::{Path, PathBuf};

use painting_calib::{
    store::{DEFAULT_CAMERA, DEFAULT_EXTRINSIC_KEY},
    CalibrationFormat, CalibrationMatrices, CalibrationSource, CalibrationStore,
    RectifiedIntrinsics,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    painter::{Painter, PainterConfig},
    sync::SyncConfig,
};

/// Where and how to read the calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// A file for `raw` and `structured`, a directory for `split-video`.
    pub path: PathBuf,
    /// The source format.
    pub format: CalibrationFormat,
    /// Rectified camera index for the key-value formats.
    pub camera: u8,
    /// Sensor-pair key of the structured format.
    pub extrinsic_key: String,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("calib.txt"),
            format: CalibrationFormat::Raw,
            camera: DEFAULT_CAMERA,
            extrinsic_key: DEFAULT_EXTRINSIC_KEY.to_string(),
        }
    }
}

impl CalibrationConfig {
    /// Build the tagged calibration source.
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Projection and rectification from the camera stream; required
    ///   by the structured format, ignored otherwise.
    pub fn source(
        &self,
        intrinsics: Option<RectifiedIntrinsics>,
    ) -> Result<CalibrationSource, ConfigError> {
        Ok(match self.format {
            CalibrationFormat::Raw => CalibrationSource::Raw {
                path: self.path.clone(),
                camera: self.camera,
            },
            CalibrationFormat::SplitVideo => CalibrationSource::SplitVideo {
                dir: self.path.clone(),
                camera: self.camera,
            },
            CalibrationFormat::Structured => CalibrationSource::Structured {
                path: self.path.clone(),
                key: self.extrinsic_key.clone(),
                intrinsics: intrinsics.ok_or(ConfigError::MissingIntrinsics)?,
            },
        })
    }

    /// Load the calibration this configuration points at.
    pub fn load(
        &self,
        intrinsics: Option<RectifiedIntrinsics>,
    ) -> Result<CalibrationMatrices, ConfigError> {
        Ok(CalibrationStore::load(&self.source(intrinsics)?)?)
    }
}

/// The full configuration surface of the painting pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintingConfig {
    /// Calibration source.
    pub calibration: CalibrationConfig,
    /// Painter settings.
    pub paint: PainterConfig,
    /// Synchronizer settings.
    pub sync: SyncConfig,
}

impl PaintingConfig {
    /// Parse a configuration from JSON text. Missing sections take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Build the painter described by this configuration.
    pub fn painter(&self) -> Result<Painter, ConfigError> {
        Ok(Painter::new(self.paint.clone())?)
    }
}
