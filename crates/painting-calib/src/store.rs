use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::CalibrationError,
    key_value::KeyValueCalibration,
    matrices::{CalibrationMatrices, Matrix3x4, RectifiedIntrinsics},
};

/// Camera-to-camera file name inside a split stereo-video calibration directory.
pub const CAM_TO_CAM_FILE: &str = "calib_cam_to_cam.txt";

/// LIDAR-to-camera file name inside a split stereo-video calibration directory.
pub const VELO_TO_CAM_FILE: &str = "calib_velo_to_cam.txt";

/// Default sensor-pair key of the structured format.
pub const DEFAULT_EXTRINSIC_KEY: &str = "top_center_lidar-to-center_camera-extrinsic";

/// Default camera: the forward-facing colour camera.
pub const DEFAULT_CAMERA: u8 = 2;

/// The supported calibration source formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationFormat {
    /// A single key-value file with `P2`, `R0_rect` and `Tr_velo_to_cam`.
    #[default]
    Raw,
    /// A directory with separate camera-to-camera and LIDAR-to-camera key-value files.
    SplitVideo,
    /// A JSON document holding the extrinsic only.
    Structured,
}

/// A calibration source, tagged by its format.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationSource {
    /// A raw key-value calibration file.
    Raw {
        /// Path to the calibration file.
        path: PathBuf,
        /// Camera whose projection `P{camera}` is used.
        camera: u8,
    },
    /// A split stereo-video calibration directory.
    SplitVideo {
        /// Directory holding `calib_cam_to_cam.txt` and `calib_velo_to_cam.txt`.
        dir: PathBuf,
        /// Camera whose projection `P_rect_0{camera}` is used.
        camera: u8,
    },
    /// A structured extrinsic document plus intrinsics from the camera stream.
    Structured {
        /// Path to the JSON document.
        path: PathBuf,
        /// Top-level sensor-pair key holding the extrinsic.
        key: String,
        /// Projection and rectification supplied by the caller.
        intrinsics: RectifiedIntrinsics,
    },
}

impl CalibrationSource {
    /// The format discriminant of this source.
    pub fn format(&self) -> CalibrationFormat {
        match self {
            CalibrationSource::Raw { .. } => CalibrationFormat::Raw,
            CalibrationSource::SplitVideo { .. } => CalibrationFormat::SplitVideo,
            CalibrationSource::Structured { .. } => CalibrationFormat::Structured,
        }
    }
}

/// Loads calibration sources into [`CalibrationMatrices`].
///
/// Downstream code never branches on the source format: every loader returns the
/// same canonical shape.
pub struct CalibrationStore;

impl CalibrationStore {
    /// Load a calibration from any supported source.
    ///
    /// # Arguments
    ///
    /// * `source` - The tagged calibration source.
    ///
    /// # Returns
    ///
    /// The canonical calibration matrices with the composite operator precomputed.
    ///
    /// # Errors
    ///
    /// Fails if a file cannot be read, a required key is absent, or a matrix has the
    /// wrong shape. Malformed individual lines are skipped, not reported.
    pub fn load(source: &CalibrationSource) -> Result<CalibrationMatrices, CalibrationError> {
        let calib = match source {
            CalibrationSource::Raw { path, camera } => {
                Self::from_raw(&KeyValueCalibration::read(path)?, *camera)
            }
            CalibrationSource::SplitVideo { dir, camera } => {
                let (cam_to_cam, velo_to_cam) = read_split_dir(dir)?;
                Self::from_split(&cam_to_cam, &velo_to_cam, *camera)
            }
            CalibrationSource::Structured {
                path,
                key,
                intrinsics,
            } => {
                let text = std::fs::read_to_string(path)?;
                Self::from_structured_str(&text, key, *intrinsics)
            }
        }?;

        log::debug!("loaded {:?} calibration", source.format());

        Ok(calib)
    }

    /// Build a calibration from a parsed raw key-value file.
    ///
    /// # Arguments
    ///
    /// * `kv` - The parsed entries.
    /// * `camera` - Index of the projection key to use (`P0`..`P3`).
    pub fn from_raw(
        kv: &KeyValueCalibration,
        camera: u8,
    ) -> Result<CalibrationMatrices, CalibrationError> {
        check_camera(camera)?;
        Ok(CalibrationMatrices::new(
            kv.matrix3x4(&format!("P{camera}"))?,
            kv.matrix3("R0_rect")?,
            kv.matrix3x4("Tr_velo_to_cam")?,
        ))
    }

    /// Build a calibration from raw key-value text.
    pub fn from_raw_str(text: &str, camera: u8) -> Result<CalibrationMatrices, CalibrationError> {
        Self::from_raw(&KeyValueCalibration::parse_str(text), camera)
    }

    /// Build a calibration from the two files of a split stereo-video calibration.
    ///
    /// The projection `P_rect_0{camera}` and rectification `R_rect_00` come from the
    /// camera-to-camera file; the extrinsic is assembled from `R` (3x3) and `T` (3x1)
    /// of the LIDAR-to-camera file.
    pub fn from_split(
        cam_to_cam: &KeyValueCalibration,
        velo_to_cam: &KeyValueCalibration,
        camera: u8,
    ) -> Result<CalibrationMatrices, CalibrationError> {
        check_camera(camera)?;
        let projection_rect = cam_to_cam.matrix3x4(&format!("P_rect_0{camera}"))?;
        let rect_rotation = cam_to_cam.matrix3("R_rect_00")?;

        let r = velo_to_cam.matrix3("R")?;
        let t = velo_to_cam.values::<3>("T")?;
        let mut extrinsic = [[0.0; 4]; 3];
        for (i, row) in extrinsic.iter_mut().enumerate() {
            row[..3].copy_from_slice(&r[i]);
            row[3] = t[i];
        }

        Ok(CalibrationMatrices::new(
            projection_rect,
            rect_rotation,
            extrinsic,
        ))
    }

    /// Build a calibration from the text of the two split stereo-video files.
    pub fn from_split_str(
        cam_to_cam: &str,
        velo_to_cam: &str,
        camera: u8,
    ) -> Result<CalibrationMatrices, CalibrationError> {
        Self::from_split(
            &KeyValueCalibration::parse_str(cam_to_cam),
            &KeyValueCalibration::parse_str(velo_to_cam),
            camera,
        )
    }

    /// Build a calibration from a structured extrinsic document.
    ///
    /// # Arguments
    ///
    /// * `json` - The document text.
    /// * `key` - The sensor-pair key; the extrinsic is read from
    ///   `<key>.param.sensor_calib.data`.
    /// * `intrinsics` - Projection and rectification supplied by the caller.
    pub fn from_structured_str(
        json: &str,
        key: &str,
        intrinsics: RectifiedIntrinsics,
    ) -> Result<CalibrationMatrices, CalibrationError> {
        let doc: serde_json::Value = serde_json::from_str(json)?;
        let extrinsic = parse_structured_extrinsic(&doc, key)?;
        Ok(CalibrationMatrices::from_parts(intrinsics, extrinsic))
    }
}

fn check_camera(camera: u8) -> Result<(), CalibrationError> {
    match camera {
        0..=3 => Ok(()),
        _ => Err(CalibrationError::InvalidCamera(camera)),
    }
}

fn read_split_dir(
    dir: &Path,
) -> Result<(KeyValueCalibration, KeyValueCalibration), CalibrationError> {
    let cam_to_cam = KeyValueCalibration::read(dir.join(CAM_TO_CAM_FILE))?;
    let velo_to_cam = KeyValueCalibration::read(dir.join(VELO_TO_CAM_FILE))?;
    Ok((cam_to_cam, velo_to_cam))
}

/// Extract the 3x4 extrinsic from `<key>.param.sensor_calib.data`.
///
/// The data may be a flat array of 12 or 16 values or a nested array of 3 or 4 rows
/// of 4 values. A homogeneous 4x4 form is truncated to its first three rows.
fn parse_structured_extrinsic(
    doc: &serde_json::Value,
    key: &str,
) -> Result<Matrix3x4, CalibrationError> {
    let field_path = format!("{key}.param.sensor_calib.data");
    let data = doc
        .get(key)
        .and_then(|v| v.get("param"))
        .and_then(|v| v.get("sensor_calib"))
        .and_then(|v| v.get("data"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| CalibrationError::MissingField(field_path.clone()))?;

    let mut values = Vec::with_capacity(16);
    for item in data {
        match item {
            serde_json::Value::Array(row) => {
                if row.len() != 4 {
                    return Err(CalibrationError::InvalidShape {
                        key: field_path,
                        expected: "rows of 4".to_string(),
                        got: row.len(),
                    });
                }
                for v in row {
                    values.push(as_f32(v, &field_path)?);
                }
            }
            v => values.push(as_f32(v, &field_path)?),
        }
    }

    if values.len() != 12 && values.len() != 16 {
        return Err(CalibrationError::InvalidShape {
            key: field_path,
            expected: "12 or 16".to_string(),
            got: values.len(),
        });
    }

    let mut extrinsic = [[0.0; 4]; 3];
    for (i, row) in extrinsic.iter_mut().enumerate() {
        row.copy_from_slice(&values[i * 4..i * 4 + 4]);
    }

    Ok(extrinsic)
}

fn as_f32(v: &serde_json::Value, field_path: &str) -> Result<f32, CalibrationError> {
    v.as_f64()
        .map(|x| x as f32)
        .ok_or_else(|| CalibrationError::MissingField(format!("{field_path}: non-numeric value")))
}
