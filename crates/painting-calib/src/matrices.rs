use std::{fmt::Write as _, path::Path};

use glam::{Mat4, Vec4};

use crate::error::CalibrationError;

/// A row-major 3x3 matrix.
pub type Matrix3 = [[f32; 3]; 3];

/// A row-major 3x4 matrix.
pub type Matrix3x4 = [[f32; 4]; 3];

/// The 3x3 identity matrix.
pub const IDENTITY3: Matrix3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// The 3x4 matrix `[I | 0]`.
pub const IDENTITY3X4: Matrix3x4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// The intrinsic half of a calibration: rectified projection plus rectification.
///
/// In the structured format these come from the live camera stream rather than
/// from the calibration file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectifiedIntrinsics {
    /// Projection from the rectified camera frame to the image plane (3x4).
    pub projection_rect: Matrix3x4,
    /// Rotation from the camera reference frame to the rectified camera frame (3x3).
    pub rect_rotation: Matrix3,
}

impl RectifiedIntrinsics {
    /// Build the intrinsics from the flat arrays of a camera-info message.
    ///
    /// # Arguments
    ///
    /// * `p` - The row-major 3x4 projection matrix, 12 values.
    /// * `r` - The row-major 3x3 rectification matrix, 9 values.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidShape`] if either slice has the wrong length.
    pub fn from_camera_info(p: &[f64], r: &[f64]) -> Result<Self, CalibrationError> {
        let p: &[f64; 12] = p.try_into().map_err(|_| CalibrationError::InvalidShape {
            key: "P".to_string(),
            expected: "12".to_string(),
            got: p.len(),
        })?;
        let r: &[f64; 9] = r.try_into().map_err(|_| CalibrationError::InvalidShape {
            key: "R".to_string(),
            expected: "9".to_string(),
            got: r.len(),
        })?;

        let mut projection_rect = [[0.0; 4]; 3];
        for (i, row) in projection_rect.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val = p[i * 4 + j] as f32;
            }
        }

        let mut rect_rotation = [[0.0; 3]; 3];
        for (i, row) in rect_rotation.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val = r[i * 3 + j] as f32;
            }
        }

        Ok(Self {
            projection_rect,
            rect_rotation,
        })
    }
}

/// The canonical calibration of one camera-LIDAR pair.
///
/// Every supported source format is reduced to these three matrices. The composite
/// operator `P_rect * [R_rect 0; 0 1] * [Tr_velo_to_cam; 0 0 0 1]` is computed once
/// here so projection is a single matrix product per point.
///
/// The struct is immutable; a new calibration epoch replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMatrices {
    projection_rect: Matrix3x4,
    rect_rotation: Matrix3,
    extrinsic_lidar_to_camera: Matrix3x4,
    composite: Mat4,
}

impl CalibrationMatrices {
    /// Create a calibration from its three canonical matrices.
    ///
    /// # Arguments
    ///
    /// * `projection_rect` - Rectified camera to image projection (3x4).
    /// * `rect_rotation` - Camera reference to rectified camera rotation (3x3).
    /// * `extrinsic_lidar_to_camera` - LIDAR to camera reference rigid transform (3x4).
    pub fn new(
        projection_rect: Matrix3x4,
        rect_rotation: Matrix3,
        extrinsic_lidar_to_camera: Matrix3x4,
    ) -> Self {
        let p = mat4_from_3x4(&projection_rect);
        let r = {
            let [r0, r1, r2] = rect_rotation;
            mat4_from_rows([
                [r0[0], r0[1], r0[2], 0.0],
                [r1[0], r1[1], r1[2], 0.0],
                [r2[0], r2[1], r2[2], 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ])
        };
        let tr = mat4_from_3x4(&extrinsic_lidar_to_camera);

        Self {
            projection_rect,
            rect_rotation,
            extrinsic_lidar_to_camera,
            composite: p * r * tr,
        }
    }

    /// Create a calibration from separately supplied intrinsics and an extrinsic.
    pub fn from_parts(intrinsics: RectifiedIntrinsics, extrinsic_lidar_to_camera: Matrix3x4) -> Self {
        Self::new(
            intrinsics.projection_rect,
            intrinsics.rect_rotation,
            extrinsic_lidar_to_camera,
        )
    }

    /// The identity calibration: a point `(x, y, z)` projects to `(x / z, y / z)`.
    pub fn identity() -> Self {
        Self::new(IDENTITY3X4, IDENTITY3, IDENTITY3X4)
    }

    /// Rectified camera to image projection (3x4).
    pub fn projection_rect(&self) -> &Matrix3x4 {
        &self.projection_rect
    }

    /// Camera reference to rectified camera rotation (3x3).
    pub fn rect_rotation(&self) -> &Matrix3 {
        &self.rect_rotation
    }

    /// LIDAR to camera reference rigid transform (3x4).
    pub fn extrinsic_lidar_to_camera(&self) -> &Matrix3x4 {
        &self.extrinsic_lidar_to_camera
    }

    /// The intrinsic half of the calibration.
    pub fn intrinsics(&self) -> RectifiedIntrinsics {
        RectifiedIntrinsics {
            projection_rect: self.projection_rect,
            rect_rotation: self.rect_rotation,
        }
    }

    /// The composite LIDAR to image operator as a 3x4 row-major matrix.
    pub fn composite(&self) -> Matrix3x4 {
        [
            self.composite.row(0).to_array(),
            self.composite.row(1).to_array(),
            self.composite.row(2).to_array(),
        ]
    }

    /// The composite operator as a 4x4 matrix whose first three rows map a homogeneous
    /// LIDAR point to `(u', v', w)`.
    #[inline]
    pub fn composite_mat4(&self) -> &Mat4 {
        &self.composite
    }

    /// Serialize the calibration as raw key-value text with `P2`, `R0_rect` and
    /// `Tr_velo_to_cam` lines, readable by the raw loader.
    pub fn to_raw_string(&self) -> String {
        let mut out = String::new();
        write_line(&mut out, "P2", self.projection_rect.iter().flatten());
        write_line(&mut out, "R0_rect", self.rect_rotation.iter().flatten());
        write_line(
            &mut out,
            "Tr_velo_to_cam",
            self.extrinsic_lidar_to_camera.iter().flatten(),
        );
        out
    }

    /// Write the calibration as a raw key-value file.
    ///
    /// # Arguments
    ///
    /// * `path` - The path of the file to create.
    pub fn write_raw(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        std::fs::write(path, self.to_raw_string())?;
        Ok(())
    }
}

fn write_line<'a>(out: &mut String, key: &str, values: impl Iterator<Item = &'a f32>) {
    out.push_str(key);
    out.push(':');
    for v in values {
        // writing to a String cannot fail
        let _ = write!(out, " {v:e}");
    }
    out.push('\n');
}

/// Build a glam matrix from row-major rows.
fn mat4_from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}

/// Promote a 3x4 affine/projective matrix to 4x4 with `[0 0 0 1]` as last row.
fn mat4_from_3x4(m: &Matrix3x4) -> Mat4 {
    mat4_from_rows([m[0], m[1], m[2], Vec4::W.to_array()])
}
