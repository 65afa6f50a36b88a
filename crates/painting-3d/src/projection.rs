use std::sync::Arc;

use glam::{Mat4, Vec4};
use painting_calib::CalibrationMatrices;
use rayon::prelude::*;

use crate::pointcloud::{ProjectedPoint, RawPoint};

/// Points whose projected depth is at or below this value are treated as behind the
/// camera and are not divided.
pub const DEPTH_EPSILON: f32 = 1e-6;

/// Batches smaller than this are projected on the calling thread.
const PARALLEL_MIN_POINTS: usize = 8192;

/// Projects LIDAR points with the composite operator of one calibration epoch.
///
/// The calibration is shared, never mutated: a new epoch builds a new projector.
#[derive(Debug, Clone)]
pub struct Projector {
    calib: Arc<CalibrationMatrices>,
}

impl Projector {
    /// Create a projector for the given calibration.
    pub fn new(calib: Arc<CalibrationMatrices>) -> Self {
        Self { calib }
    }

    /// The calibration this projector applies.
    pub fn calibration(&self) -> &Arc<CalibrationMatrices> {
        &self.calib
    }

    /// Project a batch of points. See [`project_points`].
    pub fn project(&self, points: &[RawPoint]) -> Vec<ProjectedPoint> {
        project_points(points, &self.calib)
    }
}

/// Project LIDAR points to pixel coordinates and rectified camera depth.
///
/// Each point is homogenized and multiplied by the composite 3x4 operator giving
/// `(u', v', w)`. If `w <= DEPTH_EPSILON` the point is at or behind the camera plane
/// and is returned as [`ProjectedPoint::invalid`]; otherwise `u = u' / w`,
/// `v = v' / w` and `depth = w`.
///
/// # Arguments
///
/// * `points` - The points in the LIDAR frame.
/// * `calib` - The calibration providing the composite operator.
///
/// # Returns
///
/// One projected point per input point, in the same order.
///
/// Example:
///
/// ```
/// use painting_3d::{project_points, RawPoint};
/// use painting_calib::CalibrationMatrices;
///
/// let points = vec![RawPoint::new(0.0, 0.0, 5.0, 0.0)];
/// let projected = project_points(&points, &CalibrationMatrices::identity());
/// assert_eq!((projected[0].u, projected[0].v, projected[0].depth), (0.0, 0.0, 5.0));
/// ```
pub fn project_points(points: &[RawPoint], calib: &CalibrationMatrices) -> Vec<ProjectedPoint> {
    let mut dst = vec![ProjectedPoint::invalid(0.0); points.len()];
    project_points_into(points, calib, &mut dst);
    dst
}

/// Project LIDAR points into a pre-allocated buffer.
///
/// PRECONDITION: `dst` has the same length as `points`.
pub fn project_points_into(
    points: &[RawPoint],
    calib: &CalibrationMatrices,
    dst: &mut [ProjectedPoint],
) {
    assert_eq!(points.len(), dst.len());

    let m = *calib.composite_mat4();

    if points.len() < PARALLEL_MIN_POINTS {
        dst.iter_mut()
            .zip(points)
            .for_each(|(out, p)| *out = project_point(&m, p));
    } else {
        dst.par_iter_mut()
            .zip(points.par_iter())
            .for_each(|(out, p)| *out = project_point(&m, p));
    }
}

#[inline]
fn project_point(m: &Mat4, p: &RawPoint) -> ProjectedPoint {
    let h = *m * Vec4::new(p.x, p.y, p.z, 1.0);
    let w = h.z;

    if w.is_nan() || w <= DEPTH_EPSILON {
        return ProjectedPoint::invalid(w);
    }

    let inv_w = 1.0 / w;
    ProjectedPoint {
        u: h.x * inv_w,
        v: h.y * inv_w,
        depth: w,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use painting_calib::matrices::{IDENTITY3, IDENTITY3X4};

    fn pinhole() -> CalibrationMatrices {
        CalibrationMatrices::new(
            [
                [500.0, 0.0, 320.0, 0.0],
                [0.0, 500.0, 240.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            IDENTITY3,
            IDENTITY3X4,
        )
    }

    #[test]
    fn identity_projects_optical_axis_to_origin() {
        let points = vec![RawPoint::new(0.0, 0.0, 5.0, 0.3)];
        let projected = project_points(&points, &CalibrationMatrices::identity());
        assert_eq!(projected.len(), 1);
        assert_relative_eq!(projected[0].u, 0.0);
        assert_relative_eq!(projected[0].v, 0.0);
        assert_relative_eq!(projected[0].depth, 5.0);
        assert!(projected[0].is_valid());
    }

    #[test]
    fn pinhole_projection() {
        let points = vec![
            RawPoint::new(0.0, 0.0, 5.0, 0.0),
            RawPoint::new(1.0, 2.0, 10.0, 0.0),
        ];
        let projected = project_points(&points, &pinhole());
        assert_relative_eq!(projected[0].u, 320.0, epsilon = 1e-4);
        assert_relative_eq!(projected[0].v, 240.0, epsilon = 1e-4);
        assert_relative_eq!(projected[1].u, 500.0 * 1.0 / 10.0 + 320.0, epsilon = 1e-4);
        assert_relative_eq!(projected[1].v, 500.0 * 2.0 / 10.0 + 240.0, epsilon = 1e-4);
        assert_relative_eq!(projected[1].depth, 10.0);
    }

    #[test]
    fn behind_and_on_camera_plane_are_invalid() {
        let points = vec![
            RawPoint::new(1.0, 1.0, -5.0, 0.0),
            RawPoint::new(1.0, 1.0, 0.0, 0.0),
            RawPoint::new(1.0, 1.0, 1e-8, 0.0),
            RawPoint::new(f32::NAN, 0.0, 1.0, 0.0),
        ];
        let projected = project_points(&points, &pinhole());
        assert!(projected.iter().all(|p| !p.is_valid()));
        assert!(projected[0].u.is_nan() && projected[0].v.is_nan());
        assert_relative_eq!(projected[0].depth, -5.0);
    }

    #[test]
    fn lidar_extrinsic_is_applied() {
        // LIDAR x-forward/y-left/z-up to camera z-forward/x-right/y-down
        let calib = CalibrationMatrices::new(
            IDENTITY3X4,
            IDENTITY3,
            [
                [0.0, -1.0, 0.0, 0.0],
                [0.0, 0.0, -1.0, 0.0],
                [1.0, 0.0, 0.0, 0.0],
            ],
        );
        let projected = project_points(&[RawPoint::new(10.0, -2.0, 1.0, 0.0)], &calib);
        assert_relative_eq!(projected[0].depth, 10.0);
        assert_relative_eq!(projected[0].u, 0.2);
        assert_relative_eq!(projected[0].v, -0.1);
    }

    #[test]
    fn parallel_batch_preserves_order() {
        let points: Vec<RawPoint> = (0..PARALLEL_MIN_POINTS * 2)
            .map(|i| RawPoint::new(i as f32, 0.0, 2.0, 0.0))
            .collect();
        let projector = Projector::new(Arc::new(CalibrationMatrices::identity()));
        let projected = projector.project(&points);
        assert_eq!(projected.len(), points.len());
        for (i, p) in projected.iter().enumerate() {
            assert_relative_eq!(p.u, i as f32 / 2.0);
        }
    }

    #[test]
    fn empty_batch() {
        assert!(project_points(&[], &pinhole()).is_empty());
    }
}
