/// A LIDAR return in the sensor frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawPoint {
    /// Forward, in meters.
    pub x: f32,
    /// Left, in meters.
    pub y: f32,
    /// Up, in meters.
    pub z: f32,
    /// Reflectance as reported by the sensor.
    pub intensity: f32,
}

impl RawPoint {
    /// Create a new point.
    pub const fn new(x: f32, y: f32, z: f32, intensity: f32) -> Self {
        Self { x, y, z, intensity }
    }

    /// The point coordinates as an array.
    #[inline]
    pub fn xyz(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 4]> for RawPoint {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// A LIDAR point mapped to the image plane.
///
/// `depth` is the third homogeneous coordinate after projection, i.e. the depth in
/// the rectified camera frame. When the point lies at or behind the camera plane
/// the pixel coordinates are NaN and the point is invalid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    /// Column coordinate in pixels.
    pub u: f32,
    /// Row coordinate in pixels.
    pub v: f32,
    /// Depth in the rectified camera frame.
    pub depth: f32,
}

impl ProjectedPoint {
    /// A point that could not be projected.
    pub const fn invalid(depth: f32) -> Self {
        Self {
            u: f32::NAN,
            v: f32::NAN,
            depth,
        }
    }

    /// Whether the point is in front of the camera and has finite pixel coordinates.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.depth > crate::projection::DEPTH_EPSILON && self.u.is_finite() && self.v.is_finite()
    }

    /// The nearest pixel `(col, row)` if the point is valid and its coordinates fall
    /// inside `[0, width) x [0, height)`.
    ///
    /// The bounds test uses the unrounded coordinates; the rounded pixel is clamped to
    /// the last column/row so that e.g. `u = width - 0.3` samples the last column.
    #[inline]
    pub fn nearest_pixel(&self, width: usize, height: usize) -> Option<(usize, usize)> {
        if !self.is_valid() {
            return None;
        }
        if self.u < 0.0 || self.v < 0.0 || self.u >= width as f32 || self.v >= height as f32 {
            return None;
        }
        let col = (self.u.round() as usize).min(width - 1);
        let row = (self.v.round() as usize).min(height - 1);
        Some((col, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_point_layout_is_16_bytes() {
        assert_eq!(std::mem::size_of::<RawPoint>(), 16);
        let p = RawPoint::from([1.0, 2.0, 3.0, 0.5]);
        assert_eq!(p.xyz(), [1.0, 2.0, 3.0]);
        assert_eq!(p.intensity, 0.5);
    }

    #[test]
    fn nearest_pixel_bounds() {
        let p = ProjectedPoint {
            u: 3.4,
            v: 0.0,
            depth: 1.0,
        };
        assert_eq!(p.nearest_pixel(4, 4), Some((3, 0)));

        // rounds to column 4, clamped to the last column
        let p = ProjectedPoint { u: 3.6, ..p };
        assert_eq!(p.nearest_pixel(4, 4), Some((3, 0)));

        let p = ProjectedPoint { u: 4.0, ..p };
        assert_eq!(p.nearest_pixel(4, 4), None);

        let p = ProjectedPoint { u: -0.1, ..p };
        assert_eq!(p.nearest_pixel(4, 4), None);

        assert_eq!(ProjectedPoint::invalid(-1.0).nearest_pixel(4, 4), None);
    }

    #[test]
    fn nearest_pixel_of_empty_image_is_none() {
        let p = ProjectedPoint {
            u: 0.0,
            v: 0.0,
            depth: 1.0,
        };
        assert_eq!(p.nearest_pixel(0, 0), None);
    }
}
