use crate::pointcloud::RawPoint;

/// Size in bytes of an `x, y, z, intensity` record.
pub const XYZI_POINT_STEP: usize = 16;

/// Error types for the wire buffer module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WireError {
    /// The buffer length is not a multiple of the point step.
    #[error("Buffer length {len} is not a multiple of the point step {point_step}")]
    InvalidBufferLength {
        /// Length of the buffer in bytes.
        len: usize,
        /// Declared point step in bytes.
        point_step: usize,
    },

    /// The point step cannot hold the `x, y, z, intensity` fields.
    #[error("Invalid point step {0}, expected at least 16")]
    InvalidPointStep(usize),

    /// The declared row step does not match `point_step * width`.
    #[error("Row step {row_step} does not match point step {point_step} times width {width}")]
    InvalidRowStep {
        /// Declared row step.
        row_step: usize,
        /// Declared point step.
        point_step: usize,
        /// Declared number of points per row.
        width: usize,
    },

    /// Only unorganized, single-row clouds are supported.
    #[error("Invalid height {0}, expected a single row")]
    InvalidHeight(usize),

    /// The buffer does not hold exactly `row_step * height` bytes.
    #[error("Buffer length {len} does not match the declared {expected} bytes")]
    DataLengthMismatch {
        /// Length of the buffer in bytes.
        len: usize,
        /// `row_step * height`.
        expected: usize,
    },

    /// Big-endian buffers are not supported.
    #[error("Big-endian point clouds are not supported")]
    BigEndianUnsupported,
}

/// Data type of a point field, numbered as in the common middleware convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PointFieldType {
    /// 32-bit IEEE float.
    Float32 = 7,
}

impl PointFieldType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            PointFieldType::Float32 => 4,
        }
    }
}

/// Describes one field of a point record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointField {
    /// Field name.
    pub name: String,
    /// Byte offset within the point record.
    pub offset: usize,
    /// Element type.
    pub datatype: PointFieldType,
    /// Number of elements.
    pub count: usize,
}

impl PointField {
    /// A single `f32` field.
    pub fn float32(name: impl Into<String>, offset: usize) -> Self {
        Self {
            name: name.into(),
            offset,
            datatype: PointFieldType::Float32,
            count: 1,
        }
    }

    /// The `x, y, z` fields followed by one `f32` field named `fourth` at offset 12.
    pub fn xyz_and(fourth: &str) -> Vec<PointField> {
        vec![
            Self::float32("x", 0),
            Self::float32("y", 4),
            Self::float32("z", 8),
            Self::float32(fourth, 12),
        ]
    }
}

/// An unorganized (single row) little-endian point cloud buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloudMessage {
    /// Coordinate frame of the points.
    pub frame_id: String,
    /// Number of rows, always 1.
    pub height: usize,
    /// Number of points.
    pub width: usize,
    /// Layout of one point record.
    pub fields: Vec<PointField>,
    /// Always `false`.
    pub is_bigendian: bool,
    /// Size of one point record in bytes.
    pub point_step: usize,
    /// `point_step * width`.
    pub row_step: usize,
    /// Whether every point in the buffer is valid.
    pub is_dense: bool,
    /// The point records.
    pub data: Vec<u8>,
}

impl PointCloudMessage {
    /// Build a message from records of `f32` values.
    ///
    /// # Arguments
    ///
    /// * `frame_id` - Coordinate frame of the points.
    /// * `fields` - Layout of one record; the point step is the end of the last field.
    /// * `is_dense` - Whether every point is valid.
    /// * `values` - The flat record values, `point_step / 4` per point.
    pub fn from_f32_records(
        frame_id: impl Into<String>,
        fields: Vec<PointField>,
        is_dense: bool,
        values: &[f32],
    ) -> Self {
        let point_step = fields
            .iter()
            .map(|f| f.offset + f.datatype.size() * f.count)
            .max()
            .unwrap_or(0);

        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }

        let width = match point_step {
            0 => 0,
            step => data.len() / step,
        };

        Self {
            frame_id: frame_id.into(),
            height: 1,
            width,
            fields,
            is_bigendian: false,
            point_step,
            row_step: point_step * width,
            is_dense,
            data,
        }
    }

    /// Build an `x, y, z, intensity` message from raw points.
    pub fn from_points(frame_id: impl Into<String>, points: &[RawPoint]) -> Self {
        let values: Vec<f32> = points
            .iter()
            .flat_map(|p| [p.x, p.y, p.z, p.intensity])
            .collect();
        Self::from_f32_records(frame_id, PointField::xyz_and("intensity"), true, &values)
    }

    /// Decode the message as `x, y, z, intensity` points.
    ///
    /// The header comes from the transport and is validated before the buffer is read.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is big-endian, the cloud has more than one row, the row
    /// step is inconsistent (or overflows), the data length differs from
    /// `row_step * height`, or the point step is too small.
    pub fn to_points(&self) -> Result<Vec<RawPoint>, WireError> {
        if self.is_bigendian {
            return Err(WireError::BigEndianUnsupported);
        }
        // an empty cloud may be published with zero rows
        if self.height != 1 && !(self.height == 0 && self.width == 0) {
            return Err(WireError::InvalidHeight(self.height));
        }

        let row_step = self.point_step.checked_mul(self.width);
        if row_step != Some(self.row_step) {
            return Err(WireError::InvalidRowStep {
                row_step: self.row_step,
                point_step: self.point_step,
                width: self.width,
            });
        }

        let expected = self.row_step * self.height;
        if self.data.len() != expected {
            return Err(WireError::DataLengthMismatch {
                len: self.data.len(),
                expected,
            });
        }

        decode_points(&self.data, self.point_step)
    }
}

/// Decode a flat little-endian buffer of `x, y, z, intensity` records.
///
/// Extra bytes beyond offset 16 in each record are ignored.
///
/// # Arguments
///
/// * `data` - The buffer.
/// * `point_step` - Size of one record in bytes.
///
/// # Errors
///
/// Fails if `point_step < 16` or `data.len()` is not a multiple of `point_step`.
pub fn decode_points(data: &[u8], point_step: usize) -> Result<Vec<RawPoint>, WireError> {
    if point_step < XYZI_POINT_STEP {
        return Err(WireError::InvalidPointStep(point_step));
    }
    if data.len() % point_step != 0 {
        return Err(WireError::InvalidBufferLength {
            len: data.len(),
            point_step,
        });
    }

    Ok(data
        .chunks_exact(point_step)
        .map(|record| {
            RawPoint::new(
                read_f32(record, 0),
                read_f32(record, 4),
                read_f32(record, 8),
                read_f32(record, 12),
            )
        })
        .collect())
}

/// Read a little-endian f32 from a record at least `offset + 4` bytes long.
#[inline]
fn read_f32(record: &[u8], offset: usize) -> f32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&record[offset..offset + 4]);
    f32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_records() -> Result<(), WireError> {
        let mut data = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 0.5, -1.0, -2.0, -3.0, 0.25] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let points = decode_points(&data, 16)?;
        assert_eq!(
            points,
            vec![
                RawPoint::new(1.0, 2.0, 3.0, 0.5),
                RawPoint::new(-1.0, -2.0, -3.0, 0.25)
            ]
        );
        Ok(())
    }

    #[test]
    fn rejects_partial_records() {
        assert!(matches!(
            decode_points(&[0u8; 20], 16),
            Err(WireError::InvalidBufferLength { len: 20, .. })
        ));
        assert!(matches!(
            decode_points(&[0u8; 24], 12),
            Err(WireError::InvalidPointStep(12))
        ));
    }

    #[test]
    fn wider_records_keep_the_first_four_fields() -> Result<(), WireError> {
        let mut data = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0, 99.0, 98.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let points = decode_points(&data, 24)?;
        assert_eq!(points, vec![RawPoint::new(1.0, 2.0, 3.0, 4.0)]);
        Ok(())
    }

    #[test]
    fn message_layout() -> Result<(), WireError> {
        let points = vec![RawPoint::new(1.0, 2.0, 3.0, 4.0); 3];
        let msg = PointCloudMessage::from_points("velodyne", &points);
        assert_eq!(msg.height, 1);
        assert_eq!(msg.width, 3);
        assert_eq!(msg.point_step, 16);
        assert_eq!(msg.row_step, 48);
        assert_eq!(msg.data.len(), 48);
        assert_eq!(msg.fields[3].offset, 12);
        assert_eq!(msg.to_points()?, points);
        Ok(())
    }

    #[test]
    fn message_with_bad_row_step_is_rejected() {
        let mut msg = PointCloudMessage::from_points("velodyne", &[RawPoint::default()]);
        msg.row_step = 17;
        assert!(matches!(msg.to_points(), Err(WireError::InvalidRowStep { .. })));
        msg.row_step = 16;
        msg.is_bigendian = true;
        assert!(matches!(msg.to_points(), Err(WireError::BigEndianUnsupported)));
    }

    #[test]
    fn overflowing_header_is_rejected() {
        let mut msg = PointCloudMessage::from_points("velodyne", &[RawPoint::default()]);
        msg.width = usize::MAX / 8;
        assert!(matches!(
            msg.to_points(),
            Err(WireError::InvalidRowStep { width, .. }) if width == usize::MAX / 8
        ));
    }

    #[test]
    fn header_must_agree_with_the_buffer() {
        let points = vec![RawPoint::new(1.0, 2.0, 3.0, 4.0); 3];

        // width and row step claim two points, the buffer holds three
        let mut msg = PointCloudMessage::from_points("velodyne", &points);
        msg.width = 2;
        msg.row_step = 32;
        assert!(matches!(
            msg.to_points(),
            Err(WireError::DataLengthMismatch { len: 48, expected: 32 })
        ));

        let mut msg = PointCloudMessage::from_points("velodyne", &points);
        msg.height = 3;
        assert!(matches!(msg.to_points(), Err(WireError::InvalidHeight(3))));
    }

    #[test]
    fn empty_cloud_decodes_with_zero_or_one_row() -> Result<(), WireError> {
        let mut msg = PointCloudMessage::from_points("velodyne", &[]);
        assert!(msg.to_points()?.is_empty());
        msg.height = 0;
        assert!(msg.to_points()?.is_empty());
        Ok(())
    }
}
