use painting_3d::{PointCloudMessage, PointField, ProjectedPoint, RawPoint};
use serde::{Deserialize, Serialize};

use crate::{error::PaintError, mask::SemanticMask};

/// Scalar feature written for points that cannot be painted.
pub const UNKNOWN_LABEL: f32 = -1.0;

/// Frame id of published painted clouds.
pub const PAINTED_FRAME_ID: &str = "painted_lidar";

/// How the sampled semantic class is encoded on each point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaintMode {
    /// A single class id stored as a float.
    #[default]
    ScalarLabel,
    /// An indicator vector over the known class set.
    OneHot,
    /// The full per-class score vector of a score mask.
    SoftmaxScores,
}

/// How the mask is sampled at a projected location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingPolicy {
    /// The pixel nearest to the projected location.
    #[default]
    Nearest,
}

/// Painter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    /// Feature encoding.
    pub mode: PaintMode,
    /// Size of the class set for vector modes.
    pub num_classes: usize,
    /// Drop points that cannot be painted.
    pub dense: bool,
    /// Mask sampling policy.
    pub sampling: SamplingPolicy,
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            mode: PaintMode::ScalarLabel,
            num_classes: 19,
            dense: true,
            sampling: SamplingPolicy::Nearest,
        }
    }
}

/// A painted point borrowed from a [`PaintedCloud`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintedPoint<'a> {
    /// The input LIDAR point.
    pub point: RawPoint,
    /// The sampled class, `None` for `UNKNOWN`.
    pub class: Option<u8>,
    /// The encoded semantic feature.
    pub feature: &'a [f32],
}

impl PaintedPoint<'_> {
    /// Whether the point carries the `UNKNOWN` feature.
    pub fn is_unknown(&self) -> bool {
        self.class.is_none()
    }
}

/// The painted point set of one frame.
///
/// Features are stored flat, `feature_dim` values per point. `UNKNOWN` is encoded as
/// [`UNKNOWN_LABEL`] in scalar mode and as an all-zero vector in vector modes; the
/// per-point class is kept alongside so validity never depends on the float value.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintedCloud {
    points: Vec<RawPoint>,
    classes: Vec<Option<u8>>,
    features: Vec<f32>,
    feature_dim: usize,
    mode: PaintMode,
    dense: bool,
}

impl PaintedCloud {
    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The LIDAR points, in input order.
    pub fn points(&self) -> &[RawPoint] {
        &self.points
    }

    /// The sampled class per point.
    pub fn classes(&self) -> &[Option<u8>] {
        &self.classes
    }

    /// Number of feature values per point.
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// The feature encoding.
    pub fn mode(&self) -> PaintMode {
        self.mode
    }

    /// Whether unpaintable points were dropped, so every point is valid.
    pub fn is_dense(&self) -> bool {
        self.dense
    }

    /// The point at `index`.
    pub fn get(&self, index: usize) -> Option<PaintedPoint<'_>> {
        let point = *self.points.get(index)?;
        Some(PaintedPoint {
            point,
            class: self.classes[index],
            feature: &self.features[index * self.feature_dim..(index + 1) * self.feature_dim],
        })
    }

    /// Iterate over the painted points.
    pub fn iter(&self) -> impl Iterator<Item = PaintedPoint<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Encode the cloud as a little-endian wire buffer.
    ///
    /// Scalar mode keeps the 16-byte `x, y, z, label` record. Vector modes keep the
    /// raw `x, y, z, intensity` record and append one `f32` per class.
    pub fn to_message(&self) -> PointCloudMessage {
        let fields = match self.mode {
            PaintMode::ScalarLabel => PointField::xyz_and("label"),
            PaintMode::OneHot | PaintMode::SoftmaxScores => {
                let mut fields = PointField::xyz_and("intensity");
                fields.extend(
                    (0..self.feature_dim).map(|k| PointField::float32(format!("class_{k}"), 16 + 4 * k)),
                );
                fields
            }
        };

        let scalar = self.mode == PaintMode::ScalarLabel;
        let mut values = Vec::with_capacity(self.len() * (4 + self.feature_dim));
        for p in self.iter() {
            values.extend_from_slice(&[p.point.x, p.point.y, p.point.z]);
            if !scalar {
                values.push(p.point.intensity);
            }
            values.extend_from_slice(p.feature);
        }

        PointCloudMessage::from_f32_records(PAINTED_FRAME_ID, fields, self.dense, &values)
    }
}

/// Attaches semantic classes from a mask to projected points.
#[derive(Debug, Clone)]
pub struct Painter {
    config: PainterConfig,
}

impl Painter {
    /// Create a new painter.
    ///
    /// # Errors
    ///
    /// Vector modes need `1..=256` classes.
    pub fn new(config: PainterConfig) -> Result<Self, PaintError> {
        if config.mode != PaintMode::ScalarLabel
            && (config.num_classes == 0 || config.num_classes > 256)
        {
            return Err(PaintError::InvalidNumClasses(config.num_classes));
        }
        Ok(Self { config })
    }

    /// The painter settings.
    pub fn config(&self) -> &PainterConfig {
        &self.config
    }

    /// Number of feature values emitted per point.
    pub fn feature_dim(&self) -> usize {
        match self.config.mode {
            PaintMode::ScalarLabel => 1,
            PaintMode::OneHot | PaintMode::SoftmaxScores => self.config.num_classes,
        }
    }

    /// Paint projected points with the classes of `mask`.
    ///
    /// A point whose projection is invalid (at or behind the camera) or falls outside
    /// `[0, width) x [0, height)` gets the `UNKNOWN` feature. Other points sample the
    /// nearest mask pixel. In dense mode `UNKNOWN` points are dropped; the relative
    /// order of the remaining points is preserved.
    ///
    /// # Arguments
    ///
    /// * `projected` - The projected points.
    /// * `raw` - The LIDAR points, index-aligned with `projected`.
    /// * `mask` - The semantic mask of the frame.
    ///
    /// # Errors
    ///
    /// Fails if the sequences differ in length, the mask is empty, or score painting
    /// is requested on a mask whose class count does not match.
    pub fn paint(
        &self,
        projected: &[ProjectedPoint],
        raw: &[RawPoint],
        mask: &SemanticMask,
    ) -> Result<PaintedCloud, PaintError> {
        if projected.len() != raw.len() {
            return Err(PaintError::LengthMismatch(projected.len(), raw.len()));
        }
        if mask.size().is_empty() {
            return Err(PaintError::EmptyImage);
        }
        if self.config.mode == PaintMode::SoftmaxScores {
            let mask_classes = mask.num_classes().ok_or(PaintError::ModeRequiresScores)?;
            if mask_classes != self.config.num_classes {
                return Err(PaintError::ClassCountMismatch {
                    mask: mask_classes,
                    expected: self.config.num_classes,
                });
            }
        }

        let dim = self.feature_dim();
        let capacity = raw.len();
        let mut points = Vec::with_capacity(capacity);
        let mut classes = Vec::with_capacity(capacity);
        let mut features = Vec::with_capacity(capacity * dim);

        let (width, height) = (mask.width(), mask.height());

        for (proj, point) in projected.iter().zip(raw) {
            let pixel = proj.nearest_pixel(width, height);
            let class = match (self.config.mode, pixel) {
                (_, None) => None,
                (PaintMode::OneHot, Some((col, row))) => {
                    Some(mask.label(col, row)).filter(|&c| (c as usize) < dim)
                }
                (_, Some((col, row))) => Some(mask.label(col, row)),
            };

            if class.is_none() && self.config.dense {
                continue;
            }

            points.push(*point);
            classes.push(class);

            match (self.config.mode, class, pixel) {
                (PaintMode::ScalarLabel, Some(c), _) => features.push(c as f32),
                (PaintMode::ScalarLabel, None, _) => features.push(UNKNOWN_LABEL),
                (PaintMode::OneHot, Some(c), _) => {
                    let start = features.len();
                    features.resize(start + dim, 0.0);
                    features[start + c as usize] = 1.0;
                }
                (PaintMode::SoftmaxScores, Some(_), Some((col, row))) => {
                    let scores = mask.scores(col, row).ok_or(PaintError::ModeRequiresScores)?;
                    features.extend_from_slice(scores);
                }
                (_, _, _) => features.resize(features.len() + dim, 0.0),
            }
        }

        log::trace!(
            "painted {} of {} points ({:?}, dense: {})",
            classes.iter().filter(|c| c.is_some()).count(),
            raw.len(),
            self.config.mode,
            self.config.dense
        );

        Ok(PaintedCloud {
            points,
            classes,
            features,
            feature_dim: dim,
            mode: self.config.mode,
            dense: self.config.dense,
        })
    }
}
