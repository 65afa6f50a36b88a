use std::{sync::Arc, time::Instant};

use painting_3d::{project_points, RawPoint};
use painting_calib::CalibrationMatrices;

use crate::{
    error::{FrameError, PaintError},
    mask::{CameraImage, SemanticMask},
    painter::{PaintedCloud, Painter},
};

/// The external segmentation model: one semantic mask per camera image.
///
/// Implemented for any `Fn(&CameraImage) -> Result<SemanticMask, _>` closure.
pub trait Segmenter: Send + Sync {
    /// Segment an image. The mask must have the resolution of the image.
    fn segment(
        &self,
        image: &CameraImage,
    ) -> Result<SemanticMask, Box<dyn std::error::Error + Send + Sync>>;
}

impl<F> Segmenter for F
where
    F: Fn(&CameraImage) -> Result<SemanticMask, Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync,
{
    fn segment(
        &self,
        image: &CameraImage,
    ) -> Result<SemanticMask, Box<dyn std::error::Error + Send + Sync>> {
        self(image)
    }
}

/// One atomically captured observation triple.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The camera image.
    pub image: CameraImage,
    /// The LIDAR points.
    pub points: Vec<RawPoint>,
    /// The calibration epoch active when the frame was captured.
    pub calib: Arc<CalibrationMatrices>,
}

/// Run one processing cycle: segment the image, project the points, paint them.
///
/// # Errors
///
/// Fails if segmentation fails, the mask is empty or differs in size from the
/// image, or the painter rejects its inputs. No partial output is produced.
pub fn paint_frame<S: Segmenter + ?Sized>(
    frame: &Frame,
    segmenter: &S,
    painter: &Painter,
) -> Result<PaintedCloud, FrameError> {
    let t0 = Instant::now();
    let mask = segmenter
        .segment(&frame.image)
        .map_err(|e| FrameError::Segmentation(e.to_string()))?;
    let t1 = Instant::now();

    if mask.size().is_empty() {
        return Err(PaintError::EmptyImage.into());
    }
    if mask.size() != frame.image.size() {
        return Err(PaintError::MaskSizeMismatch {
            mask: mask.size().to_string(),
            image: frame.image.size().to_string(),
        }
        .into());
    }

    let projected = project_points(&frame.points, &frame.calib);
    let t2 = Instant::now();

    let cloud = painter.paint(&projected, &frame.points, &mask)?;
    let t3 = Instant::now();

    log::debug!(
        "segmentation {:.2} ms, projection {:.2} ms, painting {:.2} ms, total {:.2} ms ({} -> {} points)",
        (t1 - t0).as_secs_f64() * 1e3,
        (t2 - t1).as_secs_f64() * 1e3,
        (t3 - t2).as_secs_f64() * 1e3,
        (t3 - t0).as_secs_f64() * 1e3,
        frame.points.len(),
        cloud.len(),
    );

    Ok(cloud)
}
