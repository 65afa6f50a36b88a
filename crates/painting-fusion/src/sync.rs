use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use painting_3d::{PointCloudMessage, RawPoint};
use painting_calib::CalibrationMatrices;
use serde::{Deserialize, Serialize};

use crate::{
    error::FrameError,
    mask::CameraImage,
    painter::{PaintedCloud, Painter},
    pipeline::{paint_frame, Frame, Segmenter},
};

/// What happens to an image or point cloud arriving while a cycle is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Drop the new observation; the running cycle's result is kept.
    DropNew,
    /// Store the observation in its slot, replacing any older pending one. At most
    /// one pending triple is processed after the running cycle finishes.
    #[default]
    KeepLatest,
}

/// Synchronizer settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Policy for observations arriving during a cycle.
    pub backpressure: BackpressurePolicy,
    /// Soft timeout of a cycle in milliseconds; `None` disables it.
    pub cycle_timeout_ms: Option<u64>,
}

/// Receives the results of processing cycles.
///
/// Implemented for any `Fn(PaintedCloud)` closure; frame errors are then logged.
pub trait PaintedCloudSink: Send + Sync {
    /// Publish a painted cloud.
    fn publish(&self, cloud: PaintedCloud);

    /// Report a frame that was dropped.
    fn report(&self, error: FrameError) {
        log::warn!("dropped frame: {error}");
    }
}

impl<F> PaintedCloudSink for F
where
    F: Fn(PaintedCloud) + Send + Sync,
{
    fn publish(&self, cloud: PaintedCloud) {
        self(cloud)
    }
}

/// Result of delivering one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The observation was stored; a triple is not complete yet.
    Waiting,
    /// A cycle is running; the observation will be used by the next one.
    Queued,
    /// A cycle is running and the policy dropped the observation.
    Dropped,
    /// This call ran `cycles` processing cycles on the calling thread.
    Processed {
        /// Number of cycles run, including pending triples picked up afterwards.
        cycles: usize,
    },
}

#[derive(Default)]
struct Slots {
    image: Option<CameraImage>,
    points: Option<Vec<RawPoint>>,
    calib: Option<Arc<CalibrationMatrices>>,
    in_flight: bool,
}

impl Slots {
    /// Move the image and points out, share the calibration. Only when all are present.
    fn take_frame(&mut self) -> Option<Frame> {
        if self.image.is_none() || self.points.is_none() {
            return None;
        }
        let calib = self.calib.clone()?;
        Some(Frame {
            image: self.image.take()?,
            points: self.points.take()?,
            calib,
        })
    }
}

/// Clears the in-flight marker if a cycle unwinds, so later triples still run.
///
/// The image and points that arrived during the failed cycle are dropped as stale.
struct InFlight<'a> {
    slots: &'a Mutex<Slots>,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::warn!("cycle aborted, discarding pending observations");
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.in_flight = false;
        slots.image = None;
        slots.points = None;
    }
}

/// Pairs the latest image, point cloud and calibration and paints each complete triple
/// exactly once.
///
/// The three slots live behind one mutex. Each arrival stores its observation under
/// the lock; if this completes a triple and no cycle is running, the image and points
/// are moved out of their slots together with the current calibration in the same
/// critical section, so a cycle never sees a mix of old and new slot values. Calibration
/// is replaced as a whole `Arc`, never mutated, and persists across cycles until
/// replaced.
///
/// # Locking
///
/// Only the capture is atomic: the cycle itself runs on the calling thread with the
/// lock released, rather than holding it through read, compute and clear. Keep it
/// that way. Arrivals during a cycle must be able to take the lock and see
/// `in_flight`, otherwise [`BackpressurePolicy`] never applies and callbacks block
/// for the length of a cycle. If a cycle unwinds (a panicking segmenter or sink), the
/// in-flight marker is cleared and observations that arrived meanwhile are discarded.
pub struct FrameSynchronizer<S, P> {
    segmenter: S,
    sink: P,
    painter: Painter,
    config: SyncConfig,
    slots: Mutex<Slots>,
}

impl<S: Segmenter, P: PaintedCloudSink> FrameSynchronizer<S, P> {
    /// Create a synchronizer with empty slots.
    ///
    /// # Arguments
    ///
    /// * `segmenter` - The external segmentation model.
    /// * `painter` - The painter applied to every triple.
    /// * `sink` - Receives painted clouds and frame errors.
    /// * `config` - Backpressure and timeout settings.
    pub fn new(segmenter: S, painter: Painter, sink: P, config: SyncConfig) -> Self {
        Self {
            segmenter,
            sink,
            painter,
            config,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// The synchronizer settings.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Deliver a camera image.
    pub fn on_image(&self, image: CameraImage) -> Result<CycleOutcome, FrameError> {
        self.deliver(|slots| slots.image = Some(image), true)
    }

    /// Deliver a point cloud wire buffer.
    ///
    /// # Errors
    ///
    /// A malformed buffer is dropped with [`FrameError::Wire`]; the slots are untouched.
    pub fn on_point_cloud(&self, msg: &PointCloudMessage) -> Result<CycleOutcome, FrameError> {
        let points = msg.to_points()?;
        self.on_points(points)
    }

    /// Deliver already decoded LIDAR points.
    pub fn on_points(&self, points: Vec<RawPoint>) -> Result<CycleOutcome, FrameError> {
        self.deliver(|slots| slots.points = Some(points), true)
    }

    /// Publish a new calibration epoch.
    ///
    /// Calibration updates are never dropped by the backpressure policy.
    pub fn on_calibration(
        &self,
        calib: Arc<CalibrationMatrices>,
    ) -> Result<CycleOutcome, FrameError> {
        self.deliver(|slots| slots.calib = Some(calib), false)
    }

    /// The calibration currently in the slot.
    pub fn calibration(&self) -> Result<Option<Arc<CalibrationMatrices>>, FrameError> {
        Ok(self.lock()?.calib.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slots>, FrameError> {
        self.slots.lock().map_err(|_| FrameError::LockPoisoned)
    }

    fn deliver(
        &self,
        store: impl FnOnce(&mut Slots),
        droppable: bool,
    ) -> Result<CycleOutcome, FrameError> {
        let frame = {
            let mut slots = self.lock()?;
            if slots.in_flight {
                if droppable && self.config.backpressure == BackpressurePolicy::DropNew {
                    log::debug!("cycle in flight, dropping observation");
                    return Ok(CycleOutcome::Dropped);
                }
                store(&mut *slots);
                return Ok(CycleOutcome::Queued);
            }

            store(&mut *slots);
            match slots.take_frame() {
                Some(frame) => {
                    slots.in_flight = true;
                    frame
                }
                None => return Ok(CycleOutcome::Waiting),
            }
        };

        self.run_cycles(frame)
    }

    /// Process `frame`, then any triple completed while it ran, until none is pending.
    fn run_cycles(&self, mut frame: Frame) -> Result<CycleOutcome, FrameError> {
        let mut guard = InFlight {
            slots: &self.slots,
            armed: true,
        };
        let timeout = self.config.cycle_timeout_ms.map(Duration::from_millis);
        let mut cycles = 0;

        loop {
            let start = Instant::now();
            let result = paint_frame(&frame, &self.segmenter, &self.painter);
            let elapsed = start.elapsed();
            cycles += 1;

            let timed_out = matches!(timeout, Some(limit) if elapsed > limit);

            match (result, timeout) {
                (Ok(_), Some(limit)) if timed_out => {
                    log::warn!("cycle took {elapsed:?}, abandoning result");
                    self.sink.report(FrameError::Timeout(limit));
                }
                (Ok(cloud), _) => self.sink.publish(cloud),
                (Err(e), _) => self.sink.report(e),
            }

            let mut slots = self.lock()?;
            if timed_out {
                // anything that arrived during an overrun is stale
                slots.image = None;
                slots.points = None;
            }
            match slots.take_frame() {
                Some(next) => frame = next,
                None => {
                    slots.in_flight = false;
                    guard.armed = false;
                    return Ok(CycleOutcome::Processed { cycles });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mask::{ImageSize, SemanticMask},
        painter::PainterConfig,
    };
    use std::sync::mpsc;

    type BoxError = Box<dyn std::error::Error + Send + Sync>;

    fn image() -> CameraImage {
        CameraImage::new(ImageSize { width: 4, height: 4 }, 1, vec![0; 16])
            .expect("valid image")
    }

    fn constant_segmenter(image: &CameraImage) -> Result<SemanticMask, BoxError> {
        Ok(SemanticMask::from_size_val(image.size(), 7)?)
    }

    fn points() -> Vec<RawPoint> {
        vec![
            RawPoint::new(0.0, 0.0, 5.0, 0.0),
            RawPoint::new(1.0, 1.0, 1.0, 0.0),
            RawPoint::new(0.0, 0.0, -1.0, 0.0),
        ]
    }

    fn synchronizer(
        config: SyncConfig,
    ) -> (
        FrameSynchronizer<fn(&CameraImage) -> Result<SemanticMask, BoxError>, impl PaintedCloudSink>,
        mpsc::Receiver<PaintedCloud>,
    ) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let sink = move |cloud: PaintedCloud| {
            if let Ok(tx) = tx.lock() {
                let _ = tx.send(cloud);
            }
        };
        let painter = Painter::new(PainterConfig::default()).expect("valid painter");
        let segmenter: fn(&CameraImage) -> Result<SemanticMask, BoxError> = constant_segmenter;
        (FrameSynchronizer::new(segmenter, painter, sink, config), rx)
    }

    #[test]
    fn waits_for_all_three_slots() -> Result<(), FrameError> {
        let (sync, rx) = synchronizer(SyncConfig::default());

        assert_eq!(sync.on_image(image())?, CycleOutcome::Waiting);
        assert_eq!(sync.on_points(points())?, CycleOutcome::Waiting);
        assert!(rx.try_recv().is_err());

        let outcome = sync.on_calibration(Arc::new(CalibrationMatrices::identity()))?;
        assert_eq!(outcome, CycleOutcome::Processed { cycles: 1 });

        let cloud = rx.try_recv().expect("one painted cloud");
        assert_eq!(cloud.len(), 2);
        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn each_triple_is_processed_once() -> Result<(), FrameError> {
        let (sync, rx) = synchronizer(SyncConfig::default());
        sync.on_calibration(Arc::new(CalibrationMatrices::identity()))?;
        sync.on_image(image())?;
        sync.on_points(points())?;

        // image and points were consumed; a new image alone does not re-trigger
        assert_eq!(sync.on_image(image())?, CycleOutcome::Waiting);
        // calibration persists across cycles
        assert_eq!(
            sync.on_points(points())?,
            CycleOutcome::Processed { cycles: 1 }
        );
        assert_eq!(rx.try_iter().count(), 2);
        Ok(())
    }

    #[test]
    fn calibration_replacement_is_wholesale() -> Result<(), FrameError> {
        let (sync, _rx) = synchronizer(SyncConfig::default());
        let first = Arc::new(CalibrationMatrices::identity());
        sync.on_calibration(first.clone())?;
        let second = Arc::new(CalibrationMatrices::new(
            [[2.0, 0.0, 0.0, 0.0], [0.0, 2.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
            painting_calib::matrices::IDENTITY3,
            painting_calib::matrices::IDENTITY3X4,
        ));
        sync.on_calibration(second.clone())?;

        let current = sync.calibration()?.expect("calibration present");
        assert!(Arc::ptr_eq(&current, &second));
        assert_eq!(*first, CalibrationMatrices::identity());
        Ok(())
    }

    #[test]
    fn malformed_cloud_is_rejected_without_touching_slots() -> Result<(), FrameError> {
        let (sync, rx) = synchronizer(SyncConfig::default());
        sync.on_calibration(Arc::new(CalibrationMatrices::identity()))?;
        sync.on_image(image())?;

        let mut msg = PointCloudMessage::from_points("velodyne", &points());
        msg.data.truncate(msg.data.len() - 3);
        assert!(matches!(
            sync.on_point_cloud(&msg),
            Err(FrameError::Wire(_))
        ));
        assert!(rx.try_recv().is_err());

        let msg = PointCloudMessage::from_points("velodyne", &points());
        assert_eq!(
            sync.on_point_cloud(&msg)?,
            CycleOutcome::Processed { cycles: 1 }
        );
        Ok(())
    }
}
