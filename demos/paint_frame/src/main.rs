use argh::FromArgs;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use painting::{
    calib::RectifiedIntrinsics,
    fusion::{
        CameraImage, CycleOutcome, FrameSynchronizer, ImageSize, PaintedCloud, PaintingConfig,
        SemanticMask,
    },
    points::{wire::decode_points, PointCloudMessage},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Paints one KITTI velodyne scan with the classes of a label mask
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the JSON pipeline configuration
    #[argh(option, short = 'c')]
    config: PathBuf,

    /// path to a velodyne scan of little-endian x, y, z, intensity records
    #[argh(option, short = 's')]
    scan: PathBuf,

    /// path to a row-major u8 label mask
    #[argh(option, short = 'm')]
    mask: PathBuf,

    /// mask width in pixels
    #[argh(option, default = "1242")]
    width: usize,

    /// mask height in pixels
    #[argh(option, default = "375")]
    height: usize,

    /// rectified projection, 12 comma separated values (structured calibration only)
    #[argh(option, from_str_fn(parse_floats))]
    projection: Option<Vec<f64>>,

    /// rectifying rotation, 9 comma separated values (structured calibration only)
    #[argh(option, from_str_fn(parse_floats))]
    rotation: Option<Vec<f64>>,

    /// where to write the painted point records
    #[argh(option, short = 'o', default = "PathBuf::from(\"painted.bin\")")]
    output: PathBuf,
}

fn parse_floats(value: &str) -> Result<Vec<f64>, String> {
    value
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{v}: {e}")))
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = PaintingConfig::from_json_file(&args.config)?;

    let intrinsics = match (&args.projection, &args.rotation) {
        (Some(p), Some(r)) => Some(RectifiedIntrinsics::from_camera_info(p, r)?),
        _ => None,
    };
    let calib = config.calibration.load(intrinsics)?;
    log::info!("composite operator: {:?}", calib.composite());

    let points = decode_points(&std::fs::read(&args.scan)?, 16)?;
    log::info!("read {} points from {}", points.len(), args.scan.display());
    let scan = PointCloudMessage::from_points("velodyne", &points);

    let size = ImageSize {
        width: args.width,
        height: args.height,
    };
    let mask = SemanticMask::from_labels(size, std::fs::read(&args.mask)?)?;

    // the label file stands in for the segmentation model
    let segmenter = move |_: &CameraImage| -> Result<SemanticMask, BoxError> { Ok(mask.clone()) };

    let painted: Arc<Mutex<Option<PaintedCloud>>> = Arc::new(Mutex::new(None));
    let sink = {
        let painted = painted.clone();
        move |cloud: PaintedCloud| {
            if let Ok(mut slot) = painted.lock() {
                *slot = Some(cloud);
            }
        }
    };

    let sync = FrameSynchronizer::new(segmenter, config.painter()?, sink, config.sync.clone());
    sync.on_calibration(Arc::new(calib))?;
    sync.on_image(CameraImage::new(size, 1, vec![0; size.area()])?)?;
    let outcome = sync.on_point_cloud(&scan)?;
    log::debug!("cycle outcome: {outcome:?}");

    let cloud = match (outcome, painted.lock().map_err(|_| "sink poisoned")?.take()) {
        (CycleOutcome::Processed { .. }, Some(cloud)) => cloud,
        _ => return Err("the frame was dropped, see the log for the reason".into()),
    };

    let msg = cloud.to_message();
    std::fs::write(&args.output, &msg.data)?;

    println!(
        "painted {} of {} points ({:?}, point step {} bytes) -> {}",
        cloud.len(),
        points.len(),
        cloud.mode(),
        msg.point_step,
        args.output.display()
    );

    Ok(())
}
