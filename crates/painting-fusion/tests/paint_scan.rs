use std::sync::{mpsc, Arc, Mutex};

use approx::assert_relative_eq;
use painting_3d::{wire::decode_points, PointCloudMessage, RawPoint};
use painting_fusion::{
    CameraImage, CycleOutcome, FrameSynchronizer, ImageSize, PaintMode, PaintedCloud,
    PaintingConfig, SemanticMask, UNKNOWN_LABEL,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const KITTI_SIZE: ImageSize = ImageSize {
    width: 1242,
    height: 375,
};

const RAW: &str = "P2: 7.215377e+02 0.000000e+00 6.095593e+02 4.485728e+01 0.000000e+00 7.215377e+02 1.728540e+02 2.163791e-01 0.000000e+00 0.000000e+00 1.000000e+00 2.745884e-03
R0_rect: 9.999239e-01 9.837760e-03 -7.445048e-03 -9.869795e-03 9.999421e-01 -4.278459e-03 7.402527e-03 4.351614e-03 9.999631e-01
Tr_velo_to_cam: 7.533745e-03 -9.999714e-01 -6.166020e-04 -4.069766e-03 1.480249e-02 7.280733e-04 -9.998902e-01 -7.631618e-02 9.998621e-01 7.523790e-03 1.480755e-02 -2.717806e-01
";

/// Labels grow by one every hundred columns.
fn column_bands(image: &CameraImage) -> Result<SemanticMask, BoxError> {
    let size = image.size();
    let labels = (0..size.area())
        .map(|i| ((i % size.width) / 100) as u8)
        .collect();
    Ok(SemanticMask::from_labels(size, labels)?)
}

fn scan() -> PointCloudMessage {
    PointCloudMessage::from_points(
        "velodyne",
        &[
            // straight ahead, lands near the principal point
            RawPoint::new(10.0, 0.0, 0.0, 0.25),
            // behind the vehicle
            RawPoint::new(-10.0, 0.0, 0.0, 0.5),
            // far to the left, outside the image
            RawPoint::new(10.0, 50.0, 0.0, 0.75),
        ],
    )
}

fn run(config_json: &str) -> Result<PaintedCloud, Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let calib_path = dir.path().join("000000.txt");
    std::fs::write(&calib_path, RAW)?;
    let config_path = dir.path().join("painting.json");
    std::fs::write(
        &config_path,
        config_json.replace("CALIB", &calib_path.to_string_lossy()),
    )?;

    let config = PaintingConfig::from_json_file(&config_path)?;
    let calib = config.calibration.load(None)?;

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let sink = move |cloud: PaintedCloud| {
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(cloud);
        }
    };
    let sync = FrameSynchronizer::new(
        column_bands,
        config.painter()?,
        sink,
        config.sync.clone(),
    );

    sync.on_calibration(Arc::new(calib))?;
    sync.on_image(CameraImage::new(
        KITTI_SIZE,
        3,
        vec![0; KITTI_SIZE.area() * 3],
    )?)?;
    assert_eq!(
        sync.on_point_cloud(&scan())?,
        CycleOutcome::Processed { cycles: 1 }
    );

    Ok(rx.try_recv()?)
}

#[test]
fn dense_scalar_scan_keeps_visible_points() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = run(r#"{"calibration": {"path": "CALIB", "camera": 2}}"#)?;
    assert_eq!(cloud.len(), 1);
    assert_eq!(cloud.classes(), &[Some(6)]);

    let msg = cloud.to_message();
    assert_eq!(msg.frame_id, "painted_lidar");
    assert_eq!(msg.point_step, 16);
    assert!(msg.is_dense);

    let decoded = decode_points(&msg.data, msg.point_step)?;
    assert_eq!(decoded.len(), 1);
    assert_relative_eq!(decoded[0].x, 10.0);
    assert_relative_eq!(decoded[0].intensity, 6.0);
    Ok(())
}

#[test]
fn sparse_scalar_scan_marks_unknown_points() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = run(r#"{"calibration": {"path": "CALIB"}, "paint": {"dense": false}}"#)?;
    assert_eq!(cloud.len(), 3);
    assert_eq!(cloud.classes(), &[Some(6), None, None]);

    let decoded = decode_points(&cloud.to_message().data, 16)?;
    let labels: Vec<f32> = decoded.iter().map(|p| p.intensity).collect();
    assert_eq!(labels, vec![6.0, UNKNOWN_LABEL, UNKNOWN_LABEL]);
    // coordinates pass through unchanged, in input order
    assert_relative_eq!(decoded[1].x, -10.0);
    assert_relative_eq!(decoded[2].y, 50.0);
    Ok(())
}

#[test]
fn one_hot_scan_widens_the_record() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = run(
        r#"{"calibration": {"path": "CALIB"}, "paint": {"mode": "ONE_HOT", "num_classes": 13, "dense": false}}"#,
    )?;
    assert_eq!(cloud.mode(), PaintMode::OneHot);
    assert_eq!(cloud.feature_dim(), 13);

    let msg = cloud.to_message();
    assert_eq!(msg.point_step, 16 + 4 * 13);
    assert_eq!(msg.fields.len(), 4 + 13);
    assert_eq!(msg.fields[3].name, "intensity");
    assert_eq!(msg.fields[4 + 6].name, "class_6");

    let decoded = decode_points(&msg.data, msg.point_step)?;
    let intensities: Vec<f32> = decoded.iter().map(|p| p.intensity).collect();
    assert_eq!(intensities, vec![0.25, 0.5, 0.75]);
    assert!(!msg.is_dense);

    let visible = cloud.get(0).ok_or("missing point")?;
    assert_eq!(visible.feature.iter().sum::<f32>(), 1.0);
    assert_eq!(visible.feature[6], 1.0);

    let behind = cloud.get(1).ok_or("missing point")?;
    assert!(behind.is_unknown());
    assert!(behind.feature.iter().all(|&v| v == 0.0));
    Ok(())
}
