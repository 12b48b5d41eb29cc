use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use region_censor::detection::DetectionRequest;
use region_censor::{
    spawn_batch, BatchEvent, BatchJob, BoundingBox, CensorEngine, CensorOptions, CensorStatus,
    DetectionResult, Detector, Effect, EffectConfig, Error, FileOutcome, ImageKey,
    SidecarDetector,
};

struct FixedDetector {
    results: Vec<DetectionResult>,
    calls: Arc<AtomicUsize>,
}

impl FixedDetector {
    fn new(results: Vec<DetectionResult>) -> Self {
        Self {
            results,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Detector for FixedDetector {
    fn detect(&self, _request: &DetectionRequest<'_>) -> Vec<DetectionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results.clone()
    }
}

fn det(x1: f32, y1: f32, x2: f32, y2: f32, label: &str) -> DetectionResult {
    DetectionResult::new(BoundingBox::new(x1, y1, x2, y2), label, 0.9)
}

#[allow(clippy::cast_possible_truncation)]
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8])
    })
}

fn red_mist() -> CensorOptions {
    CensorOptions {
        effect: EffectConfig::new(Effect::Mist {
            color: Rgb([255, 0, 0]),
        })
        .with_alpha(1.0)
        .with_scale(1.0),
        ..CensorOptions::default()
    }
}

fn write_png(path: &Path, img: &RgbImage) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    img.save(path).unwrap();
}

#[test]
fn mist_fills_exactly_the_detected_region() {
    let engine = CensorEngine::with_detector(FixedDetector::new(vec![det(
        10.0, 10.0, 50.0, 50.0, "a",
    )]));
    let original = gradient(100, 100);
    let outcome = engine.censor_image(&ImageKey::from("mem"), original.clone(), None, &red_mist());

    assert!(matches!(outcome.status, CensorStatus::Censored { regions: 1 }));
    let processed = outcome.processed.unwrap();
    for (x, y, px) in processed.enumerate_pixels() {
        let inside = (10..50).contains(&x) && (10..50).contains(&y);
        if inside {
            assert_eq!(*px, Rgb([255, 0, 0]), "pixel ({x},{y})");
        } else {
            assert_eq!(px, original.get_pixel(x, y), "pixel ({x},{y})");
        }
    }
    assert_eq!(outcome.original, original);
}

#[test]
fn label_filter_limits_censored_regions() {
    let engine = CensorEngine::with_detector(FixedDetector::new(vec![
        det(0.0, 0.0, 10.0, 10.0, "face"),
        det(20.0, 20.0, 30.0, 30.0, "plate"),
    ]));
    let original = RgbImage::from_pixel(40, 40, Rgb([0, 0, 255]));
    let opts = CensorOptions {
        labels: vec!["plate".to_string()],
        ..red_mist()
    };
    let outcome = engine.censor_image(&ImageKey::from("mem"), original, None, &opts);
    let processed = outcome.processed.unwrap();

    assert_eq!(*processed.get_pixel(5, 5), Rgb([0, 0, 255]));
    assert_eq!(*processed.get_pixel(25, 25), Rgb([255, 0, 0]));
}

#[test]
fn missing_detector_reports_unavailable() {
    let engine = CensorEngine::new(None);
    let outcome = engine.censor_image(
        &ImageKey::from("mem"),
        RgbImage::new(10, 10),
        None,
        &red_mist(),
    );
    assert!(outcome.processed.is_none());
    assert!(matches!(
        outcome.status,
        CensorStatus::Failed(Error::DetectorUnavailable(_))
    ));
}

#[test]
fn changed_thresholds_rerun_detection_only_for_that_image() {
    let detector = FixedDetector::new(vec![det(0.0, 0.0, 4.0, 4.0, "a")]);
    let calls = Arc::clone(&detector.calls);
    let engine = CensorEngine::with_detector(detector);
    let img = RgbImage::new(8, 8);
    let (a, b) = (ImageKey::from("a"), ImageKey::from("b"));

    engine.detect(&a, &img, None, 0.25, 0.7).unwrap();
    engine.detect(&b, &img, None, 0.25, 0.7).unwrap();
    engine.detect(&a, &img, None, 0.25, 0.7).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    engine.detect(&a, &img, None, 0.4, 0.7).unwrap();
    engine.detect(&b, &img, None, 0.25, 0.7).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn batch_continues_past_a_corrupt_file() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_png(&input.path().join("a.png"), &gradient(8, 8));
    std::fs::write(input.path().join("b.png"), b"definitely not a png").unwrap();
    write_png(&input.path().join("c.png"), &gradient(8, 8));

    let engine = CensorEngine::with_detector(FixedDetector::new(vec![det(
        2.0, 2.0, 6.0, 6.0, "a",
    )]));
    let cancel = AtomicBool::new(false);
    let mut progress = Vec::new();
    let report = engine
        .process_batch(input.path(), output.path(), &red_mist(), &cancel, |event| {
            if let BatchEvent::Progress { processed, total } = event {
                progress.push((processed, total));
            }
        })
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.files.len(), 3);
    assert_eq!(report.files[1].outcome, FileOutcome::Failed);
    assert_eq!(report.censored(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

    assert!(output.path().join("a.png").exists());
    assert!(!output.path().join("b.png").exists());
    let c = image::open(output.path().join("c.png")).unwrap().to_rgb8();
    assert_eq!(*c.get_pixel(3, 3), Rgb([255, 0, 0]));
}

#[test]
fn batch_mirrors_nested_directories() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_png(&input.path().join("top.png"), &gradient(8, 8));
    write_png(&input.path().join("one/two/deep.PNG"), &gradient(8, 8));
    std::fs::write(input.path().join("one/notes.txt"), "skip me").unwrap();

    let engine = CensorEngine::with_detector(FixedDetector::new(Vec::new()));
    let cancel = AtomicBool::new(false);
    let report = engine
        .process_batch(input.path(), output.path(), &red_mist(), &cancel, |_| {})
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.no_regions(), 2);
    assert!(output.path().join("top.png").exists());
    assert!(output.path().join("one/two/deep.PNG").exists());
    assert!(!output.path().join("one/notes.txt").exists());

    // Nothing matched, so the saved image is the original.
    let saved = image::open(output.path().join("top.png")).unwrap().to_rgb8();
    assert_eq!(saved, gradient(8, 8));
}

#[test]
fn batch_without_detector_fails_every_file() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_png(&input.path().join("a.png"), &gradient(4, 4));
    write_png(&input.path().join("b.png"), &gradient(4, 4));

    let engine = CensorEngine::new(None);
    let cancel = AtomicBool::new(false);
    let report = engine
        .process_batch(input.path(), output.path(), &red_mist(), &cancel, |_| {})
        .unwrap();

    assert_eq!(report.failed(), 2);
    assert!(report.files[0].message.contains("detector unavailable"));
}

#[test]
fn cancellation_stops_between_files() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for name in ["a.png", "b.png", "c.png"] {
        write_png(&input.path().join(name), &gradient(4, 4));
    }

    let engine = CensorEngine::with_detector(FixedDetector::new(Vec::new()));
    let cancel = AtomicBool::new(false);
    let report = engine
        .process_batch(input.path(), output.path(), &red_mist(), &cancel, |event| {
            if let BatchEvent::File(_) = event {
                cancel.store(true, Ordering::Relaxed);
            }
        })
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.total, 3);
    assert!(output.path().join("a.png").exists());
    assert!(!output.path().join("b.png").exists());
}

#[test]
fn single_file_input_writes_into_output_root() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let file = input.path().join("solo.png");
    write_png(&file, &gradient(8, 8));

    let engine = CensorEngine::with_detector(FixedDetector::new(vec![det(
        0.0, 0.0, 8.0, 8.0, "a",
    )]));
    let cancel = AtomicBool::new(false);
    let report = engine
        .process_batch(&file, output.path(), &red_mist(), &cancel, |_| {})
        .unwrap();

    assert_eq!(report.censored(), 1);
    assert_eq!(
        report.files[0].output.as_deref(),
        Some(output.path().join("solo.png").as_path())
    );
}

#[test]
fn background_batch_streams_events_and_returns_report() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_png(&input.path().join("a.png"), &gradient(8, 8));
    write_png(&input.path().join("b.png"), &gradient(8, 8));

    let engine = Arc::new(CensorEngine::with_detector(FixedDetector::new(vec![det(
        1.0, 1.0, 3.0, 3.0, "a",
    )])));
    let handle = spawn_batch(
        engine,
        BatchJob {
            input: input.path().to_path_buf(),
            output: output.path().to_path_buf(),
            options: red_mist(),
        },
    )
    .unwrap();

    let events: Vec<BatchEvent> = handle.events().iter().collect();
    let report = handle.join().unwrap();

    assert!(matches!(events.first(), Some(BatchEvent::Started { total: 2 })));
    assert!(matches!(
        events.last(),
        Some(BatchEvent::Progress {
            processed: 2,
            total: 2
        })
    ));
    assert_eq!(report.censored(), 2);
    assert!(!report.cancelled);
}

#[test]
fn sidecar_detections_drive_file_processing() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("shot.png");
    write_png(&image_path, &RgbImage::from_pixel(20, 20, Rgb([0, 0, 0])));
    std::fs::write(
        SidecarDetector::sidecar_path(&image_path),
        r#"{"detections": [
            {"box": [0, 0, 10, 10], "label": "face", "confidence": 0.9},
            {"box": [10, 10, 20, 20], "label": "face", "confidence": 0.1}
        ]}"#,
    )
    .unwrap();

    let engine = CensorEngine::with_detector(SidecarDetector::per_image());
    let out_path = dir.path().join("out/shot.png");
    let report = engine.process_file(&image_path, &out_path, &red_mist());

    assert_eq!(report.outcome, FileOutcome::Censored { regions: 1 });
    let saved = image::open(&out_path).unwrap().to_rgb8();
    assert_eq!(*saved.get_pixel(5, 5), Rgb([255, 0, 0]));
    // Below the confidence threshold.
    assert_eq!(*saved.get_pixel(15, 15), Rgb([0, 0, 0]));
}

#[test]
fn unreadable_fixed_detections_file_is_an_error() {
    let err = SidecarDetector::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
