//! Detector that reads precomputed detections from JSON files.
//!
//! Two layouts are supported: a `<image file name>.json` file next to each
//! image, or one fixed file used for every image. Either file holds a list of
//! detections, bare or under a `"detections"` key:
//!
//! ```json
//! {"detections": [{"box": [10, 10, 50, 50], "label": "face", "confidence": 0.91}]}
//! ```
//!
//! The confidence threshold is applied on read and overlapping boxes of the
//! same label are suppressed greedily at the IoU threshold.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;

use crate::detection::{DetectionRequest, DetectionResult, Detector};
use crate::error::{Error, Result};
use crate::geometry::BoundingBox;

#[derive(Debug, Deserialize)]
struct RawDetection {
    #[serde(rename = "box")]
    bbox: [f32; 4],
    #[serde(default)]
    label: String,
    #[serde(default = "full_confidence")]
    confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFile {
    List(Vec<RawDetection>),
    Wrapped { detections: Vec<RawDetection> },
}

impl From<RawFile> for Vec<DetectionResult> {
    fn from(file: RawFile) -> Self {
        let raw = match file {
            RawFile::List(list) | RawFile::Wrapped { detections: list } => list,
        };
        raw.into_iter()
            .map(|d| {
                let [x1, y1, x2, y2] = d.bbox;
                DetectionResult::new(BoundingBox::new(x1, y1, x2, y2), d.label, d.confidence)
            })
            .collect()
    }
}

/// Parse a detections document.
///
/// # Errors
///
/// Returns [`Error::DetectionsFile`] if the JSON does not match either layout.
pub fn parse_detections(json: &str, origin: &Path) -> Result<Vec<DetectionResult>> {
    serde_json::from_str::<RawFile>(json)
        .map(Into::into)
        .map_err(|e| Error::DetectionsFile {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
}

fn read_detections(path: &Path) -> Result<Vec<DetectionResult>> {
    let json = std::fs::read_to_string(path)?;
    parse_detections(&json, path)
}

/// Drop results under `confidence` and suppress same-label overlaps above `iou`.
///
/// Suppression visits boxes highest confidence first, and survivors keep
/// their input order.
#[must_use]
pub fn filter_detections(
    mut results: Vec<DetectionResult>,
    confidence: f32,
    iou: f32,
) -> Vec<DetectionResult> {
    results.retain(|r| r.confidence.is_finite() && r.confidence >= confidence);

    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by(|&a, &b| results[b].confidence.total_cmp(&results[a].confidence));

    let mut keep = vec![false; results.len()];
    for (pos, &i) in order.iter().enumerate() {
        let candidate = &results[i];
        let suppressed = order[..pos].iter().any(|&k| {
            keep[k]
                && results[k].label == candidate.label
                && results[k].bbox.iou(&candidate.bbox) > iou
        });
        keep[i] = !suppressed;
    }

    results
        .into_iter()
        .zip(keep)
        .filter_map(|(r, kept)| kept.then_some(r))
        .collect()
}

/// Where a [`SidecarDetector`] looks for detections.
#[derive(Debug, Clone)]
enum Source {
    PerImage,
    Fixed(Vec<DetectionResult>),
}

/// [`Detector`] backed by JSON detection files.
#[derive(Debug, Clone)]
pub struct SidecarDetector {
    source: Source,
}

impl SidecarDetector {
    /// Read `<image path>.json` next to every image.
    #[must_use]
    pub fn per_image() -> Self {
        Self {
            source: Source::PerImage,
        }
    }

    /// Use the detections in `path` for every image.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed; callers treat that as the
    /// detector being unavailable.
    pub fn from_file(path: &Path) -> Result<Self> {
        let results = read_detections(path)?;
        debug!(
            "loaded {} detection(s) from {}",
            results.len(),
            path.display()
        );
        Ok(Self {
            source: Source::Fixed(results),
        })
    }

    /// Sidecar location for an image: `photo.jpg` -> `photo.jpg.json`.
    #[must_use]
    pub fn sidecar_path(image: &Path) -> PathBuf {
        let mut name = image.as_os_str().to_owned();
        name.push(".json");
        PathBuf::from(name)
    }
}

impl Detector for SidecarDetector {
    fn detect(&self, request: &DetectionRequest<'_>) -> Vec<DetectionResult> {
        let results = match &self.source {
            Source::Fixed(results) => results.clone(),
            Source::PerImage => {
                let Some(image_path) = request.path else {
                    warn!("sidecar detector needs an image path; reporting no regions");
                    return Vec::new();
                };
                let sidecar = Self::sidecar_path(image_path);
                if !sidecar.exists() {
                    debug!("no sidecar at {}", sidecar.display());
                    return Vec::new();
                }
                match read_detections(&sidecar) {
                    Ok(results) => results,
                    Err(e) => {
                        warn!("ignoring sidecar: {e}");
                        return Vec::new();
                    }
                }
            }
        };
        filter_detections(results, request.confidence, request.iou)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn det(x1: f32, label: &str, confidence: f32) -> DetectionResult {
        DetectionResult::new(BoundingBox::new(x1, 0.0, x1 + 10.0, 10.0), label, confidence)
    }

    #[test]
    fn parses_bare_and_wrapped_lists() {
        let bare = r#"[{"box": [1, 2, 3, 4], "label": "a", "confidence": 0.5}]"#;
        let wrapped = r#"{"detections": [{"box": [1, 2, 3, 4], "label": "a"}]}"#;

        let a = parse_detections(bare, Path::new("bare.json")).unwrap();
        let b = parse_detections(wrapped, Path::new("wrapped.json")).unwrap();

        assert_eq!(a[0].bbox, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        assert!((a[0].confidence - 0.5).abs() < f32::EPSILON);
        assert_eq!(b[0].label, "a");
        assert!((b[0].confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_malformed_documents() {
        let err = parse_detections(r#"{"boxes": 3}"#, Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, Error::DetectionsFile { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn filter_applies_confidence_threshold() {
        let kept = filter_detections(vec![det(0.0, "a", 0.2), det(50.0, "a", 0.3)], 0.25, 0.7);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].confidence - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn filter_suppresses_same_label_overlaps_only() {
        let results = vec![
            det(0.0, "a", 0.6),
            det(1.0, "a", 0.9),
            det(1.0, "b", 0.8),
            det(40.0, "a", 0.5),
        ];
        let kept = filter_detections(results, 0.0, 0.5);
        let summary: Vec<(&str, f32)> = kept
            .iter()
            .map(|r| (r.label.as_str(), r.bbox.x1))
            .collect();
        assert_eq!(summary, vec![("a", 1.0), ("b", 1.0), ("a", 40.0)]);
    }

    #[test]
    fn survivors_keep_detector_order() {
        let results = vec![det(0.0, "a", 0.3), det(0.0, "b", 0.9)];
        let kept = filter_detections(results, 0.0, 0.5);
        let labels: Vec<&str> = kept.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);

        // The lower-confidence box of an overlapping pair is the one dropped.
        let results = vec![det(0.0, "a", 0.3), det(1.0, "a", 0.9), det(40.0, "b", 0.1)];
        let kept = filter_detections(results, 0.0, 0.5);
        let summary: Vec<(&str, f32)> = kept
            .iter()
            .map(|r| (r.label.as_str(), r.bbox.x1))
            .collect();
        assert_eq!(summary, vec![("a", 1.0), ("b", 40.0)]);
    }

    #[test]
    fn sidecar_path_appends_json() {
        assert_eq!(
            SidecarDetector::sidecar_path(Path::new("dir/photo.jpg")),
            PathBuf::from("dir/photo.jpg.json")
        );
    }

    #[test]
    fn per_image_without_path_or_file_reports_nothing() {
        let detector = SidecarDetector::per_image();
        let img = RgbImage::new(4, 4);
        let request = DetectionRequest {
            image: &img,
            path: None,
            confidence: 0.25,
            iou: 0.7,
        };
        assert!(detector.detect(&request).is_empty());

        let missing = DetectionRequest {
            path: Some(Path::new("/definitely/not/here.png")),
            ..request
        };
        assert!(detector.detect(&missing).is_empty());
    }
}
