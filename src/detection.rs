//! Detector interface and the per-image detection cache.
//!
//! The object detector itself is an external collaborator. The crate only
//! needs something implementing [`Detector`]; results are memoized per image
//! and per `(confidence, iou)` threshold pair by [`DetectionCache`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use log::{debug, trace};

use crate::geometry::BoundingBox;

/// Default detector confidence threshold.
pub const DEFAULT_CONFIDENCE: f32 = 0.25;
/// Default detector IoU (non-maximum suppression) threshold.
pub const DEFAULT_IOU: f32 = 0.7;

/// One region flagged by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Region in image pixel coordinates.
    pub bbox: BoundingBox,
    /// Class label reported by the detector.
    pub label: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

impl DetectionResult {
    /// Convenience constructor.
    #[must_use]
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }
}

/// Everything a detector gets to look at for one call.
#[derive(Debug, Clone, Copy)]
pub struct DetectionRequest<'a> {
    /// Decoded image.
    pub image: &'a RgbImage,
    /// Source file, when the image came from disk.
    pub path: Option<&'a Path>,
    /// Minimum confidence to report.
    pub confidence: f32,
    /// IoU threshold for suppressing overlapping boxes.
    pub iou: f32,
}

/// Pluggable object detector.
///
/// Implementations fail soft: internal errors are logged and an empty list is
/// returned. Results must be returned in a stable order, since overlapping
/// regions are composited in exactly that order.
pub trait Detector: Send + Sync {
    /// Detect regions in the requested image.
    fn detect(&self, request: &DetectionRequest<'_>) -> Vec<DetectionResult>;
}

/// Identity of a decoded image in the cache, usually its source path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey(String);

impl ImageKey {
    /// Key for an image loaded from `path`.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Path> for ImageKey {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

impl From<&str> for ImageKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    confidence: f32,
    iou: f32,
    results: Arc<[DetectionResult]>,
}

impl CacheEntry {
    #[allow(clippy::float_cmp)]
    fn matches(&self, confidence: f32, iou: f32) -> bool {
        self.confidence == confidence && self.iou == iou
    }
}

/// Memoized detector output, one entry per image.
///
/// An entry is reused only while the thresholds match the ones it was
/// computed with; a threshold change replaces that image's entry and leaves
/// every other image alone.
#[derive(Debug, Default)]
pub struct DetectionCache {
    entries: HashMap<ImageKey, CacheEntry>,
}

impl DetectionCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached results for `key` if they were computed at these thresholds.
    #[must_use]
    pub fn get(&self, key: &ImageKey, confidence: f32, iou: f32) -> Option<Arc<[DetectionResult]>> {
        self.entries
            .get(key)
            .filter(|entry| entry.matches(confidence, iou))
            .map(|entry| Arc::clone(&entry.results))
    }

    /// Store results for `key`, replacing any previous entry.
    pub fn insert(
        &mut self,
        key: ImageKey,
        confidence: f32,
        iou: f32,
        results: Vec<DetectionResult>,
    ) -> Arc<[DetectionResult]> {
        let results: Arc<[DetectionResult]> = results.into();
        self.entries.insert(
            key,
            CacheEntry {
                confidence,
                iou,
                results: Arc::clone(&results),
            },
        );
        results
    }

    /// Return cached results, or run `detector` and cache what it returns.
    pub fn get_or_detect(
        &mut self,
        key: &ImageKey,
        detector: &dyn Detector,
        request: &DetectionRequest<'_>,
    ) -> Arc<[DetectionResult]> {
        if let Some(hit) = self.get(key, request.confidence, request.iou) {
            trace!("detection cache hit for {key}");
            return hit;
        }
        if self.entries.contains_key(key) {
            debug!(
                "thresholds changed for {key} (conf={}, iou={}); re-running detector",
                request.confidence, request.iou
            );
        }
        let results = detector.detect(request);
        debug!("detector returned {} region(s) for {key}", results.len());
        self.insert(key.clone(), request.confidence, request.iou, results)
    }

    /// Drop the entry for one image.
    pub fn invalidate(&mut self, key: &ImageKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sorted, de-duplicated labels from a detection pass.
#[must_use]
pub fn unique_labels(results: &[DetectionResult]) -> Vec<String> {
    let mut labels: Vec<String> = results
        .iter()
        .filter(|r| !r.label.is_empty())
        .map(|r| r.label.clone())
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDetector {
        calls: AtomicUsize,
    }

    impl CountingDetector {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Detector for CountingDetector {
        fn detect(&self, request: &DetectionRequest<'_>) -> Vec<DetectionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![DetectionResult::new(
                BoundingBox::new(0.0, 0.0, 4.0, 4.0),
                "face",
                request.confidence,
            )]
        }
    }

    fn request(image: &RgbImage, confidence: f32, iou: f32) -> DetectionRequest<'_> {
        DetectionRequest {
            image,
            path: None,
            confidence,
            iou,
        }
    }

    #[test]
    fn threshold_change_invokes_detector_again() {
        let detector = CountingDetector::new();
        let img = RgbImage::new(8, 8);
        let key = ImageKey::from("img");
        let mut cache = DetectionCache::new();

        cache.get_or_detect(&key, &detector, &request(&img, 0.25, 0.7));
        let second = cache.get_or_detect(&key, &detector, &request(&img, 0.3, 0.7));

        assert_eq!(detector.calls(), 2);
        assert!((second[0].confidence - 0.3).abs() < f32::EPSILON);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn identical_thresholds_hit_the_cache() {
        let detector = CountingDetector::new();
        let img = RgbImage::new(8, 8);
        let key = ImageKey::from("img");
        let mut cache = DetectionCache::new();

        let first = cache.get_or_detect(&key, &detector, &request(&img, 0.25, 0.7));
        let second = cache.get_or_detect(&key, &detector, &request(&img, 0.25, 0.7));

        assert_eq!(detector.calls(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn iou_change_also_invalidates() {
        let detector = CountingDetector::new();
        let img = RgbImage::new(8, 8);
        let key = ImageKey::from("img");
        let mut cache = DetectionCache::new();

        cache.get_or_detect(&key, &detector, &request(&img, 0.25, 0.7));
        cache.get_or_detect(&key, &detector, &request(&img, 0.25, 0.5));
        cache.get_or_detect(&key, &detector, &request(&img, 0.25, 0.5));

        assert_eq!(detector.calls(), 2);
    }

    #[test]
    fn invalidation_is_per_image() {
        let detector = CountingDetector::new();
        let img = RgbImage::new(8, 8);
        let a = ImageKey::from("a.png");
        let b = ImageKey::from("b.png");
        let mut cache = DetectionCache::new();

        cache.get_or_detect(&a, &detector, &request(&img, 0.25, 0.7));
        cache.get_or_detect(&b, &detector, &request(&img, 0.25, 0.7));
        // Re-threshold only `a`.
        cache.get_or_detect(&a, &detector, &request(&img, 0.5, 0.7));
        assert_eq!(detector.calls(), 3);

        // `b` is still served from cache at its original thresholds.
        cache.get_or_detect(&b, &detector, &request(&img, 0.25, 0.7));
        assert_eq!(detector.calls(), 3);

        assert!(cache.invalidate(&b));
        assert!(!cache.invalidate(&b));
        assert!(cache.get(&a, 0.5, 0.7).is_some());
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = DetectionCache::new();
        cache.insert(ImageKey::from("x"), 0.25, 0.7, Vec::new());
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn unique_labels_are_sorted_and_deduplicated() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let results = vec![
            DetectionResult::new(b, "plate", 0.9),
            DetectionResult::new(b, "face", 0.8),
            DetectionResult::new(b, "plate", 0.4),
            DetectionResult::new(b, "", 0.4),
        ];
        assert_eq!(unique_labels(&results), vec!["face", "plate"]);
    }
}
