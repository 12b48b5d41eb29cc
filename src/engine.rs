//! Censor engine: detection through the cache, compositing, and batch runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use image::{ImageFormat, RgbImage, RgbaImage};
use log::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::compositor::{composite, select_regions, Stage};
use crate::detection::{
    unique_labels, DetectionCache, DetectionRequest, DetectionResult, Detector, ImageKey,
    DEFAULT_CONFIDENCE, DEFAULT_IOU,
};
use crate::effects::EffectConfig;
use crate::error::{Error, Result};

/// File extensions picked up when walking an input directory.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tiff", "webp"];

/// Options controlling how an image is censored.
#[derive(Debug, Clone)]
pub struct CensorOptions {
    /// Effect painted over every selected region.
    pub effect: EffectConfig,
    /// Labels to censor. Empty means every detected label.
    pub labels: Vec<String>,
    /// Detector confidence threshold.
    pub confidence: f32,
    /// Detector IoU threshold.
    pub iou: f32,
}

impl Default for CensorOptions {
    fn default() -> Self {
        Self {
            effect: EffectConfig::default(),
            labels: Vec::new(),
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_IOU,
        }
    }
}

impl CensorOptions {
    /// Set the label allow-list, trimming names and dropping empty ones.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.labels = labels
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        self
    }
}

/// How censoring one image ended.
#[derive(Debug)]
pub enum CensorStatus {
    /// At least one region was painted.
    Censored {
        /// Number of regions painted.
        regions: usize,
    },
    /// Nothing matched; the processed image equals the original.
    NoRegions,
    /// Detection could not run; there is no processed image.
    Failed(Error),
}

/// Result of censoring one decoded image.
#[derive(Debug)]
pub struct CensorOutcome {
    /// The image as decoded.
    pub original: RgbImage,
    /// The censored image, absent only when the status is `Failed`.
    pub processed: Option<RgbImage>,
    /// What happened.
    pub status: CensorStatus,
    /// Stage processing stopped in (`Done` or `Failed`).
    pub stage: Stage,
}

impl CensorOutcome {
    /// Whether any region was painted.
    #[must_use]
    pub fn is_censored(&self) -> bool {
        matches!(self.status, CensorStatus::Censored { .. })
    }
}

/// Per-file result classification in batch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Regions were censored and the result saved.
    Censored {
        /// Number of regions painted.
        regions: usize,
    },
    /// No regions matched; the unchanged image was saved.
    NoRegions,
    /// Decoding, detection or saving failed.
    Failed,
}

/// Result of processing a single image file.
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Input file.
    pub path: PathBuf,
    /// Where the result was written, if anything was.
    pub output: Option<PathBuf>,
    /// Classification.
    pub outcome: FileOutcome,
    /// Human-readable status message.
    pub message: String,
}

impl FileReport {
    fn failed(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            output: None,
            outcome: FileOutcome::Failed,
            message,
        }
    }

    /// Whether this file failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome == FileOutcome::Failed
    }
}

/// Something that happened during a batch run.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// Discovery finished; `total` files will be processed.
    Started {
        /// Number of files found.
        total: usize,
    },
    /// One file finished.
    File(FileReport),
    /// Progress after each file.
    Progress {
        /// Files handled so far.
        processed: usize,
        /// Files found.
        total: usize,
    },
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One report per file handled, in processing order.
    pub files: Vec<FileReport>,
    /// Number of files found.
    pub total: usize,
    /// Whether the run stopped early on request.
    pub cancelled: bool,
}

impl BatchReport {
    /// Files that were censored.
    #[must_use]
    pub fn censored(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Censored { .. }))
    }

    /// Files saved unchanged because nothing matched.
    #[must_use]
    pub fn no_regions(&self) -> usize {
        self.count(|o| o == FileOutcome::NoRegions)
    }

    /// Files that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| o == FileOutcome::Failed)
    }

    fn count(&self, pred: impl Fn(FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(f.outcome)).count()
    }
}

/// Holds the detector and its cache.
///
/// Create once and reuse for many images; the cache is keyed per image and
/// per threshold pair, so re-running with the same thresholds skips detection.
pub struct CensorEngine {
    detector: Option<Arc<dyn Detector>>,
    cache: Mutex<DetectionCache>,
}

impl CensorEngine {
    /// Engine over an optional detector. Without one, every image fails with
    /// [`Error::DetectorUnavailable`].
    #[must_use]
    pub fn new(detector: Option<Arc<dyn Detector>>) -> Self {
        Self {
            detector,
            cache: Mutex::new(DetectionCache::new()),
        }
    }

    /// Engine over `detector`.
    #[must_use]
    pub fn with_detector(detector: impl Detector + 'static) -> Self {
        Self::new(Some(Arc::new(detector)))
    }

    /// Whether a detector is configured.
    #[must_use]
    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    fn cache(&self) -> MutexGuard<'_, DetectionCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of images with cached detections.
    #[must_use]
    pub fn cached_images(&self) -> usize {
        self.cache().len()
    }

    /// Forget cached detections for one image.
    pub fn invalidate(&self, key: &ImageKey) -> bool {
        self.cache().invalidate(key)
    }

    /// Run (or reuse) detection for an image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DetectorUnavailable`] if no detector is configured.
    pub fn detect(
        &self,
        key: &ImageKey,
        image: &RgbImage,
        path: Option<&Path>,
        confidence: f32,
        iou: f32,
    ) -> Result<Arc<[DetectionResult]>> {
        let detector = self
            .detector
            .as_deref()
            .ok_or_else(|| Error::DetectorUnavailable("no detector configured".to_string()))?;
        let cached = self.cache().get(key, confidence, iou);
        if let Some(hit) = cached {
            trace!("detection cache hit for {key}");
            return Ok(hit);
        }

        // The lock is not held while the detector runs.
        let request = DetectionRequest {
            image,
            path,
            confidence,
            iou,
        };
        let results = detector.detect(&request);
        debug!("detector returned {} region(s) for {key}", results.len());
        Ok(self.cache().insert(key.clone(), confidence, iou, results))
    }

    /// Sorted unique labels the detector reports for an image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DetectorUnavailable`] if no detector is configured.
    pub fn available_labels(
        &self,
        key: &ImageKey,
        image: &RgbImage,
        path: Option<&Path>,
        confidence: f32,
        iou: f32,
    ) -> Result<Vec<String>> {
        let results = self.detect(key, image, path, confidence, iou)?;
        Ok(unique_labels(&results))
    }

    /// Censor a decoded image.
    ///
    /// Never fails outright: a missing detector is reported through
    /// [`CensorStatus::Failed`] with no processed image.
    #[must_use]
    pub fn censor_image(
        &self,
        key: &ImageKey,
        original: RgbImage,
        path: Option<&Path>,
        opts: &CensorOptions,
    ) -> CensorOutcome {
        enter(key, Stage::Detecting);
        let detections = match self.detect(key, &original, path, opts.confidence, opts.iou) {
            Ok(d) => d,
            Err(e) => {
                warn!("{key}: {e}");
                return CensorOutcome {
                    original,
                    processed: None,
                    status: CensorStatus::Failed(e),
                    stage: enter(key, Stage::Failed),
                };
            }
        };

        enter(key, Stage::Filtering);
        let regions = select_regions(&detections, &opts.labels);
        if regions.is_empty() {
            debug!(
                "{key}: no regions match (detected {}, labels {:?})",
                detections.len(),
                opts.labels
            );
            return CensorOutcome {
                processed: Some(original.clone()),
                original,
                status: CensorStatus::NoRegions,
                stage: enter(key, Stage::Done),
            };
        }

        enter(key, Stage::Compositing);
        let result = composite(&original, &regions, &opts.effect);
        debug!(
            "{key}: {} applied to {} region(s), {} skipped",
            opts.effect.effect.name(),
            result.applied,
            result.skipped
        );
        let status = if result.applied == 0 {
            CensorStatus::NoRegions
        } else {
            CensorStatus::Censored {
                regions: result.applied,
            }
        };
        CensorOutcome {
            original,
            processed: Some(result.image),
            status,
            stage: enter(key, Stage::Done),
        }
    }

    /// Decode `path` and censor it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the file cannot be decoded.
    pub fn censor_file(&self, path: &Path, opts: &CensorOptions) -> Result<CensorOutcome> {
        let image = load_image(path)?;
        Ok(self.censor_image(&ImageKey::from_path(path), image, Some(path), opts))
    }

    /// Process a single image file: decode, censor, save.
    ///
    /// Files with no matching regions are saved unchanged.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path, opts: &CensorOptions) -> FileReport {
        let outcome = match self.censor_file(input, opts) {
            Ok(o) => o,
            Err(e) => return FileReport::failed(input, format!("Failed to load: {e}")),
        };

        let (file_outcome, message) = match &outcome.status {
            CensorStatus::Censored { regions } => (
                FileOutcome::Censored { regions: *regions },
                format!("Censored {regions} region(s)"),
            ),
            CensorStatus::NoRegions => (FileOutcome::NoRegions, "No matching regions".to_string()),
            CensorStatus::Failed(e) => return FileReport::failed(input, e.to_string()),
        };
        let Some(processed) = outcome.processed else {
            return FileReport::failed(input, "No processed image".to_string());
        };

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return FileReport::failed(
                        input,
                        format!("Failed to create output directory: {e}"),
                    );
                }
            }
        }

        match save_image(&processed, output) {
            Ok(()) => FileReport {
                path: input.to_path_buf(),
                output: Some(output.to_path_buf()),
                outcome: file_outcome,
                message,
            },
            Err(e) => FileReport::failed(input, format!("Failed to save: {e}")),
        }
    }

    /// Process a file or a directory tree into `output_root`.
    ///
    /// Directory inputs are walked recursively and mirrored under
    /// `output_root`; a single file is written as `output_root/<file name>`.
    /// Files run one at a time in sorted order. A failing file is recorded and
    /// the batch moves on. `cancel` is checked before each file.
    ///
    /// # Errors
    ///
    /// Fails only if the input cannot be enumerated at all.
    pub fn process_batch(
        &self,
        input: &Path,
        output_root: &Path,
        opts: &CensorOptions,
        cancel: &AtomicBool,
        mut on_event: impl FnMut(BatchEvent),
    ) -> Result<BatchReport> {
        let files = collect_images(input)?;
        let total = files.len();
        info!("processing {total} image(s) from {}", input.display());
        on_event(BatchEvent::Started { total });

        let mut report = BatchReport {
            files: Vec::with_capacity(total),
            total,
            cancelled: false,
        };

        for (index, file) in files.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                info!("batch cancelled after {index} of {total} file(s)");
                report.cancelled = true;
                break;
            }
            let output = mirrored_output_path(input, file, output_root);
            let file_report = self.process_file(file, &output, opts);
            if file_report.is_failure() {
                warn!("{}: {}", file.display(), file_report.message);
            }
            on_event(BatchEvent::File(file_report.clone()));
            report.files.push(file_report);
            on_event(BatchEvent::Progress {
                processed: index + 1,
                total,
            });
        }

        Ok(report)
    }
}

fn enter(key: &ImageKey, stage: Stage) -> Stage {
    trace!("{key}: {stage}");
    stage
}

/// A batch to run in the background.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// File or directory to read.
    pub input: PathBuf,
    /// Root of the mirrored output tree.
    pub output: PathBuf,
    /// Options for every file.
    pub options: CensorOptions,
}

/// Handle to a batch running on a worker thread.
pub struct BatchHandle {
    cancel: Arc<AtomicBool>,
    events: mpsc::Receiver<BatchEvent>,
    worker: JoinHandle<Result<BatchReport>>,
}

impl BatchHandle {
    /// Ask the worker to stop before its next file.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Events from the worker; the channel closes when the batch ends.
    #[must_use]
    pub fn events(&self) -> &mpsc::Receiver<BatchEvent> {
        &self.events
    }

    /// Wait for the worker and return its report.
    ///
    /// # Errors
    ///
    /// Returns the batch error, or [`Error::Worker`] if the thread panicked.
    pub fn join(self) -> Result<BatchReport> {
        self.worker
            .join()
            .map_err(|_| Error::Worker("batch thread panicked".to_string()))?
    }
}

/// Run `job` on a background thread.
///
/// # Errors
///
/// Returns [`Error::Io`] if the thread cannot be spawned.
pub fn spawn_batch(engine: Arc<CensorEngine>, job: BatchJob) -> Result<BatchHandle> {
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, events) = mpsc::channel();
    let flag = Arc::clone(&cancel);

    let worker = thread::Builder::new()
        .name("region-censor-batch".to_string())
        .spawn(move || {
            engine.process_batch(&job.input, &job.output, &job.options, &flag, |event| {
                // The receiver may already be gone; the report still comes back via join.
                let _ = tx.send(event);
            })
        })?;

    Ok(BatchHandle {
        cancel,
        events,
        worker,
    })
}

/// Check if a file has a supported image extension (case-insensitive).
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Supported images under `input`, sorted.
///
/// A file input yields just itself. Unreadable directory entries are logged
/// and skipped.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `input` does not exist, or
/// [`Error::UnsupportedFormat`] for a single file with an unknown extension.
pub fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        if !is_supported_image(input) {
            return Err(Error::UnsupportedFormat(input.display().to_string()));
        }
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(Error::InvalidInput(format!(
            "{} does not exist",
            input.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input) {
        match entry {
            Ok(e) if e.file_type().is_file() && is_supported_image(e.path()) => {
                files.push(e.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!("skipping unreadable entry: {e}"),
        }
    }
    files.sort();
    Ok(files)
}

/// Output location for `file`, mirroring its position under `input_root`.
#[must_use]
pub fn mirrored_output_path(input_root: &Path, file: &Path, output_root: &Path) -> PathBuf {
    match file.strip_prefix(input_root) {
        Ok(relative) if !relative.as_os_str().is_empty() => output_root.join(relative),
        _ => output_root.join(file.file_name().unwrap_or_default()),
    }
}

/// Decode an image into the RGB working layout.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Decode an overlay image, keeping (or synthesizing opaque) alpha.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the file cannot be opened or decoded.
pub fn load_overlay(path: &Path) -> Result<RgbaImage> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Save an RGB image with format-specific quality settings.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
    let encode_err = |source: image::ImageError| Error::Encode {
        path: path.to_path_buf(),
        source,
    };

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(img).map_err(encode_err)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp | ImageFormat::Tiff => {
            img.save_with_format(path, format).map_err(encode_err)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_censored.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_censored.{ext}"))
}
