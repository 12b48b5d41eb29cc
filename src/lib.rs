//! Censor detector-flagged image regions.
//!
//! An object [`Detector`] reports labeled bounding boxes; every box whose label
//! is selected gets one of five effects painted over it: Gaussian blur, a
//! black line screen, a flat color mist, a radial light glow, or a custom
//! overlay image. Detection results are cached per image and per threshold
//! pair, so trying different effects never re-runs the detector.
//!
//! # Quick Start
//!
//! ```no_run
//! use region_censor::{CensorEngine, CensorOptions, Effect, EffectConfig, SidecarDetector};
//! use std::path::Path;
//!
//! let engine = CensorEngine::with_detector(SidecarDetector::per_image());
//! let opts = CensorOptions {
//!     effect: EffectConfig::new(Effect::mist()).with_alpha(0.8),
//!     labels: vec!["face".to_string()],
//!     ..CensorOptions::default()
//! };
//! let report = engine.process_file(Path::new("photo.jpg"), Path::new("out/photo.jpg"), &opts);
//! println!("{}", report.message);
//! ```
//!
//! # Batches
//!
//! Directories are walked recursively and mirrored into an output root. A
//! batch can run on a worker thread and be cancelled between files.
//!
//! ```no_run
//! use region_censor::{spawn_batch, BatchEvent, BatchJob, CensorEngine, CensorOptions, SidecarDetector};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(CensorEngine::with_detector(SidecarDetector::per_image()));
//! let handle = spawn_batch(engine, BatchJob {
//!     input: "photos".into(),
//!     output: "censored".into(),
//!     options: CensorOptions::default(),
//! }).expect("spawn batch worker");
//! for event in handle.events() {
//!     if let BatchEvent::Progress { processed, total } = event {
//!         println!("{processed}/{total}");
//!     }
//! }
//! let report = handle.join().expect("batch failed");
//! println!("{} failed", report.failed());
//! ```

#![deny(missing_docs)]

pub mod blending;
pub mod compositor;
pub mod detection;
pub mod effects;
mod engine;
pub mod error;
pub mod geometry;
mod session;
pub mod sidecar;

pub use compositor::Stage;
pub use detection::{DetectionResult, Detector, ImageKey};
pub use effects::{Effect, EffectConfig, LineDirection};
pub use engine::{
    collect_images, default_output_path, is_supported_image, load_image, load_overlay,
    mirrored_output_path, save_image, spawn_batch, BatchEvent, BatchHandle, BatchJob,
    BatchReport, CensorEngine, CensorOptions, CensorOutcome, CensorStatus, FileOutcome,
    FileReport, SUPPORTED_EXTENSIONS,
};
pub use error::{Error, Result};
pub use geometry::{adjust_box, BoundingBox, PixelRect};
pub use session::Session;
pub use sidecar::SidecarDetector;
