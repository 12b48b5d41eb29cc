//! Region compositing: label filtering and per-box effect application.

use std::fmt;

use image::RgbImage;
use log::trace;

use crate::detection::DetectionResult;
use crate::effects::{self, EffectConfig};
use crate::geometry::region_for;

/// Where processing of one image currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing started.
    Idle,
    /// Waiting on the detector (or the cache).
    Detecting,
    /// Applying the label allow-list.
    Filtering,
    /// Painting effects over regions.
    Compositing,
    /// Finished, with or without regions.
    Done,
    /// Decode or detection could not proceed.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::Detecting => "detecting",
            Stage::Filtering => "filtering",
            Stage::Compositing => "compositing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        })
    }
}

/// Keep detections whose label is in `labels`, in detector order.
///
/// An empty allow-list keeps everything.
#[must_use]
pub fn select_regions<'a>(
    detections: &'a [DetectionResult],
    labels: &[String],
) -> Vec<&'a DetectionResult> {
    detections
        .iter()
        .filter(|d| labels.is_empty() || labels.iter().any(|l| *l == d.label))
        .collect()
}

/// Result of compositing one image.
#[derive(Debug, Clone)]
pub struct Composite {
    /// The censored copy.
    pub image: RgbImage,
    /// Regions an effect was applied to.
    pub applied: usize,
    /// Regions skipped because they were empty after scaling and clamping.
    pub skipped: usize,
}

/// Apply `config` to every region of `regions` over a copy of `original`.
///
/// Regions are processed strictly in the order given and each one sees the
/// output of the previous ones, so overlapping regions compound.
#[must_use]
pub fn composite(
    original: &RgbImage,
    regions: &[&DetectionResult],
    config: &EffectConfig,
) -> Composite {
    let mut working = original.clone();
    let mut applied = 0;
    let mut skipped = 0;

    for detection in regions {
        match region_for(&detection.bbox, config.scale, working.dimensions()) {
            Some(rect) => {
                effects::apply(&mut working, rect, config);
                applied += 1;
            }
            None => {
                trace!(
                    "skipping empty region {:?} ({})",
                    detection.bbox,
                    detection.label
                );
                skipped += 1;
            }
        }
    }

    Composite {
        image: working,
        applied,
        skipped,
    }
}
