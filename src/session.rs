//! Interactive editing session over one image at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use log::debug;

use crate::detection::ImageKey;
use crate::engine::{
    default_output_path, load_image, save_image, CensorEngine, CensorOptions, CensorOutcome,
};
use crate::error::{Error, Result};

#[derive(Debug)]
struct Loaded {
    key: ImageKey,
    path: Option<PathBuf>,
    image: RgbImage,
}

/// Current image, options and last preview.
///
/// Loading a new image drops the previous image's cached detections. Previews
/// re-use the cache, so changing only the effect never re-runs detection.
pub struct Session {
    engine: Arc<CensorEngine>,
    options: CensorOptions,
    current: Option<Loaded>,
    last: Option<CensorOutcome>,
}

impl Session {
    /// Empty session with default options.
    #[must_use]
    pub fn new(engine: Arc<CensorEngine>) -> Self {
        Self {
            engine,
            options: CensorOptions::default(),
            current: None,
            last: None,
        }
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> &CensorOptions {
        &self.options
    }

    /// Mutable access to the options; takes effect on the next preview.
    pub fn options_mut(&mut self) -> &mut CensorOptions {
        &mut self.options
    }

    /// Load an image from disk, replacing the current one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the file cannot be decoded. The previous
    /// image stays loaded in that case.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let image = load_image(path)?;
        self.replace(Loaded {
            key: ImageKey::from_path(path),
            path: Some(path.to_path_buf()),
            image,
        });
        Ok(())
    }

    /// Use an already decoded image, identified by `key`.
    pub fn load_image(&mut self, key: ImageKey, image: RgbImage) {
        self.replace(Loaded {
            key,
            path: None,
            image,
        });
    }

    fn replace(&mut self, next: Loaded) {
        if let Some(previous) = self.current.take() {
            if self.engine.invalidate(&previous.key) {
                debug!("dropped cached detections for {}", previous.key);
            }
        }
        self.last = None;
        self.current = Some(next);
    }

    /// Path of the loaded image, if it came from disk.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.current.as_ref().and_then(|c| c.path.as_deref())
    }

    /// The loaded image.
    #[must_use]
    pub fn image(&self) -> Option<&RgbImage> {
        self.current.as_ref().map(|c| &c.image)
    }

    fn loaded(&self) -> Result<&Loaded> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no image loaded".to_string()))
    }

    /// Labels detected in the loaded image at the current thresholds.
    ///
    /// # Errors
    ///
    /// Fails if nothing is loaded or no detector is configured.
    pub fn labels(&self) -> Result<Vec<String>> {
        let loaded = self.loaded()?;
        self.engine.available_labels(
            &loaded.key,
            &loaded.image,
            loaded.path.as_deref(),
            self.options.confidence,
            self.options.iou,
        )
    }

    /// Censor the loaded image with the current options and keep the result.
    ///
    /// # Errors
    ///
    /// Fails only if nothing is loaded; detector problems are reported in the
    /// outcome's status.
    pub fn preview(&mut self) -> Result<&CensorOutcome> {
        let loaded = self.loaded()?;
        let outcome = self.engine.censor_image(
            &loaded.key,
            loaded.image.clone(),
            loaded.path.as_deref(),
            &self.options,
        );
        Ok(&*self.last.insert(outcome))
    }

    /// The most recent preview.
    #[must_use]
    pub fn last_outcome(&self) -> Option<&CensorOutcome> {
        self.last.as_ref()
    }

    /// Save the last processed image.
    ///
    /// Without an explicit destination the result goes next to the source as
    /// `<stem>_censored.<ext>`. Returns the path written.
    ///
    /// # Errors
    ///
    /// Fails if there is no processed image, no destination can be derived,
    /// or encoding fails.
    pub fn save(&self, destination: Option<&Path>) -> Result<PathBuf> {
        let processed = self
            .last
            .as_ref()
            .and_then(|o| o.processed.as_ref())
            .ok_or_else(|| Error::InvalidInput("nothing to save; run a preview first".to_string()))?;
        let target = match (destination, self.path()) {
            (Some(dest), _) => dest.to_path_buf(),
            (None, Some(source)) => default_output_path(source),
            (None, None) => {
                return Err(Error::InvalidInput(
                    "an output path is required for in-memory images".to_string(),
                ))
            }
        };
        save_image(processed, &target)?;
        Ok(target)
    }
}
