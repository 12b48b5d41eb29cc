//! The five censor effects and their configuration.
//!
//! Every effect works on the canonical RGB working buffer and only writes
//! inside the pixel rectangle it is given.

pub mod blur;
pub mod light;
pub mod line_screen;
pub mod mist;
pub mod overlay;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::{Rgb, RgbImage, RgbaImage};

use crate::blending::unit_interval;
use crate::geometry::PixelRect;

/// Direction of the strokes drawn by [`Effect::LineScreen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineDirection {
    /// Rows of horizontal strokes.
    #[default]
    Horizontal,
    /// Columns of vertical strokes.
    Vertical,
    /// 45 degree hatching.
    Diagonal,
}

impl fmt::Display for LineDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LineDirection::Horizontal => "horizontal",
            LineDirection::Vertical => "vertical",
            LineDirection::Diagonal => "diagonal",
        })
    }
}

impl FromStr for LineDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "h" => Ok(LineDirection::Horizontal),
            "vertical" | "v" => Ok(LineDirection::Vertical),
            "diagonal" | "d" => Ok(LineDirection::Diagonal),
            other => Err(format!(
                "unknown line direction '{other}' (expected horizontal, vertical or diagonal)"
            )),
        }
    }
}

/// A censor effect together with its own parameters.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Gaussian blur with the given kernel size (forced odd).
    Blur {
        /// Kernel width in pixels.
        kernel_width: u32,
        /// Kernel height in pixels.
        kernel_height: u32,
    },
    /// Opaque black line screen.
    LineScreen {
        /// Stroke thickness in pixels.
        thickness: u32,
        /// Distance between consecutive strokes in pixels.
        spacing: u32,
        /// Stroke orientation.
        direction: LineDirection,
    },
    /// Flat color mist.
    Mist {
        /// Mist color.
        color: Rgb<u8>,
    },
    /// Radial glow, brightest at the region center.
    Light {
        /// Peak strength of the glow in `[0, 1]`.
        intensity: f32,
        /// Softness of the falloff; larger values flatten it.
        feather_percent: u32,
        /// Glow color.
        color: Rgb<u8>,
    },
    /// Custom image stretched over the region.
    Overlay {
        /// Overlay pixels; opacity comes from the alpha channel unless forced.
        image: Arc<RgbaImage>,
    },
}

impl Effect {
    /// Default blur: a 31x31 kernel.
    #[must_use]
    pub fn blur() -> Self {
        Effect::Blur {
            kernel_width: 31,
            kernel_height: 31,
        }
    }

    /// Default line screen: 5px strokes every 10px, horizontal.
    #[must_use]
    pub fn line_screen() -> Self {
        Effect::LineScreen {
            thickness: 5,
            spacing: 10,
            direction: LineDirection::Horizontal,
        }
    }

    /// Default mist: white.
    #[must_use]
    pub fn mist() -> Self {
        Effect::Mist {
            color: Rgb([255, 255, 255]),
        }
    }

    /// Default light: white glow at 0.8 intensity with 30% feathering.
    #[must_use]
    pub fn light() -> Self {
        Effect::Light {
            intensity: 0.8,
            feather_percent: 30,
            color: Rgb([255, 255, 255]),
        }
    }

    /// Overlay effect from an RGBA image.
    #[must_use]
    pub fn overlay(image: RgbaImage) -> Self {
        Effect::Overlay {
            image: Arc::new(image),
        }
    }

    /// Short lowercase name, used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Blur { .. } => "blur",
            Effect::LineScreen { .. } => "lines",
            Effect::Mist { .. } => "mist",
            Effect::Light { .. } => "light",
            Effect::Overlay { .. } => "overlay",
        }
    }
}

/// Effect plus the parameters shared by all effects.
#[derive(Debug, Clone)]
pub struct EffectConfig {
    /// What to paint over each region.
    pub effect: Effect,
    /// Region size multiplier applied about the box center before painting.
    pub scale: f32,
    /// Blend strength against the untouched pixels.
    ///
    /// `None` means full strength for Blur, `LineScreen` and Mist. Light uses
    /// its own `intensity` and ignores this. For Overlay, `Some(a)` forces a
    /// uniform opacity and `None` uses the overlay's alpha channel.
    pub alpha: Option<f32>,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self::new(Effect::blur())
    }
}

impl EffectConfig {
    /// Config for `effect` with unit scale and no explicit alpha.
    #[must_use]
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            scale: 1.0,
            alpha: None,
        }
    }

    /// Set the region scale.
    #[must_use]
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Set the blend alpha.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = Some(alpha);
        self
    }

    /// Blend strength for effects that treat `alpha` as a plain blend factor.
    #[must_use]
    pub fn blend_alpha(&self) -> f32 {
        self.alpha.map_or(1.0, unit_interval)
    }
}

/// Paint the configured effect over `rect` of the working buffer.
pub fn apply(image: &mut RgbImage, rect: PixelRect, config: &EffectConfig) {
    let alpha = config.blend_alpha();
    match &config.effect {
        Effect::Blur {
            kernel_width,
            kernel_height,
        } => blur::apply(image, rect, (*kernel_width, *kernel_height), alpha),
        Effect::LineScreen {
            thickness,
            spacing,
            direction,
        } => line_screen::apply(image, rect, *thickness, *spacing, *direction, alpha),
        Effect::Mist { color } => mist::apply(image, rect, *color, alpha),
        Effect::Light {
            intensity,
            feather_percent,
            color,
        } => light::apply(image, rect, *intensity, *feather_percent, *color),
        Effect::Overlay { image: overlay } => {
            overlay::apply(image, rect, overlay, config.alpha.map(unit_interval));
        }
    }
}
