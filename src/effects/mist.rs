//! Flat color mist.

use image::{Rgb, RgbImage};

use crate::blending::blend_color;
use crate::geometry::PixelRect;

/// Blend `color` over `rect` at `strength`.
pub fn apply(image: &mut RgbImage, rect: PixelRect, color: Rgb<u8>, strength: f32) {
    blend_color(image, rect, color, strength);
}
