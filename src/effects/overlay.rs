//! Custom overlay image stretched over a region.

use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};

use crate::blending::{to_channel, unit_interval};
use crate::geometry::PixelRect;

/// Composite `overlay` over `rect`.
///
/// The overlay is resized (bilinear) to exactly the region size. Opacity per
/// pixel is `forced_alpha` when given, otherwise the overlay's own alpha
/// channel normalized to `[0, 1]`.
pub fn apply(image: &mut RgbImage, rect: PixelRect, overlay: &RgbaImage, forced_alpha: Option<f32>) {
    let (width, height) = (rect.width(), rect.height());
    if overlay.width() == 0 || overlay.height() == 0 {
        return;
    }
    let resized;
    let source = if overlay.dimensions() == (width, height) {
        overlay
    } else {
        resized = imageops::resize(overlay, width, height, FilterType::Triangle);
        &resized
    };

    for (dx, dy, src) in source.enumerate_pixels() {
        let a = forced_alpha.map_or_else(|| f32::from(src[3]) / 255.0, unit_interval);
        let px = image.get_pixel_mut(rect.x1 + dx, rect.y1 + dy);
        for ch in 0..3 {
            let value = a * f32::from(src[ch]) + (1.0 - a) * f32::from(px[ch]);
            px[ch] = to_channel(value);
        }
    }
}
