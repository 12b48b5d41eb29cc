//! Alpha blending math shared by the censor effects.
//!
//! Every effect ends with the same forward blend of generated content over the
//! untouched pixels:
//! `output = original * (1 - alpha) + layer * alpha`
//!
//! Values are computed in `f32`, rounded to the nearest integer and clamped to
//! the 8-bit channel range.

use image::{Rgb, RgbImage};

use crate::geometry::PixelRect;

/// Blend one channel value. `alpha` is expected in `[0, 1]`.
#[must_use]
pub fn mix(original: u8, layer: u8, alpha: f32) -> u8 {
    to_channel(f32::from(original) * (1.0 - alpha) + f32::from(layer) * alpha)
}

/// Clamp a blend factor to `[0, 1]`, treating NaN as 0.
#[must_use]
pub fn unit_interval(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Round and clamp a floating point channel value back to `u8`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Copy the `rect` area out of `image` into a new buffer.
#[must_use]
pub fn extract_region(image: &RgbImage, rect: PixelRect) -> RgbImage {
    RgbImage::from_fn(rect.width(), rect.height(), |x, y| {
        *image.get_pixel(rect.x1 + x, rect.y1 + y)
    })
}

/// Blend a region-sized `layer` over the `rect` area of `image` in-place.
///
/// `alpha >= 1` replaces the area outright; `alpha <= 0` leaves it untouched.
pub fn blend_layer(image: &mut RgbImage, rect: PixelRect, layer: &RgbImage, alpha: f32) {
    debug_assert_eq!(layer.dimensions(), (rect.width(), rect.height()));
    let alpha = unit_interval(alpha);
    if alpha <= 0.0 {
        return;
    }
    for (dx, dy, src) in layer.enumerate_pixels() {
        let px = image.get_pixel_mut(rect.x1 + dx, rect.y1 + dy);
        if alpha >= 1.0 {
            *px = *src;
        } else {
            for ch in 0..3 {
                px[ch] = mix(px[ch], src[ch], alpha);
            }
        }
    }
}

/// Blend the `rect` area of `layer` (same size as `image`) over `image`.
pub fn blend_from(image: &mut RgbImage, rect: PixelRect, layer: &RgbImage, alpha: f32) {
    debug_assert_eq!(layer.dimensions(), image.dimensions());
    let alpha = unit_interval(alpha);
    if alpha <= 0.0 {
        return;
    }
    for y in rect.y1..rect.y2 {
        for x in rect.x1..rect.x2 {
            let src = layer.get_pixel(x, y);
            let px = image.get_pixel_mut(x, y);
            if alpha >= 1.0 {
                *px = *src;
            } else {
                for ch in 0..3 {
                    px[ch] = mix(px[ch], src[ch], alpha);
                }
            }
        }
    }
}

/// Blend a flat color over the `rect` area of `image` in-place.
pub fn blend_color(image: &mut RgbImage, rect: PixelRect, color: Rgb<u8>, alpha: f32) {
    let alpha = unit_interval(alpha);
    if alpha <= 0.0 {
        return;
    }
    for y in rect.y1..rect.y2 {
        for x in rect.x1..rect.x2 {
            let px = image.get_pixel_mut(x, y);
            for ch in 0..3 {
                px[ch] = mix(px[ch], color[ch], alpha);
            }
        }
    }
}
