//! Radial light glow, strongest at the region center.

use image::{Rgb, RgbImage};

use crate::blending::{to_channel, unit_interval};
use crate::geometry::PixelRect;

/// Smallest `max_distance` used for the falloff, so 1x1 regions stay finite.
const MIN_MAX_DISTANCE: f32 = 1e-6;

/// Exponent applied to the raw radial mask for a feather percentage.
#[must_use]
pub fn feather_exponent(feather_percent: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let feather = feather_percent as f32 / 100.0;
    1.0 / (feather + 0.1)
}

/// Feathered radial mask for a `width x height` region, row-major.
///
/// The center is `(width / 2, height / 2)` using integer halves, so for even
/// dimensions the pixel at the center has mask value 1.
#[must_use]
pub fn radial_mask(width: u32, height: u32, feather_percent: u32) -> Vec<f32> {
    #[allow(clippy::cast_precision_loss)]
    let (cx, cy) = ((width / 2) as f32, (height / 2) as f32);
    let max_distance = (cx * cx + cy * cy).sqrt().max(MIN_MAX_DISTANCE);
    let exponent = feather_exponent(feather_percent);

    let mut mask = vec![0.0_f32; width as usize * height as usize];
    if mask.is_empty() {
        return mask;
    }

    let fill_row = |y: usize, row: &mut [f32]| {
        for (x, m) in row.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let distance = (dx * dx + dy * dy).sqrt();
            let raw = (1.0 - distance / max_distance).clamp(0.0, 1.0);
            *m = raw.powf(exponent);
        }
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        mask.par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| fill_row(y, row));
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (y, row) in mask.chunks_mut(width as usize).enumerate() {
            fill_row(y, row);
        }
    }

    mask
}

/// Paint a glow of `color` over `rect`.
pub fn apply(
    image: &mut RgbImage,
    rect: PixelRect,
    intensity: f32,
    feather_percent: u32,
    color: Rgb<u8>,
) {
    let intensity = unit_interval(intensity);
    if intensity <= 0.0 {
        return;
    }
    let width = rect.width();
    let mask = radial_mask(width, rect.height(), feather_percent);

    for (i, m) in mask.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let (dx, dy) = ((i % width as usize) as u32, (i / width as usize) as u32);
        let weight = m * intensity;
        let px = image.get_pixel_mut(rect.x1 + dx, rect.y1 + dy);
        for ch in 0..3 {
            let value = f32::from(px[ch]) * (1.0 - weight) + f32::from(color[ch]) * weight;
            px[ch] = to_channel(value);
        }
    }
}
