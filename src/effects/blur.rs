//! Separable Gaussian blur over a region.

use image::RgbImage;
use imageproc::filter::separable_filter;

use crate::blending::{blend_layer, extract_region};
use crate::geometry::PixelRect;

/// Round an even kernel size up to the next odd value; zero becomes 1.
#[must_use]
pub fn odd_kernel(size: u32) -> u32 {
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Standard deviation implied by a kernel size, as in the usual
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8` convention.
#[must_use]
pub fn sigma_for(kernel: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let k = kernel as f32;
    0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian weights of odd length `size`.
#[must_use]
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = odd_kernel(size);
    if size == 1 {
        return vec![1.0];
    }
    let sigma = sigma_for(size);
    let half = (size / 2) as usize;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (0..size as usize)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let d = i as f32 - half as f32;
            (-d * d / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Gaussian-blur a whole buffer with a `kernel = (width, height)` kernel.
///
/// Kernel sides are capped at the buffer's longer side. Samples past the
/// border repeat the edge pixel, so blurring an extracted region never reads
/// pixels outside it.
#[must_use]
pub fn gaussian_blur(region: &RgbImage, kernel: (u32, u32)) -> RgbImage {
    let (width, height) = region.dimensions();
    if width == 0 || height == 0 {
        return region.clone();
    }
    let longest = width.max(height);
    let kx = gaussian_kernel(kernel.0.min(longest));
    let ky = gaussian_kernel(kernel.1.min(longest));
    separable_filter(region, &kx, &ky)
}

/// Blur `rect` of `image` and blend the result back at `alpha`.
pub fn apply(image: &mut RgbImage, rect: PixelRect, kernel: (u32, u32), alpha: f32) {
    if alpha <= 0.0 {
        return;
    }
    let region = extract_region(image, rect);
    let blurred = gaussian_blur(&region, kernel);
    blend_layer(image, rect, &blurred, alpha);
}
