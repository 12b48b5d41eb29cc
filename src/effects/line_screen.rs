//! Black line screen drawn across a region.
//!
//! Strokes are rastered onto a copy of the whole working image so stroke
//! geometry is computed in image coordinates; only the region of that raster
//! is then blended back.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::blending::blend_from;
use crate::effects::LineDirection;
use crate::geometry::PixelRect;

const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Start/end points of the strokes for a region, in image coordinates.
#[must_use]
pub fn stroke_segments(
    rect: PixelRect,
    spacing: u32,
    direction: LineDirection,
) -> Vec<((i64, i64), (i64, i64))> {
    let step = spacing.max(1) as usize;
    let (x1, y1, x2, y2) = (
        i64::from(rect.x1),
        i64::from(rect.y1),
        i64::from(rect.x2),
        i64::from(rect.y2),
    );

    match direction {
        LineDirection::Horizontal => (y1..y2).step_by(step).map(|y| ((x1, y), (x2, y))).collect(),
        LineDirection::Vertical => (x1..x2).step_by(step).map(|x| ((x, y1), (x, y2))).collect(),
        LineDirection::Diagonal => {
            let extent = (x2 - x1).max(y2 - y1);
            (-extent..extent)
                .step_by(step)
                .filter_map(|i| {
                    let start = (x1.max(x1 + i), y1.max(y1 - i));
                    let end = (x2.min(x2 + i), y2.min(y2 - i));
                    (start.0 < end.0 && start.1 < end.1).then_some((start, end))
                })
                .collect()
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Draw one stroke of `thickness` pixels centered on the segment.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn draw_stroke(canvas: &mut RgbImage, start: (i64, i64), end: (i64, i64), thickness: u32) {
    let half = i64::from(thickness / 2);
    let t = i64::from(thickness);

    if start.1 == end.1 {
        let rect = Rect::at(to_i32(start.0), to_i32(start.1 - half))
            .of_size((end.0 - start.0 + 1).max(1) as u32, thickness);
        draw_filled_rect_mut(canvas, rect, INK);
    } else if start.0 == end.0 {
        let rect = Rect::at(to_i32(start.0 - half), to_i32(start.1))
            .of_size(thickness, (end.1 - start.1 + 1).max(1) as u32);
        draw_filled_rect_mut(canvas, rect, INK);
    } else if t < 2 {
        draw_line_segment_mut(
            canvas,
            (start.0 as f32, start.1 as f32),
            (end.0 as f32, end.1 as f32),
            INK,
        );
    } else {
        let (dx, dy) = ((end.0 - start.0) as f32, (end.1 - start.1) as f32);
        let len = (dx * dx + dy * dy).sqrt();
        let (nx, ny) = (-dy / len * t as f32 / 2.0, dx / len * t as f32 / 2.0);
        let corner = |p: (i64, i64), sign: f32| {
            Point::new(
                (p.0 as f32 + sign * nx).round() as i32,
                (p.1 as f32 + sign * ny).round() as i32,
            )
        };
        let poly = [
            corner(start, 1.0),
            corner(end, 1.0),
            corner(end, -1.0),
            corner(start, -1.0),
        ];
        draw_polygon_mut(canvas, &poly, INK);
    }
}

/// Draw the line screen over `rect` and blend it back at `alpha`.
pub fn apply(
    image: &mut RgbImage,
    rect: PixelRect,
    thickness: u32,
    spacing: u32,
    direction: LineDirection,
    alpha: f32,
) {
    if alpha <= 0.0 {
        return;
    }
    let thickness = thickness.max(1);
    let mut raster = image.clone();
    for (start, end) in stroke_segments(rect, spacing, direction) {
        draw_stroke(&mut raster, start, end, thickness);
    }
    blend_from(image, rect, &raster, alpha);
}
