//! Bounding box geometry: scaling about the center and clamping to the image.

/// Axis-aligned box in image pixel coordinates, as reported by a detector.
///
/// Corner order is not guaranteed; see [`BoundingBox::normalized`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge (exclusive once converted to pixels).
    pub x2: f32,
    /// Bottom edge (exclusive once converted to pixels).
    pub y2: f32,
}

impl BoundingBox {
    /// Create a box from its corner coordinates.
    #[must_use]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Width of the box (negative when corners are swapped).
    #[must_use]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Height of the box (negative when corners are swapped).
    #[must_use]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Area, zero for degenerate boxes.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over union with another box.
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let a = self.normalized();
        let b = other.normalized();
        let w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
        let h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
        let intersection = w * h;
        if intersection <= 0.0 {
            return 0.0;
        }
        let union = a.area() + b.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Returns the box with its corners ordered so that `x1 <= x2` and `y1 <= y2`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    /// Normalize the box, floor its leading edges at zero and cap its trailing
    /// edges at the image size. The result is empty for boxes fully outside.
    #[must_use]
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (width as f32, height as f32);
        let b = self.normalized();
        Self {
            x1: b.x1.max(0.0),
            y1: b.y1.max(0.0),
            x2: b.x2.min(w),
            y2: b.y2.min(h),
        }
    }

    /// Convert to integer pixel bounds by truncating each coordinate.
    ///
    /// Returns `None` when the resulting rectangle has no pixels.
    #[must_use]
    pub fn to_pixel_rect(&self) -> Option<PixelRect> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let trunc = |v: f32| v.max(0.0) as u32;
        let (x1, y1, x2, y2) = (trunc(self.x1), trunc(self.y1), trunc(self.x2), trunc(self.y2));
        if x1 >= x2 || y1 >= y2 {
            return None;
        }
        Some(PixelRect { x1, y1, x2, y2 })
    }
}

/// Non-empty, half-open pixel rectangle `[x1, x2) x [y1, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    /// First column.
    pub x1: u32,
    /// First row.
    pub y1: u32,
    /// One past the last column.
    pub x2: u32,
    /// One past the last row.
    pub y2: u32,
}

impl PixelRect {
    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Scale `bbox` about its own center by `scale` and clamp it to the image.
///
/// Never fails. The result may be empty (for example when the box lies fully
/// outside the image); callers check with [`BoundingBox::to_pixel_rect`].
/// A non-positive or non-finite scale, or a box with non-finite corners,
/// yields an empty box.
#[must_use]
pub fn adjust_box(bbox: &BoundingBox, scale: f32, image_size: (u32, u32)) -> BoundingBox {
    let finite = [bbox.x1, bbox.y1, bbox.x2, bbox.y2]
        .iter()
        .all(|v| v.is_finite());
    if !finite || !scale.is_finite() || scale <= 0.0 {
        return BoundingBox::new(0.0, 0.0, 0.0, 0.0);
    }
    let b = bbox.normalized();
    let cx = (b.x1 + b.x2) / 2.0;
    let cy = (b.y1 + b.y2) / 2.0;
    let half_w = b.width() * scale / 2.0;
    let half_h = b.height() * scale / 2.0;

    #[allow(clippy::cast_precision_loss)]
    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
    BoundingBox {
        x1: (cx - half_w).max(0.0),
        y1: (cy - half_h).max(0.0),
        x2: (cx + half_w).min(img_w),
        y2: (cy + half_h).min(img_h),
    }
}

/// Adjust a detector box and convert it to a pixel rectangle in one step.
#[must_use]
pub fn region_for(bbox: &BoundingBox, scale: f32, image_size: (u32, u32)) -> Option<PixelRect> {
    adjust_box(bbox, scale, image_size).to_pixel_rect()
}
