use ndarray::{Array2, ArrayView1, ArrayView2};

/// Axis-aligned bounding box in corner form.
///
/// Coordinates live in the same normalized space as the anchors, so a box
/// covering the whole input image is `(0, 0, 1, 1)`. Nothing here clamps to
/// that range; see [`BoundingBox::clipped`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    /// Left edge
    pub xmin: f32,
    /// Top edge
    pub ymin: f32,
    /// Right edge
    pub xmax: f32,
    /// Bottom edge
    pub ymax: f32,
}

impl BoundingBox {
    /// Create a box from its corners (xmin, ymin, xmax, ymax).
    #[inline]
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Read a box from a `[xmin, ymin, xmax, ymax]` row.
    #[inline]
    pub fn from_row(row: ArrayView1<'_, f32>) -> Self {
        Self::new(row[0], row[1], row[2], row[3])
    }

    /// Convert to `[xmin, ymin, xmax, ymax]`.
    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    /// Width, never negative.
    #[inline]
    pub fn width(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0)
    }

    /// Height, never negative.
    #[inline]
    pub fn height(&self) -> f32 {
        (self.ymax - self.ymin).max(0.0)
    }

    /// Area of the box. Degenerate boxes have zero area.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Calculate Intersection over Union (IoU) with another bounding box.
    ///
    /// Returns 0 when either box has a non-finite coordinate or the union is
    /// empty, so a NaN box never overlaps anything.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        // f32::max/min drop NaN operands, which would fake an overlap.
        if !self.is_finite() || !other.is_finite() {
            return 0.0;
        }

        let x1 = self.xmin.max(other.xmin);
        let y1 = self.ymin.max(other.ymin);
        let x2 = self.xmax.min(other.xmax);
        let y2 = self.ymax.min(other.ymax);

        let inter_width = (x2 - x1).max(0.0);
        let inter_height = (y2 - y1).max(0.0);
        let inter_area = inter_width * inter_height;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 && union_area.is_finite() {
            inter_area / union_area
        } else {
            0.0
        }
    }

    /// Clamp every corner into the unit square.
    pub fn clipped(&self) -> Self {
        Self {
            xmin: self.xmin.clamp(0.0, 1.0),
            ymin: self.ymin.clamp(0.0, 1.0),
            xmax: self.xmax.clamp(0.0, 1.0),
            ymax: self.ymax.clamp(0.0, 1.0),
        }
    }

    /// Whether every coordinate is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Calculate the IoU matrix between two sets of corner-form boxes.
///
/// Both inputs have shape (N, 4). Returns a matrix of shape (M, N) where M is
/// the row count of `boxes_a` and N the row count of `boxes_b`.
pub fn iou_matrix(boxes_a: ArrayView2<'_, f32>, boxes_b: ArrayView2<'_, f32>) -> Array2<f32> {
    let a: Vec<BoundingBox> = boxes_a.rows().into_iter().map(BoundingBox::from_row).collect();
    let b: Vec<BoundingBox> = boxes_b.rows().into_iter().map(BoundingBox::from_row).collect();

    let mut ious = Array2::zeros((a.len(), b.len()));
    for (i, box_a) in a.iter().enumerate() {
        for (j, box_b) in b.iter().enumerate() {
            ious[[i, j]] = box_a.iou(box_b);
        }
    }
    ious
}
