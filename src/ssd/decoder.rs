//! Decoding of location regressions against the anchor set.

use ndarray::{Array1, Array2, ArrayView2, Zip, aview1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ensure_positive};
use crate::ssd::rect::BoundingBox;

/// Scale factors applied to the raw regression outputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variance {
    /// Applied to the center offsets (dx, dy).
    pub center: f32,
    /// Applied to the log-size offsets (dw, dh).
    pub size: f32,
}

impl Default for Variance {
    fn default() -> Self {
        Self {
            center: 0.1,
            size: 0.2,
        }
    }
}

impl Variance {
    pub fn new(center: f32, size: f32) -> Self {
        Self { center, size }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("variance.center", f64::from(self.center))?;
        ensure_positive("variance.size", f64::from(self.size))
    }
}

/// Turns per-anchor offsets into absolute boxes.
///
/// The decoder is a pure function of its inputs and never clamps the result;
/// boxes reaching past the image edge are returned as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxDecoder {
    variance: Variance,
}

impl BoxDecoder {
    pub fn new(variance: Variance) -> Result<Self> {
        variance.validate()?;
        Ok(Self { variance })
    }

    pub fn variance(&self) -> Variance {
        self.variance
    }

    /// Decode to center form `[cx, cy, w, h]`.
    ///
    /// `anchors` and `loc` are both (N, 4); the whole set is processed with
    /// column-wise array expressions.
    pub fn decode_center_form(
        &self,
        anchors: ArrayView2<'_, f32>,
        loc: ArrayView2<'_, f32>,
    ) -> Result<Array2<f32>> {
        check_shapes(anchors, loc)?;
        let Variance { center, size } = self.variance;

        let aw = anchors.column(2);
        let ah = anchors.column(3);

        let cx = &anchors.column(0) + &(&loc.column(0) * &aw * center);
        let cy = &anchors.column(1) + &(&loc.column(1) * &ah * center);
        let w = (&loc.column(2) * size).mapv(f32::exp) * &aw;
        let h = (&loc.column(3) * size).mapv(f32::exp) * &ah;

        Ok(assemble([cx, cy, w, h]))
    }

    /// Decode to corner form `[xmin, ymin, xmax, ymax]`.
    pub fn decode(
        &self,
        anchors: ArrayView2<'_, f32>,
        loc: ArrayView2<'_, f32>,
    ) -> Result<Array2<f32>> {
        let centers = self.decode_center_form(anchors, loc)?;
        Ok(center_to_corners(centers.view()))
    }
}

fn check_shapes(anchors: ArrayView2<'_, f32>, loc: ArrayView2<'_, f32>) -> Result<()> {
    if anchors.ncols() != 4 {
        return Err(Error::ShapeMismatch {
            what: "anchors",
            expected: vec![anchors.nrows(), 4],
            got: anchors.shape().to_vec(),
        });
    }
    if loc.dim() != anchors.dim() {
        return Err(Error::ShapeMismatch {
            what: "location predictions",
            expected: vec![anchors.nrows(), 4],
            got: loc.shape().to_vec(),
        });
    }
    Ok(())
}

fn assemble(columns: [Array1<f32>; 4]) -> Array2<f32> {
    let n = columns[0].len();
    let mut out = Array2::zeros((n, 4));
    for (i, column) in columns.iter().enumerate() {
        out.column_mut(i).assign(column);
    }
    out
}

/// Convert (N, 4) center-form boxes to corner form.
///
/// `xmax` is derived as `xmin + w` so width survives the conversion.
pub fn center_to_corners(boxes: ArrayView2<'_, f32>) -> Array2<f32> {
    let xmin = &boxes.column(0) - &(&boxes.column(2) / 2.0);
    let ymin = &boxes.column(1) - &(&boxes.column(3) / 2.0);
    let xmax = &xmin + &boxes.column(2);
    let ymax = &ymin + &boxes.column(3);
    assemble([xmin, ymin, xmax, ymax])
}

/// Clamp (N, 4) corner-form boxes into the unit square in place.
///
/// This is an optional step after decoding; NaN coordinates stay NaN.
pub fn clip_to_unit(boxes: &mut Array2<f32>) {
    for mut row in boxes.rows_mut() {
        let clipped = BoundingBox::from_row(row.view()).clipped();
        row.assign(&aview1(&clipped.to_array()));
    }
}

/// Number of decoded rows carrying a NaN or infinite coordinate.
pub(crate) fn count_non_finite(boxes: ArrayView2<'_, f32>) -> usize {
    let mut count = 0;
    Zip::from(boxes.rows()).for_each(|row| {
        if row.iter().any(|v| !v.is_finite()) {
            count += 1;
        }
    });
    count
}
