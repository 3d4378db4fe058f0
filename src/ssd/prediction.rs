//! Raw network outputs for a batch of images.

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

use crate::error::{Error, Result};

/// Location regressions and class confidences for a batch.
///
/// `loc` has shape (batch, anchors, 4) and `conf` has shape
/// (batch, anchors, class_num). Confidences are expected to be probabilities
/// but are only ever thresholded, never checked.
#[derive(Debug, Clone)]
pub struct RawPredictions {
    loc: Array3<f32>,
    conf: Array3<f32>,
}

impl RawPredictions {
    /// Pair location and confidence arrays, checking that they agree on the
    /// batch and anchor dimensions.
    pub fn new(loc: Array3<f32>, conf: Array3<f32>) -> Result<Self> {
        let (batch, anchors, coords) = loc.dim();
        if coords != 4 {
            return Err(Error::ShapeMismatch {
                what: "location predictions",
                expected: vec![batch, anchors, 4],
                got: loc.shape().to_vec(),
            });
        }
        let (conf_batch, conf_anchors, class_num) = conf.dim();
        if conf_batch != batch || conf_anchors != anchors {
            return Err(Error::ShapeMismatch {
                what: "confidence predictions",
                expected: vec![batch, anchors, class_num],
                got: conf.shape().to_vec(),
            });
        }
        Ok(Self { loc, conf })
    }

    pub fn batch_size(&self) -> usize {
        self.loc.len_of(Axis(0))
    }

    pub fn anchor_count(&self) -> usize {
        self.loc.len_of(Axis(1))
    }

    pub fn class_num(&self) -> usize {
        self.conf.len_of(Axis(2))
    }

    pub fn loc(&self) -> ArrayView3<'_, f32> {
        self.loc.view()
    }

    pub fn conf(&self) -> ArrayView3<'_, f32> {
        self.conf.view()
    }

    /// One image's (loc, conf) pair.
    pub fn image(&self, index: usize) -> (ArrayView2<'_, f32>, ArrayView2<'_, f32>) {
        (
            self.loc.index_axis(Axis(0), index),
            self.conf.index_axis(Axis(0), index),
        )
    }

    /// Replace raw class logits by their per-anchor softmax.
    ///
    /// Use this when the network emits logits instead of probabilities.
    /// A lane whose logits are all `-inf` becomes all zeros, and `+inf`
    /// logits split the whole mass evenly between them.
    pub fn with_softmax(mut self) -> Self {
        for mut logits in self.conf.lanes_mut(Axis(2)) {
            let max = logits.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
            if max == f32::NEG_INFINITY {
                logits.fill(0.0);
                continue;
            }
            if max == f32::INFINITY {
                let count = logits.iter().filter(|&&v| v == f32::INFINITY).count() as f32;
                logits.mapv_inplace(|v| if v == f32::INFINITY { 1.0 / count } else { 0.0 });
                continue;
            }
            logits.mapv_inplace(|v| (v - max).exp());
            let sum = logits.sum();
            logits.mapv_inplace(|v| v / sum);
        }
        self
    }

    pub fn into_parts(self) -> (Array3<f32>, Array3<f32>) {
        (self.loc, self.conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    #[test]
    fn test_shapes() {
        let preds = RawPredictions::new(Array3::zeros((2, 10, 4)), Array3::zeros((2, 10, 3))).unwrap();
        assert_eq!(preds.batch_size(), 2);
        assert_eq!(preds.anchor_count(), 10);
        assert_eq!(preds.class_num(), 3);

        let (loc, conf) = preds.image(1);
        assert_eq!(loc.dim(), (10, 4));
        assert_eq!(conf.dim(), (10, 3));
    }

    #[test]
    fn test_mismatched_shapes() {
        let err = RawPredictions::new(Array3::zeros((1, 10, 5)), Array3::zeros((1, 10, 3))).unwrap_err();
        assert!(err.is_precondition());

        let err = RawPredictions::new(Array3::zeros((1, 10, 4)), Array3::zeros((1, 9, 3))).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_softmax() {
        let mut conf = Array3::zeros((1, 2, 3));
        conf[[0, 0, 1]] = 2.0;
        conf[[0, 1, 2]] = 1000.0;
        let preds = RawPredictions::new(Array3::zeros((1, 2, 4)), conf)
            .unwrap()
            .with_softmax();

        for row in preds.conf().lanes(Axis(2)) {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
        let conf = preds.conf();
        assert!(conf[[0, 0, 1]] > conf[[0, 0, 0]]);
        assert!((conf[[0, 1, 2]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_infinite_logits() {
        let mut conf = Array3::from_elem((1, 2, 3), f32::NEG_INFINITY);
        conf[[0, 1, 0]] = f32::INFINITY;
        conf[[0, 1, 2]] = f32::INFINITY;
        let preds = RawPredictions::new(Array3::zeros((1, 2, 4)), conf)
            .unwrap()
            .with_softmax();

        let conf = preds.conf();
        assert!(conf.iter().all(|v| !v.is_nan()));
        assert!(conf.slice(s![0, 0, ..]).iter().all(|&v| v == 0.0));
        assert_eq!(conf[[0, 1, 0]], 0.5);
        assert_eq!(conf[[0, 1, 1]], 0.0);
        assert_eq!(conf[[0, 1, 2]], 0.5);
    }
}
