//! Batch detector: decode, threshold, suppress, and pack into a fixed-shape tensor.

use std::sync::Arc;

use ndarray::{Array4, ArrayView2, ArrayViewMut2, ArrayViewMut3, Axis, aview1, s};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ensure_unit_threshold};
use crate::ssd::anchor::{AnchorGenerator, AnchorSet};
use crate::ssd::decoder::{self, BoxDecoder};
use crate::ssd::nms::nms;
use crate::ssd::prediction::RawPredictions;
use crate::ssd::rect::BoundingBox;

/// Width of one output row: `[score, xmin, ymin, xmax, ymax]`.
pub const DETECTION_WIDTH: usize = 5;

/// Thresholds and output sizing for the [`Detector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Number of classes including background at index 0.
    pub class_num: usize,
    /// Candidates must score strictly above this value.
    pub score_threshold: f32,
    /// IoU above which a lower-scoring candidate is suppressed.
    pub iou_threshold: f32,
    /// Maximum detections kept per (image, class).
    pub top_k: usize,
    /// Clamp decoded boxes into the unit square before suppression.
    pub clip_boxes: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            class_num: 81,
            score_threshold: 0.5,
            iou_threshold: 0.45,
            top_k: 200,
            clip_boxes: false,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.class_num <= 1 {
            return Err(Error::TooFewClasses(self.class_num));
        }
        ensure_unit_threshold("score_threshold", self.score_threshold)?;
        ensure_unit_threshold("iou_threshold", self.iou_threshold)?;
        if self.top_k == 0 {
            return Err(Error::ZeroTopK);
        }
        Ok(())
    }
}

/// A single detection read back out of a [`DetectionBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Confidence of `class_id`
    pub score: f32,
    /// Bounding box in normalized corner form
    pub bbox: BoundingBox,
    /// Foreground class index, never 0
    pub class_id: usize,
}

impl Detection {
    pub fn new(score: f32, bbox: BoundingBox, class_id: usize) -> Self {
        Self {
            score,
            bbox,
            class_id,
        }
    }
}

/// Fixed-shape detector output of shape (batch, class_num, top_k, 5).
///
/// Each row is `[score, xmin, ymin, xmax, ymax]`. Rows past the real
/// detection count of a slot are all zero, and the background slot
/// (class 0) is always empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionBatch {
    data: Array4<f32>,
}

impl DetectionBatch {
    fn zeros(batch: usize, class_num: usize, top_k: usize) -> Self {
        Self {
            data: Array4::zeros((batch, class_num, top_k, DETECTION_WIDTH)),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn class_num(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn top_k(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// The (top_k, 5) block for one image and class.
    ///
    /// # Panics
    ///
    /// Panics if `image >= batch_size()` or `class_id >= class_num()`.
    pub fn slot(&self, image: usize, class_id: usize) -> ArrayView2<'_, f32> {
        self.data.slice(s![image, class_id, .., ..])
    }

    /// All non-empty rows of one image, ordered by class, then by rank.
    ///
    /// # Panics
    ///
    /// Panics if `image >= batch_size()`.
    pub fn detections(&self, image: usize) -> Vec<Detection> {
        let mut out = Vec::new();
        for (class_id, slot) in self.data.index_axis(Axis(0), image).outer_iter().enumerate() {
            for row in slot.rows() {
                if row[0].is_nan() || row[0] <= 0.0 {
                    break;
                }
                let bbox = BoundingBox::new(row[1], row[2], row[3], row[4]);
                out.push(Detection::new(row[0], bbox, class_id));
            }
        }
        out
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// SSD post-processor over a cached anchor set.
///
/// A detector is immutable after construction and can be shared between
/// threads; each call only touches its own input and output.
#[derive(Debug, Clone)]
pub struct Detector {
    anchors: Arc<AnchorSet>,
    decoder: BoxDecoder,
    config: DetectorConfig,
}

impl Detector {
    /// Generate anchors from `generator` and build a detector around them.
    pub fn new(generator: &AnchorGenerator, decoder: BoxDecoder, config: DetectorConfig) -> Result<Self> {
        Self::with_anchors(Arc::new(generator.generate()), decoder, config)
    }

    /// Build a detector around an existing anchor set.
    pub fn with_anchors(
        anchors: Arc<AnchorSet>,
        decoder: BoxDecoder,
        config: DetectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            anchors,
            decoder,
            config,
        })
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run the full post-processing over a batch.
    ///
    /// Every shape is checked before work starts, so a bad batch fails as a
    /// whole and never yields partial output. Images are processed in
    /// parallel, and within an image each foreground class is too.
    pub fn detect(&self, predictions: &RawPredictions) -> Result<DetectionBatch> {
        self.check_predictions(predictions)?;

        let batch = predictions.batch_size();
        tracing::debug!(
            batch,
            classes = self.config.class_num,
            anchors = self.anchors.len(),
            "running detector"
        );

        let loc = predictions.loc();
        let conf = predictions.conf();
        let mut output = DetectionBatch::zeros(batch, self.config.class_num, self.config.top_k);
        output
            .data
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(loc.axis_iter(Axis(0)).into_par_iter())
            .zip(conf.axis_iter(Axis(0)).into_par_iter())
            .try_for_each(|((slots, loc), conf)| self.fill_image(slots, loc, conf))?;

        Ok(output)
    }

    /// Post-process a single image.
    ///
    /// `loc` is (anchors, 4) and `conf` is (anchors, class_num). The result
    /// has shape (1, class_num, top_k, 5).
    pub fn detect_image(
        &self,
        loc: ArrayView2<'_, f32>,
        conf: ArrayView2<'_, f32>,
    ) -> Result<DetectionBatch> {
        self.check_image(loc, conf)?;
        let mut output = DetectionBatch::zeros(1, self.config.class_num, self.config.top_k);
        self.fill_image(output.data.index_axis_mut(Axis(0), 0), loc, conf)?;
        Ok(output)
    }

    fn check_predictions(&self, predictions: &RawPredictions) -> Result<()> {
        let expected = self.anchors.len();
        if predictions.anchor_count() != expected {
            return Err(Error::ShapeMismatch {
                what: "location predictions",
                expected: vec![predictions.batch_size(), expected, 4],
                got: predictions.loc().shape().to_vec(),
            });
        }
        if predictions.class_num() != self.config.class_num {
            return Err(Error::ShapeMismatch {
                what: "confidence predictions",
                expected: vec![predictions.batch_size(), expected, self.config.class_num],
                got: predictions.conf().shape().to_vec(),
            });
        }
        Ok(())
    }

    fn check_image(&self, loc: ArrayView2<'_, f32>, conf: ArrayView2<'_, f32>) -> Result<()> {
        let expected = self.anchors.len();
        if loc.dim() != (expected, 4) {
            return Err(Error::ShapeMismatch {
                what: "location predictions",
                expected: vec![expected, 4],
                got: loc.shape().to_vec(),
            });
        }
        if conf.dim() != (expected, self.config.class_num) {
            return Err(Error::ShapeMismatch {
                what: "confidence predictions",
                expected: vec![expected, self.config.class_num],
                got: conf.shape().to_vec(),
            });
        }
        Ok(())
    }

    fn fill_image(
        &self,
        mut slots: ArrayViewMut3<'_, f32>,
        loc: ArrayView2<'_, f32>,
        conf: ArrayView2<'_, f32>,
    ) -> Result<()> {
        let mut boxes = self.decoder.decode(self.anchors.view(), loc)?;
        if self.config.clip_boxes {
            decoder::clip_to_unit(&mut boxes);
        }

        let non_finite = decoder::count_non_finite(boxes.view());
        if non_finite > 0 {
            tracing::warn!(non_finite, "decoded boxes contain NaN or infinite coordinates");
        }

        let boxes = boxes.view();
        slots
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .skip(1)
            .try_for_each(|(class_id, slot)| self.fill_class(slot, boxes, conf, class_id))
    }

    fn fill_class(
        &self,
        mut slot: ArrayViewMut2<'_, f32>,
        boxes: ArrayView2<'_, f32>,
        conf: ArrayView2<'_, f32>,
        class_id: usize,
    ) -> Result<()> {
        let scores = conf.column(class_id);
        let threshold = self.config.score_threshold;
        let candidates: Vec<usize> = scores
            .indexed_iter()
            .filter(|&(_, &score)| score > threshold)
            .map(|(i, _)| i)
            .collect();

        tracing::trace!(class_id, candidates = candidates.len(), "class candidates");
        if candidates.is_empty() {
            return Ok(());
        }

        let candidate_boxes = boxes.select(Axis(0), &candidates);
        let candidate_scores = scores.select(Axis(0), &candidates);
        let keep = nms(
            candidate_boxes.view(),
            candidate_scores.view(),
            self.config.iou_threshold,
            self.config.top_k,
        )?;

        for (rank, &k) in keep.iter().enumerate() {
            let mut row = slot.row_mut(rank);
            row[0] = candidate_scores[k];
            row.slice_mut(s![1..]).assign(&aview1(&[
                candidate_boxes[[k, 0]],
                candidate_boxes[[k, 1]],
                candidate_boxes[[k, 2]],
                candidate_boxes[[k, 3]],
            ]));
        }
        Ok(())
    }
}
