//! Multi-scale anchor (default box) generation.
//!
//! Anchors are laid out level-major, then row-major over each feature map,
//! then in per-cell emission order. The upstream network flattens its output
//! channels the same way, so this order is part of the contract.

use std::f32::consts::SQRT_2;

use ndarray::{Array2, ArrayView2, Axis, aview1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ensure_positive};

/// A reference box in center form, normalized to the input image size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl Anchor {
    #[inline]
    pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self { cx, cy, w, h }
    }

    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.cx, self.cy, self.w, self.h]
    }
}

/// Static description of the detection heads.
///
/// All per-level lists must have one entry per feature map. Sizes and steps
/// are given in input-image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Side of the square model input, in pixels.
    pub image_size: u32,
    /// Grid side of each feature map.
    pub feature_sizes: Vec<usize>,
    /// Anchors emitted per grid cell, either 4 or 6.
    pub anchor_counts: Vec<usize>,
    pub min_sizes: Vec<f32>,
    pub max_sizes: Vec<f32>,
    /// Stride of each feature map in input pixels.
    ///
    /// Descriptive only: centers are placed on the `feature_sizes` grid so
    /// they always stay inside the unit square.
    pub steps: Vec<f32>,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self::ssd300()
    }
}

impl AnchorConfig {
    /// The 300x300, six level layout of the SSD300 model (8732 anchors).
    pub fn ssd300() -> Self {
        Self {
            image_size: 300,
            feature_sizes: vec![38, 19, 10, 5, 3, 1],
            anchor_counts: vec![4, 6, 6, 6, 4, 4],
            min_sizes: vec![30.0, 60.0, 111.0, 162.0, 213.0, 264.0],
            max_sizes: vec![60.0, 111.0, 162.0, 213.0, 264.0, 315.0],
            steps: vec![8.0, 16.0, 32.0, 64.0, 100.0, 300.0],
        }
    }

    /// Number of feature map levels.
    pub fn levels(&self) -> usize {
        self.feature_sizes.len()
    }

    /// Check that the per-level lists agree and every quantity is usable.
    pub fn validate(&self) -> Result<()> {
        let levels = self.levels();
        if levels == 0 {
            return Err(Error::NoLevels);
        }

        let lengths = [
            ("anchor_counts", self.anchor_counts.len()),
            ("min_sizes", self.min_sizes.len()),
            ("max_sizes", self.max_sizes.len()),
            ("steps", self.steps.len()),
        ];
        for (field, got) in lengths {
            if got != levels {
                return Err(Error::LevelCountMismatch {
                    field,
                    expected: levels,
                    got,
                });
            }
        }

        ensure_positive("image_size", f64::from(self.image_size))?;
        for level in 0..levels {
            ensure_positive(
                format!("feature_sizes[{level}]"),
                self.feature_sizes[level] as f64,
            )?;
            ensure_positive(format!("min_sizes[{level}]"), f64::from(self.min_sizes[level]))?;
            ensure_positive(format!("max_sizes[{level}]"), f64::from(self.max_sizes[level]))?;
            ensure_positive(format!("steps[{level}]"), f64::from(self.steps[level]))?;

            let count = self.anchor_counts[level];
            if count != 4 && count != 6 {
                return Err(Error::UnsupportedAnchorCount { level, count });
            }
        }
        Ok(())
    }

    /// Total number of anchors this configuration produces.
    pub fn anchor_total(&self) -> usize {
        self.feature_sizes
            .iter()
            .zip(&self.anchor_counts)
            .map(|(&f, &n)| f * f * n)
            .sum()
    }
}

/// Ordered, immutable set of anchors stored as an (N, 4) array of `[cx, cy, w, h]` rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorSet {
    anchors: Array2<f32>,
}

impl AnchorSet {
    /// Build a set from explicit anchors, keeping their order.
    pub fn from_anchors(anchors: &[Anchor]) -> Self {
        let mut array = Array2::zeros((anchors.len(), 4));
        for (mut row, anchor) in array.rows_mut().into_iter().zip(anchors) {
            row.assign(&aview1(&anchor.to_array()));
        }
        Self { anchors: array }
    }

    /// Wrap an existing (N, 4) array of center-form anchors.
    pub fn from_array(anchors: Array2<f32>) -> Result<Self> {
        if anchors.ncols() != 4 {
            return Err(Error::ShapeMismatch {
                what: "anchor array",
                expected: vec![anchors.nrows(), 4],
                got: anchors.shape().to_vec(),
            });
        }
        Ok(Self { anchors })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.anchors.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Anchor> {
        (index < self.len()).then(|| {
            let row = self.anchors.row(index);
            Anchor::new(row[0], row[1], row[2], row[3])
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Anchor> + '_ {
        self.anchors
            .axis_iter(Axis(0))
            .map(|row| Anchor::new(row[0], row[1], row[2], row[3]))
    }

    /// View of the underlying (N, 4) array.
    #[inline]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.anchors.view()
    }
}

/// Enumerates the anchors of a validated [`AnchorConfig`].
#[derive(Debug, Clone)]
pub struct AnchorGenerator {
    config: AnchorConfig,
}

impl AnchorGenerator {
    /// Validate the configuration up front; a bad configuration never generates.
    pub fn new(config: AnchorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Produce the full anchor set.
    ///
    /// The output is pre-allocated from [`AnchorConfig::anchor_total`] and
    /// written by index. Two calls with the same configuration return
    /// bit-identical sets.
    pub fn generate(&self) -> AnchorSet {
        let cfg = &self.config;
        let image_size = cfg.image_size as f32;
        let total = cfg.anchor_total();
        let mut anchors = Array2::<f32>::zeros((total, 4));
        let sqrt_3 = 3.0_f32.sqrt();

        let mut index = 0;
        let mut emit = |cx: f32, cy: f32, w: f32, h: f32| {
            anchors.row_mut(index).assign(&aview1(&[cx, cy, w, h]));
            index += 1;
        };

        for level in 0..cfg.levels() {
            let f = cfg.feature_sizes[level];
            let fk = f as f32;
            let s_k = cfg.min_sizes[level] / image_size;
            let s_k_prime = (s_k * (cfg.max_sizes[level] / image_size)).sqrt();
            let six = cfg.anchor_counts[level] == 6;

            // i walks rows (y), j walks columns (x).
            for i in 0..f {
                for j in 0..f {
                    let cx = (j as f32 + 0.5) / fk;
                    let cy = (i as f32 + 0.5) / fk;

                    emit(cx, cy, s_k, s_k);
                    emit(cx, cy, s_k_prime, s_k_prime);
                    emit(cx, cy, s_k / SQRT_2, s_k * SQRT_2);
                    emit(cx, cy, s_k * SQRT_2, s_k / SQRT_2);
                    if six {
                        emit(cx, cy, s_k / sqrt_3, s_k * sqrt_3);
                        emit(cx, cy, s_k * sqrt_3, s_k / sqrt_3);
                    }
                }
            }
        }
        debug_assert_eq!(index, total);

        tracing::debug!(
            levels = cfg.levels(),
            anchors = total,
            "generated anchor set"
        );
        AnchorSet { anchors }
    }
}
