//! Reader for line-oriented ground-truth label files.
//!
//! Each non-empty line is `image_path box1 box2 ...` where every box is a
//! comma-joined `xmin,ymin,xmax,ymax,class_id` literal. Images carry a
//! variable number of boxes; [`LabelSet::padded`] fills the remainder with
//! all `-1` sentinel rows so batches can be stacked.

use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, Axis, aview1};

use crate::error::{Error, Result};

/// Value written into every column of a padding row.
pub const PADDING_VALUE: f32 = -1.0;

/// One labelled box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundTruth {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub class_id: i32,
}

impl GroundTruth {
    fn parse(token: &str, line: usize) -> Result<Self> {
        let malformed = || Error::MalformedLabel {
            line,
            token: token.to_string(),
        };

        let fields: Vec<&str> = token.split(',').collect();
        let [xmin, ymin, xmax, ymax, class_id] = fields.as_slice() else {
            return Err(malformed());
        };
        let coord = |s: &str| s.trim().parse::<f32>().map_err(|_| malformed());

        Ok(Self {
            xmin: coord(*xmin)?,
            ymin: coord(*ymin)?,
            xmax: coord(*xmax)?,
            ymax: coord(*ymax)?,
            class_id: class_id.trim().parse().map_err(|_| malformed())?,
        })
    }

    /// The `[xmin, ymin, xmax, ymax, class_id]` row used in padded arrays.
    pub fn to_row(&self) -> [f32; 5] {
        [
            self.xmin,
            self.ymin,
            self.xmax,
            self.ymax,
            self.class_id as f32,
        ]
    }
}

/// An image path with its boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledImage {
    pub path: PathBuf,
    pub boxes: Vec<GroundTruth>,
}

/// All images of a label file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelSet {
    images: Vec<LabeledImage>,
    max_boxes: usize,
}

impl LabelSet {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut images = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            let Some(path) = tokens.next() else {
                continue;
            };
            let boxes = tokens
                .map(|token| GroundTruth::parse(token, index + 1))
                .collect::<Result<Vec<_>>>()?;
            images.push(LabeledImage {
                path: PathBuf::from(path),
                boxes,
            });
        }

        let max_boxes = images.iter().map(|i| i.boxes.len()).max().unwrap_or(0);
        Ok(Self { images, max_boxes })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let labels = Self::parse(&raw)?;
        tracing::debug!(
            path = %path.display(),
            images = labels.len(),
            max_boxes = labels.max_boxes,
            "loaded label file"
        );
        Ok(labels)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[LabeledImage] {
        &self.images
    }

    pub fn get(&self, index: usize) -> Option<&LabeledImage> {
        self.images.get(index)
    }

    /// Largest number of boxes on any image.
    pub fn max_boxes(&self) -> usize {
        self.max_boxes
    }

    /// The boxes of one image as a (max_boxes, 5) array, sentinel-padded.
    pub fn padded(&self, index: usize) -> Result<Array2<f32>> {
        let image = self.images.get(index).ok_or(Error::LabelIndex {
            index,
            len: self.images.len(),
        })?;

        let mut rows = Array2::from_elem((self.max_boxes, 5), PADDING_VALUE);
        for (mut row, gt) in rows.rows_mut().into_iter().zip(&image.boxes) {
            row.assign(&aview1(&gt.to_row()));
        }
        Ok(rows)
    }

    /// Stack several images into a (len, max_boxes, 5) array.
    pub fn padded_batch(&self, indices: &[usize]) -> Result<Array3<f32>> {
        let mut batch = Array3::from_elem((indices.len(), self.max_boxes, 5), PADDING_VALUE);
        for (mut slot, &index) in batch.axis_iter_mut(Axis(0)).zip(indices) {
            slot.assign(&self.padded(index)?);
        }
        Ok(batch)
    }
}
