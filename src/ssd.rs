mod anchor;
mod decoder;
mod detector;
mod nms;
mod prediction;
mod rect;

pub use anchor::{Anchor, AnchorConfig, AnchorGenerator, AnchorSet};
pub use decoder::{BoxDecoder, Variance, center_to_corners, clip_to_unit};
pub use detector::{DETECTION_WIDTH, Detection, DetectionBatch, Detector, DetectorConfig};
pub use nms::nms;
pub use prediction::RawPredictions;
pub use rect::{BoundingBox, iou_matrix};
