//! Inference-time post-processing for Single Shot Multibox Detectors.
//!
//! The crate generates the fixed anchor set of an SSD model, decodes the
//! network's location regressions against it, and runs per-class greedy
//! non-maximum suppression to produce a fixed-shape detection tensor.
//!
//! ```no_run
//! use ssd_postprocess::{Detector, RawPredictions, SsdConfig};
//! # fn run(preds: RawPredictions) -> ssd_postprocess::Result<()> {
//! let detector = Detector::from_config(&SsdConfig::default())?;
//! let batch = detector.detect(&preds)?;
//! for det in batch.detections(0) {
//!     println!("class {} at {:?} ({})", det.class_id, det.bbox, det.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod integration;
pub mod labels;
pub mod ssd;

pub use config::SsdConfig;
pub use error::{Error, Result};
pub use integration::{DetectionPipeline, PipelineError, PredictionSource};
pub use labels::{GroundTruth, LabelSet, LabeledImage};
pub use ssd::{
    Anchor, AnchorConfig, AnchorGenerator, AnchorSet, BoundingBox, BoxDecoder, Detection,
    DetectionBatch, Detector, DetectorConfig, RawPredictions, Variance, nms,
};
