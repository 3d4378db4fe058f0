//! Integration module for connecting inference backends to the SSD post-processor.
//!
//! This module provides the trait a network backend implements to hand raw
//! predictions over, and a pipeline bundling such a backend with a
//! [`Detector`](crate::Detector).

mod pipeline;
mod source;

pub use pipeline::{DetectionPipeline, PipelineError};
pub use source::PredictionSource;

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnPredictor, BurnPredictorError, BurnSsdModel};
