//! DetectionPipeline for combining network inference with post-processing.

use thiserror::Error;

use crate::error::Error;
use crate::ssd::{DetectionBatch, Detector};

use super::PredictionSource;

/// Failure of either pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError<E>
where
    E: std::error::Error + 'static,
{
    /// The prediction source failed.
    #[error("prediction source failed")]
    Source(#[source] E),
    /// Post-processing rejected the predictions.
    #[error(transparent)]
    Detect(#[from] Error),
}

/// Bundles a [`PredictionSource`] with a [`Detector`].
///
/// This struct provides a convenient way to run end-to-end detection on a
/// frame with any backend implementing `PredictionSource`.
pub struct DetectionPipeline<S: PredictionSource> {
    source: S,
    detector: Detector,
}

impl<S: PredictionSource> DetectionPipeline<S>
where
    S::Error: std::error::Error + 'static,
{
    /// Create a new pipeline from a source and a ready detector.
    pub fn new(source: S, detector: Detector) -> Self {
        Self { source, detector }
    }

    /// Process a single frame and return its detections.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    pub fn process_frame(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<DetectionBatch, PipelineError<S::Error>> {
        let predictions = self
            .source
            .predict(input, width, height)
            .map_err(PipelineError::Source)?;
        Ok(self.detector.detect(&predictions)?)
    }

    /// Get a reference to the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a mutable reference to the underlying source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Get a reference to the underlying detector.
    pub fn detector(&self) -> &Detector {
        &self.detector
    }
}
