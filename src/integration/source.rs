//! Trait for SSD network backends.

use crate::ssd::RawPredictions;

/// Trait for inference backends producing raw SSD outputs.
///
/// Implement this trait to connect any SSD network to the post-processor.
///
/// # Example
///
/// ```ignore
/// use ssd_postprocess::{PredictionSource, RawPredictions};
///
/// struct MyNetwork {
///     // Your model here
/// }
///
/// impl PredictionSource for MyNetwork {
///     type Error = std::io::Error;
///
///     fn predict(&mut self, input: &[u8], width: u32, height: u32) -> Result<RawPredictions, Self::Error> {
///         // Run inference, return loc (1, anchors, 4) and conf (1, anchors, classes)
///         todo!()
///     }
/// }
/// ```
pub trait PredictionSource {
    /// Error type for inference failures.
    type Error;

    /// Run the network on raw image data.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes (format depends on implementation)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    ///
    /// # Returns
    /// Location regressions and class confidences for every anchor.
    fn predict(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<RawPredictions, Self::Error>;
}
