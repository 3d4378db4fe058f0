//! Burn inference backend for SSD networks.
//!
//! This module provides a `BurnPredictor` that implements `PredictionSource`
//! for SSD models built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use ssd_postprocess::integration::{BurnPredictor, BurnSsdModel};
//! use burn::backend::NdArray;
//!
//! // Implement BurnSsdModel for your network
//! struct MySsd300 { /* ... */ }
//!
//! impl BurnSsdModel<NdArray> for MySsd300 {
//!     fn forward(&self, input: Tensor<NdArray, 4>) -> (Tensor<NdArray, 3>, Tensor<NdArray, 3>) {
//!         // Run the network, return (loc, conf)
//!     }
//! }
//!
//! let model = MySsd300::load("ssd300.bin");
//! let predictor = BurnPredictor::new(model, Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use ndarray::Array3;
use thiserror::Error;

use super::PredictionSource;
use crate::ssd::RawPredictions;

/// Error type for Burn inference failures.
#[derive(Debug, Error)]
pub enum BurnPredictorError {
    /// Input image has invalid dimensions.
    #[error("invalid input dimensions: expected {expected:?}, got {got:?}")]
    InvalidInputDimensions {
        expected: (u32, u32, u32),
        got: (u32, u32, u32),
    },
    /// The output tensor could not be read back.
    #[error("failed to read `{name}` tensor: {message}")]
    ReadOutput { name: &'static str, message: String },
    /// The network outputs do not form a valid prediction pair.
    #[error(transparent)]
    Predictions(#[from] crate::error::Error),
}

/// Trait for Burn-based SSD networks.
///
/// Implement this trait for your specific model architecture.
pub trait BurnSsdModel<B: Backend>: Send + Sync {
    /// Run forward pass on the input tensor.
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch, channels, height, width]
    ///
    /// # Returns
    /// Location tensor [batch, anchors, 4] and confidence tensor
    /// [batch, anchors, class_num].
    fn forward(&self, input: Tensor<B, 4>) -> (Tensor<B, 3>, Tensor<B, 3>);

    /// Get the expected input size (channels, height, width).
    fn input_size(&self) -> (u32, u32, u32) {
        (3, 300, 300) // SSD300
    }

    /// Whether the confidence output holds logits that still need a softmax.
    fn emits_logits(&self) -> bool {
        false
    }
}

/// Burn-based SSD network implementing `PredictionSource`.
pub struct BurnPredictor<B: Backend, M: BurnSsdModel<B>> {
    model: M,
    device: B::Device,
}

impl<B: Backend, M: BurnSsdModel<B>> BurnPredictor<B, M> {
    /// Create a new Burn predictor with the given model and device.
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Preprocess raw CHW image bytes to a Burn tensor scaled to [0, 1].
    ///
    /// The image must already match the model input size.
    pub fn preprocess(
        &self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Tensor<B, 4>, BurnPredictorError> {
        let (channels, target_h, target_w) = self.model.input_size();
        let expected_len = (width * height * channels) as usize;

        if input.len() != expected_len || height != target_h || width != target_w {
            return Err(BurnPredictorError::InvalidInputDimensions {
                expected: (channels, target_h, target_w),
                got: (channels, height, width),
            });
        }

        let data: Vec<f32> = input.iter().map(|&x| x as f32 / 255.0).collect();

        let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            channels as usize,
            height as usize,
            width as usize,
        ]);
        Ok(tensor)
    }

    /// Convert the network output pair to `RawPredictions`.
    fn postprocess(
        &self,
        loc: Tensor<B, 3>,
        conf: Tensor<B, 3>,
    ) -> Result<RawPredictions, BurnPredictorError> {
        let loc = tensor_to_array(loc, "loc")?;
        let conf = tensor_to_array(conf, "conf")?;
        let predictions = RawPredictions::new(loc, conf)?;
        if self.model.emits_logits() {
            Ok(predictions.with_softmax())
        } else {
            Ok(predictions)
        }
    }
}

fn tensor_to_array<B: Backend>(
    tensor: Tensor<B, 3>,
    name: &'static str,
) -> Result<Array3<f32>, BurnPredictorError> {
    let [d0, d1, d2] = tensor.dims();
    let values = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| BurnPredictorError::ReadOutput {
            name,
            message: format!("{e:?}"),
        })?;
    Array3::from_shape_vec((d0, d1, d2), values).map_err(|e| BurnPredictorError::ReadOutput {
        name,
        message: e.to_string(),
    })
}

impl<B: Backend, M: BurnSsdModel<B>> PredictionSource for BurnPredictor<B, M> {
    type Error = BurnPredictorError;

    fn predict(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<RawPredictions, Self::Error> {
        let tensor = self.preprocess(input, width, height)?;
        let (loc, conf) = self.model.forward(tensor);
        self.postprocess(loc, conf)
    }
}
