//! TOML configuration for the whole post-processing stack.
//!
//! Every section is optional; a missing key falls back to the SSD300
//! reference values.
//!
//! ```toml
//! [anchors]
//! image_size = 300
//! feature_sizes = [38, 19, 10, 5, 3, 1]
//!
//! [variance]
//! center = 0.1
//! size = 0.2
//!
//! [detector]
//! class_num = 21
//! score_threshold = 0.3
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ssd::{AnchorConfig, AnchorGenerator, BoxDecoder, Detector, DetectorConfig, Variance};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsdConfig {
    pub anchors: AnchorConfig,
    pub variance: Variance,
    pub detector: DetectorConfig,
}

impl SsdConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading detector configuration");
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.anchors.validate()?;
        self.variance.validate()?;
        self.detector.validate()
    }
}

impl Detector {
    /// Build a detector, generating its anchors from `config`.
    pub fn from_config(config: &SsdConfig) -> Result<Self> {
        let generator = AnchorGenerator::new(config.anchors.clone())?;
        let decoder = BoxDecoder::new(config.variance)?;
        Self::new(&generator, decoder, config.detector.clone())
    }
}
