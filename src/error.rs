//! Error type shared by every stage of the post-processing core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by anchor generation, decoding, detection and the file readers.
#[derive(Debug, Error)]
pub enum Error {
    /// A per-level anchor parameter list does not have one entry per feature map.
    #[error("`{field}` has {got} entries but there are {expected} feature maps")]
    LevelCountMismatch {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    /// The anchor configuration names no feature maps at all.
    #[error("anchor configuration has no feature maps")]
    NoLevels,

    /// Only 4 or 6 anchors per cell are supported.
    #[error("level {level} asks for {count} anchors per cell, expected 4 or 6")]
    UnsupportedAnchorCount { level: usize, count: usize },

    /// A size, step, variance or similar quantity is zero, negative or not finite.
    #[error("`{field}` must be positive and finite, got {value}")]
    NonPositive { field: String, value: f64 },

    /// A threshold lies outside of `[0, 1]` or is not finite.
    #[error("`{name}` must lie in [0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f32 },

    /// `top_k` of zero would produce an empty output tensor.
    #[error("`top_k` must be at least 1")]
    ZeroTopK,

    /// At least one foreground class besides background is required.
    #[error("`class_num` must be greater than 1 (background + foreground), got {0}")]
    TooFewClasses(usize),

    /// An input array does not have the shape the cached anchors require.
    #[error("{what} has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("failed to read `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration")]
    ParseConfig(#[from] toml::de::Error),

    /// A token on a label line is not a valid `xmin,ymin,xmax,ymax,class_id` literal.
    #[error("line {line}: malformed box `{token}`")]
    MalformedLabel { line: usize, token: String },

    #[error("label index {index} is out of range for {len} images")]
    LabelIndex { index: usize, len: usize },
}

impl Error {
    /// Whether this error stems from an inconsistent static configuration.
    ///
    /// Configuration errors are fatal at construction time.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::LevelCountMismatch { .. }
                | Self::NoLevels
                | Self::UnsupportedAnchorCount { .. }
                | Self::NonPositive { .. }
                | Self::InvalidThreshold { .. }
                | Self::ZeroTopK
                | Self::ParseConfig(_)
        )
    }

    /// Whether this error rejects a single call's input.
    ///
    /// The call can be retried with corrected input, shared state is untouched.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. } | Self::TooFewClasses(_))
    }
}

/// Type alias for [`Result<T, Error>`].
pub type Result<T> = std::result::Result<T, Error>;

/// Fails with [`Error::NonPositive`] unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(field: impl Into<String>, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::NonPositive {
            field: field.into(),
            value,
        })
    }
}

/// Fails with [`Error::InvalidThreshold`] unless `value` lies in `[0, 1]`.
pub(crate) fn ensure_unit_threshold(name: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidThreshold { name, value })
    }
}
