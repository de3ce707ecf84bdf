use std::sync::Arc;

use thiserror::Error;

use crate::preprocess::PixelScale;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Cause shared by every caller of a failed model load.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = VisionError> = std::result::Result<T, E>;

/// Failures raised by the embedding pipeline.
///
/// A failure here is never a "no match": callers must report it separately
/// from a low similarity score.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("failed to preprocess image: {0}")]
    PreprocessingFailed(#[from] PreprocessError),

    #[error("failed to load model: {0}")]
    ModelLoadFailed(#[source] SharedError),

    #[error("inference failed: {0}")]
    InferenceFailed(#[source] BoxError),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("pixel scale mismatch: enrolled with {enrolled:?}, query uses {query:?}")]
    ScaleMismatch {
        enrolled: PixelScale,
        query: PixelScale,
    },
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("invalid image dimensions: {width}x{height}x{channels}, expected {expected_width}x{expected_height}x3")]
    Dimensions {
        width: u32,
        height: u32,
        channels: usize,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("cannot shape tensor: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PreprocessingFailed,
    ModelLoadFailed,
    InferenceFailed,
    DimensionMismatch,
    ScaleMismatch,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::PreprocessingFailed => "PreprocessingFailed",
            ErrorKind::ModelLoadFailed => "ModelLoadFailed",
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::DimensionMismatch => "DimensionMismatch",
            ErrorKind::ScaleMismatch => "ScaleMismatch",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VisionError::PreprocessingFailed(_) => ErrorKind::PreprocessingFailed,
            VisionError::ModelLoadFailed(_) => ErrorKind::ModelLoadFailed,
            VisionError::InferenceFailed(_) => ErrorKind::InferenceFailed,
            VisionError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            VisionError::ScaleMismatch { .. } => ErrorKind::ScaleMismatch,
        }
    }

    /// Status a request boundary should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::PreprocessingFailed => 400,
            ErrorKind::DimensionMismatch => 422,
            ErrorKind::ScaleMismatch => 409,
            ErrorKind::ModelLoadFailed => 503,
            ErrorKind::InferenceFailed => 500,
        }
    }

    /// Whether the caller can fix the failure by sending different input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::PreprocessingFailed)
    }

    pub(crate) fn inference(cause: impl Into<BoxError>) -> Self {
        VisionError::InferenceFailed(cause.into())
    }
}
