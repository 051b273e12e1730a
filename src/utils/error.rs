//! Error Handling Module
//!
//! Defines the error taxonomy for classification, attribution, rendering and
//! the prediction history. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the mango classifier
#[derive(Error, Debug)]
pub enum MangoError {
    /// No classifier is available for the requested operation
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// Forward or backward pass failed
    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    /// No 2D raster surface could be allocated for the overlay
    #[error("Render surface unavailable: {0}")]
    RenderSurfaceUnavailable(String),

    /// A previous analysis is still running
    #[error("An analysis is already in progress")]
    AnalysisInProgress,

    /// Error restoring model weights
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    /// Error decoding or encoding an image
    #[error("Image error: {0}")]
    Image(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MangoError {
    /// Whether the error only affects the optional heatmap and the
    /// classification result is still usable.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            MangoError::RenderSurfaceUnavailable(_) | MangoError::InferenceFailure(_)
        )
    }
}

impl From<serde_json::Error> for MangoError {
    fn from(err: serde_json::Error) -> Self {
        MangoError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for MangoError {
    fn from(err: image::ImageError) -> Self {
        MangoError::Image(err.to_string())
    }
}

/// Convenience Result type for mango classifier operations
pub type Result<T> = std::result::Result<T, MangoError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| MangoError::InvalidInput(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| MangoError::InvalidInput(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| MangoError::InvalidInput(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| MangoError::InvalidInput(f()))
    }
}
