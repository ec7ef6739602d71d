//! Error types for background removal operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, NoBgError>;

/// Structured failure kinds surfaced by the orchestration layer.
///
/// Every variant carries enough context (source name, failure kind and the
/// underlying message) for a front end to render its own explanation; the
/// `Display` output is only a sensible default.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoBgError {
    /// The source could not be read or decoded (bad path, corrupt file,
    /// unsupported format)
    #[error("Unreadable source '{source_name}': {reason}")]
    UnreadableSource { source_name: String, reason: String },

    /// The inference backend could not produce a mask
    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    /// The composited result could not be encoded
    #[error("Encoding failed: {0}")]
    EncodeFailure(String),

    /// The system clipboard holds no image
    #[error("No image on the clipboard: {0}")]
    NoClipboardImage(String),

    /// `reprocess` was requested before any clipboard capture
    #[error("No active clipboard session; capture an image first")]
    NoActiveSession,

    /// Mask and image dimensions disagree
    #[error("Mask dimensions {mask:?} do not match image dimensions {image:?}")]
    DimensionMismatch { image: (u32, u32), mask: (u32, u32) },

    /// A result sink could not persist or publish a result
    #[error("Failed to write '{destination}': {reason}")]
    SinkWriteFailure { destination: String, reason: String },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Serializable tag naming the failure kind without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnreadableSource,
    InferenceFailure,
    EncodeFailure,
    NoClipboardImage,
    NoActiveSession,
    DimensionMismatch,
    SinkWriteFailure,
    InvalidConfig,
}

impl NoBgError {
    /// Create an unreadable-source error for the named source
    pub fn unreadable<N: Into<String>, R: Into<String>>(source_name: N, reason: R) -> Self {
        Self::UnreadableSource {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::InferenceFailure(msg.into())
    }

    /// Create a new encoding error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::EncodeFailure(msg.into())
    }

    /// Create a new clipboard error
    pub fn no_clipboard_image<S: Into<String>>(msg: S) -> Self {
        Self::NoClipboardImage(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a sink write error with the destination for context
    pub fn sink_write<D: std::fmt::Display, R: std::fmt::Display>(destination: D, reason: R) -> Self {
        Self::SinkWriteFailure {
            destination: destination.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an image decoding error with path and format context
    pub fn image_load_error<P: AsRef<std::path::Path>>(path: P, error: &image::ImageError) -> Self {
        let path_ref = path.as_ref();
        let extension = path_ref
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");

        Self::unreadable(
            path_ref.display().to_string(),
            format!("failed to decode (format: {extension}): {error}"),
        )
    }

    /// The kind tag for this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnreadableSource { .. } => ErrorKind::UnreadableSource,
            Self::InferenceFailure(_) => ErrorKind::InferenceFailure,
            Self::EncodeFailure(_) => ErrorKind::EncodeFailure,
            Self::NoClipboardImage(_) => ErrorKind::NoClipboardImage,
            Self::NoActiveSession => ErrorKind::NoActiveSession,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::SinkWriteFailure { .. } => ErrorKind::SinkWriteFailure,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Fold a compositor contract violation into an inference failure.
    ///
    /// A mask that does not match its image means the backend broke its
    /// contract, so callers see it as the inference step failing.
    #[must_use]
    pub fn into_inference_failure(self) -> Self {
        match self {
            Self::DimensionMismatch { image, mask } => Self::InferenceFailure(format!(
                "backend returned a {}x{} mask for a {}x{} image",
                mask.0, mask.1, image.0, image.1
            )),
            other => other,
        }
    }
}
