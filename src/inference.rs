//! Inference service abstraction

use crate::{error::Result, types::SegmentationMask};
use image::RgbaImage;

/// Produces a soft foreground mask for a decoded image.
///
/// Implementations must return a mask with exactly the image's dimensions.
/// They are shared across batch workers, so any interior state (a model
/// session, call counters) must be synchronized by the implementation.
pub trait InferenceService: Send + Sync {
    /// Run inference on `image`
    ///
    /// # Errors
    /// - Backend not ready or model failure (`InferenceFailure`)
    fn infer(&self, image: &RgbaImage) -> Result<SegmentationMask>;

    /// Short human-readable backend name for logs
    fn name(&self) -> &str {
        "inference"
    }
}

impl<T: InferenceService + ?Sized> InferenceService for std::sync::Arc<T> {
    fn infer(&self, image: &RgbaImage) -> Result<SegmentationMask> {
        (**self).infer(image)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
