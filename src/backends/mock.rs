//! Mock inference services
//!
//! Deterministic stand-ins for a real matting model. They let the
//! orchestration layer be exercised end to end (tests, benchmarks, demos)
//! without model files or a native runtime.

use crate::{
    error::{NoBgError, Result},
    inference::InferenceService,
    types::SegmentationMask,
};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns the same mask value for every pixel
#[derive(Debug, Default)]
pub struct UniformMaskService {
    value: u8,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl UniformMaskService {
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self {
            value,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` on every call to simulate a slow backend
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `infer` calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceService for UniformMaskService {
    fn infer(&self, image: &RgbaImage) -> Result<SegmentationMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let (width, height) = image.dimensions();
        Ok(SegmentationMask::uniform(width, height, self.value))
    }

    fn name(&self) -> &str {
        "uniform-mock"
    }
}

/// Computes each mask value from the source pixel
pub struct FnMaskService<F> {
    f: F,
}

impl<F> FnMaskService<F>
where
    F: Fn(u32, u32, &Rgba<u8>) -> u8 + Send + Sync,
{
    #[must_use]
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> InferenceService for FnMaskService<F>
where
    F: Fn(u32, u32, &Rgba<u8>) -> u8 + Send + Sync,
{
    fn infer(&self, image: &RgbaImage) -> Result<SegmentationMask> {
        let data = image
            .enumerate_pixels()
            .map(|(x, y, pixel)| (self.f)(x, y, pixel))
            .collect();
        SegmentationMask::new(data, image.dimensions())
    }

    fn name(&self) -> &str {
        "fn-mock"
    }
}

/// Always fails
#[derive(Debug, Clone)]
pub struct FailingInferenceService {
    message: String,
}

impl FailingInferenceService {
    #[must_use]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl InferenceService for FailingInferenceService {
    fn infer(&self, _image: &RgbaImage) -> Result<SegmentationMask> {
        Err(NoBgError::inference(self.message.clone()))
    }

    fn name(&self) -> &str {
        "failing-mock"
    }
}

/// Delegates to `inner` but fails for images of one particular size.
///
/// Lets a batch contain a single item whose inference fails while the
/// others succeed.
pub struct FailOnDimensions<S> {
    inner: S,
    dimensions: (u32, u32),
}

impl<S: InferenceService> FailOnDimensions<S> {
    #[must_use]
    pub fn new(inner: S, width: u32, height: u32) -> Self {
        Self {
            inner,
            dimensions: (width, height),
        }
    }
}

impl<S: InferenceService> InferenceService for FailOnDimensions<S> {
    fn infer(&self, image: &RgbaImage) -> Result<SegmentationMask> {
        if image.dimensions() == self.dimensions {
            return Err(NoBgError::inference(format!(
                "model rejected {}x{} input",
                self.dimensions.0, self.dimensions.1
            )));
        }
        self.inner.infer(image)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Breaks the backend contract by returning a mask of the wrong size
#[derive(Debug, Default)]
pub struct MismatchedMaskService;

impl InferenceService for MismatchedMaskService {
    fn infer(&self, image: &RgbaImage) -> Result<SegmentationMask> {
        let (width, height) = image.dimensions();
        Ok(SegmentationMask::uniform(width + 1, height, 255))
    }

    fn name(&self) -> &str {
        "mismatched-mock"
    }
}
