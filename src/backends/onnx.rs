//! ONNX Runtime inference service for the RMBG-1.4 matting model
//!
//! The model takes a `[1, 3, 1024, 1024]` float tensor normalized as
//! `pixel / 255 - 0.5` and returns a `[1, 1, 1024, 1024]` sigmoid mask. The
//! mask is resized back to the source resolution before it is returned.

use crate::{
    error::{NoBgError, Result},
    inference::InferenceService,
    types::SegmentationMask,
};
use image::{imageops::FilterType, DynamicImage, GrayImage, RgbaImage};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Square input resolution expected by RMBG-1.4
pub const MODEL_INPUT_SIZE: u32 = 1024;

/// RMBG-1.4 through ONNX Runtime.
///
/// The session is loaded once and shared; ONNX Runtime needs exclusive access
/// per run, so concurrent callers serialize on the session lock.
#[derive(Debug)]
pub struct OnnxInferenceService {
    session: Mutex<Session>,
    model_path: PathBuf,
}

impl OnnxInferenceService {
    /// Load the model at `model_path`.
    ///
    /// `intra_threads` of 0 uses all available cores.
    ///
    /// # Errors
    /// - Model file missing
    /// - Session creation failures
    pub fn from_file<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(NoBgError::inference(format!(
                "model file not found at '{}'; download RMBG-1.4 (model.onnx) and point to it",
                model_path.display()
            )));
        }

        let intra_threads = if intra_threads > 0 {
            intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        };

        let load_start = std::time::Instant::now();
        let session = Session::builder()
            .map_err(|e| NoBgError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| NoBgError::inference(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| NoBgError::inference(format!("Failed to set intra threads: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                NoBgError::inference(format!(
                    "Failed to load model '{}': {e}",
                    model_path.display()
                ))
            })?;

        log::info!(
            "Loaded {} in {:.0}ms ({intra_threads} intra-op threads)",
            model_path.display(),
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            session: Mutex::new(session),
            model_path: model_path.to_path_buf(),
        })
    }

    /// Path the model was loaded from
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Resize to the model resolution and build the normalized CHW tensor
    fn preprocess(image: &RgbaImage) -> Array4<f32> {
        let size = MODEL_INPUT_SIZE as usize;
        let resized = DynamicImage::ImageRgba8(image.clone())
            .resize_exact(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, FilterType::Lanczos3)
            .to_rgb8();

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] =
                    f32::from(pixel[channel]) / 255.0 - 0.5;
            }
        }
        tensor
    }
}

impl InferenceService for OnnxInferenceService {
    fn infer(&self, image: &RgbaImage) -> Result<SegmentationMask> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(NoBgError::inference("image has zero width or height"));
        }

        let input = Value::from_array(Self::preprocess(image))
            .map_err(|e| NoBgError::inference(format!("Failed to convert input tensor: {e}")))?;

        let mut session = self.session.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let inference_start = std::time::Instant::now();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| NoBgError::inference(format!("ONNX inference failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| NoBgError::inference("model produced no outputs"))?;
        let output = outputs
            .get(first_key)
            .ok_or_else(|| NoBgError::inference("first output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| NoBgError::inference(format!("Failed to extract output tensor: {e}")))?;

        let shape = output.shape();
        let (mask_height, mask_width) = match shape {
            [.., h, w] => (*h, *w),
            _ => {
                return Err(NoBgError::inference(format!(
                    "unexpected output shape {shape:?}"
                )))
            },
        };

        let raw: Vec<u8> = output
            .iter()
            .take(mask_width * mask_height)
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        log::debug!(
            "Inference for {width}x{height} input: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        let model_mask = GrayImage::from_raw(mask_width as u32, mask_height as u32, raw)
            .ok_or_else(|| NoBgError::inference("output tensor smaller than its shape"))?;
        let mask = image::imageops::resize(&model_mask, width, height, FilterType::Lanczos3);
        Ok(SegmentationMask::from_image(&mask))
    }

    fn name(&self) -> &str {
        "onnx-rmbg"
    }
}
