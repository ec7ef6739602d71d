//! Inference service implementations
//!
//! - Mock services (always available) for tests, demos and headless runs
//! - ONNX Runtime service for the RMBG-1.4 matting model (`onnx` feature)

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxInferenceService;
