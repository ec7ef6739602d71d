//! Inference backend selection for the CLI

use crate::{backends::mock::UniformMaskService, inference::InferenceService};
use anyhow::Result;
use clap::ValueEnum;
use std::path::Path;
use std::sync::Arc;

/// Model file looked up in the working directory when `--model` is absent
pub(crate) const DEFAULT_MODEL_PATH: &str = "model.onnx";

/// Inference backend choices
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    /// RMBG-1.4 through ONNX Runtime (needs the `onnx` feature and a model file)
    Onnx,
    /// Treats every pixel as foreground; checks decoding, compositing and
    /// encoding without a model
    Passthrough,
}

pub(crate) struct CliBackendFactory;

impl CliBackendFactory {
    /// Create the inference service for `backend`
    pub(crate) fn create(
        backend: CliBackend,
        model: Option<&Path>,
        threads: usize,
    ) -> Result<Arc<dyn InferenceService>> {
        match backend {
            CliBackend::Passthrough => Ok(Arc::new(UniformMaskService::new(u8::MAX))),
            CliBackend::Onnx => Self::create_onnx(model.unwrap_or(Path::new(DEFAULT_MODEL_PATH)), threads),
        }
    }

    #[cfg(feature = "onnx")]
    fn create_onnx(model: &Path, threads: usize) -> Result<Arc<dyn InferenceService>> {
        use anyhow::Context;

        let service = crate::backends::OnnxInferenceService::from_file(model, threads)
            .context("Failed to load the ONNX model")?;
        Ok(Arc::new(service))
    }

    #[cfg(not(feature = "onnx"))]
    fn create_onnx(_model: &Path, _threads: usize) -> Result<Arc<dyn InferenceService>> {
        anyhow::bail!(
            "this build has no ONNX support; rebuild with `--features onnx` or use `--backend passthrough`"
        )
    }
}
