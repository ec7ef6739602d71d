//! `BackgroundRemover`: one entry point for every front-end action
//!
//! Wires the processor, the clipboard session, the batch coordinator and
//! the result sinks together, and enforces the cross-component lifecycle:
//! submitting a new source through any channel invalidates the clipboard
//! cache, and starting a single or batch operation discards the previous
//! batch run.

use crate::{
    batch::{BatchCoordinator, BatchEventStream, BatchRun},
    config::{CodecConfig, CoordinatorConfig, ProcessOptions},
    error::{NoBgError, Result},
    inference::InferenceService,
    processor::SingleImageProcessor,
    services::{
        ClipboardProvider, FileResultSink, ImageCodec, ImageCrateCodec, ResultSink, SaveOutcome,
    },
    session::{ClipboardImageSession, SessionOutcome},
    types::{EncodedImage, ImageSource},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Facade over the processing core
pub struct BackgroundRemover {
    processor: SingleImageProcessor,
    session: ClipboardImageSession,
    batch: BatchCoordinator,
    clipboard: Arc<dyn ClipboardProvider>,
    sink: Arc<dyn ResultSink>,
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("processor", &self.processor)
            .field("session", &self.session)
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemover {
    #[must_use]
    pub fn builder() -> BackgroundRemoverBuilder {
        BackgroundRemoverBuilder::new()
    }

    /// Read the clipboard and process its image
    ///
    /// # Errors
    /// - `NoClipboardImage`, `InferenceFailure`, `EncodeFailure`
    pub fn capture_clipboard(&self, options: &ProcessOptions) -> Result<SessionOutcome> {
        self.batch.reset();
        self.session.capture_and_process(options)
    }

    /// Re-process the last captured clipboard image, e.g. with a new background
    ///
    /// # Errors
    /// - `NoActiveSession`, `InferenceFailure`, `EncodeFailure`
    pub fn reprocess_clipboard(&self, options: &ProcessOptions) -> Result<SessionOutcome> {
        self.session.reprocess(options)
    }

    /// Process one path or bitmap source
    ///
    /// # Errors
    /// - `UnreadableSource`, `InferenceFailure`, `EncodeFailure`
    pub fn process_single(
        &self,
        source: &ImageSource,
        options: &ProcessOptions,
    ) -> Result<EncodedImage> {
        self.session.invalidate();
        self.batch.reset();
        self.processor.process(source, options)
    }

    /// Start a batch run over `paths`
    ///
    /// # Errors
    /// - `InvalidConfig` outside a Tokio runtime
    pub fn process_batch(
        &self,
        paths: Vec<PathBuf>,
        options: ProcessOptions,
    ) -> Result<(BatchRun, BatchEventStream)> {
        self.session.invalidate();
        self.batch.submit(paths, options)
    }

    /// Write a single result to `destination`
    ///
    /// # Errors
    /// - `SinkWriteFailure`
    pub fn save_single(&self, image: &EncodedImage, destination: &Path) -> Result<PathBuf> {
        self.sink.save(image, destination)
    }

    /// Write one finished batch item to `destination`
    ///
    /// # Errors
    /// - `InvalidConfig` when there is no active run or the item has no result
    /// - `SinkWriteFailure`
    pub fn save_batch_item(&self, index: usize, destination: &Path) -> Result<PathBuf> {
        let unit = self
            .active_run()?
            .result(index)
            .ok_or_else(|| NoBgError::invalid_config(format!("batch item {index} has no result")))?;
        self.sink.save(&unit.image, destination)
    }

    /// Write every finished batch item into `folder`, one independent write
    /// per item
    ///
    /// # Errors
    /// - `InvalidConfig` when there is no active run
    pub fn save_all_batch(&self, folder: &Path) -> Result<Vec<SaveOutcome>> {
        let units = self.active_run()?.results();
        let outcomes = self.sink.save_all(&units, folder);
        let saved = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        info!(
            saved,
            failed = outcomes.len() - saved,
            folder = %folder.display(),
            "Saved batch results"
        );
        Ok(outcomes)
    }

    /// Put a result on the clipboard as an RGBA bitmap
    ///
    /// # Errors
    /// - `UnreadableSource` when the payload cannot be decoded
    /// - `SinkWriteFailure` when the clipboard rejects it
    pub fn copy_to_clipboard(&self, image: &EncodedImage) -> Result<()> {
        let pixels = image.to_rgba()?;
        self.clipboard.write_image(&pixels)
    }

    /// Discard the batch run and the clipboard cache
    pub fn reset(&self) {
        self.batch.reset();
        self.session.invalidate();
    }

    #[must_use]
    pub fn session(&self) -> &ClipboardImageSession {
        &self.session
    }

    #[must_use]
    pub fn current_batch(&self) -> Option<BatchRun> {
        self.batch.current_run()
    }

    #[must_use]
    pub fn processor(&self) -> &SingleImageProcessor {
        &self.processor
    }

    fn active_run(&self) -> Result<BatchRun> {
        self.batch
            .current_run()
            .ok_or_else(|| NoBgError::invalid_config("no batch run to save"))
    }
}

/// Builder for [`BackgroundRemover`]
#[derive(Default)]
pub struct BackgroundRemoverBuilder {
    inference: Option<Arc<dyn InferenceService>>,
    codec: Option<Arc<dyn ImageCodec>>,
    clipboard: Option<Arc<dyn ClipboardProvider>>,
    sink: Option<Arc<dyn ResultSink>>,
    codec_config: CodecConfig,
    coordinator: CoordinatorConfig,
}

impl BackgroundRemoverBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inference backend (required)
    #[must_use]
    pub fn inference(mut self, inference: Arc<dyn InferenceService>) -> Self {
        self.inference = Some(inference);
        self
    }

    /// Replace the default `image`-crate codec
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Settings for the default codec; ignored when a codec is supplied
    #[must_use]
    pub fn codec_config(mut self, config: CodecConfig) -> Self {
        self.codec_config = config;
        self
    }

    #[must_use]
    pub fn clipboard(mut self, clipboard: Arc<dyn ClipboardProvider>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.coordinator.max_workers = max_workers;
        self
    }

    /// Build the remover
    ///
    /// # Errors
    /// - `InvalidConfig` when no inference backend was set
    pub fn build(self) -> Result<BackgroundRemover> {
        let inference = self
            .inference
            .ok_or_else(|| NoBgError::invalid_config("an inference backend is required"))?;
        if self.codec.is_none() && self.codec_config.max_dimension == 0 {
            return Err(NoBgError::invalid_config("max_dimension must be positive"));
        }
        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(ImageCrateCodec::new(self.codec_config)));
        let clipboard = self.clipboard.unwrap_or_else(default_clipboard);
        let sink = self.sink.unwrap_or_else(|| Arc::new(FileResultSink));

        let processor = SingleImageProcessor::new(codec, inference);
        Ok(BackgroundRemover {
            session: ClipboardImageSession::new(processor.clone(), Arc::clone(&clipboard)),
            batch: BatchCoordinator::new(processor.clone(), self.coordinator),
            processor,
            clipboard,
            sink,
        })
    }
}

#[cfg(feature = "clipboard")]
fn default_clipboard() -> Arc<dyn ClipboardProvider> {
    Arc::new(crate::services::SystemClipboard)
}

#[cfg(not(feature = "clipboard"))]
fn default_clipboard() -> Arc<dyn ClipboardProvider> {
    Arc::new(crate::services::MemoryClipboard::new())
}
