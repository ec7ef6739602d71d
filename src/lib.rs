#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # nobg
//!
//! Orchestration layer for background removal: takes images from files or
//! the clipboard, obtains a soft foreground mask from an inference backend,
//! composites the result against a chosen background, and hands back
//! encoded payloads synchronously (single image, clipboard) or as a stream
//! of progress events (batch).
//!
//! ## Features
//!
//! - **Backgrounds**: transparent, white, black or any RGB colour, with
//!   exact round-half-up blending
//! - **Clipboard sessions**: change the background of a pasted image
//!   without reading the clipboard again; stale results are detectable by
//!   generation number
//! - **Batches**: bounded concurrency, per-item failure isolation, results
//!   reported by submission index as a `futures::Stream`
//! - **Pluggable collaborators**: inference, codec, clipboard and result
//!   sink are traits, with mock inference services for tests and demos
//!
//! ### Feature Flags
//!
//! - `cli` (default): the `nobg` command-line front end
//! - `clipboard` (default): system clipboard through `arboard`
//! - `svg` (default): SVG input rasterized with `resvg`
//! - `webp-support` (default): WebP decoding and lossless WebP output
//! - `onnx`: RMBG-1.4 inference through ONNX Runtime
//! - `tracing-json`: JSON log output for the CLI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nobg::{
//!     backends::mock::UniformMaskService, BackgroundRemover, BackgroundSpec, ImageSource,
//!     ProcessOptions,
//! };
//! use std::sync::Arc;
//!
//! # fn example() -> nobg::Result<()> {
//! let remover = BackgroundRemover::builder()
//!     .inference(Arc::new(UniformMaskService::new(255)))
//!     .build()?;
//!
//! let result = remover.process_single(
//!     &ImageSource::path("portrait.jpg")?,
//!     &ProcessOptions::new(BackgroundSpec::White),
//! )?;
//! remover.save_single(&result, std::path::Path::new("portrait_nobg.png"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Batches
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use nobg::{backends::mock::UniformMaskService, BackgroundRemover, ProcessOptions};
//! use std::sync::Arc;
//!
//! # async fn example() -> nobg::Result<()> {
//! let remover = BackgroundRemover::builder()
//!     .inference(Arc::new(UniformMaskService::new(255)))
//!     .max_workers(4)
//!     .build()?;
//!
//! let paths = vec!["a.png".into(), "b.jpg".into()];
//! let (run, mut events) = remover.process_batch(paths, ProcessOptions::default())?;
//! while let Some(event) = events.next().await {
//!     println!("{}/{} {} ok={}", event.index + 1, event.total, event.name, event.is_success());
//! }
//! assert!(run.summary().is_complete());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod inference;
pub mod processor;
pub mod remover;
pub mod services;
pub mod session;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

pub use batch::{
    BatchCoordinator, BatchEventStream, BatchItem, BatchProgressEvent, BatchRun, BatchSummary,
    ItemStatus,
};
pub use compositor::BackgroundCompositor;
pub use config::{
    BackgroundSpec, CodecConfig, CoordinatorConfig, OutputFormat, ProcessOptions,
    ProcessOptionsBuilder,
};
pub use error::{ErrorKind, NoBgError, Result};
pub use inference::InferenceService;
pub use processor::SingleImageProcessor;
pub use remover::{BackgroundRemover, BackgroundRemoverBuilder};
pub use services::{
    ClipboardProvider, ExportUnit, FileResultSink, ImageCodec, ImageCrateCodec, ResultSink,
    SaveOutcome,
};
pub use session::{ClipboardImageSession, SessionOutcome};
pub use types::{EncodedImage, ImageSource, ProcessingTimings, SegmentationMask};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};
