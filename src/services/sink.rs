//! Result persistence
//!
//! The core never writes results on its own; a front end hands finished
//! results to a [`ResultSink`] on an explicit save action.

use crate::{
    error::{NoBgError, Result},
    services::format::OutputFormatHandler,
    types::EncodedImage,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Marker appended to the source stem in suggested file names
pub const OUTPUT_SUFFIX: &str = "_nobg";

/// Stem used when the source has none (clipboard, odd paths)
pub const FALLBACK_STEM: &str = "output";

/// One independently saveable result
#[derive(Debug, Clone)]
pub struct ExportUnit {
    /// Display name of the source
    pub name: String,
    /// Source path, `None` for clipboard results
    pub source_path: Option<PathBuf>,
    /// Encoded result
    pub image: Arc<EncodedImage>,
}

impl ExportUnit {
    #[must_use]
    pub fn new(name: String, source_path: Option<PathBuf>, image: Arc<EncodedImage>) -> Self {
        Self {
            name,
            source_path,
            image,
        }
    }

    /// `<stem>_nobg.<ext>` for this unit
    #[must_use]
    pub fn suggested_file_name(&self) -> String {
        suggested_file_name(self.source_path.as_deref(), &self.image)
    }
}

/// Suggested destination file name for a result: the source stem with
/// [`OUTPUT_SUFFIX`] and the result format's extension.
#[must_use]
pub fn suggested_file_name(source: Option<&Path>, image: &EncodedImage) -> String {
    let stem = source
        .and_then(Path::file_stem)
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(FALLBACK_STEM);
    format!(
        "{stem}{OUTPUT_SUFFIX}.{}",
        OutputFormatHandler::get_extension(image.format)
    )
}

/// Outcome of one write within [`ResultSink::save_all`]
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub name: String,
    pub result: Result<PathBuf>,
}

impl SaveOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Destination for finished results
pub trait ResultSink: Send + Sync {
    /// Persist one result at `destination`, returning where it was written
    ///
    /// # Errors
    /// - `SinkWriteFailure` when the write fails
    fn save(&self, image: &EncodedImage, destination: &Path) -> Result<PathBuf>;

    /// Write every unit into `folder` under its suggested name.
    ///
    /// Writes are independent: a failure is recorded for that unit and the
    /// remaining units are still written.
    fn save_all(&self, units: &[ExportUnit], folder: &Path) -> Vec<SaveOutcome> {
        units
            .iter()
            .map(|unit| {
                let destination = folder.join(unit.suggested_file_name());
                let result = self.save(&unit.image, &destination);
                if let Err(e) = &result {
                    log::warn!("Failed to save {}: {e}", unit.name);
                }
                SaveOutcome {
                    name: unit.name.clone(),
                    result,
                }
            })
            .collect()
    }
}

/// Writes results to the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResultSink;

impl ResultSink for FileResultSink {
    fn save(&self, image: &EncodedImage, destination: &Path) -> Result<PathBuf> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| NoBgError::sink_write(parent.display(), e))?;
            }
        }
        std::fs::write(destination, &image.bytes)
            .map_err(|e| NoBgError::sink_write(destination.display(), e))?;
        log::info!(
            "Saved {} ({} bytes)",
            destination.display(),
            image.bytes.len()
        );
        Ok(destination.to_path_buf())
    }
}
