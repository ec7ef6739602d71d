//! Clipboard image session
//!
//! Remembers the last captured clipboard bitmap so a background change can
//! be applied without reading the clipboard again. Every request is stamped
//! with a generation number; a consumer applies a result only while
//! [`ClipboardImageSession::is_latest`] holds for it, so when two requests
//! overlap the most recent one wins.

use crate::{
    config::ProcessOptions,
    error::{NoBgError, Result},
    processor::SingleImageProcessor,
    services::ClipboardProvider,
    types::EncodedImage,
};
use image::RgbaImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Result of a session request, stamped with the request's generation
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub generation: u64,
    pub image: EncodedImage,
}

/// Stateful clipboard pipeline holding at most one cached bitmap
pub struct ClipboardImageSession {
    processor: SingleImageProcessor,
    clipboard: Arc<dyn ClipboardProvider>,
    cached: Mutex<Option<Arc<RgbaImage>>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for ClipboardImageSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardImageSession")
            .field("has_cached_image", &self.has_cached_image())
            .field("generation", &self.current_generation())
            .finish_non_exhaustive()
    }
}

impl ClipboardImageSession {
    #[must_use]
    pub fn new(processor: SingleImageProcessor, clipboard: Arc<dyn ClipboardProvider>) -> Self {
        Self {
            processor,
            clipboard,
            cached: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Read the clipboard, cache the decoded bitmap and process it.
    ///
    /// The cache is replaced as soon as the read succeeds, so a later
    /// inference or encode failure still leaves the new bitmap available to
    /// [`reprocess`](Self::reprocess). A failed read keeps the previous
    /// cache. A capture overtaken by [`invalidate`](Self::invalidate) or a
    /// newer request while reading is still processed but never cached.
    ///
    /// # Errors
    /// - `NoClipboardImage` when the clipboard holds no image
    /// - `InferenceFailure` / `EncodeFailure` from the pipeline
    #[instrument(name = "capture", skip(self, options), fields(background = %options.background))]
    pub fn capture_and_process(&self, options: &ProcessOptions) -> Result<SessionOutcome> {
        let generation = self.next_generation();
        let raw = self.clipboard.read_image()?;
        let bitmap = Arc::new(self.processor.codec().prepare(raw));
        debug!(
            width = bitmap.width(),
            height = bitmap.height(),
            generation,
            "Captured clipboard image"
        );
        {
            let mut cached = self.lock();
            if self.is_latest(generation) {
                *cached = Some(Arc::clone(&bitmap));
            } else {
                debug!(generation, "Capture superseded while reading, not cached");
            }
        }

        let image = self.processor.process_decoded(&bitmap, options)?;
        Ok(SessionOutcome { generation, image })
    }

    /// Re-run inference, compositing and encoding on the cached bitmap
    ///
    /// # Errors
    /// - `NoActiveSession` when nothing has been captured
    /// - `InferenceFailure` / `EncodeFailure` from the pipeline
    #[instrument(name = "reprocess", skip(self, options), fields(background = %options.background))]
    pub fn reprocess(&self, options: &ProcessOptions) -> Result<SessionOutcome> {
        let bitmap = self.lock().clone().ok_or(NoBgError::NoActiveSession)?;
        let generation = self.next_generation();
        let image = self.processor.process_decoded(&bitmap, options)?;
        Ok(SessionOutcome { generation, image })
    }

    /// Drop the cached bitmap; results still in flight become stale
    pub fn invalidate(&self) {
        let had_image = {
            let mut cached = self.lock();
            self.next_generation();
            cached.take().is_some()
        };
        if had_image {
            debug!("Clipboard session invalidated");
        }
    }

    /// Whether `generation` belongs to the most recent request
    #[must_use]
    pub fn is_latest(&self, generation: u64) -> bool {
        generation == self.current_generation()
    }

    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn has_cached_image(&self) -> bool {
        self.lock().is_some()
    }

    /// Dimensions of the cached bitmap
    #[must_use]
    pub fn cached_dimensions(&self) -> Option<(u32, u32)> {
        self.lock().as_ref().map(|bitmap| bitmap.dimensions())
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<RgbaImage>>> {
        self.cached
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backends::mock::{FailingInferenceService, UniformMaskService},
        config::BackgroundSpec,
        services::{ImageCrateCodec, MemoryClipboard},
    };
    use image::Rgba;
    use std::sync::Barrier;

    fn session_with(
        clipboard: Arc<MemoryClipboard>,
        inference: Arc<dyn crate::inference::InferenceService>,
    ) -> ClipboardImageSession {
        let processor = SingleImageProcessor::new(Arc::new(ImageCrateCodec::default()), inference);
        ClipboardImageSession::new(processor, clipboard)
    }

    #[test]
    fn test_reprocess_without_capture() {
        let session = session_with(
            Arc::new(MemoryClipboard::new()),
            Arc::new(UniformMaskService::new(255)),
        );
        let err = session.reprocess(&ProcessOptions::default()).unwrap_err();
        assert_eq!(err, NoBgError::NoActiveSession);
    }

    #[test]
    fn test_reprocess_reuses_cached_bitmap() {
        let clipboard = Arc::new(MemoryClipboard::with_image(RgbaImage::from_pixel(
            3,
            3,
            Rgba([0, 128, 0, 255]),
        )));
        let inference = Arc::new(UniformMaskService::new(0));
        let session = session_with(Arc::clone(&clipboard), inference.clone());

        session
            .capture_and_process(&ProcessOptions::new(BackgroundSpec::White))
            .unwrap();
        clipboard.clear();

        let outcome = session
            .reprocess(&ProcessOptions::new(BackgroundSpec::Black))
            .unwrap();
        assert_eq!(clipboard.reads(), 1);
        assert_eq!(inference.calls(), 2);
        let pixels = outcome.image.to_rgba().unwrap();
        assert!(pixels.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_empty_clipboard_keeps_previous_cache() {
        let clipboard = Arc::new(MemoryClipboard::with_image(RgbaImage::new(2, 5)));
        let session = session_with(Arc::clone(&clipboard), Arc::new(UniformMaskService::new(255)));
        session.capture_and_process(&ProcessOptions::default()).unwrap();

        clipboard.clear();
        let err = session.capture_and_process(&ProcessOptions::default()).unwrap_err();
        assert!(matches!(err, NoBgError::NoClipboardImage(_)));
        assert_eq!(session.cached_dimensions(), Some((2, 5)));
    }

    #[test]
    fn test_failed_inference_still_caches_capture() {
        let clipboard = Arc::new(MemoryClipboard::with_image(RgbaImage::new(4, 4)));
        let session = session_with(clipboard, Arc::new(FailingInferenceService::new("busy")));
        assert!(session.capture_and_process(&ProcessOptions::default()).is_err());
        assert!(session.has_cached_image());
    }

    /// Blocks inside `read_image` until the test releases it
    struct GatedClipboard {
        image: RgbaImage,
        entered: Barrier,
        release: Barrier,
    }

    impl ClipboardProvider for GatedClipboard {
        fn read_image(&self) -> Result<RgbaImage> {
            self.entered.wait();
            self.release.wait();
            Ok(self.image.clone())
        }

        fn write_image(&self, _image: &RgbaImage) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_invalidate_during_capture_is_not_undone() {
        let clipboard = Arc::new(GatedClipboard {
            image: RgbaImage::new(3, 3),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        });
        let processor = SingleImageProcessor::new(
            Arc::new(ImageCrateCodec::default()),
            Arc::new(UniformMaskService::new(255)),
        );
        let session = ClipboardImageSession::new(
            processor,
            Arc::clone(&clipboard) as Arc<dyn ClipboardProvider>,
        );

        let outcome = std::thread::scope(|scope| {
            let capture = scope.spawn(|| session.capture_and_process(&ProcessOptions::default()));
            clipboard.entered.wait();
            session.invalidate();
            clipboard.release.wait();
            capture.join().unwrap()
        })
        .unwrap();

        assert!(!session.is_latest(outcome.generation));
        assert!(!session.has_cached_image());
        assert_eq!(
            session.reprocess(&ProcessOptions::default()).unwrap_err(),
            NoBgError::NoActiveSession
        );
    }

    #[test]
    fn test_latest_generation_wins() {
        let clipboard = Arc::new(MemoryClipboard::with_image(RgbaImage::new(2, 2)));
        let session = session_with(clipboard, Arc::new(UniformMaskService::new(255)));

        let first = session.capture_and_process(&ProcessOptions::default()).unwrap();
        let second = session
            .reprocess(&ProcessOptions::new(BackgroundSpec::White))
            .unwrap();
        assert!(!session.is_latest(first.generation));
        assert!(session.is_latest(second.generation));

        session.invalidate();
        assert!(!session.is_latest(second.generation));
        assert!(!session.has_cached_image());
        assert_eq!(
            session.reprocess(&ProcessOptions::default()).unwrap_err(),
            NoBgError::NoActiveSession
        );
    }
}
