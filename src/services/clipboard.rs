//! Clipboard access
//!
//! [`SystemClipboard`] talks to the OS clipboard through `arboard`;
//! [`MemoryClipboard`] is an in-process stand-in for headless use and tests.

use crate::error::{NoBgError, Result};
use image::RgbaImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Source and destination for clipboard bitmaps
pub trait ClipboardProvider: Send + Sync {
    /// Current clipboard image as straight-alpha RGBA
    ///
    /// # Errors
    /// - `NoClipboardImage` when the clipboard is empty or holds no image
    fn read_image(&self) -> Result<RgbaImage>;

    /// Replace the clipboard contents with `image`
    ///
    /// # Errors
    /// - `SinkWriteFailure` when the clipboard rejects the write
    fn write_image(&self, image: &RgbaImage) -> Result<()>;
}

/// Clipboard held in memory
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    image: Mutex<Option<RgbaImage>>,
    reads: AtomicUsize,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_image(image: RgbaImage) -> Self {
        Self {
            image: Mutex::new(Some(image)),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn set_image(&self, image: RgbaImage) {
        *self.lock() = Some(image);
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Copy of the current contents
    #[must_use]
    pub fn image(&self) -> Option<RgbaImage> {
        self.lock().clone()
    }

    /// Number of `read_image` calls so far
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<RgbaImage>> {
        self.image
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ClipboardProvider for MemoryClipboard {
    fn read_image(&self) -> Result<RgbaImage> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .clone()
            .ok_or_else(|| NoBgError::no_clipboard_image("clipboard is empty"))
    }

    fn write_image(&self, image: &RgbaImage) -> Result<()> {
        self.set_image(image.clone());
        Ok(())
    }
}

/// OS clipboard
#[cfg(feature = "clipboard")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    fn open() -> Result<arboard::Clipboard> {
        arboard::Clipboard::new()
            .map_err(|e| NoBgError::no_clipboard_image(format!("clipboard unavailable: {e}")))
    }

    /// Clipboard text that names an existing image file
    fn image_from_text_path(clipboard: &mut arboard::Clipboard) -> Option<RgbaImage> {
        let text = clipboard.get_text().ok()?;
        let path = std::path::Path::new(text.trim());
        if !path.is_file() {
            return None;
        }
        log::debug!("Clipboard text names a file, loading {}", path.display());
        image::open(path).ok().map(|img| img.to_rgba8())
    }
}

#[cfg(feature = "clipboard")]
impl ClipboardProvider for SystemClipboard {
    fn read_image(&self) -> Result<RgbaImage> {
        let mut clipboard = Self::open()?;
        match clipboard.get_image() {
            Ok(data) => RgbaImage::from_raw(
                data.width as u32,
                data.height as u32,
                data.bytes.into_owned(),
            )
            .ok_or_else(|| NoBgError::no_clipboard_image("clipboard image has an invalid size")),
            Err(err) => Self::image_from_text_path(&mut clipboard)
                .ok_or_else(|| NoBgError::no_clipboard_image(err.to_string())),
        }
    }

    fn write_image(&self, image: &RgbaImage) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| NoBgError::sink_write("clipboard", e))?;
        let data = arboard::ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: std::borrow::Cow::Borrowed(image.as_raw()),
        };
        clipboard
            .set_image(data)
            .map_err(|e| NoBgError::sink_write("clipboard", e))
    }
}
