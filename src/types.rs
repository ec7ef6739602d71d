//! Core types: image sources, soft masks, encoded payloads and timings

use crate::{
    config::OutputFormat,
    error::{NoBgError, Result},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{GrayImage, ImageBuffer, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where an image comes from.
///
/// Exactly one origin is populated per request: either a filesystem path or
/// an already-decoded bitmap (clipboard or dropped data).
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Image file on disk
    Path(PathBuf),
    /// In-memory RGBA bitmap
    Bitmap(Arc<RgbaImage>),
}

impl ImageSource {
    /// Path source; rejects an empty path
    ///
    /// # Errors
    /// - Empty path
    pub fn path<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(NoBgError::unreadable("<empty path>", "source path is empty"));
        }
        Ok(Self::Path(path))
    }

    /// Bitmap source
    #[must_use]
    pub fn bitmap(image: RgbaImage) -> Self {
        Self::Bitmap(Arc::new(image))
    }

    /// Display name: the final path segment, or a fixed marker for bitmaps
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(path) => display_name_for(path),
            Self::Bitmap(_) => CLIPBOARD_SOURCE_NAME.to_string(),
        }
    }
}

/// Display name used for bitmap-origin sources
pub const CLIPBOARD_SOURCE_NAME: &str = "clipboard";

/// Final path segment of `path`, falling back to the whole path
#[must_use]
pub fn display_name_for(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or_else(|| path.display().to_string(), str::to_string)
}

/// Soft foreground mask.
///
/// Values are fixed-point soft alpha: 0 is pure background, 255 is pure
/// foreground. Stored row-major, one byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255)
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a mask, checking that the buffer length matches the dimensions
    ///
    /// # Errors
    /// - Buffer length differs from `width * height`
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(NoBgError::inference(format!(
                "mask buffer holds {} values, {}x{} needs {expected}",
                data.len(),
                dimensions.0,
                dimensions.1
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Mask with the same value everywhere
    #[must_use]
    pub fn uniform(width: u32, height: u32, value: u8) -> Self {
        Self {
            data: vec![value; width as usize * height as usize],
            dimensions: (width, height),
        }
    }

    /// Build a mask from normalized values in [0, 1]; out-of-range input is clamped
    ///
    /// # Errors
    /// - Buffer length differs from `width * height`
    pub fn from_normalized(values: &[f32], dimensions: (u32, u32)) -> Result<Self> {
        let data = values
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        Self::new(data, dimensions)
    }

    /// Create mask from a grayscale image
    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.as_raw().clone(),
            dimensions: (width, height),
        }
    }

    /// Convert mask to a grayscale image
    ///
    /// # Errors
    /// - Internal buffer inconsistent with the dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone())
            .ok_or_else(|| NoBgError::inference("mask buffer does not match its dimensions"))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Mask value at `(x, y)`, `None` outside the mask
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.dimensions.0 || y >= self.dimensions.1 {
            return None;
        }
        self.data
            .get(y as usize * self.dimensions.0 as usize + x as usize)
            .copied()
    }

    /// Resize the mask to new dimensions
    ///
    /// # Errors
    /// - Internal buffer inconsistent with the dimensions
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<Self> {
        if self.dimensions == (new_width, new_height) {
            return Ok(self.clone());
        }
        let resized = image::imageops::resize(
            &self.to_image()?,
            new_width,
            new_height,
            image::imageops::FilterType::Lanczos3,
        );
        Ok(Self::from_image(&resized))
    }

    /// Soften edges with a 3x3 Gaussian kernel, clamping at the borders
    #[must_use]
    pub fn feathered(&self) -> Self {
        const KERNEL: [[u32; 3]; 3] = [[1, 2, 1], [2, 4, 2], [1, 2, 1]];
        let (width, height) = self.dimensions;
        if width == 0 || height == 0 {
            return self.clone();
        }

        let mut out = GrayImage::new(width, height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let mut sum = 0u32;
            for (ky, row) in KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    let sx = (i64::from(x) + kx as i64 - 1).clamp(0, i64::from(width) - 1) as u32;
                    let sy = (i64::from(y) + ky as i64 - 1).clamp(0, i64::from(height) - 1) as u32;
                    sum += weight * u32::from(self.get(sx, sy).unwrap_or(0));
                }
            }
            *pixel = Luma([((sum + 8) / 16) as u8]);
        }
        Self::from_image(&out)
    }
}

/// Encoded result payload, ready for transport, saving or copying.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    /// Encoded bytes in `format`
    pub bytes: Vec<u8>,
    /// Encoding of `bytes`
    pub format: OutputFormat,
    /// Pixel dimensions (width, height)
    pub dimensions: (u32, u32),
    /// Stage timings of the run that produced this payload
    pub timings: ProcessingTimings,
}

const DATA_URL_PREFIX: &str = "data:";
const DATA_URL_BASE64_MARKER: &str = ";base64,";

impl EncodedImage {
    #[must_use]
    pub fn new(bytes: Vec<u8>, format: OutputFormat, dimensions: (u32, u32)) -> Self {
        Self {
            bytes,
            format,
            dimensions,
            timings: ProcessingTimings::default(),
        }
    }

    /// Embeddable `data:<mime>;base64,...` URL
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!(
            "{DATA_URL_PREFIX}{}{DATA_URL_BASE64_MARKER}{}",
            self.format.mime_type(),
            STANDARD.encode(&self.bytes)
        )
    }

    /// Parse a data URL produced by [`EncodedImage::to_data_url`].
    ///
    /// Dimensions are read back from the image header.
    ///
    /// # Errors
    /// - Not a base64 data URL, unknown MIME type, or undecodable content
    pub fn from_data_url(data_url: &str) -> Result<Self> {
        let rest = data_url
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| NoBgError::unreadable("data URL", "missing 'data:' prefix"))?;
        let (mime, payload) = rest
            .split_once(DATA_URL_BASE64_MARKER)
            .ok_or_else(|| NoBgError::unreadable("data URL", "payload is not base64"))?;
        let format = OutputFormat::from_mime_type(mime)
            .ok_or_else(|| NoBgError::unreadable("data URL", format!("unsupported MIME type '{mime}'")))?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| NoBgError::unreadable("data URL", format!("invalid base64: {e}")))?;

        let dimensions = image::ImageReader::new(std::io::Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| NoBgError::unreadable("data URL", e.to_string()))?
            .into_dimensions()
            .map_err(|e| NoBgError::unreadable("data URL", e.to_string()))?;

        Ok(Self::new(bytes, format, dimensions))
    }

    /// Decode the payload back to RGBA pixels
    ///
    /// # Errors
    /// - Payload is not a decodable image
    pub fn to_rgba(&self) -> Result<RgbaImage> {
        image::load_from_memory(&self.bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| NoBgError::unreadable("encoded result", e.to_string()))
    }

    /// Encoded size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Per-stage timings in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Reading and decoding the source
    pub decode_ms: u64,
    /// Mask inference
    pub inference_ms: u64,
    /// Compositing against the background
    pub composite_ms: u64,
    /// Encoding the result
    pub encode_ms: u64,
    /// End to end
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Share of the total spent in inference (0.0 when nothing was timed)
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_is_rejected() {
        let err = ImageSource::path("").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnreadableSource);
    }

    #[test]
    fn test_display_name_uses_final_segment() {
        let source = ImageSource::path("/photos/2024/cat.jpeg").unwrap();
        assert_eq!(source.display_name(), "cat.jpeg");
        assert_eq!(
            ImageSource::bitmap(RgbaImage::new(1, 1)).display_name(),
            CLIPBOARD_SOURCE_NAME
        );
    }

    #[test]
    fn test_mask_length_is_checked() {
        assert!(SegmentationMask::new(vec![0; 5], (2, 2)).is_err());
        assert!(SegmentationMask::new(vec![0; 4], (2, 2)).is_ok());
    }

    #[test]
    fn test_mask_from_normalized_clamps() {
        let mask = SegmentationMask::from_normalized(&[-0.5, 0.0, 0.5, 1.5], (2, 2)).unwrap();
        assert_eq!(mask.data, vec![0, 0, 128, 255]);
    }

    #[test]
    fn test_mask_get_bounds() {
        let mask = SegmentationMask::new(vec![1, 2, 3, 4], (2, 2)).unwrap();
        assert_eq!(mask.get(1, 1), Some(4));
        assert_eq!(mask.get(2, 0), None);
    }

    #[test]
    fn test_feathering_keeps_uniform_masks() {
        let mask = SegmentationMask::uniform(5, 4, 200);
        assert_eq!(mask.feathered(), mask);
    }

    #[test]
    fn test_feathering_softens_a_step() {
        let mut data = vec![0u8; 16];
        for y in 0..4 {
            for x in 2..4 {
                data[y * 4 + x] = 255;
            }
        }
        let mask = SegmentationMask::new(data, (4, 4)).unwrap().feathered();
        let left_edge = mask.get(1, 1).unwrap();
        let right_edge = mask.get(2, 1).unwrap();
        assert!(left_edge > 0 && left_edge < 255);
        assert!(right_edge > 0 && right_edge < 255);
        assert_eq!(mask.get(0, 0), Some(0));
        assert_eq!(mask.get(3, 0), Some(255));
    }

    #[test]
    fn test_mask_resize_to_same_size_is_identity() {
        let mask = SegmentationMask::new(vec![10, 20, 30, 40], (2, 2)).unwrap();
        assert_eq!(mask.resize(2, 2).unwrap(), mask);
        assert_eq!(mask.resize(4, 3).unwrap().dimensions, (4, 3));
    }

    #[test]
    fn test_data_url_round_trip() {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(RgbaImage::new(3, 2))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let encoded = EncodedImage::new(bytes, OutputFormat::Png, (3, 2));

        let url = encoded.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));

        let parsed = EncodedImage::from_data_url(&url).unwrap();
        assert_eq!(parsed.bytes, encoded.bytes);
        assert_eq!(parsed.dimensions, (3, 2));
        assert_eq!(parsed.to_rgba().unwrap().dimensions(), (3, 2));
    }

    #[test]
    fn test_data_url_rejects_foreign_input() {
        assert!(EncodedImage::from_data_url("http://example.com/a.png").is_err());
        assert!(EncodedImage::from_data_url("data:text/plain;base64,aGk=").is_err());
        assert!(EncodedImage::from_data_url("data:image/png;base64,@@@").is_err());
    }
}
