//! Image decoding and encoding
//!
//! Keeps file and byte I/O out of the processing pipeline so the pipeline
//! can be driven entirely from memory in tests.

use crate::{
    config::{CodecConfig, OutputFormat, ProcessOptions},
    error::{NoBgError, Result},
    services::format::OutputFormatHandler,
};
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use std::path::Path;

/// File extensions accepted as decode input
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "bmp", "gif", "tif", "tiff", "ico", "tga", "pnm", "pbm", "pgm",
    "ppm", "hdr", "ff", "qoi", "svg",
];

/// Extensions of vector formats that need a rasterizer
const VECTOR_EXTENSIONS: &[&str] = &["svg"];

/// Check if a file path has a supported image extension (case-insensitive).
///
/// Vector extensions only count when the `svg` feature is enabled.
pub fn is_supported<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    let listed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    listed && (cfg!(feature = "svg") || !is_vector(path))
}

fn is_vector(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VECTOR_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Whether `bytes` look like an SVG document rather than a raster format
fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = bytes.get(..512).unwrap_or(bytes);
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

/// Decoder/encoder collaborator used by the processing pipeline.
///
/// Decoders return straight-alpha RGBA. Implementations must be usable from
/// several batch workers at once.
pub trait ImageCodec: Send + Sync {
    /// Read and decode the image at `path`
    ///
    /// # Errors
    /// - `UnreadableSource` when the file is missing, corrupt or unsupported
    fn decode_path(&self, path: &Path) -> Result<RgbaImage>;

    /// Decode in-memory image bytes; `source_name` is used in errors
    ///
    /// # Errors
    /// - `UnreadableSource` when the bytes are not a supported image
    fn decode_bytes(&self, bytes: &[u8], source_name: &str) -> Result<RgbaImage>;

    /// Bring an already-decoded bitmap (clipboard, drag data) to the same
    /// shape `decode_*` would produce
    fn prepare(&self, image: RgbaImage) -> RgbaImage {
        image
    }

    /// Encode a composited RGBA buffer per `options`
    ///
    /// # Errors
    /// - `EncodeFailure` when the encoder rejects the buffer
    fn encode(&self, image: &RgbaImage, options: &ProcessOptions) -> Result<Vec<u8>>;
}

/// [`ImageCodec`] backed by the `image` crate
#[derive(Debug, Clone, Default)]
pub struct ImageCrateCodec {
    config: CodecConfig,
}

impl ImageCrateCodec {
    #[must_use]
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Shrink `image` so that neither side exceeds `max_dimension`,
    /// preserving the aspect ratio. Smaller images are returned untouched.
    #[must_use]
    pub fn smart_downscale(image: RgbaImage, max_dimension: u32) -> RgbaImage {
        let (width, height) = image.dimensions();
        if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
            return image;
        }

        let scale = f64::from(max_dimension) / f64::from(width.max(height));
        let new_width = ((f64::from(width) * scale).round() as u32).clamp(1, max_dimension);
        let new_height = ((f64::from(height) * scale).round() as u32).clamp(1, max_dimension);
        log::info!("Downscaling {width}x{height} input to {new_width}x{new_height}");
        image::imageops::resize(&image, new_width, new_height, FilterType::Lanczos3)
    }

    #[cfg(feature = "svg")]
    fn decode_vector(&self, data: &[u8], source_name: &str) -> Result<RgbaImage> {
        let raster = crate::services::vector::rasterize_svg(data, source_name)?;
        Ok(self.prepare(raster))
    }

    #[cfg(not(feature = "svg"))]
    fn decode_vector(&self, _data: &[u8], source_name: &str) -> Result<RgbaImage> {
        Err(NoBgError::unreadable(
            source_name,
            "SVG input requires the 'svg' feature",
        ))
    }
}

impl ImageCodec for ImageCrateCodec {
    fn decode_path(&self, path: &Path) -> Result<RgbaImage> {
        if !path.exists() {
            return Err(NoBgError::unreadable(
                path.display().to_string(),
                "file does not exist",
            ));
        }
        if is_vector(path) {
            let data = std::fs::read(path).map_err(|e| {
                NoBgError::unreadable(path.display().to_string(), format!("read failed: {e}"))
            })?;
            return self.decode_vector(&data, &path.display().to_string());
        }

        // Extension first, then sniff the content in case the extension lies
        let decoded = match image::open(path) {
            Ok(img) => img,
            Err(extension_err) => {
                log::debug!(
                    "Extension-based loading failed for {}: {extension_err}. Attempting content-based detection.",
                    path.display()
                );
                let data = std::fs::read(path).map_err(|e| {
                    NoBgError::unreadable(path.display().to_string(), format!("read failed: {e}"))
                })?;
                image::load_from_memory(&data)
                    .map_err(|_| NoBgError::image_load_error(path, &extension_err))?
            },
        };

        Ok(self.prepare(decoded.to_rgba8()))
    }

    fn decode_bytes(&self, bytes: &[u8], source_name: &str) -> Result<RgbaImage> {
        if looks_like_svg(bytes) {
            return self.decode_vector(bytes, source_name);
        }
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| NoBgError::unreadable(source_name, e.to_string()))?;
        Ok(self.prepare(decoded.to_rgba8()))
    }

    fn prepare(&self, image: RgbaImage) -> RgbaImage {
        Self::smart_downscale(image, self.config.max_dimension)
    }

    fn encode(&self, image: &RgbaImage, options: &ProcessOptions) -> Result<Vec<u8>> {
        let format = options.output_format;
        let converted = OutputFormatHandler::convert_format(image.clone(), format);
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        match format {
            OutputFormat::Png => converted
                .write_to(&mut cursor, image::ImageFormat::Png)
                .map_err(|e| NoBgError::encode(format!("Failed to encode PNG: {e}")))?,
            OutputFormat::Tiff => converted
                .write_to(&mut cursor, image::ImageFormat::Tiff)
                .map_err(|e| NoBgError::encode(format!("Failed to encode TIFF: {e}")))?,
            OutputFormat::Jpeg => {
                let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                    &mut cursor,
                    options.jpeg_quality,
                );
                converted
                    .write_with_encoder(encoder)
                    .map_err(|e| NoBgError::encode(format!("Failed to encode JPEG: {e}")))?;
            },
            OutputFormat::WebP => encode_webp(&converted, &mut cursor)?,
        }

        log::debug!(
            "Encoded {}x{} result as {format} ({} bytes)",
            image.width(),
            image.height(),
            buffer.len()
        );
        Ok(buffer)
    }
}

#[cfg(feature = "webp-support")]
fn encode_webp(image: &DynamicImage, cursor: &mut std::io::Cursor<&mut Vec<u8>>) -> Result<()> {
    let encoder = image::codecs::webp::WebPEncoder::new_lossless(cursor);
    image
        .write_with_encoder(encoder)
        .map_err(|e| NoBgError::encode(format!("Failed to encode WebP: {e}")))
}

#[cfg(not(feature = "webp-support"))]
fn encode_webp(_image: &DynamicImage, _cursor: &mut std::io::Cursor<&mut Vec<u8>>) -> Result<()> {
    Err(NoBgError::encode(
        "WebP output requires the 'webp-support' feature",
    ))
}
