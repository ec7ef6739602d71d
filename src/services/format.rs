//! Output format handling
//!
//! Format-specific conversions and naming, kept apart from the encoders.

use crate::config::{BackgroundSpec, OutputFormat};
use image::{DynamicImage, RgbaImage};

/// Conversions and metadata per [`OutputFormat`]
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert a composited RGBA buffer into the pixel layout the format
    /// stores. JPEG drops the alpha channel; the others keep RGBA.
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage, format: OutputFormat) -> DynamicImage {
        match format {
            OutputFormat::Png | OutputFormat::Tiff | OutputFormat::WebP => {
                DynamicImage::ImageRgba8(rgba_image)
            },
            OutputFormat::Jpeg => DynamicImage::ImageRgba8(rgba_image).to_rgb8().into(),
        }
    }

    /// File extension (without the dot)
    ///
    /// ```rust
    /// use nobg::{config::OutputFormat, services::OutputFormatHandler};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
        }
    }

    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jpeg)
    }

    /// Warn when a transparent result is requested in a format that cannot
    /// carry it. Returns `false` in that case.
    pub fn validate_for_background(format: OutputFormat, background: BackgroundSpec) -> bool {
        if background.is_opaque() || Self::supports_transparency(format) {
            return true;
        }
        log::warn!(
            "Output format {format} does not support transparency; the mask will be lost. \
             Pick an opaque background or a format with alpha."
        );
        false
    }
}
