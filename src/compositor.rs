//! Alpha compositing of a matted image against a background treatment

use crate::{
    config::BackgroundSpec,
    error::{NoBgError, Result},
    types::SegmentationMask,
};
use image::{Rgba, RgbaImage};

/// Pure compositing stage: (pixels, mask, background) -> pixels.
pub struct BackgroundCompositor;

impl BackgroundCompositor {
    /// Composite `image` against `spec` using `mask` as the foreground weight.
    ///
    /// - `Transparent`: RGB is copied unchanged and alpha is the mask value
    ///   (straight, not premultiplied).
    /// - Any opaque background: each channel is
    ///   `mask * source + (1 - mask) * background`, rounded half-up, and
    ///   alpha is 255.
    ///
    /// # Errors
    /// - `DimensionMismatch` when mask and image sizes differ
    pub fn composite(
        image: &RgbaImage,
        mask: &SegmentationMask,
        spec: BackgroundSpec,
    ) -> Result<RgbaImage> {
        let dimensions = image.dimensions();
        if mask.dimensions != dimensions {
            return Err(NoBgError::DimensionMismatch {
                image: dimensions,
                mask: mask.dimensions,
            });
        }

        let mut output = RgbaImage::new(dimensions.0, dimensions.1);
        let pixels = image.pixels().zip(mask.data.iter().copied());

        match spec.rgb() {
            None => {
                for (out, (src, alpha)) in output.pixels_mut().zip(pixels) {
                    *out = Rgba([src[0], src[1], src[2], alpha]);
                }
            },
            Some([r, g, b]) => {
                for (out, (src, alpha)) in output.pixels_mut().zip(pixels) {
                    *out = Rgba([
                        blend_channel(src[0], r, alpha),
                        blend_channel(src[1], g, alpha),
                        blend_channel(src[2], b, alpha),
                        255,
                    ]);
                }
            },
        }

        Ok(output)
    }
}

/// `alpha/255 * fg + (1 - alpha/255) * bg`, rounded half-up, in exact integer math
#[must_use]
pub fn blend_channel(fg: u8, bg: u8, alpha: u8) -> u8 {
    let alpha = u32::from(alpha);
    let numerator = alpha * u32::from(fg) + (255 - alpha) * u32::from(bg);
    // floor(numerator / 255 + 1/2)
    ((2 * numerator + 255) / 510) as u8
}
