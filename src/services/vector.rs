//! SVG rasterization through `resvg`

use crate::error::{NoBgError, Result};
use image::RgbaImage;
use resvg::{tiny_skia, usvg};

/// SVGs narrower than this are scaled up before rendering so the matting
/// model sees enough detail
pub const MIN_RASTER_WIDTH: f32 = 2048.0;

/// Upper bound on either side of the rendered pixmap
pub const MAX_RASTER_SIDE: u32 = 8192;

/// Render SVG `data` into a straight-alpha RGBA bitmap.
///
/// The drawing is scaled up to at least [`MIN_RASTER_WIDTH`] wide, never
/// down, and the scale is reduced when either side would exceed
/// [`MAX_RASTER_SIDE`].
///
/// # Errors
/// - `UnreadableSource` when the document does not parse, has a zero or
///   negative size, or cannot be rendered
pub fn rasterize_svg(data: &[u8], source_name: &str) -> Result<RgbaImage> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(data, &options)
        .map_err(|e| NoBgError::unreadable(source_name, format!("SVG parse error: {e}")))?;

    let size = tree.size();
    let (width, height) = (size.width(), size.height());
    if !(width > 0.0 && height > 0.0) {
        return Err(NoBgError::unreadable(
            source_name,
            "SVG has a zero or negative size",
        ));
    }

    let cap = MAX_RASTER_SIDE as f32;
    let scale = (MIN_RASTER_WIDTH / width)
        .max(1.0)
        .min(cap / width)
        .min(cap / height);
    let px_width = ((width * scale).round() as u32).clamp(1, MAX_RASTER_SIDE);
    let px_height = ((height * scale).round() as u32).clamp(1, MAX_RASTER_SIDE);

    let mut pixmap = tiny_skia::Pixmap::new(px_width, px_height).ok_or_else(|| {
        NoBgError::unreadable(
            source_name,
            format!("cannot allocate a {px_width}x{px_height} pixmap"),
        )
    })?;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    log::debug!("Rasterized {source_name} ({width}x{height}) to {px_width}x{px_height}");

    RgbaImage::from_raw(px_width, px_height, unpremultiply(pixmap.data()))
        .ok_or_else(|| NoBgError::unreadable(source_name, "rendered SVG has an unexpected size"))
}

/// tiny-skia stores premultiplied RGBA; the rest of the pipeline expects
/// straight alpha
fn unpremultiply(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|px| match *px {
            [r, g, b, a] if a > 0 => {
                let alpha = u32::from(a);
                let channel = |c: u8| ((u32::from(c) * 255 + alpha / 2) / alpha).min(255) as u8;
                [channel(r), channel(g), channel(b), a]
            },
            _ => [0, 0, 0, 0],
        })
        .collect()
}
