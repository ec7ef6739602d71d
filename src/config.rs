//! Configuration types for background removal operations

use crate::error::{NoBgError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Background treatment applied to the matted result.
///
/// Serialized with an internal `type` tag so front ends can send
/// `{ "type": "White" }` or `{ "type": "Color", "r": 12, "g": 34, "b": 56 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackgroundSpec {
    /// Keep the source colours and write the mask into the alpha channel
    #[default]
    Transparent,
    /// Flatten onto opaque white
    White,
    /// Flatten onto opaque black
    Black,
    /// Flatten onto an arbitrary opaque colour
    Color { r: u8, g: u8, b: u8 },
}

impl BackgroundSpec {
    /// Background colour for the flattening variants, `None` for `Transparent`
    #[must_use]
    pub fn rgb(&self) -> Option<[u8; 3]> {
        match *self {
            Self::Transparent => None,
            Self::White => Some([255, 255, 255]),
            Self::Black => Some([0, 0, 0]),
            Self::Color { r, g, b } => Some([r, g, b]),
        }
    }

    /// Whether the composited output is fully opaque
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.rgb().is_some()
    }
}

impl std::fmt::Display for BackgroundSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transparent => write!(f, "transparent"),
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
            Self::Color { r, g, b } => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

impl FromStr for BackgroundSpec {
    type Err = NoBgError;

    /// Accepts `transparent`, `white`, `black`, `#rrggbb`, `rrggbb` or `r,g,b`
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "transparent" | "none" => return Ok(Self::Transparent),
            "white" => return Ok(Self::White),
            "black" => return Ok(Self::Black),
            _ => {},
        }

        if value.contains(',') {
            let channels: Vec<u8> = value
                .split(',')
                .map(|c| c.trim().parse::<u8>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| {
                    NoBgError::invalid_config(format!("Invalid RGB triple '{s}': {e}"))
                })?;
            return match channels.as_slice() {
                [r, g, b] => Ok(Self::Color {
                    r: *r,
                    g: *g,
                    b: *b,
                }),
                _ => Err(NoBgError::invalid_config(format!(
                    "Expected three channels in '{s}', got {}",
                    channels.len()
                ))),
            };
        }

        let hex = value.strip_prefix('#').unwrap_or(&value);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(NoBgError::invalid_config(format!(
                "Unknown background '{s}' (expected transparent, white, black, #rrggbb or r,g,b)"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| NoBgError::invalid_config(format!("Invalid hex colour '{s}'")))
        };
        Ok(Self::Color {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency; alpha is dropped)
    Jpeg,
    /// Lossless WebP with alpha channel transparency
    WebP,
    /// TIFF with alpha channel transparency
    Tiff,
}

impl OutputFormat {
    /// MIME type used when the payload is embedded as a data URL
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Tiff => "image/tiff",
        }
    }

    /// Reverse of [`OutputFormat::mime_type`]
    #[must_use]
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            "image/tiff" => Some(Self::Tiff),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::WebP => write!(f, "webp"),
            Self::Tiff => write!(f, "tiff"),
        }
    }
}

/// Per-request processing options.
///
/// New fields must carry a default so that existing callers (and serialized
/// requests that omit them) keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessOptions {
    /// Background treatment for the composite
    pub background: BackgroundSpec,
    /// Encoding of the returned payload
    pub output_format: OutputFormat,
    /// JPEG quality (0-100), ignored by other formats
    pub jpeg_quality: u8,
    /// Soften the mask with a 3x3 Gaussian before compositing
    pub feather_edges: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            background: BackgroundSpec::Transparent,
            output_format: OutputFormat::Png,
            jpeg_quality: 90,
            feather_edges: false,
        }
    }
}

impl ProcessOptions {
    /// Options with the given background and defaults for everything else
    #[must_use]
    pub fn new(background: BackgroundSpec) -> Self {
        Self {
            background,
            ..Self::default()
        }
    }

    /// Create a new options builder
    #[must_use]
    pub fn builder() -> ProcessOptionsBuilder {
        ProcessOptionsBuilder::new()
    }
}

/// Builder for `ProcessOptions`
#[derive(Debug, Default)]
pub struct ProcessOptionsBuilder {
    options: ProcessOptions,
}

impl ProcessOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn background(mut self, background: BackgroundSpec) -> Self {
        self.options.background = background;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.options.output_format = format;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.options.jpeg_quality = quality;
        self
    }

    #[must_use]
    pub fn feather_edges(mut self, feather: bool) -> Self {
        self.options.feather_edges = feather;
        self
    }

    /// Build the options
    ///
    /// # Errors
    /// - JPEG quality above 100
    pub fn build(self) -> Result<ProcessOptions> {
        if self.options.jpeg_quality > 100 {
            return Err(NoBgError::invalid_config(format!(
                "JPEG quality must be 0-100, got {}",
                self.options.jpeg_quality
            )));
        }
        Ok(self.options)
    }
}

/// Batch coordinator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Maximum number of items processed concurrently (0 = auto-detect)
    pub max_workers: usize,
}

impl CoordinatorConfig {
    #[must_use]
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self { max_workers }
    }

    /// Worker count actually used for a run
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.max_workers > 0 {
            self.max_workers
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(1)
        }
    }
}

/// Decoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Decoded images wider or taller than this are downscaled before
    /// inference, preserving aspect ratio
    pub max_dimension: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { max_dimension: 4096 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_parse_named() {
        assert_eq!(
            "transparent".parse::<BackgroundSpec>().unwrap(),
            BackgroundSpec::Transparent
        );
        assert_eq!("White".parse::<BackgroundSpec>().unwrap(), BackgroundSpec::White);
        assert_eq!(" black ".parse::<BackgroundSpec>().unwrap(), BackgroundSpec::Black);
    }

    #[test]
    fn test_background_parse_colours() {
        let expected = BackgroundSpec::Color {
            r: 0x12,
            g: 0xab,
            b: 0xff,
        };
        assert_eq!("#12abff".parse::<BackgroundSpec>().unwrap(), expected);
        assert_eq!("12ABFF".parse::<BackgroundSpec>().unwrap(), expected);
        assert_eq!("18, 171, 255".parse::<BackgroundSpec>().unwrap(), expected);
    }

    #[test]
    fn test_background_parse_rejects_garbage() {
        assert!("#12ab".parse::<BackgroundSpec>().is_err());
        assert!("purple".parse::<BackgroundSpec>().is_err());
        assert!("1,2".parse::<BackgroundSpec>().is_err());
        assert!("1,2,300".parse::<BackgroundSpec>().is_err());
    }

    #[test]
    fn test_background_display_round_trips() {
        let spec = BackgroundSpec::Color { r: 1, g: 2, b: 3 };
        assert_eq!(spec.to_string(), "#010203");
        assert_eq!(spec.to_string().parse::<BackgroundSpec>().unwrap(), spec);
    }

    #[test]
    fn test_background_wire_format() {
        let json = serde_json::to_string(&BackgroundSpec::Color { r: 1, g: 2, b: 3 }).unwrap();
        assert_eq!(json, r#"{"type":"Color","r":1,"g":2,"b":3}"#);

        let parsed: BackgroundSpec = serde_json::from_str(r#"{"type":"White"}"#).unwrap();
        assert_eq!(parsed, BackgroundSpec::White);
    }

    #[test]
    fn test_background_defaults_to_transparent() {
        assert_eq!(BackgroundSpec::default(), BackgroundSpec::Transparent);
        assert!(!BackgroundSpec::Transparent.is_opaque());
        assert_eq!(BackgroundSpec::Black.rgb(), Some([0, 0, 0]));
    }

    #[test]
    fn test_process_options_accepts_partial_requests() {
        let options: ProcessOptions =
            serde_json::from_str(r#"{"background":{"type":"Black"}}"#).unwrap();
        assert_eq!(options.background, BackgroundSpec::Black);
        assert_eq!(options.output_format, OutputFormat::Png);
        assert_eq!(options.jpeg_quality, 90);
    }

    #[test]
    fn test_process_options_builder_validates_quality() {
        assert!(ProcessOptions::builder().jpeg_quality(101).build().is_err());

        let options = ProcessOptions::builder()
            .background(BackgroundSpec::White)
            .output_format(OutputFormat::Jpeg)
            .jpeg_quality(75)
            .build()
            .unwrap();
        assert_eq!(options.background, BackgroundSpec::White);
        assert_eq!(options.output_format, OutputFormat::Jpeg);
        assert_eq!(options.jpeg_quality, 75);
    }

    #[test]
    fn test_coordinator_workers() {
        assert_eq!(CoordinatorConfig::with_max_workers(3).effective_workers(), 3);
        assert!(CoordinatorConfig::default().effective_workers() >= 1);
    }

    #[test]
    fn test_mime_round_trip() {
        for format in [
            OutputFormat::Png,
            OutputFormat::Jpeg,
            OutputFormat::WebP,
            OutputFormat::Tiff,
        ] {
            assert_eq!(OutputFormat::from_mime_type(format.mime_type()), Some(format));
        }
    }
}
