//! Single-image pipeline: decode, infer, composite, encode

use crate::{
    compositor::BackgroundCompositor,
    config::ProcessOptions,
    error::Result,
    inference::InferenceService,
    services::{ImageCodec, OutputFormatHandler},
    types::{EncodedImage, ImageSource, ProcessingTimings},
};
use image::RgbaImage;
use instant::Instant;
use std::sync::Arc;
use tracing::{debug, info, instrument, span, Level};

/// Drives one image through the pipeline.
///
/// Stateless and cheap to clone; clones share the codec and inference
/// service, so concurrent calls on distinct inputs never interfere.
#[derive(Clone)]
pub struct SingleImageProcessor {
    codec: Arc<dyn ImageCodec>,
    inference: Arc<dyn InferenceService>,
}

impl std::fmt::Debug for SingleImageProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleImageProcessor")
            .field("inference", &self.inference.name())
            .finish_non_exhaustive()
    }
}

impl SingleImageProcessor {
    #[must_use]
    pub fn new(codec: Arc<dyn ImageCodec>, inference: Arc<dyn InferenceService>) -> Self {
        Self { codec, inference }
    }

    #[must_use]
    pub fn codec(&self) -> &Arc<dyn ImageCodec> {
        &self.codec
    }

    #[must_use]
    pub fn inference(&self) -> &Arc<dyn InferenceService> {
        &self.inference
    }

    /// Run the full pipeline for `source`.
    ///
    /// # Errors
    /// - `UnreadableSource` when the source cannot be read or decoded
    /// - `InferenceFailure` when no usable mask is produced
    /// - `EncodeFailure` when the result cannot be encoded
    #[instrument(
        name = "process",
        skip(self, source, options),
        fields(source = %source.display_name(), background = %options.background)
    )]
    pub fn process(&self, source: &ImageSource, options: &ProcessOptions) -> Result<EncodedImage> {
        let total_start = Instant::now();
        let decode_start = Instant::now();
        let image = self.decode(source)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut encoded = self.process_decoded(&image, options)?;
        encoded.timings.decode_ms = decode_ms;
        encoded.timings.total_ms = total_start.elapsed().as_millis() as u64;

        info!(
            width = encoded.dimensions.0,
            height = encoded.dimensions.1,
            total_ms = encoded.timings.total_ms,
            "Processed {}",
            source.display_name()
        );
        Ok(encoded)
    }

    /// Decode `source` into the RGBA buffer the rest of the pipeline uses
    ///
    /// # Errors
    /// - `UnreadableSource` when the source cannot be read or decoded
    pub fn decode(&self, source: &ImageSource) -> Result<RgbaImage> {
        let _span = span!(Level::DEBUG, "decode", source = %source.display_name()).entered();
        match source {
            ImageSource::Path(path) => self.codec.decode_path(path),
            ImageSource::Bitmap(bitmap) => Ok(self.codec.prepare(bitmap.as_ref().clone())),
        }
    }

    /// Infer, composite and encode an already-decoded image
    ///
    /// # Errors
    /// - `InferenceFailure` when no usable mask is produced
    /// - `EncodeFailure` when the result cannot be encoded
    pub fn process_decoded(
        &self,
        image: &RgbaImage,
        options: &ProcessOptions,
    ) -> Result<EncodedImage> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        OutputFormatHandler::validate_for_background(options.output_format, options.background);

        let mask = {
            let _span = span!(
                Level::INFO,
                "inference",
                backend = %self.inference.name(),
                width = image.width(),
                height = image.height()
            )
            .entered();
            let start = Instant::now();
            let mask = self.inference.infer(image)?;
            timings.inference_ms = start.elapsed().as_millis() as u64;
            if options.feather_edges {
                mask.feathered()
            } else {
                mask
            }
        };

        let composited = {
            let _span = span!(Level::DEBUG, "composite", background = %options.background).entered();
            let start = Instant::now();
            let composited = BackgroundCompositor::composite(image, &mask, options.background)
                .map_err(crate::error::NoBgError::into_inference_failure)?;
            timings.composite_ms = start.elapsed().as_millis() as u64;
            composited
        };

        let bytes = {
            let _span = span!(Level::DEBUG, "encode", format = %options.output_format).entered();
            let start = Instant::now();
            let bytes = self.codec.encode(&composited, options)?;
            timings.encode_ms = start.elapsed().as_millis() as u64;
            bytes
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!(
            inference_ms = timings.inference_ms,
            composite_ms = timings.composite_ms,
            encode_ms = timings.encode_ms,
            "Pipeline stages complete"
        );

        let mut encoded = EncodedImage::new(bytes, options.output_format, composited.dimensions());
        encoded.timings = timings;
        Ok(encoded)
    }
}
