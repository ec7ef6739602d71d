//! Error handling and edge case tests
//!
//! Failure paths surfaced through the public API: bad sources, broken
//! backends, missing clipboard content, invalid options and sink failures.

use image::{Rgba, RgbaImage};
use nobg::{
    backends::mock::{FailingInferenceService, MismatchedMaskService, UniformMaskService},
    services::{ImageCodec, ImageCrateCodec, MemoryClipboard},
    BackgroundRemover, BackgroundSpec, CodecConfig, ErrorKind, ImageSource, NoBgError,
    OutputFormat, ProcessOptions,
};
use std::sync::Arc;
use tempfile::TempDir;

fn remover(inference: Arc<dyn nobg::InferenceService>) -> BackgroundRemover {
    BackgroundRemover::builder()
        .inference(inference)
        .clipboard(Arc::new(MemoryClipboard::new()))
        .build()
        .unwrap()
}

#[test]
fn test_missing_file_is_unreadable() {
    let remover = remover(Arc::new(UniformMaskService::new(255)));
    let err = remover
        .process_single(
            &ImageSource::path("/definitely/not/here.png").unwrap(),
            &ProcessOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnreadableSource);
    assert!(err.to_string().contains("here.png"));
}

#[test]
fn test_corrupt_file_is_unreadable() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.jpg");
    std::fs::write(&path, b"definitely not a jpeg").unwrap();

    let remover = remover(Arc::new(UniformMaskService::new(255)));
    let err = remover
        .process_single(&ImageSource::path(&path).unwrap(), &ProcessOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnreadableSource);
}

#[test]
fn test_empty_path_is_rejected() {
    let err = ImageSource::path("").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnreadableSource);
}

#[test]
fn test_backend_failure_is_inference_failure() {
    let remover = remover(Arc::new(FailingInferenceService::new("session crashed")));
    let err = remover
        .process_single(
            &ImageSource::bitmap(RgbaImage::new(2, 2)),
            &ProcessOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InferenceFailure);
    assert!(err.to_string().contains("session crashed"));
}

#[test]
fn test_wrong_mask_size_surfaces_as_inference_failure() {
    let remover = remover(Arc::new(MismatchedMaskService));
    let err = remover
        .process_single(
            &ImageSource::bitmap(RgbaImage::new(4, 4)),
            &ProcessOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InferenceFailure);
}

#[test]
fn test_empty_clipboard() {
    let remover = remover(Arc::new(UniformMaskService::new(255)));
    let err = remover
        .capture_clipboard(&ProcessOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoClipboardImage);
    assert!(!remover.session().has_cached_image());
}

#[test]
fn test_reprocess_without_capture() {
    let remover = remover(Arc::new(UniformMaskService::new(255)));
    let err = remover
        .reprocess_clipboard(&ProcessOptions::default())
        .unwrap_err();
    assert_eq!(err, NoBgError::NoActiveSession);
}

#[test]
fn test_failed_capture_keeps_previous_image() {
    let clipboard = Arc::new(MemoryClipboard::with_image(RgbaImage::new(3, 2)));
    let remover = BackgroundRemover::builder()
        .inference(Arc::new(UniformMaskService::new(255)))
        .clipboard(Arc::clone(&clipboard) as Arc<dyn nobg::ClipboardProvider>)
        .build()
        .unwrap();

    remover.capture_clipboard(&ProcessOptions::default()).unwrap();
    clipboard.clear();
    assert!(remover.capture_clipboard(&ProcessOptions::default()).is_err());

    assert_eq!(remover.session().cached_dimensions(), Some((3, 2)));
    assert!(remover
        .reprocess_clipboard(&ProcessOptions::default())
        .is_ok());
}

#[test]
fn test_invalid_background_strings() {
    for input in ["", "plaid", "#12345", "#gggggg", "1,2", "1,2,300"] {
        let err = input.parse::<BackgroundSpec>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig, "input: {input:?}");
    }
}

#[test]
fn test_jpeg_quality_out_of_range() {
    let err = ProcessOptions::builder()
        .output_format(OutputFormat::Jpeg)
        .jpeg_quality(101)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[test]
fn test_zero_max_dimension_is_rejected() {
    let err = BackgroundRemover::builder()
        .inference(Arc::new(UniformMaskService::new(255)))
        .codec_config(CodecConfig { max_dimension: 0 })
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[test]
fn test_oversized_clipboard_image_is_downscaled() {
    let clipboard = Arc::new(MemoryClipboard::with_image(RgbaImage::from_pixel(
        400,
        100,
        Rgba([1, 2, 3, 255]),
    )));
    let remover = BackgroundRemover::builder()
        .inference(Arc::new(UniformMaskService::new(255)))
        .clipboard(clipboard)
        .codec_config(CodecConfig { max_dimension: 200 })
        .build()
        .unwrap();

    let outcome = remover.capture_clipboard(&ProcessOptions::default()).unwrap();
    assert_eq!(outcome.image.dimensions, (200, 50));
}

#[test]
fn test_sink_failure_reports_destination() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("taken");
    std::fs::write(&blocker, b"file, not a directory").unwrap();

    let remover = remover(Arc::new(UniformMaskService::new(255)));
    let result = remover
        .process_single(
            &ImageSource::bitmap(RgbaImage::new(1, 1)),
            &ProcessOptions::default(),
        )
        .unwrap();
    let err = remover
        .save_single(&result, &blocker.join("out.png"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SinkWriteFailure);
    assert!(err.to_string().contains("taken"));
}

#[test]
fn test_save_missing_batch_index() {
    let remover = remover(Arc::new(UniformMaskService::new(255)));
    assert!(remover
        .save_batch_item(0, std::path::Path::new("nowhere.png"))
        .is_err());
}

#[cfg(feature = "svg")]
#[test]
fn test_svg_input_is_rasterized() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("logo.svg");
    std::fs::write(
        &path,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10" fill="red"/></svg>"#,
    )
    .unwrap();
    assert!(nobg::services::is_supported(&path));

    let remover = remover(Arc::new(UniformMaskService::new(255)));
    let result = remover
        .process_single(&ImageSource::path(&path).unwrap(), &ProcessOptions::default())
        .unwrap();
    assert_eq!(result.dimensions, (2048, 2048));
    assert_eq!(
        result.to_rgba().unwrap().get_pixel(1024, 1024),
        &Rgba([255, 0, 0, 255])
    );
}

#[test]
fn test_malformed_svg_is_unreadable() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("logo.svg");
    std::fs::write(&path, b"<svg xmlns='http://www.w3.org/2000/svg'><rect").unwrap();

    let codec = ImageCrateCodec::new(CodecConfig::default());
    let err = codec.decode_path(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnreadableSource);
    assert!(err.to_string().contains("logo.svg"));
}

#[test]
fn test_single_pixel_image() {
    let remover = remover(Arc::new(UniformMaskService::new(0)));
    let result = remover
        .process_single(
            &ImageSource::bitmap(RgbaImage::from_pixel(1, 1, Rgba([9, 9, 9, 255]))),
            &ProcessOptions::new(BackgroundSpec::Black),
        )
        .unwrap();
    assert_eq!(result.dimensions, (1, 1));
    assert_eq!(
        result.to_rgba().unwrap().get_pixel(0, 0),
        &Rgba([0, 0, 0, 255])
    );
}
