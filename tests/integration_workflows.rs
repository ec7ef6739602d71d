//! Integration tests for complete background removal workflows
//!
//! These tests drive the public API end to end with mock inference
//! services, so no model file is needed.

use futures::StreamExt;
use image::{ImageFormat, Rgba, RgbaImage};
use nobg::{
    backends::mock::{FailOnDimensions, FnMaskService, UniformMaskService},
    services::MemoryClipboard,
    BackgroundRemover, BackgroundSpec, EncodedImage, ErrorKind, ImageSource, ItemStatus,
    OutputFormat, ProcessOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Write a solid-colour PNG and return its path
fn write_png(dir: &Path, name: &str, width: u32, height: u32, colour: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(width, height, Rgba(colour))
        .save_with_format(&path, ImageFormat::Png)
        .expect("Failed to write test image");
    path
}

fn remover_with(
    inference: Arc<dyn nobg::InferenceService>,
    clipboard: Arc<MemoryClipboard>,
) -> BackgroundRemover {
    BackgroundRemover::builder()
        .inference(inference)
        .clipboard(clipboard)
        .max_workers(2)
        .build()
        .expect("Failed to build remover")
}

#[test]
fn test_single_image_white_background() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_png(temp_dir.path(), "cat.png", 4, 2, [200, 100, 50, 255]);

    // Left half foreground, right half background
    let inference = Arc::new(FnMaskService::new(|x, _, _| if x < 2 { 255 } else { 0 }));
    let remover = remover_with(inference, Arc::new(MemoryClipboard::new()));

    let options = ProcessOptions::new(BackgroundSpec::White);
    let result = remover
        .process_single(&ImageSource::path(&input).unwrap(), &options)
        .unwrap();
    assert_eq!(result.format, OutputFormat::Png);
    assert_eq!(result.dimensions, (4, 2));

    let pixels = result.to_rgba().unwrap();
    assert_eq!(pixels.get_pixel(0, 0), &Rgba([200, 100, 50, 255]));
    assert_eq!(pixels.get_pixel(3, 1), &Rgba([255, 255, 255, 255]));

    let destination = temp_dir.path().join("out").join("cat_nobg.png");
    let written = remover.save_single(&result, &destination).unwrap();
    assert_eq!(written, destination);
    assert_eq!(std::fs::read(&written).unwrap(), result.bytes);
}

#[test]
fn test_transparent_background_keeps_colour_and_uses_mask_as_alpha() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_png(temp_dir.path(), "dog.png", 3, 3, [10, 20, 30, 255]);
    let remover = remover_with(
        Arc::new(UniformMaskService::new(128)),
        Arc::new(MemoryClipboard::new()),
    );

    let result = remover
        .process_single(
            &ImageSource::path(&input).unwrap(),
            &ProcessOptions::default(),
        )
        .unwrap();
    let pixels = result.to_rgba().unwrap();
    assert!(pixels.pixels().all(|p| *p == Rgba([10, 20, 30, 128])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batch_with_missing_file_reports_one_error() {
    let temp_dir = TempDir::new().unwrap();
    let paths = vec![
        write_png(temp_dir.path(), "a.png", 2, 2, [1, 2, 3, 255]),
        temp_dir.path().join("missing.png"),
        write_png(temp_dir.path(), "c.png", 3, 1, [4, 5, 6, 255]),
    ];
    let remover = remover_with(
        Arc::new(UniformMaskService::new(255)),
        Arc::new(MemoryClipboard::new()),
    );

    let (run, mut events) = remover
        .process_batch(paths, ProcessOptions::default())
        .unwrap();
    assert_eq!(run.total(), 3);
    assert!(run
        .initial_items()
        .iter()
        .all(|item| item.status == ItemStatus::Processing));

    let mut seen = Vec::new();
    while let Some(event) = events.next().await {
        assert_eq!(event.total, 3);
        seen.push(event);
    }
    assert_eq!(seen.len(), 3);

    let failures: Vec<_> = seen.iter().filter(|e| !e.is_success()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 1);
    assert_eq!(failures[0].name, "missing.png");
    assert_eq!(
        failures[0].error.as_ref().map(nobg::NoBgError::kind),
        Some(ErrorKind::UnreadableSource)
    );

    let summary = run.summary();
    assert_eq!(summary.done, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.is_complete());
    assert_eq!(run.results().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batch_inference_failure_is_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let paths = vec![
        write_png(temp_dir.path(), "ok.png", 2, 2, [9, 9, 9, 255]),
        write_png(temp_dir.path(), "bad.png", 5, 5, [9, 9, 9, 255]),
    ];
    let inference = Arc::new(FailOnDimensions::new(UniformMaskService::new(255), 5, 5));
    let remover = remover_with(inference, Arc::new(MemoryClipboard::new()));

    let (run, events) = remover
        .process_batch(paths, ProcessOptions::default())
        .unwrap();
    let events: Vec<_> = events.collect().await;
    assert_eq!(events.len(), 2);

    let bad = run.item(1).unwrap();
    assert_eq!(bad.status, ItemStatus::Error);
    assert_eq!(
        bad.error.as_ref().map(nobg::NoBgError::kind),
        Some(ErrorKind::InferenceFailure)
    );
    assert!(bad.result.is_none());
    assert_eq!(run.item(0).unwrap().status, ItemStatus::Done);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_save_all_writes_every_result() {
    let temp_dir = TempDir::new().unwrap();
    let paths = vec![
        write_png(temp_dir.path(), "one.png", 2, 2, [1, 1, 1, 255]),
        write_png(temp_dir.path(), "two.png", 2, 2, [2, 2, 2, 255]),
    ];
    let remover = remover_with(
        Arc::new(UniformMaskService::new(255)),
        Arc::new(MemoryClipboard::new()),
    );

    let options = ProcessOptions::builder()
        .background(BackgroundSpec::Black)
        .output_format(OutputFormat::Jpeg)
        .build()
        .unwrap();
    let (_run, events) = remover.process_batch(paths, options).unwrap();
    let _: Vec<_> = events.collect().await;

    let out_dir = temp_dir.path().join("exports");
    let outcomes = remover.save_all_batch(&out_dir).unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(nobg::SaveOutcome::is_ok));
    assert!(out_dir.join("one_nobg.jpg").is_file());
    assert!(out_dir.join("two_nobg.jpg").is_file());

    let single = remover
        .save_batch_item(0, &temp_dir.path().join("picked.jpg"))
        .unwrap();
    assert!(single.is_file());
}

#[test]
fn test_save_all_without_batch_is_rejected() {
    let remover = remover_with(
        Arc::new(UniformMaskService::new(255)),
        Arc::new(MemoryClipboard::new()),
    );
    let err = remover.save_all_batch(Path::new("unused")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[test]
fn test_clipboard_capture_then_reprocess() {
    let clipboard = Arc::new(MemoryClipboard::with_image(RgbaImage::from_pixel(
        2,
        2,
        Rgba([50, 60, 70, 255]),
    )));
    let inference = Arc::new(UniformMaskService::new(0));
    let remover = remover_with(inference.clone(), Arc::clone(&clipboard));

    let first = remover
        .capture_clipboard(&ProcessOptions::default())
        .unwrap();
    assert!(first
        .image
        .to_rgba()
        .unwrap()
        .pixels()
        .all(|p| p[3] == 0));

    // Reprocessing uses the cached bitmap, not a fresh clipboard read
    clipboard.clear();
    let second = remover
        .reprocess_clipboard(&ProcessOptions::new(BackgroundSpec::Color {
            r: 0,
            g: 0,
            b: 255,
        }))
        .unwrap();
    assert!(second.generation > first.generation);
    assert!(remover.session().is_latest(second.generation));
    assert!(second
        .image
        .to_rgba()
        .unwrap()
        .pixels()
        .all(|p| *p == Rgba([0, 0, 255, 255])));
    assert_eq!(clipboard.reads(), 1);
    assert_eq!(inference.calls(), 2);
}

#[test]
fn test_copy_to_clipboard_round_trips_pixels() {
    let clipboard = Arc::new(MemoryClipboard::new());
    let remover = remover_with(
        Arc::new(UniformMaskService::new(255)),
        Arc::clone(&clipboard),
    );

    let source = RgbaImage::from_pixel(3, 2, Rgba([7, 8, 9, 255]));
    let result = remover
        .process_single(&ImageSource::bitmap(source.clone()), &ProcessOptions::default())
        .unwrap();
    remover.copy_to_clipboard(&result).unwrap();
    assert_eq!(clipboard.image(), Some(source));
}

#[test]
fn test_data_url_transport() {
    let remover = remover_with(
        Arc::new(UniformMaskService::new(255)),
        Arc::new(MemoryClipboard::new()),
    );
    let result = remover
        .process_single(
            &ImageSource::bitmap(RgbaImage::new(2, 2)),
            &ProcessOptions::default(),
        )
        .unwrap();

    let url = result.to_data_url();
    assert!(url.starts_with("data:image/png;base64,"));
    let decoded = EncodedImage::from_data_url(&url).unwrap();
    assert_eq!(decoded.bytes, result.bytes);
    assert_eq!(decoded.format, OutputFormat::Png);
}
