//! nobg CLI
//!
//! Single files are processed directly; several files or a folder run as a
//! batch with a progress bar. `--clipboard` processes the clipboard image.

use super::backend_factory::{CliBackend, CliBackendFactory};
use super::config::CliConfigBuilder;
use crate::{
    batch::{BatchProgressEvent, BatchRun, ItemStatus},
    config::ProcessOptions,
    remover::BackgroundRemover,
    services::{codec::is_supported, suggested_file_name},
    tracing_config::{init_cli_tracing, TracingFormat},
    types::{EncodedImage, ImageSource},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Remove image backgrounds
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "nobg")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories
    #[arg(value_name = "INPUT")]
    pub input: Vec<String>,

    /// Output file (single input) or directory (several inputs)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// Background: transparent, white, black, #rrggbb or r,g,b
    #[arg(short, long, default_value = "transparent")]
    pub background: String,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 90)]
    pub jpeg_quality: u8,

    /// Soften mask edges before compositing
    #[arg(long)]
    pub feather: bool,

    /// Inference backend
    #[arg(long, value_enum, default_value_t = CliBackend::Onnx)]
    pub backend: CliBackend,

    /// Path to the RMBG-1.4 ONNX model [default: ./model.onnx]
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Inference threads per model session (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Images processed concurrently in a batch (0 = available parallelism)
    #[arg(short, long, default_value_t = 0)]
    pub workers: usize,

    /// Process the image currently on the clipboard
    #[arg(long)]
    pub clipboard: bool,

    /// Copy the result to the clipboard
    #[arg(long)]
    pub copy: bool,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Print one JSON object per result on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[cfg(feature = "tracing-json")]
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
    Tiff,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose, tracing_format(&cli)).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let options = CliConfigBuilder::process_options(&cli)?;

    let inference = CliBackendFactory::create(cli.backend, cli.model.as_deref(), cli.threads)?;
    info!(backend = %inference.name(), background = %options.background, "Starting nobg");

    let remover = Arc::new(
        BackgroundRemover::builder()
            .inference(inference)
            .max_workers(cli.workers)
            .build()
            .context("Failed to create background remover")?,
    );

    let start_time = Instant::now();
    let processed = if cli.clipboard {
        process_clipboard(&cli, &remover, options).await?
    } else {
        process_inputs(&cli, &remover, options).await?
    };

    info!(
        "Processed {} image(s) in {:.2}s",
        processed,
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

#[cfg_attr(not(feature = "tracing-json"), allow(unused_variables))]
fn tracing_format(cli: &Cli) -> TracingFormat {
    #[cfg(feature = "tracing-json")]
    if cli.log_json {
        return TracingFormat::Json;
    }
    TracingFormat::Console
}

async fn process_clipboard(
    cli: &Cli,
    remover: &Arc<BackgroundRemover>,
    options: ProcessOptions,
) -> Result<usize> {
    let worker = Arc::clone(remover);
    let outcome = tokio::task::spawn_blocking(move || worker.capture_clipboard(&options))
        .await
        .context("Clipboard worker failed")?
        .context("Failed to process the clipboard image")?;

    let destination = match &cli.output {
        Some(output) => PathBuf::from(output),
        None => PathBuf::from(suggested_file_name(None, &outcome.image)),
    };
    finish_single(cli, remover, &outcome.image, "clipboard", &destination)?;
    Ok(1)
}

async fn process_inputs(
    cli: &Cli,
    remover: &Arc<BackgroundRemover>,
    options: ProcessOptions,
) -> Result<usize> {
    let (mut files, saw_directory) = collect_inputs(&cli.input, cli.recursive)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(0);
    }

    if files.len() > 1 || saw_directory {
        return process_batch(cli, remover, files, options).await;
    }

    let file = files.swap_remove(0);
    let destination = single_destination(cli.output.as_deref(), &file, &options);
    let source = ImageSource::path(file.clone())?;
    let worker = Arc::clone(remover);
    let result = tokio::task::spawn_blocking(move || worker.process_single(&source, &options))
        .await
        .context("Image worker failed")?
        .with_context(|| format!("Failed to process {}", file.display()))?;
    let name = crate::types::display_name_for(&file);
    finish_single(cli, remover, &result, &name, &destination)?;
    Ok(1)
}

async fn process_batch(
    cli: &Cli,
    remover: &BackgroundRemover,
    files: Vec<PathBuf>,
    options: ProcessOptions,
) -> Result<usize> {
    let output_dir = match &cli.output {
        Some(output) => {
            let dir = PathBuf::from(output);
            if dir.is_file() {
                anyhow::bail!(
                    "Output path exists and is a file, not a directory: {}",
                    dir.display()
                );
            }
            Some(dir)
        },
        None => None,
    };

    info!("Found {} image file(s) to process", files.len());
    let (run, mut events) = remover.process_batch(files, options)?;

    let progress = (!cli.json).then(|| ProgressBar::new(run.total() as u64));
    if let Some(pb) = &progress {
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
    }

    while let Some(event) = events.next().await {
        if let Some(pb) = &progress {
            pb.inc(1);
            pb.set_message(event.name.clone());
            if let Some(error) = &event.error {
                pb.println(format!("✗ {}: {error}", event.name));
            }
        }
        if cli.json {
            println!("{}", event_json(&event));
        }
    }
    if let Some(pb) = &progress {
        pb.finish_with_message("done");
    }

    save_batch(remover, &run, output_dir.as_deref())?;

    let summary = run.summary();
    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "run_id": run.run_id().to_string(),
                "started_at": run.started_at().to_rfc3339(),
                "summary": summary,
            })
        );
    }
    if summary.failed > 0 {
        anyhow::bail!("{} of {} image(s) failed", summary.failed, summary.total);
    }
    Ok(summary.done)
}

/// Save every finished item into `output_dir`, or next to its source
fn save_batch(remover: &BackgroundRemover, run: &BatchRun, output_dir: Option<&Path>) -> Result<()> {
    if let Some(dir) = output_dir {
        for outcome in remover.save_all_batch(dir)? {
            if let Err(e) = outcome.result {
                warn!("Failed to save {}: {e}", outcome.name);
            }
        }
        return Ok(());
    }

    for item in run.items() {
        if item.status != ItemStatus::Done {
            continue;
        }
        let Some(unit) = run.result(item.index) else {
            continue;
        };
        let destination = item
            .source_path
            .parent()
            .unwrap_or(Path::new("."))
            .join(unit.suggested_file_name());
        if let Err(e) = remover.save_batch_item(item.index, &destination) {
            warn!("Failed to save {}: {e}", item.name);
        }
    }
    Ok(())
}

fn finish_single(
    cli: &Cli,
    remover: &BackgroundRemover,
    image: &EncodedImage,
    name: &str,
    destination: &Path,
) -> Result<()> {
    let written = remover
        .save_single(image, destination)
        .with_context(|| format!("Failed to save {}", destination.display()))?;
    if cli.copy {
        remover
            .copy_to_clipboard(image)
            .context("Failed to copy the result to the clipboard")?;
        debug!("Copied result to the clipboard");
    }

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "name": name,
                "status": ItemStatus::Done,
                "output": written.display().to_string(),
                "bytes": image.len(),
                "timings": image.timings,
            })
        );
    } else {
        println!("✓ {name} → {}", written.display());
    }
    Ok(())
}

fn event_json(event: &BatchProgressEvent) -> serde_json::Value {
    serde_json::json!({
        "index": event.index,
        "total": event.total,
        "name": event.name,
        "status": event.status(),
        "bytes": event.result.as_ref().map(|image| image.len()),
        "error": event.error.as_ref().map(ToString::to_string),
        "error_kind": event.error.as_ref().map(crate::error::NoBgError::kind),
    })
}

/// Destination for a single-file run: `--output` (file, or directory to
/// place the suggested name in), else next to the input
fn single_destination(output: Option<&str>, input: &Path, options: &ProcessOptions) -> PathBuf {
    let file_name = || {
        let placeholder = EncodedImage::new(Vec::new(), options.output_format, (0, 0));
        suggested_file_name(Some(input), &placeholder)
    };
    match output {
        Some(output) => {
            let path = PathBuf::from(output);
            if path.is_dir() {
                path.join(file_name())
            } else {
                path
            }
        },
        None => input.parent().unwrap_or(Path::new(".")).join(file_name()),
    }
}

/// Expand inputs into a sorted list of supported image files. The flag
/// reports whether any input was a directory.
fn collect_inputs(inputs: &[String], recursive: bool) -> Result<(Vec<PathBuf>, bool)> {
    let mut files = Vec::new();
    let mut saw_directory = false;

    for input in inputs {
        let path = PathBuf::from(input);
        if path.is_file() {
            if is_supported(&path) {
                files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            saw_directory = true;
            files.extend(find_image_files(&path, recursive)?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    files.sort();
    files.dedup();
    Ok((files, saw_directory))
}

fn find_image_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
