//! Conversion of CLI arguments into library configuration

use crate::cli::main_impl::{Cli, CliOutputFormat};
use crate::config::{BackgroundSpec, OutputFormat, ProcessOptions};
use anyhow::{Context, Result};

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `ProcessOptions` from CLI arguments
    pub(crate) fn process_options(cli: &Cli) -> Result<ProcessOptions> {
        let background: BackgroundSpec = cli
            .background
            .parse()
            .with_context(|| format!("Invalid --background value '{}'", cli.background))?;

        ProcessOptions::builder()
            .background(background)
            .output_format(Self::output_format(cli.format))
            .jpeg_quality(cli.jpeg_quality)
            .feather_edges(cli.feather)
            .build()
            .context("Invalid configuration")
    }

    pub(crate) fn output_format(format: CliOutputFormat) -> OutputFormat {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            CliOutputFormat::Webp => OutputFormat::WebP,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
        }
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.input.is_empty() && !cli.clipboard {
            anyhow::bail!("Provide at least one input or use --clipboard");
        }
        if cli.clipboard && !cli.input.is_empty() {
            anyhow::bail!("--clipboard cannot be combined with input paths");
        }
        if cli.copy && cli.input.len() > 1 {
            anyhow::bail!("--copy needs a single result");
        }
        Self::process_options(cli)?;
        Ok(())
    }
}
