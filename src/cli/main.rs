//! Background removal CLI tool
//!
//! Command-line front end over [`BackgroundRemovalProcessor`]: single files, stdin/stdout
//! streaming and directory batches.

use super::config::CliConfigBuilder;
use crate::{
    config::OutputFormat,
    processor::BackgroundRemovalProcessor,
    services::{OutputFormatHandler, ProcessingStage, ProgressReporter, ProgressUpdate},
    types::{ProcessingTimings, RemovalResult},
    BgRemovalError,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Background removal CLI tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgcutout")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories (use "-" for stdin)
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<String>,

    /// Output file (single input) or directory (batch processing). Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// Mask construction strategy [default: auto]
    #[arg(short, long, value_enum)]
    pub strategy: Option<CliStrategy>,

    /// Quality mode for refinement and compositing [default: balanced]
    #[arg(short, long, value_enum)]
    pub quality: Option<CliQuality>,

    /// Aggressive external-mask handling (implies --quality mac-like)
    #[arg(long)]
    pub aggressive: bool,

    /// Flood-fill color tolerance
    #[arg(long)]
    pub tolerance: Option<f32>,

    /// Region-growing sensitivity (0.0-1.0)
    #[arg(long)]
    pub sensitivity: Option<f32>,

    /// Border-color distance threshold
    #[arg(long)]
    pub color_threshold: Option<f32>,

    /// Gaussian edge smoothing radius (0 disables)
    #[arg(long, value_name = "RADIUS")]
    pub edge_smooth: Option<u32>,

    /// Median filter passes for noise reduction
    #[arg(long, value_name = "PASSES")]
    pub noise_reduction: Option<u32>,

    /// Protect hair and other fine detail during refinement
    #[arg(long)]
    pub hair_protection: bool,

    /// Heuristic strategy used when the external segmenter fails [default: auto]
    #[arg(long, value_enum)]
    pub fallback: Option<CliStrategy>,

    /// External segmenter time budget in milliseconds [default: 30000]
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Path to an ONNX segmentation model for the external/hybrid strategies
    #[cfg(feature = "tract")]
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// JSON removal configuration; flags override its values
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Also write the refined mask as a grayscale PNG next to each output
    #[arg(long)]
    pub save_mask: bool,

    /// Print processing metadata as JSON to stderr
    #[arg(long)]
    pub metadata: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process directory recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pattern for batch processing (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Show per-stage progress for single inputs
    #[arg(long)]
    pub progress: bool,

    /// Plain log lines without colors
    #[arg(long)]
    pub compact_logs: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Webp,
    Tiff,
    Rgba8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliStrategy {
    Auto,
    BorderColor,
    FloodFill,
    RegionGrowing,
    ColorRange,
    GrabCut,
    External,
    Hybrid,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliQuality {
    Fast,
    Balanced,
    High,
    MacLike,
}

/// Stage progress rendered on an indicatif bar
struct IndicatifProgressReporter {
    bar: ProgressBar,
}

impl IndicatifProgressReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.bar.set_position(u64::from(update.progress));
        self.bar.set_message(update.description);
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        self.bar
            .finish_with_message(format!("Done in {}ms", timings.total_ms));
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar
            .abandon_with_message(format!("Failed during {}: {error}", stage.description()));
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    crate::tracing_config::init_cli_tracing(cli.verbose, cli.compact_logs)
        .context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    info!("Starting background removal");
    info!("Input(s): {}", cli.input.join(", "));
    info!(
        "Strategy: {}, quality: {}",
        config.strategy, config.quality_mode
    );

    let mut processor = BackgroundRemovalProcessor::new(config)?;
    if cli.progress && cli.input.len() == 1 {
        processor = processor.with_progress_reporter(Box::new(IndicatifProgressReporter::new()?));
    }
    processor = attach_segmenter(&cli, processor);

    if let Err(e) = processor.initialize().await {
        warn!("External segmenter unavailable, heuristic fallback will be used: {e}");
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight work");
            signal_token.cancel();
        }
    });

    let outcome = process_inputs(&cli, &processor, &cancel).await;

    if let Err(e) = processor.dispose().await {
        warn!("Failed to release segmenter: {e}");
    }

    let processed = outcome?;
    info!("Processed {processed} file(s)");
    Ok(())
}

#[cfg(feature = "tract")]
fn attach_segmenter(cli: &Cli, processor: BackgroundRemovalProcessor) -> BackgroundRemovalProcessor {
    use crate::segmenter::{tract::TractSegmenter, SegmenterHandle};

    match &cli.model {
        Some(path) => {
            info!("Using ONNX model: {}", path.display());
            let timeout = processor.config().segmenter_timeout();
            processor.with_segmenter(SegmenterHandle::new(TractSegmenter::new(path), timeout))
        },
        None => processor,
    }
}

#[cfg(not(feature = "tract"))]
fn attach_segmenter(_cli: &Cli, processor: BackgroundRemovalProcessor) -> BackgroundRemovalProcessor {
    processor
}

async fn process_inputs(
    cli: &Cli,
    processor: &BackgroundRemovalProcessor,
    cancel: &CancellationToken,
) -> Result<usize> {
    if cli.input.len() == 1 && cli.input.first().is_some_and(|s| s == "-") {
        return process_stdin(cli, processor, cancel).await;
    }

    let mut all_files = Vec::new();
    for input in &cli.input {
        let path = PathBuf::from(input);
        if path.is_file() {
            if is_image_file(&path) {
                all_files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            all_files.extend(find_image_files(&path, cli.recursive, cli.pattern.as_deref())?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    if all_files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(0);
    }

    // Sort for a stable processing order
    all_files.sort();
    let file_count = all_files.len();
    info!("Found {file_count} image file(s) to process");

    let output_dir = if file_count > 1 {
        prepare_output_dir(cli.output.as_deref())?
    } else {
        None
    };

    let batch_progress = if file_count > 1 {
        let pb = ProgressBar::new(file_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let format = processor.config().output_format;
    let mut processed_count = 0;
    let mut failed_count = 0;
    let batch_start_time = Instant::now();

    for input_file in &all_files {
        if cancel.is_cancelled() {
            warn!("Cancelled; skipping remaining files");
            break;
        }
        if let Some(ref pb) = batch_progress {
            pb.set_message(format!("Processing {}", input_file.display()));
        }

        let output_path = if file_count == 1 {
            cli.output
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| generate_output_path(input_file, format))
        } else {
            match &output_dir {
                Some(dir) => generate_output_path_with_dir(input_file, dir, format),
                None => generate_output_path(input_file, format),
            }
        };

        match process_single_file(cli, processor, input_file, &output_path, cancel).await {
            Ok(()) => {
                processed_count += 1;
                debug!(input = %input_file.display(), "processed");
            },
            Err(e) => {
                error!("Failed to process {}: {e:#}", input_file.display());
                failed_count += 1;
            },
        }

        if let Some(ref pb) = batch_progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = batch_progress {
        pb.finish_with_message(format!(
            "Completed! Processed: {processed_count}, Failed: {failed_count}"
        ));
    }

    if file_count > 1 {
        let total = batch_start_time.elapsed();
        info!("Batch processing summary:");
        info!("  Files processed: {processed_count}");
        info!("  Files failed: {failed_count}");
        info!("  Total time: {:.2}s", total.as_secs_f64());
    }

    if cancel.is_cancelled() {
        anyhow::bail!("Processing cancelled after {processed_count} file(s)");
    }
    if processed_count == 0 && failed_count > 0 {
        anyhow::bail!("All {failed_count} input(s) failed to process");
    }
    if failed_count > 0 {
        warn!("Some files failed to process. Processed: {processed_count}, Failed: {failed_count}");
    }
    Ok(processed_count)
}

fn prepare_output_dir(output: Option<&str>) -> Result<Option<PathBuf>> {
    let Some(output) = output else {
        return Ok(None);
    };
    let output_path = PathBuf::from(output);
    if output_path.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output_path.display()
        );
    }
    std::fs::create_dir_all(&output_path).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;
    Ok(Some(output_path))
}

async fn process_single_file(
    cli: &Cli,
    processor: &BackgroundRemovalProcessor,
    input_path: &Path,
    output_path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = processor
        .process_file(input_path, cancel)
        .await
        .with_context(|| format!("Failed to process {}", input_path.display()))?;

    report_result(cli, &result)?;

    let format = processor.config().output_format;
    if output_path == Path::new("-") {
        write_stdout(&result.to_bytes(format)?)?;
    } else {
        result
            .save(output_path, format)
            .with_context(|| format!("Failed to save {}", output_path.display()))?;
        info!(
            "Saved {} ({}x{}, {}ms)",
            output_path.display(),
            result.metadata.dimensions.0,
            result.metadata.dimensions.1,
            result.metadata.timings.total_ms
        );
        if cli.save_mask {
            let mask_path = mask_output_path(output_path);
            result
                .save_mask(&mask_path)
                .with_context(|| format!("Failed to save mask {}", mask_path.display()))?;
        }
    }
    Ok(())
}

/// Process image from stdin
async fn process_stdin(
    cli: &Cli,
    processor: &BackgroundRemovalProcessor,
    cancel: &CancellationToken,
) -> Result<usize> {
    info!("Reading image from stdin");
    let image_data = read_stdin()?;

    let result = match processor.process_bytes(&image_data, cancel).await {
        Ok(result) => result,
        Err(BgRemovalError::Cancelled) => anyhow::bail!("Processing cancelled"),
        Err(e) => return Err(e).context("Failed to process stdin image"),
    };
    report_result(cli, &result)?;

    let format = processor.config().output_format;
    match cli.output.as_deref() {
        None | Some("-") => write_stdout(&result.to_bytes(format)?)?,
        Some(path) => {
            result
                .save(path, format)
                .with_context(|| format!("Failed to save {path}"))?;
            if cli.save_mask {
                result.save_mask(mask_output_path(Path::new(path)))?;
            }
        },
    }
    Ok(1)
}

fn report_result(cli: &Cli, result: &RemovalResult) -> Result<()> {
    if let Some(reason) = &result.metadata.degraded {
        warn!(
            "External segmenter failed ({reason}); used {} instead",
            result.metadata.strategy
        );
    }
    if cli.metadata {
        let json = serde_json::to_string_pretty(&result.metadata)
            .context("Failed to serialize metadata")?;
        eprintln!("{json}");
    }
    Ok(())
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read from stdin")?;
    if buffer.is_empty() {
        anyhow::bail!("No data received from stdin");
    }
    Ok(buffer)
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(data).context("Failed to write to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Find all decodable images in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let path = entry.path();
                if is_image_file(path) && matches_pattern(path, pattern) {
                    files.push(path.to_path_buf());
                }
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if is_image_file(&path) && matches_pattern(&path, pattern) {
                    files.push(path);
                }
            }
        }
    }

    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    crate::services::ImageIOService::is_supported_input(path)
}

fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

/// `<dir>/<stem>_cutout.<ext>` next to the input
fn generate_output_path(input_path: &Path, format: OutputFormat) -> PathBuf {
    let dir = input_path.parent().unwrap_or(Path::new("."));
    generate_output_path_with_dir(input_path, dir, format)
}

fn generate_output_path_with_dir(input_path: &Path, output_dir: &Path, format: OutputFormat) -> PathBuf {
    let stem = input_path.file_stem().unwrap_or_default();
    output_dir.join(format!(
        "{}_cutout.{}",
        stem.to_string_lossy(),
        OutputFormatHandler::get_extension(format)
    ))
}

fn mask_output_path(output_path: &Path) -> PathBuf {
    let stem = output_path.file_stem().unwrap_or_default();
    let dir = output_path.parent().unwrap_or(Path::new("."));
    dir.join(format!("{}_mask.png", stem.to_string_lossy()))
}
