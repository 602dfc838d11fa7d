//! Background removal reveal CLI tool
//!
//! Uploads one image to the remote endpoint, shows the synthetic progress,
//! saves the processed image and optionally a before/after composite.

use super::config::CliConfigBuilder;
use crate::{
    backends::HttpBackend,
    intake::SelectedFile,
    services::ConsoleProgressReporter,
    session::SessionState,
    shell::{PresentationShell, LOADING_MESSAGE},
    tracing_config::init_cli_tracing,
};
use anyhow::{Context, Result};
use clap::Parser;
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Remove an image background remotely and compare the result
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bg-reveal")]
pub struct Cli {
    /// Input image (PNG, JPG or WEBP, up to 10MB)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Where to save the processed image [default: removed-bg-hd.<ext>]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Also save a before/after composite to this path
    #[arg(long, value_name = "PATH")]
    pub compare: Option<PathBuf>,

    /// Divider position of the composite, in percent
    #[arg(long, value_name = "PERCENT", default_value_t = 50.0)]
    pub split: f64,

    /// Remote processing endpoint
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Pipeline configuration file (JSON)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    info!("Endpoint: {}", config.endpoint);
    let backend = HttpBackend::new(&config).context("Failed to create HTTP backend")?;
    let shell = PresentationShell::new(config, Arc::new(backend))
        .context("Failed to create presentation shell")?
        .with_reporter(Arc::new(ConsoleProgressReporter::new(cli.verbose > 0)));

    let file = SelectedFile::from_path(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let start_time = Instant::now();
    let (bar, watcher) = spawn_progress_bar(shell.subscribe());
    let result = shell.submit(Some(file)).await;
    watcher.abort();

    if let Err(err) = result {
        bar.abandon_with_message(err.user_message());
        return Err(anyhow::Error::new(err).context("Background removal failed"));
    }
    bar.finish_with_message("Done");

    let artifact = shell
        .download()
        .context("No processed image available")?;
    if let Some(warning) = CliConfigBuilder::opacity_warning(&artifact.mime_type) {
        warn!("{warning}");
    }
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&artifact.file_name));
    artifact
        .write_to(&output)
        .await
        .context("Failed to save processed image")?;
    info!("Saved {} ({} bytes)", output.display(), artifact.bytes.len());

    if let Some(compare) = &cli.compare {
        shell.set_split(cli.split);
        let composite = shell
            .render_comparison()
            .context("Failed to render comparison")?
            .context("No comparison available")?;
        DynamicImage::ImageRgba8(composite)
            .to_rgb8()
            .save(compare)
            .with_context(|| format!("Failed to save comparison to {}", compare.display()))?;
        info!("Saved comparison {} (split {:.0}%)", compare.display(), cli.split);
    }

    info!(
        "Processed {} in {:.2}s",
        cli.input.display(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Progress bar following the session's synthetic progress
fn spawn_progress_bar(mut updates: watch::Receiver<SessionState>) -> (ProgressBar, JoinHandle<()>) {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.set_message(LOADING_MESSAGE);

    let follower = bar.clone();
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let (progress, status) = {
                let state = updates.borrow_and_update();
                (state.progress, state.status)
            };
            follower.set_position(u64::from(progress));
            if status.is_terminal() {
                break;
            }
        }
    });

    (bar, watcher)
}
