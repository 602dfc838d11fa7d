//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::PipelineConfig;
use crate::services::ResultFormatHandler;
use anyhow::{Context, Result};

/// Convert CLI arguments to a `PipelineConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the pipeline configuration
    ///
    /// Starts from `--config` when given, otherwise from defaults, then
    /// applies `--endpoint` and `--timeout` on top.
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let mut config = match &cli.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(endpoint) = &cli.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(timeout) = cli.timeout {
            config.request_timeout_secs = timeout;
        }

        config.validate().context("Invalid pipeline configuration")?;
        Ok(config)
    }

    /// Validate CLI arguments that are not part of the pipeline configuration
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if !(0.0..=100.0).contains(&cli.split) {
            anyhow::bail!("Split must be between 0 and 100, got {}", cli.split);
        }
        if cli.timeout == Some(0) {
            anyhow::bail!("Timeout must be at least 1 second");
        }
        if let (Some(compare), Some(output)) = (&cli.compare, &cli.output) {
            if compare == output {
                anyhow::bail!("--compare and --output must be different files");
            }
        }
        Ok(())
    }

    /// Warning for a processed image whose format cannot carry transparency
    pub(crate) fn opacity_warning(mime_type: &str) -> Option<String> {
        (!ResultFormatHandler::supports_transparency(mime_type)).then(|| {
            format!("Processed image is {mime_type}, which has no alpha channel; the removed background will be opaque")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bg-reveal").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["photo.jpg"]);
        assert_eq!(cli.split, 50.0);
        CliConfigBuilder::validate_cli(&cli).unwrap();

        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cli = parse(&[
            "photo.jpg",
            "--endpoint",
            "https://example.com/remove",
            "--timeout",
            "30",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.endpoint, "https://example.com/remove");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.png", "--split", "120"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.png", "--timeout", "0"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&[
            "a.png", "-o", "same.png", "--compare", "same.png"
        ]))
        .is_err());
        assert!(CliConfigBuilder::from_cli(&parse(&["a.png", "--endpoint", "nope"])).is_err());
    }

    #[test]
    fn test_config_file_is_layered_under_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{"endpoint":"https://file.example/api","settle_delay_ms":100}"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(path),
            ..parse(&["a.png", "--timeout", "5"])
        };
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.endpoint, "https://file.example/api");
        assert_eq!(config.settle_delay_ms, 100);
        assert_eq!(config.request_timeout_secs, 5);

        let missing = Cli {
            config: Some(PathBuf::from("/nonexistent/pipeline.json")),
            ..parse(&["a.png"])
        };
        assert!(CliConfigBuilder::from_cli(&missing).is_err());
    }

    #[test]
    fn test_opacity_warning() {
        assert!(CliConfigBuilder::opacity_warning("image/png").is_none());
        assert!(CliConfigBuilder::opacity_warning("image/webp").is_none());
        let warning = CliConfigBuilder::opacity_warning("image/jpeg").unwrap();
        assert!(warning.contains("image/jpeg"));
    }
}
