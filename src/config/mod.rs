mod file_config;

pub use file_config::{ExtractionConfig, FileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub uploads_dir: PathBuf,
    pub retain_uploads: bool,
    pub max_upload_size_mb: usize,
    pub classifier_path: PathBuf,
    pub selector_path: PathBuf,
    pub ffmpeg_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 443,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::Path,
            uploads_dir: PathBuf::from("uploads"),
            retain_uploads: true,
            max_upload_size_mb: 512,
            classifier_path: PathBuf::from("model/dog_bark_classifier.json"),
            selector_path: PathBuf::from("model/rfe_selector.json"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub uploads_dir: PathBuf,
    pub retain_uploads: bool,
    pub max_upload_size_mb: usize,

    // Model artifacts
    pub classifier_path: PathBuf,
    pub selector_path: PathBuf,

    // Audio extraction
    pub ffmpeg_path: PathBuf,
    pub extraction: ExtractionSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    pub sample_rate: u32,
    pub timeout_sec: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            timeout_sec: 300,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let host = file.host.unwrap_or_else(|| cli.host.clone());
        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let uploads_dir = file
            .uploads_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.uploads_dir.clone());
        if uploads_dir.exists() && !uploads_dir.is_dir() {
            bail!("uploads_dir is not a directory: {:?}", uploads_dir);
        }

        let retain_uploads = file.retain_uploads.unwrap_or(cli.retain_uploads);

        let max_upload_size_mb = file.max_upload_size_mb.unwrap_or(cli.max_upload_size_mb);
        if max_upload_size_mb == 0 {
            bail!("max_upload_size_mb must be greater than 0");
        }

        let classifier_path = file
            .classifier_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.classifier_path.clone());
        if !classifier_path.is_file() {
            bail!("Classifier artifact not found: {:?}", classifier_path);
        }

        let selector_path = file
            .selector_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.selector_path.clone());
        if !selector_path.is_file() {
            bail!("Feature selector artifact not found: {:?}", selector_path);
        }

        let ffmpeg_path = file
            .ffmpeg_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.ffmpeg_path.clone());

        // Extraction settings - merge file config with defaults
        let extraction_file = file.extraction.unwrap_or_default();
        let defaults = ExtractionSettings::default();
        let extraction = ExtractionSettings {
            sample_rate: extraction_file.sample_rate.unwrap_or(defaults.sample_rate),
            timeout_sec: extraction_file.timeout_sec.unwrap_or(defaults.timeout_sec),
        };
        if extraction.sample_rate == 0 {
            bail!("extraction.sample_rate must be greater than 0");
        }
        if extraction.timeout_sec == 0 {
            bail!("extraction.timeout_sec must be greater than 0");
        }

        Ok(Self {
            host,
            port,
            metrics_port,
            logging_level,
            uploads_dir,
            retain_uploads,
            max_upload_size_mb,
            classifier_path,
            selector_path,
            ffmpeg_path,
            extraction,
        })
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_mb * 1024 * 1024
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.timeout_sec)
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
