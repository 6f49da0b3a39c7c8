use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bark_classifier_server::audio::{check_ffmpeg_available, AudioExtractor};
use bark_classifier_server::config;
use bark_classifier_server::model::ModelArtifacts;
use bark_classifier_server::prediction::{FileHandler, PredictionService};
use bark_classifier_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The address to bind to.
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 443)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Directory where uploads and extracted audio are written. Created if missing.
    #[clap(long, value_parser = parse_path, default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Delete each upload once its prediction is done.
    #[clap(long)]
    pub discard_uploads: bool,

    /// Maximum accepted request body size, in megabytes.
    #[clap(long, default_value_t = 512)]
    pub max_upload_size_mb: usize,

    /// Path to the classifier JSON artifact.
    #[clap(long, value_parser = parse_path, default_value = "model/dog_bark_classifier.json")]
    pub classifier_path: PathBuf,

    /// Path to the feature selector JSON artifact.
    #[clap(long, value_parser = parse_path, default_value = "model/rfe_selector.json")]
    pub selector_path: PathBuf,

    /// The ffmpeg binary used to extract audio.
    #[clap(long, default_value = "ffmpeg")]
    pub ffmpeg_path: PathBuf,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            host: args.host.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            uploads_dir: args.uploads_dir.clone(),
            retain_uploads: !args.discard_uploads,
            max_upload_size_mb: args.max_upload_size_mb,
            classifier_path: args.classifier_path.clone(),
            selector_path: args.selector_path.clone(),
            ffmpeg_path: args.ffmpeg_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    info!("Starting bark-classifier-server ({})", env!("GIT_HASH"));

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  uploads_dir: {:?}", app_config.uploads_dir);
    info!("  classifier_path: {:?}", app_config.classifier_path);
    info!("  selector_path: {:?}", app_config.selector_path);
    info!("  max_upload_size_mb: {}", app_config.max_upload_size_mb);
    info!("  retain_uploads: {}", app_config.retain_uploads);

    let file_handler = FileHandler::new(&app_config.uploads_dir);
    file_handler
        .init()
        .await
        .with_context(|| format!("Failed to create uploads dir {:?}", app_config.uploads_dir))?;

    if let Err(e) = check_ffmpeg_available(&app_config.ffmpeg_path).await {
        warn!("ffmpeg is not usable, every prediction will fail: {}", e);
    }

    info!("Loading model artifacts...");
    let models = Arc::new(ModelArtifacts::load(
        &app_config.classifier_path,
        &app_config.selector_path,
    )?);

    // Initialize metrics system
    info!("Initializing metrics...");
    metrics::init_metrics();

    let extractor = AudioExtractor::new(
        &app_config.ffmpeg_path,
        app_config.extraction.sample_rate,
        app_config.extraction_timeout(),
    );
    let prediction_service = Arc::new(PredictionService::new(
        file_handler,
        extractor,
        models,
        app_config.retain_uploads,
    ));

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        host: app_config.host.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        max_upload_size_bytes: app_config.max_upload_size_bytes(),
    };

    tokio::select! {
        result = run_server(server_config, prediction_service) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
