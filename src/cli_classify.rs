//! Classifies local video files with the same pipeline the server uses.

use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bark_classifier_server::audio::AudioExtractor;
use bark_classifier_server::model::{Label, ModelArtifacts};
use bark_classifier_server::prediction::{classify_audio, ProcessingError, EXTRACTED_AUDIO_PREFIX};

fn get_styles() -> Styles {
    Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
}

#[derive(Parser, Debug)]
#[command(styles = get_styles())]
struct CliArgs {
    /// Video files to classify.
    #[clap(required = true)]
    pub videos: Vec<PathBuf>,

    /// Path to the classifier JSON artifact.
    #[clap(long, default_value = "model/dog_bark_classifier.json")]
    pub classifier_path: PathBuf,

    /// Path to the feature selector JSON artifact.
    #[clap(long, default_value = "model/rfe_selector.json")]
    pub selector_path: PathBuf,

    /// The ffmpeg binary used to extract audio.
    #[clap(long, default_value = "ffmpeg")]
    pub ffmpeg_path: PathBuf,

    /// Sample rate ffmpeg extracts audio at.
    #[clap(long, default_value_t = 44100)]
    pub sample_rate: u32,

    /// Maximum time in seconds for a single extraction.
    #[clap(long, default_value_t = 300)]
    pub timeout_sec: u64,
}

async fn classify_video(
    video: &Path,
    extractor: &AudioExtractor,
    models: &Arc<ModelArtifacts>,
) -> Result<Label> {
    let audio_path = tempfile::Builder::new()
        .prefix(EXTRACTED_AUDIO_PREFIX)
        .suffix(".wav")
        .tempfile()
        .context("Failed to create temporary audio file")?
        .into_temp_path();

    extractor
        .extract(video, &audio_path)
        .await
        .context("Error extracting audio")?;

    let models = Arc::clone(models);
    let label = tokio::task::spawn_blocking(move || classify_audio(&audio_path, &models))
        .await
        .map_err(ProcessingError::from)
        .and_then(|result| result)
        .context("Error processing audio")?;
    Ok(label)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let models = Arc::new(ModelArtifacts::load(
        &cli_args.classifier_path,
        &cli_args.selector_path,
    )?);
    let extractor = AudioExtractor::new(
        &cli_args.ffmpeg_path,
        cli_args.sample_rate,
        Duration::from_secs(cli_args.timeout_sec),
    );

    let mut failures = 0;
    for video in &cli_args.videos {
        match classify_video(video, &extractor, &models).await {
            Ok(label) => println!("{}: {}", video.display(), label),
            Err(e) => {
                failures += 1;
                println!("{}: error: {:#}", video.display(), e);
            }
        }
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
