//! Audio track extraction using ffmpeg.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors that can occur while extracting the audio track of a video.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("ffmpeg did not finish within {0} seconds")]
    TimedOut(u64),
}

/// Runs ffmpeg to write the first audio stream of a file as 16-bit PCM WAV.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    ffmpeg_path: PathBuf,
    sample_rate: u32,
    timeout: Duration,
}

impl AudioExtractor {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, sample_rate: u32, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            sample_rate,
            timeout,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn command(&self, input_path: &Path, output_path: &Path) -> Command {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"])
            .arg(input_path)
            .args([
                "-map",
                "0:a:0",
                "-vn",
                "-acodec",
                "pcm_s16le",
                "-ar",
                &self.sample_rate.to_string(),
                "-f",
                "wav",
            ])
            .arg(output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Extracts the audio of `input_path` into `output_path`, overwriting it.
    ///
    /// Fails if the input has no audio stream, ffmpeg cannot decode it, or
    /// the conversion outlives the configured timeout.
    pub async fn extract(
        &self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<(), ExtractionError> {
        debug!(
            "Extracting audio from {:?} into {:?}",
            input_path, output_path
        );

        let child = self
            .command(input_path, output_path)
            .spawn()
            .map_err(|source| ExtractionError::Spawn {
                program: self.ffmpeg_path.display().to_string(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractionError::TimedOut(self.timeout.as_secs()))?
            .map_err(|source| ExtractionError::Spawn {
                program: self.ffmpeg_path.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(ExtractionError::Ffmpeg(message));
        }

        Ok(())
    }
}

/// Check that the ffmpeg binary at `ffmpeg_path` can be executed.
pub async fn check_ffmpeg_available(ffmpeg_path: &Path) -> Result<(), ExtractionError> {
    let status = Command::new(ffmpeg_path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|source| ExtractionError::Spawn {
            program: ffmpeg_path.display().to_string(),
            source,
        })?;

    if !status.success() {
        return Err(ExtractionError::Ffmpeg(format!(
            "`{} -version` exited with {}",
            ffmpeg_path.display(),
            status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extractor(ffmpeg: &str) -> AudioExtractor {
        AudioExtractor::new(ffmpeg, 44100, Duration::from_secs(30))
    }

    async fn ffmpeg_available() -> bool {
        check_ffmpeg_available(Path::new("ffmpeg")).await.is_ok()
    }

    #[test]
    fn builds_pcm_wav_arguments() {
        let command = extractor("ffmpeg").command(Path::new("in.mp4"), Path::new("out.wav"));
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-loglevel",
                "error",
                "-nostdin",
                "-y",
                "-i",
                "in.mp4",
                "-map",
                "0:a:0",
                "-vn",
                "-acodec",
                "pcm_s16le",
                "-ar",
                "44100",
                "-f",
                "wav",
                "out.wav",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = TempDir::new().unwrap();
        let result = extractor("/nonexistent/ffmpeg-binary")
            .extract(&dir.path().join("in.mp4"), &dir.path().join("out.wav"))
            .await;
        assert!(matches!(result, Err(ExtractionError::Spawn { .. })));

        let check = check_ffmpeg_available(Path::new("/nonexistent/ffmpeg-binary")).await;
        assert!(check.is_err());
    }

    #[tokio::test]
    async fn garbage_input_fails_with_ffmpeg_error() {
        if !ffmpeg_available().await {
            eprintln!("ffmpeg not available, skipping");
            return;
        }
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("garbage.mp4");
        std::fs::write(&input, b"this is not a video container").unwrap();

        let result = extractor("ffmpeg")
            .extract(&input, &dir.path().join("out.wav"))
            .await;
        match result {
            Err(ExtractionError::Ffmpeg(message)) => assert!(!message.is_empty()),
            other => panic!("expected ffmpeg error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn extracts_audio_track_of_generated_video() {
        if !ffmpeg_available().await {
            eprintln!("ffmpeg not available, skipping");
            return;
        }
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mp4");
        let status = std::process::Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-f",
                "lavfi",
                "-i",
                "color=c=black:s=64x64:d=1",
                "-f",
                "lavfi",
                "-i",
                "sine=frequency=440:duration=1",
                "-shortest",
                "-c:v",
                "mpeg4",
                "-c:a",
                "aac",
            ])
            .arg(&input)
            .status()
            .unwrap();
        if !status.success() {
            eprintln!("ffmpeg cannot encode test media, skipping");
            return;
        }

        let output = dir.path().join("out.wav");
        extractor("ffmpeg").extract(&input, &output).await.unwrap();

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().sample_rate, 44100);
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert!(reader.duration() > 0);
    }
}
