//! Test fixture creation for model artifacts and media
//!
//! Media is generated with the ffmpeg binary on PATH. Tests that need it
//! should skip themselves when [`generate_video`] returns `None`.

use super::constants::*;
use anyhow::{bail, Result};
use bark_classifier_server::features::FEATURE_VECTOR_LEN;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Writes a classifier and selector pair into `dir`.
///
/// The classifier is a single split on the mean first MFCC: clips with any
/// audible content are `bark`, digital silence is `no_bark`. `selector_width`
/// sets the selector's expected input width, so passing anything other than
/// the extracted vector length produces per-request processing errors.
/// Returns (classifier_path, selector_path).
pub fn write_model_artifacts(dir: &Path, selector_width: usize) -> Result<(PathBuf, PathBuf)> {
    let mut support = vec![false; selector_width];
    for index in SELECTED_FEATURES {
        if index < selector_width {
            support[index] = true;
        }
    }
    let kept = support.iter().filter(|k| **k).count();

    let selector = json!({
        "n_features_in": selector_width,
        "support": support,
    });
    let classifier = json!({
        "n_features_in": kept,
        "classes": [LABEL_QUIET, LABEL_BARK],
        "model": {
            "type": "decision_tree",
            "children_left": [1, -1, -1],
            "children_right": [2, -1, -1],
            "feature": [0, -2, -2],
            "threshold": [MFCC0_THRESHOLD, -2.0, -2.0],
            "value": [[1.0, 1.0], [1.0, 0.0], [0.0, 1.0]],
        },
    });

    let classifier_path = dir.join("dog_bark_classifier.json");
    let selector_path = dir.join("rfe_selector.json");
    std::fs::write(&classifier_path, serde_json::to_vec_pretty(&classifier)?)?;
    std::fs::write(&selector_path, serde_json::to_vec_pretty(&selector)?)?;
    Ok((classifier_path, selector_path))
}

/// Writes artifacts matching the extracted feature vector.
pub fn write_default_model_artifacts(dir: &Path) -> Result<(PathBuf, PathBuf)> {
    write_model_artifacts(dir, FEATURE_VECTOR_LEN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    /// Black frames with a sine tone
    Tone,
    /// Black frames with a silent audio track
    Silence,
    /// Black frames and no audio stream at all
    NoAudio,
}

pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn encode_video(kind: VideoKind, output: &Path) -> Result<()> {
    let video_source = format!("color=c=black:s=64x64:d={CLIP_DURATION_SECS}");
    let mut command = Command::new("ffmpeg");
    command
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg(&video_source);

    match kind {
        VideoKind::Tone => {
            command.args(["-f", "lavfi", "-i"]).arg(format!(
                "sine=frequency={TONE_FREQUENCY_HZ}:duration={CLIP_DURATION_SECS}"
            ));
        }
        VideoKind::Silence => {
            command
                .args(["-f", "lavfi", "-i"])
                .arg("anullsrc=channel_layout=stereo:sample_rate=44100")
                .args(["-t", &CLIP_DURATION_SECS.to_string()]);
        }
        VideoKind::NoAudio => {}
    }

    command.args(["-c:v", "mpeg4"]);
    if kind != VideoKind::NoAudio {
        command.args(["-c:a", "aac", "-shortest"]);
    }
    let status = command
        .arg(output)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if !status.success() {
        bail!("ffmpeg could not encode {:?}", kind);
    }
    Ok(())
}

/// Generates an MP4 clip of the given kind, or `None` when ffmpeg is not
/// available to produce one.
pub fn generate_video(kind: VideoKind) -> Option<Vec<u8>> {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not available, skipping");
        return None;
    }
    let dir = TempDir::new().ok()?;
    let output = dir.path().join("clip.mp4");
    match encode_video(kind, &output) {
        Ok(()) => std::fs::read(&output).ok(),
        Err(e) => {
            eprintln!("{}, skipping", e);
            None
        }
    }
}
