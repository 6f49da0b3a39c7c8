//! Audio extraction and loading.
//!
//! Extraction runs ffmpeg to demux the audio track of an uploaded video into
//! a PCM WAV file; loading reads that file back as a mono waveform at the
//! analysis sample rate.

mod extract;
mod resample;
mod wav;

pub use extract::{check_ffmpeg_available, AudioExtractor, ExtractionError};
pub use resample::resample;
pub use wav::read_wav;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read WAV data: {0}")]
    Wav(#[from] hound::Error),

    #[error("WAV file declares no channels")]
    NoChannels,

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Mono samples at a known rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Reads a WAV file, averages its channels and resamples it to
/// `target_rate`.
pub fn load_waveform(path: &Path, target_rate: u32) -> Result<Waveform, AudioError> {
    let decoded = read_wav(path)?;
    if decoded.sample_rate == target_rate {
        return Ok(decoded);
    }
    let samples = resample(&decoded.samples, decoded.sample_rate, target_rate)?;
    Ok(Waveform::new(samples, target_rate))
}
