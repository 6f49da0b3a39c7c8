//! Acoustic feature extraction.
//!
//! A clip is summarised by the frame-wise mean of three spectral
//! descriptors, concatenated in a fixed order:
//!
//! 1. 10 MFCCs
//! 2. 12 chroma bins
//! 3. 7 spectral contrast bands (6 octave bands plus the residual band)
//!
//! The layout is part of the model contract: the feature selector is fit on
//! exactly this vector.

mod chroma;
mod contrast;
mod mel;
mod spectrum;

pub use chroma::{chroma_means, estimate_tuning};
pub use contrast::contrast_means;
pub use mel::mfcc_means;
pub use spectrum::{power_to_db, Spectrogram};

use serde::Serialize;
use thiserror::Error;

use crate::audio::Waveform;

pub const SAMPLE_RATE: u32 = 22050;
pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;
pub const N_MELS: usize = 128;
pub const N_MFCC: usize = 10;
pub const N_CHROMA: usize = 12;
pub const N_CONTRAST_BANDS: usize = 6;

/// Length of every [`FeatureVector`].
pub const FEATURE_VECTOR_LEN: usize = N_MFCC + N_CHROMA + N_CONTRAST_BANDS + 1;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Audio buffer is empty")]
    EmptySignal,

    #[error("Audio buffer is not finite everywhere")]
    NonFiniteSignal,

    #[error("Contrast bands reach {highest} Hz, above the Nyquist frequency of {sample_rate} Hz audio")]
    BandsAboveNyquist { sample_rate: u32, highest: f64 },

    #[error("Contrast band {0} contains no frequency bins")]
    EmptyBand(usize),
}

/// Fixed-length summary of one clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Computes the [`FeatureVector`] of a waveform.
pub fn extract_features(waveform: &Waveform) -> Result<FeatureVector, FeatureError> {
    if waveform.samples.is_empty() {
        return Err(FeatureError::EmptySignal);
    }
    if waveform.samples.iter().any(|s| !s.is_finite()) {
        return Err(FeatureError::NonFiniteSignal);
    }

    let sr = waveform.sample_rate;
    let magnitude = Spectrogram::magnitude(&waveform.samples, N_FFT, HOP_LENGTH);
    let power = magnitude.powered(2.0);

    let mut values = Vec::with_capacity(FEATURE_VECTOR_LEN);
    values.extend(mfcc_means(&power, sr, N_MELS, N_MFCC));
    values.extend(chroma_means(&power, sr, N_CHROMA));
    values.extend(contrast_means(&magnitude, sr, N_CONTRAST_BANDS)?);

    Ok(FeatureVector(values))
}
