//! Short-time Fourier analysis shared by all feature extractors.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Smallest magnitude fed to the logarithm in [`power_to_db`].
const AMIN: f64 = 1e-10;

/// Dynamic range kept by [`power_to_db`], relative to the peak value.
const TOP_DB: f64 = 80.0;

/// Frame-major spectrogram: `frames` columns of `bins` frequency values each.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    bins: usize,
    frames: usize,
    data: Vec<f64>,
}

impl Spectrogram {
    /// Magnitude STFT with a periodic Hann window and centred frames.
    ///
    /// The signal is zero padded by `n_fft / 2` on both sides, so the frame
    /// count is `1 + samples.len() / hop_length`.
    pub fn magnitude(samples: &[f32], n_fft: usize, hop_length: usize) -> Self {
        let pad = n_fft / 2;
        let mut padded = vec![0.0f64; samples.len() + 2 * pad];
        for (dst, src) in padded[pad..pad + samples.len()].iter_mut().zip(samples) {
            *dst = *src as f64;
        }

        let bins = n_fft / 2 + 1;
        let frames = 1 + (padded.len() - n_fft) / hop_length;
        let window = hann_window(n_fft);

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];
        let mut data = Vec::with_capacity(frames * bins);

        for frame in 0..frames {
            let start = frame * hop_length;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * window[i], 0.0);
            }
            fft.process(&mut buffer);
            data.extend(buffer[..bins].iter().map(|c| c.norm()));
        }

        Self { bins, frames, data }
    }

    /// Returns a new spectrogram with every value raised to `exponent`.
    pub fn powered(&self, exponent: f64) -> Self {
        let data = if exponent == 2.0 {
            self.data.iter().map(|v| v * v).collect()
        } else {
            self.data.iter().map(|v| v.powf(exponent)).collect()
        };
        Self {
            bins: self.bins,
            frames: self.frames,
            data,
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn frame(&self, index: usize) -> &[f64] {
        &self.data[index * self.bins..(index + 1) * self.bins]
    }

    pub fn iter_frames(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.bins)
    }

    /// Largest value over the whole spectrogram.
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }
}

/// Periodic Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Centre frequency of every STFT bin.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    (0..=n_fft / 2)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

/// Converts power values to decibels in place (reference 1.0), then clips
/// everything more than 80 dB below the maximum.
pub fn power_to_db(values: &mut [f64]) {
    let mut peak = f64::NEG_INFINITY;
    for v in values.iter_mut() {
        *v = 10.0 * v.max(AMIN).log10();
        peak = peak.max(*v);
    }
    let floor = peak - TOP_DB;
    for v in values.iter_mut() {
        *v = v.max(floor);
    }
}
