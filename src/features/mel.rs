//! Mel filter bank and MFCC summary.

use super::spectrum::{fft_frequencies, power_to_db, Spectrogram};

// Slaney mel scale: linear below 1 kHz, logarithmic above.
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub(crate) fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub(crate) fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filters from 0 Hz to Nyquist with Slaney area
/// normalisation. Returns `n_mels` rows of `n_fft / 2 + 1` weights.
pub(crate) fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let lower_width = mel_f[m + 1] - mel_f[m];
            let upper_width = mel_f[m + 2] - mel_f[m + 1];
            let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - mel_f[m]) / lower_width;
                    let upper = (mel_f[m + 2] - f) / upper_width;
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II of `input`, truncated to the first `n_out` terms.
pub(crate) fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len() as f64;
    let scale = (2.0 / n).sqrt();
    (0..n_out)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, x)| {
                    x * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n))
                        .cos()
                })
                .sum();
            if k == 0 {
                sum * scale / 2f64.sqrt()
            } else {
                sum * scale
            }
        })
        .collect()
}

/// Mean over all frames of the first `n_mfcc` cepstral coefficients of the
/// log-mel power spectrogram.
pub fn mfcc_means(power: &Spectrogram, sample_rate: u32, n_mels: usize, n_mfcc: usize) -> Vec<f64> {
    let n_fft = (power.bins() - 1) * 2;
    let filters = mel_filterbank(sample_rate, n_fft, n_mels);

    let mut mel_db = Vec::with_capacity(power.frames() * n_mels);
    for frame in power.iter_frames() {
        for filter in &filters {
            mel_db.push(filter.iter().zip(frame).map(|(w, p)| w * p).sum::<f64>());
        }
    }
    power_to_db(&mut mel_db);

    // The DCT is linear, so averaging the dB frames first gives the mean MFCC.
    let frames = power.frames() as f64;
    let mut mean_db = vec![0.0; n_mels];
    for frame in mel_db.chunks_exact(n_mels) {
        for (acc, v) in mean_db.iter_mut().zip(frame) {
            *acc += v;
        }
    }
    mean_db.iter_mut().for_each(|v| *v /= frames);

    dct_ortho(&mean_db, n_mfcc)
}
