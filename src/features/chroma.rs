//! Chroma energy with automatic tuning estimation.

use super::spectrum::{fft_frequencies, Spectrogram};

const PIPTRACK_FMIN: f64 = 150.0;
const PIPTRACK_FMAX: f64 = 4000.0;
const PIPTRACK_THRESHOLD: f64 = 0.1;
const TUNING_RESOLUTION: f64 = 0.01;

/// Centre octave and width of the Gaussian octave weighting.
const CENTER_OCTAVE: f64 = 5.0;
const OCTAVE_WIDTH: f64 = 2.0;

/// Octaves relative to A0 (27.5 Hz at zero tuning).
fn hz_to_octs(hz: f64, tuning: f64, bins_per_octave: usize) -> f64 {
    let a440 = 440.0 * 2f64.powf(tuning / bins_per_octave as f64);
    (hz / (a440 / 16.0)).log2()
}

/// Parabolically interpolated spectral peaks per frame, as
/// `(frequency, magnitude)` pairs. Only bins between 150 Hz and 4 kHz whose
/// value exceeds a tenth of the frame maximum are candidates.
fn pitch_peaks(spec: &Spectrogram, sample_rate: u32) -> Vec<(f64, f64)> {
    let bins = spec.bins();
    let n_fft = (bins - 1) * 2;
    let freqs = fft_frequencies(sample_rate, n_fft);
    let fmax = PIPTRACK_FMAX.min(sample_rate as f64 / 2.0);

    let mut peaks = Vec::new();
    let mut masked = vec![0.0; bins];

    for s in spec.iter_frames() {
        let reference = PIPTRACK_THRESHOLD * s.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for (m, v) in masked.iter_mut().zip(s) {
            *m = if *v > reference { *v } else { 0.0 };
        }

        for i in 0..bins {
            if !(PIPTRACK_FMIN <= freqs[i] && freqs[i] < fmax) {
                continue;
            }
            // Local maximum with edge padding on both ends.
            let prev = if i == 0 { masked[0] } else { masked[i - 1] };
            let next = if i + 1 == bins { masked[i] } else { masked[i + 1] };
            if !(masked[i] > prev && masked[i] >= next) {
                continue;
            }

            let (shift, dskew) = if i == 0 || i + 1 == bins {
                (0.0, 0.0)
            } else {
                let avg = 0.5 * (s[i + 1] - s[i - 1]);
                let curvature = 2.0 * s[i] - s[i + 1] - s[i - 1];
                let guard = if curvature.abs() < f64::MIN_POSITIVE { 1.0 } else { 0.0 };
                let shift = avg / (curvature + guard);
                (shift, 0.5 * avg * shift)
            };

            let pitch = (i as f64 + shift) * sample_rate as f64 / n_fft as f64;
            peaks.push((pitch, s[i] + dskew));
        }
    }

    peaks
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Most common deviation, in fractions of a bin, of `frequencies` from the
/// equal-tempered grid. Returns 0.0 when there is nothing to measure.
pub(crate) fn pitch_tuning(frequencies: &[f64], bins_per_octave: usize) -> f64 {
    let n_bins = (1.0 / TUNING_RESOLUTION).ceil() as usize;
    let mut counts = vec![0usize; n_bins];
    let mut any = false;

    for &f in frequencies.iter().filter(|f| **f > 0.0) {
        any = true;
        let mut residual = (bins_per_octave as f64 * hz_to_octs(f, 0.0, bins_per_octave)).rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }
        let idx = (((residual + 0.5) * n_bins as f64).floor() as usize).min(n_bins - 1);
        counts[idx] += 1;
    }

    if !any {
        return 0.0;
    }

    // First maximum wins.
    let mut best = 0;
    for (i, c) in counts.iter().enumerate() {
        if *c > counts[best] {
            best = i;
        }
    }
    -0.5 + best as f64 / n_bins as f64
}

/// Estimates the tuning offset of a power spectrogram in fractions of a
/// chroma bin.
pub fn estimate_tuning(power: &Spectrogram, sample_rate: u32, bins_per_octave: usize) -> f64 {
    let peaks: Vec<(f64, f64)> = pitch_peaks(power, sample_rate)
        .into_iter()
        .filter(|(pitch, _)| *pitch > 0.0)
        .collect();

    let threshold = if peaks.is_empty() {
        0.0
    } else {
        let mut mags: Vec<f64> = peaks.iter().map(|(_, m)| *m).collect();
        median(&mut mags)
    };

    let selected: Vec<f64> = peaks
        .iter()
        .filter(|(_, mag)| *mag >= threshold)
        .map(|(pitch, _)| *pitch)
        .collect();

    pitch_tuning(&selected, bins_per_octave)
}

/// Gaussian chroma filter bank: `n_chroma` rows over the `n_fft / 2 + 1`
/// STFT bins, first row is C.
pub(crate) fn chroma_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_chroma: usize,
    tuning: f64,
) -> Vec<Vec<f64>> {
    let n_chroma_f = n_chroma as f64;

    let mut frqbins = Vec::with_capacity(n_fft);
    for k in 1..n_fft {
        let hz = k as f64 * sample_rate as f64 / n_fft as f64;
        frqbins.push(n_chroma_f * hz_to_octs(hz, tuning, n_chroma));
    }
    frqbins.insert(0, frqbins[0] - 1.5 * n_chroma_f);

    let mut binwidth: Vec<f64> = frqbins.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
    binwidth.push(1.0);

    let half = (n_chroma_f / 2.0).round();
    let mut weights = vec![vec![0.0; n_fft]; n_chroma];
    for (c, row) in weights.iter_mut().enumerate() {
        for (j, w) in row.iter_mut().enumerate() {
            let d = (frqbins[j] - c as f64 + half + 10.0 * n_chroma_f).rem_euclid(n_chroma_f) - half;
            *w = (-0.5 * (2.0 * d / binwidth[j]).powi(2)).exp();
        }
    }

    // L2-normalise each column, then weight by octave.
    for j in 0..n_fft {
        let norm = weights.iter().map(|row| row[j] * row[j]).sum::<f64>().sqrt();
        let norm = if norm < f64::MIN_POSITIVE { 1.0 } else { norm };
        let octave_weight =
            (-0.5 * ((frqbins[j] / n_chroma_f - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        for row in weights.iter_mut() {
            row[j] = row[j] / norm * octave_weight;
        }
    }

    // Start at C instead of A.
    weights.rotate_left(3 * (n_chroma / 12));
    for row in weights.iter_mut() {
        row.truncate(n_fft / 2 + 1);
    }
    weights
}

/// Mean over all frames of the max-normalised chroma of a power spectrogram.
pub fn chroma_means(power: &Spectrogram, sample_rate: u32, n_chroma: usize) -> Vec<f64> {
    let n_fft = (power.bins() - 1) * 2;
    let tuning = estimate_tuning(power, sample_rate, n_chroma);
    let filters = chroma_filterbank(sample_rate, n_fft, n_chroma, tuning);

    let mut sums = vec![0.0; n_chroma];
    let mut raw = vec![0.0; n_chroma];
    for frame in power.iter_frames() {
        for (r, filter) in raw.iter_mut().zip(&filters) {
            *r = filter.iter().zip(frame).map(|(w, p)| w * p).sum();
        }
        let peak = raw.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let peak = if peak < f64::MIN_POSITIVE { 1.0 } else { peak };
        for (s, r) in sums.iter_mut().zip(&raw) {
            *s += r / peak;
        }
    }

    let frames = power.frames() as f64;
    sums.into_iter().map(|s| s / frames).collect()
}
