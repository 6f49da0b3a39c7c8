//! Octave-band spectral contrast.

use super::spectrum::{fft_frequencies, power_to_db, Spectrogram};
use super::FeatureError;

const FMIN: f64 = 200.0;
const QUANTILE: f64 = 0.02;

/// Bin indices belonging to each of the `n_bands + 1` contrast bands, paired
/// with the number of bins averaged for the peak and the valley.
fn band_bins(freqs: &[f64], sample_rate: u32, n_bands: usize) -> Result<Vec<(Vec<usize>, usize)>, FeatureError> {
    let mut edges = vec![0.0; n_bands + 2];
    for (k, edge) in edges.iter_mut().enumerate().skip(1) {
        *edge = FMIN * 2f64.powi(k as i32 - 1);
    }
    let nyquist = 0.5 * sample_rate as f64;
    if edges[..n_bands + 1].iter().any(|e| *e >= nyquist) {
        return Err(FeatureError::BandsAboveNyquist {
            sample_rate,
            highest: edges[n_bands],
        });
    }

    let mut bands = Vec::with_capacity(n_bands + 1);
    for k in 0..=n_bands {
        let (low, high) = (edges[k], edges[k + 1]);
        let mut members: Vec<usize> = (0..freqs.len())
            .filter(|&i| freqs[i] >= low && freqs[i] <= high)
            .collect();
        let (first, last) = match (members.first(), members.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Err(FeatureError::EmptyBand(k)),
        };
        if k > 0 && first > 0 {
            members.insert(0, first - 1);
        }
        if k == n_bands {
            members.extend(last + 1..freqs.len());
        }

        // The quantile is taken over the full band size even though the top
        // bin is dropped for every band but the last.
        let width = members.len();
        if k < n_bands {
            members.pop();
        }
        let take = ((QUANTILE * width as f64).round_ties_even() as usize).max(1);
        bands.push((members, take));
    }
    Ok(bands)
}

/// Mean over all frames of the peak-to-valley contrast (in dB) of each
/// octave band of a magnitude spectrogram. Returns `n_bands + 1` values.
pub fn contrast_means(
    magnitude: &Spectrogram,
    sample_rate: u32,
    n_bands: usize,
) -> Result<Vec<f64>, FeatureError> {
    let n_fft = (magnitude.bins() - 1) * 2;
    let freqs = fft_frequencies(sample_rate, n_fft);
    let bands = band_bins(&freqs, sample_rate, n_bands)?;

    let frames = magnitude.frames();
    let n_rows = n_bands + 1;
    let mut peaks = vec![0.0; n_rows * frames];
    let mut valleys = vec![0.0; n_rows * frames];
    let mut sorted = Vec::new();

    for (t, frame) in magnitude.iter_frames().enumerate() {
        for (k, (members, take)) in bands.iter().enumerate() {
            sorted.clear();
            sorted.extend(members.iter().map(|&i| frame[i]));
            sorted.sort_by(|a, b| a.total_cmp(b));
            let take = (*take).min(sorted.len());
            let valley = sorted[..take].iter().sum::<f64>() / take as f64;
            let peak = sorted[sorted.len() - take..].iter().sum::<f64>() / take as f64;
            valleys[k * frames + t] = valley;
            peaks[k * frames + t] = peak;
        }
    }

    power_to_db(&mut peaks);
    power_to_db(&mut valleys);

    Ok((0..n_rows)
        .map(|k| {
            let row = k * frames..(k + 1) * frames;
            peaks[row.clone()]
                .iter()
                .zip(&valleys[row])
                .map(|(p, v)| p - v)
                .sum::<f64>()
                / frames as f64
        })
        .collect())
}
