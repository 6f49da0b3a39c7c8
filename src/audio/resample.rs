//! Sample rate conversion using rubato.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::AudioError;

const CHUNK_SIZE: usize = 4096;

fn resample_error(err: impl std::fmt::Display) -> AudioError {
    AudioError::Resample(err.to_string())
}

/// Resamples mono `samples` from `from_rate` to `to_rate`.
///
/// The output is aligned with the input and holds
/// `ceil(len * to_rate / from_rate)` samples. Rubato's sinc output is
/// already aligned, so only the tail past the expected length is cut.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(AudioError::Resample(format!(
            "invalid sample rates {from_rate} -> {to_rate}"
        )));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1).map_err(resample_error)?;

    let expected = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(expected + CHUNK_SIZE);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in chunks.by_ref() {
        let input = [chunk];
        let out = resampler
            .process(&input[..], None)
            .map_err(resample_error)?;
        output.extend_from_slice(&out[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let input = [rest];
        let out = resampler
            .process_partial(Some(&input[..]), None)
            .map_err(resample_error)?;
        output.extend_from_slice(&out[0]);
    }

    // Flush the filter tail.
    while output.len() < expected {
        let out = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(resample_error)?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.truncate(expected);
    Ok(output)
}
