use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::domain::TranscriptionError;

const CHUNK_SIZE: usize = 1024;

/// Resample mono audio from `from_rate` to `to_rate`.
///
/// The filter delay is removed and its tail flushed, so output sample `i`
/// lines up with input time `i / to_rate`. The output length is
/// `len * to_rate / from_rate` so durations survive the round trip.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, TranscriptionError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(TranscriptionError::unsupported_media(format!(
            "cannot resample {}Hz to {}Hz",
            from_rate, to_rate
        )));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to_rate) / f64::from(from_rate);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
        .map_err(|e| TranscriptionError::internal(format!("resampler init: {}", e)))?;

    let expected_len = (samples.len() as u64 * u64::from(to_rate) / u64::from(from_rate)) as usize;
    // Filter latency: the first `delay` output frames precede the input timeline
    let delay = resampler.output_delay();
    let wanted = delay + expected_len;
    let mut output = Vec::with_capacity(wanted + CHUNK_SIZE * 4);

    let resample_err = |e: rubato::ResampleError| TranscriptionError::internal(format!("resample: {}", e));

    for chunk in samples.chunks(CHUNK_SIZE) {
        let resampled = if chunk.len() == CHUNK_SIZE {
            resampler.process(&[chunk], None)
        } else {
            resampler.process_partial(Some(&[chunk]), None)
        }
        .map_err(resample_err)?;

        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
    }

    // Flush the tail still held back by the filter
    while output.len() < wanted {
        let resampled = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(resample_err)?;
        match resampled.first() {
            Some(channel) if !channel.is_empty() => output.extend_from_slice(channel),
            _ => break,
        }
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected_len, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000).unwrap(), samples);
    }

    #[test]
    fn test_downsample_length() {
        let samples: Vec<f32> = (0..48000).map(|i| (i as f32 / 48000.0).sin()).collect();
        let result = resample(&samples, 48000, 16000).unwrap();
        assert_eq!(result.len(), 16000);
    }

    #[test]
    fn test_timeline_is_not_shifted() {
        // 0.5 s of silence then 0.5 s at half scale, 8 kHz to 16 kHz
        let mut samples = vec![0.0f32; 4000];
        samples.extend(std::iter::repeat(0.5f32).take(4000));
        let result = resample(&samples, 8000, 16000).unwrap();

        assert_eq!(result.len(), 16000);
        // Step sits at output 8000, not a filter delay later
        assert!(result[7900].abs() < 0.05, "{}", result[7900]);
        assert!((result[8100] - 0.5).abs() < 0.05, "{}", result[8100]);
        // Tail is flushed rather than cut off
        assert!((result[15900] - 0.5).abs() < 0.05, "{}", result[15900]);
    }

    #[test]
    fn test_upsample_length() {
        let samples = vec![0.0f32; 8000];
        let result = resample(&samples, 8000, 16000).unwrap();
        assert_eq!(result.len(), 16000);
    }
}
