//! Pure sample math: down-mixing, loudness and silence detection.

use serde::Serialize;

/// Granularity of the silence scan.
pub const SILENCE_WINDOW_MS: u64 = 10;

/// Average interleaved frames into one channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Loudness of a window relative to full scale. Digital silence is `-inf`.
pub fn dbfs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }
    let mean_square = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    if mean_square <= 0.0 {
        return f32::NEG_INFINITY;
    }
    10.0 * mean_square.log10()
}

fn window_len(sample_rate: u32) -> usize {
    ((sample_rate as u64 * SILENCE_WINDOW_MS / 1000) as usize).max(1)
}

fn silent_windows<'a>(windows: impl Iterator<Item = &'a [f32]>, threshold_db: f32) -> u64 {
    windows.take_while(|w| dbfs(w) < threshold_db).count() as u64
}

/// Length of the run of windows quieter than `threshold_db` at the start.
pub fn leading_silence_ms(samples: &[f32], sample_rate: u32, threshold_db: f32) -> u64 {
    let windows = silent_windows(samples.chunks(window_len(sample_rate)), threshold_db);
    (windows * SILENCE_WINDOW_MS).min(duration_ms(samples.len(), sample_rate))
}

/// Length of the run of windows quieter than `threshold_db` at the end.
pub fn trailing_silence_ms(samples: &[f32], sample_rate: u32, threshold_db: f32) -> u64 {
    let windows = silent_windows(samples.rchunks(window_len(sample_rate)), threshold_db);
    (windows * SILENCE_WINDOW_MS).min(duration_ms(samples.len(), sample_rate))
}

pub fn duration_ms(samples: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    samples as u64 * 1000 / sample_rate as u64
}

/// Silence-trim thresholds.
#[derive(Debug, Clone, Copy)]
pub struct TrimParams {
    pub threshold_db: f32,
    /// Shorter silent runs are left in place.
    pub min_silence_ms: u64,
    /// Trims that would leave less than this are discarded.
    pub min_remaining_ms: u64,
}

/// Portion of the timeline to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrimWindow {
    pub start_ms: u64,
    pub end_ms: u64,
    pub trimmed: bool,
}

/// Decide which part of `samples` survives silence trimming.
pub fn plan_trim(samples: &[f32], sample_rate: u32, params: &TrimParams) -> TrimWindow {
    let total = duration_ms(samples.len(), sample_rate);
    let untouched = TrimWindow {
        start_ms: 0,
        end_ms: total,
        trimmed: false,
    };

    let mut lead = leading_silence_ms(samples, sample_rate, params.threshold_db);
    if lead < params.min_silence_ms {
        lead = 0;
    }
    let mut trail = trailing_silence_ms(samples, sample_rate, params.threshold_db);
    if trail < params.min_silence_ms {
        trail = 0;
    }

    if lead == 0 && trail == 0 {
        return untouched;
    }

    let remaining = total.saturating_sub(lead + trail);
    if remaining < params.min_remaining_ms {
        return untouched;
    }

    TrimWindow {
        start_ms: lead,
        end_ms: total - trail,
        trimmed: true,
    }
}
