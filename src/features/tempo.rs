//! Tempo and beat-frame estimation via an onset-strength envelope and
//! autocorrelation peak-picking — adequate for coarse BPM estimation without
//! pulling in a dedicated beat tracker.

use crate::config::MatcherConfig;

pub struct TempoEstimate {
    /// Beats per minute; 0.0 means detection failed.
    pub bpm: f32,
    /// Frame indices (at `hop_size` granularity) of detected onset peaks.
    /// Diagnostic only — never read by fusion.
    pub beat_frames: Vec<usize>,
}

pub fn estimate_tempo(samples: &[f32], cfg: &MatcherConfig) -> TempoEstimate {
    let duration_secs = samples.len() as f32 / cfg.sample_rate as f32;
    if duration_secs < 0.5 {
        return TempoEstimate { bpm: 0.0, beat_frames: Vec::new() };
    }

    let rms: Vec<f32> = samples
        .chunks(cfg.hop_size)
        .map(|c| (c.iter().map(|s| s * s).sum::<f32>() / c.len() as f32).sqrt())
        .collect();
    let onset_env: Vec<f32> = rms.windows(2).map(|w| (w[1] - w[0]).max(0.0)).collect();

    if onset_env.len() < 100 {
        return TempoEstimate { bpm: 0.0, beat_frames: Vec::new() };
    }

    let fps = cfg.sample_rate as f32 / cfg.hop_size as f32;
    let min_lag = (fps * 60.0 / 200.0) as usize;
    let max_lag = ((fps * 60.0 / 60.0) as usize).min(onset_env.len() / 2);

    if min_lag >= max_lag {
        return TempoEstimate { bpm: 0.0, beat_frames: pick_peaks(&onset_env) };
    }

    let mut best_lag = min_lag;
    let mut best_corr = f32::NEG_INFINITY;
    for lag in min_lag..=max_lag {
        let corr: f32 = onset_env
            .iter()
            .zip(onset_env[lag..].iter())
            .map(|(a, b)| a * b)
            .sum();
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    if best_corr <= 0.0 {
        return TempoEstimate { bpm: 0.0, beat_frames: pick_peaks(&onset_env) };
    }

    TempoEstimate {
        bpm: fps * 60.0 / best_lag as f32,
        beat_frames: pick_peaks(&onset_env),
    }
}

/// Pick local maxima above 30% of the envelope's peak — the same threshold
/// heuristic used to estimate onset density.
fn pick_peaks(onset_env: &[f32]) -> Vec<usize> {
    let max = onset_env.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let threshold = max * 0.3;
    onset_env
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v > threshold)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn click_track(bpm: f32, secs: f32, sample_rate: u32) -> Vec<f32> {
        let interval = (60.0 / bpm * sample_rate as f32) as usize;
        let mut out = vec![0.0f32; (sample_rate as f32 * secs) as usize];
        let mut pos = 0;
        while pos < out.len() {
            for i in 0..200.min(out.len() - pos) {
                out[pos + i] = (2.0 * PI * 1000.0 * i as f32 / sample_rate as f32).sin() * 0.8;
            }
            pos += interval;
        }
        out
    }

    #[test]
    fn detects_tempo_in_plausible_range() {
        let cfg = MatcherConfig::default();
        let samples = click_track(120.0, 8.0, cfg.sample_rate);
        let est = estimate_tempo(&samples, &cfg);
        assert!(est.bpm > 0.0, "expected nonzero tempo");
        assert!(est.bpm >= 55.0 && est.bpm <= 245.0, "bpm={}", est.bpm);
    }

    #[test]
    fn silence_yields_zero_or_low_confidence_tempo() {
        let cfg = MatcherConfig::default();
        let samples = vec![0.0f32; cfg.sample_rate as usize * 2];
        let est = estimate_tempo(&samples, &cfg);
        assert_eq!(est.bpm, 0.0);
    }

    #[test]
    fn too_short_returns_zero() {
        let cfg = MatcherConfig::default();
        let samples = vec![0.1f32; 100];
        let est = estimate_tempo(&samples, &cfg);
        assert_eq!(est.bpm, 0.0);
        assert!(est.beat_frames.is_empty());
    }
}
