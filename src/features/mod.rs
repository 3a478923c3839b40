//! Feature Extractor (spec component B): mono PCM → a feature bundle of
//! MFCC, chroma, spectral-contrast matrices plus a scalar tempo estimate.

pub mod chroma;
pub mod contrast;
pub mod matrix;
pub mod mel;
pub mod mfcc;
pub mod tempo;

use crate::config::MatcherConfig;
use crate::error::MatcherError;
pub use matrix::FeatureMatrix;

/// One audio input's full feature bundle. Invariant: every matrix has at
/// least one time frame; otherwise the whole bundle is rejected rather than
/// emitted partially (spec 3, 4.B).
#[derive(Debug, Clone)]
pub struct FeatureBundle {
    pub mfcc: FeatureMatrix,
    pub chroma: FeatureMatrix,
    pub spectral_contrast: FeatureMatrix,
    pub tempo_bpm: f32,
    pub beat_frames: Vec<usize>,
}

/// Extract the full feature bundle from mono PCM at `cfg.sample_rate`.
/// Any failure discards the whole bundle (spec 4.B error policy) — there is
/// no partial-bundle case.
pub fn extract_features(samples: &[f32], cfg: &MatcherConfig) -> Result<FeatureBundle, MatcherError> {
    if samples.is_empty() {
        return Err(MatcherError::FeatureFailed("empty input".into()));
    }

    let mfcc = mfcc::mfcc_matrix(samples, cfg);
    let chroma = chroma::chroma_matrix(samples, cfg);
    let spectral_contrast = contrast::spectral_contrast_matrix(samples, cfg);

    for (name, m) in [("mfcc", &mfcc), ("chroma", &chroma), ("spectral_contrast", &spectral_contrast)] {
        if m.is_empty() {
            return Err(MatcherError::FeatureFailed(format!("{name} matrix has zero frames")));
        }
        if !m.is_finite() {
            return Err(MatcherError::FeatureFailed(format!("{name} matrix contains NaN/Inf")));
        }
    }

    let tempo = tempo::estimate_tempo(samples, cfg);

    Ok(FeatureBundle {
        mfcc,
        chroma,
        spectral_contrast,
        tempo_bpm: tempo.bpm,
        beat_frames: tempo.beat_frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn extract_features_rejects_empty_input() {
        let cfg = MatcherConfig::default();
        assert!(extract_features(&[], &cfg).is_err());
    }

    #[test]
    fn extract_features_succeeds_on_tone() {
        let cfg = MatcherConfig::default();
        let samples: Vec<f32> = (0..cfg.sample_rate * 2)
            .map(|i| 0.4 * (2.0 * PI * 440.0 * i as f32 / cfg.sample_rate as f32).sin())
            .collect();
        let bundle = extract_features(&samples, &cfg).unwrap();
        assert_eq!(bundle.mfcc.dim(), cfg.n_mfcc);
        assert_eq!(bundle.chroma.dim(), cfg.n_chroma);
        assert_eq!(bundle.spectral_contrast.dim(), cfg.n_spectral_bands);
    }
}
