//! MFCC matrix: mel-filterbank cepstral coefficients, one `n_mfcc`-dim vector
//! per time frame.

use crate::config::MatcherConfig;
use crate::features::matrix::FeatureMatrix;
use crate::features::mel::{dct_ii, framed_magnitude_spectrum, mel_spectrogram};

const N_MELS: usize = 40;

pub fn mfcc_matrix(samples: &[f32], cfg: &MatcherConfig) -> FeatureMatrix {
    let spectrum = framed_magnitude_spectrum(samples, cfg.fft_size, cfg.hop_size);
    let mel = mel_spectrogram(&spectrum, cfg.sample_rate, cfg.fft_size, N_MELS);

    let frames: Vec<Vec<f32>> = mel
        .iter()
        .map(|frame| dct_ii(frame, cfg.n_mfcc))
        .collect();

    let mut matrix = FeatureMatrix::new(frames);
    matrix.l2_normalize_frames();
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mfcc_matrix_has_n_mfcc_dims() {
        let cfg = MatcherConfig::default();
        let samples = vec![0.2f32; cfg.sample_rate as usize];
        let m = mfcc_matrix(&samples, &cfg);
        assert!(!m.is_empty());
        assert_eq!(m.dim(), cfg.n_mfcc);
        assert!(m.is_finite());
    }
}
