//! Chroma matrix: constant-Q-style pitch-class energy, one 12-dim vector per
//! time frame. Built by folding FFT bins into pitch classes via the standard
//! MIDI-from-frequency mapping (a lightweight stand-in for a true constant-Q
//! transform, adequate at this sample rate/window size).

use crate::config::MatcherConfig;
use crate::features::matrix::FeatureMatrix;
use crate::features::mel::framed_magnitude_spectrum;

const MIN_FREQ_HZ: f32 = 20.0;
const MAX_FREQ_HZ: f32 = 5000.0;

pub fn chroma_matrix(samples: &[f32], cfg: &MatcherConfig) -> FeatureMatrix {
    let spectrum = framed_magnitude_spectrum(samples, cfg.fft_size, cfg.hop_size);
    let n_bins = spectrum.n_bins;

    // Precompute pitch class per bin once; identical across frames.
    let pitch_class_of_bin: Vec<Option<usize>> = (0..n_bins)
        .map(|bin| {
            let freq = bin as f32 * cfg.sample_rate as f32 / cfg.fft_size as f32;
            if freq < MIN_FREQ_HZ || freq > MAX_FREQ_HZ {
                None
            } else {
                let midi = 12.0 * (freq / 440.0).log2() + 69.0;
                let pc = ((midi.round() as i32 % 12 + 12) % 12) as usize;
                Some(pc)
            }
        })
        .collect();

    let frames: Vec<Vec<f32>> = spectrum
        .frames
        .iter()
        .map(|mags| {
            let mut chroma = vec![0.0f32; cfg.n_chroma.min(12)];
            for (bin, mag) in mags.iter().enumerate() {
                if let Some(Some(pc)) = pitch_class_of_bin.get(bin) {
                    if *pc < chroma.len() {
                        chroma[*pc] += mag * mag;
                    }
                }
            }
            chroma
        })
        .collect();

    let mut matrix = FeatureMatrix::new(frames);
    matrix.l2_normalize_frames();
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn chroma_matrix_has_twelve_dims() {
        let cfg = MatcherConfig::default();
        let samples: Vec<f32> = (0..cfg.sample_rate)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / cfg.sample_rate as f32).sin())
            .collect();
        let m = chroma_matrix(&samples, &cfg);
        assert!(!m.is_empty());
        assert_eq!(m.dim(), 12);
        assert!(m.is_finite());
    }
}
