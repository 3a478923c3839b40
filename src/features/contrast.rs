//! Spectral contrast matrix: per-frame peak-vs-valley energy contrast across
//! `n_spectral_bands` octave-spaced bands (a DC/sub-bass band plus six octave
//! bands by default), the standard texture descriptor used alongside
//! MFCC/chroma for fingerprinting.

use crate::config::MatcherConfig;
use crate::features::matrix::FeatureMatrix;
use crate::features::mel::framed_magnitude_spectrum;

/// Fraction of bins at each band's extremes averaged for the peak/valley
/// estimate (matches the standard alpha=0.02 quantile used by librosa).
const ALPHA: f32 = 0.02;
const BASE_FREQ_HZ: f32 = 200.0;

pub fn spectral_contrast_matrix(samples: &[f32], cfg: &MatcherConfig) -> FeatureMatrix {
    let spectrum = framed_magnitude_spectrum(samples, cfg.fft_size, cfg.hop_size);
    let n_bins = spectrum.n_bins;
    let n_bands = cfg.n_spectral_bands.max(1);
    let octave_bands = n_bands - 1;

    let edges = band_edges(cfg.sample_rate, cfg.fft_size, n_bins, octave_bands);

    let frames: Vec<Vec<f32>> = spectrum
        .frames
        .iter()
        .map(|mags| {
            edges
                .windows(2)
                .map(|w| band_contrast(&mags[w[0]..w[1]]))
                .collect()
        })
        .collect();

    let mut matrix = FeatureMatrix::new(frames);
    matrix.l2_normalize_frames();
    matrix
}

/// Bin boundaries for a DC band followed by `octave_bands` doublings of
/// `BASE_FREQ_HZ`, clipped to `[0, n_bins]`.
fn band_edges(sample_rate: u32, fft_size: usize, n_bins: usize, octave_bands: usize) -> Vec<usize> {
    let hz_to_bin = |f: f32| -> usize {
        ((f * fft_size as f32 / sample_rate as f32).round() as usize).min(n_bins)
    };

    let mut edges = vec![0usize, hz_to_bin(BASE_FREQ_HZ)];
    let mut freq = BASE_FREQ_HZ;
    for _ in 1..octave_bands {
        freq *= 2.0;
        edges.push(hz_to_bin(freq));
    }
    edges.push(n_bins);
    edges.dedup();
    if edges.len() < 2 {
        edges = vec![0, n_bins];
    }
    edges
}

fn band_contrast(band: &[f32]) -> f32 {
    if band.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f32> = band.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let k = ((sorted.len() as f32 * ALPHA).ceil() as usize).max(1).min(sorted.len());
    let valley: f32 = sorted[..k].iter().sum::<f32>() / k as f32;
    let peak: f32 = sorted[sorted.len() - k..].iter().sum::<f32>() / k as f32;

    (peak + 1e-10).ln() - (valley + 1e-10).ln()
}
