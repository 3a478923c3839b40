//! Mel filterbank construction, framed power spectra, and the DCT-II used to
//! turn log-mel energies into MFCCs. Pure numeric building blocks shared by
//! the MFCC and spectral-contrast extractors.

use std::f32::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// One STFT frame: windowed magnitude spectrum, bins `0..=fft_size/2`.
pub struct FramedSpectrum {
    pub frames: Vec<Vec<f32>>,
    pub n_bins: usize,
}

/// Compute the magnitude spectrum for every Hann-windowed, hopped frame.
pub fn framed_magnitude_spectrum(samples: &[f32], fft_size: usize, hop_size: usize) -> FramedSpectrum {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    let hann = hann_window(fft_size);
    let n_bins = fft_size / 2 + 1;

    let mut frames = Vec::new();
    let mut pos = 0;
    while pos + fft_size <= samples.len() {
        let mut buffer: Vec<Complex<f32>> = (0..fft_size)
            .map(|i| Complex::new(samples[pos + i] * hann[i], 0.0))
            .collect();
        fft.process(&mut buffer);
        let mags: Vec<f32> = buffer[..n_bins].iter().map(|c| c.norm()).collect();
        frames.push(mags);
        pos += hop_size;
    }

    FramedSpectrum { frames, n_bins }
}

/// Apply a triangular mel filterbank to a sequence of power spectra, yielding
/// one log-mel energy vector (length `n_mels`) per frame.
pub fn mel_spectrogram(spectrum: &FramedSpectrum, sample_rate: u32, fft_size: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let filters = build_mel_filterbank(sample_rate, fft_size, n_mels, spectrum.n_bins);

    spectrum
        .frames
        .iter()
        .map(|mags| {
            filters
                .iter()
                .map(|filter| {
                    let energy: f32 = filter
                        .iter()
                        .zip(mags.iter())
                        .map(|(&w, &m)| w * m * m)
                        .sum();
                    (energy + 1e-10).ln()
                })
                .collect()
        })
        .collect()
}

fn build_mel_filterbank(sample_rate: u32, fft_size: usize, n_mels: usize, n_bins: usize) -> Vec<Vec<f32>> {
    let f_max = sample_rate as f32 / 2.0;

    let hz_to_mel = |f: f32| -> f32 { 2595.0 * (1.0 + f / 700.0).log10() };
    let mel_to_hz = |m: f32| -> f32 { 700.0 * (10.0_f32.powf(m / 2595.0) - 1.0) };

    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(f_max);

    let mel_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32)
        .collect();
    let bin_points: Vec<f32> = mel_points
        .iter()
        .map(|&m| mel_to_hz(m) * fft_size as f32 / sample_rate as f32)
        .collect();

    let mut filters = Vec::with_capacity(n_mels);
    for i in 0..n_mels {
        let mut filter = vec![0.0f32; n_bins];
        let left = bin_points[i];
        let center = bin_points[i + 1];
        let right = bin_points[i + 2];

        for j in 0..n_bins {
            let jf = j as f32;
            if jf >= left && jf <= center && (center - left) > 1e-10 {
                filter[j] = (jf - left) / (center - left);
            } else if jf > center && jf <= right && (right - center) > 1e-10 {
                filter[j] = (right - jf) / (right - center);
            }
        }
        filters.push(filter);
    }
    filters
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Type-II DCT (direct computation; fine for the small `n_mels` sizes used here).
pub fn dct_ii(input: &[f32], n_out: usize) -> Vec<f32> {
    let n = input.len();
    (0..n_out)
        .map(|k| {
            input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f32 * (2.0 * i as f32 + 1.0) / (2.0 * n as f32)).cos())
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_spectrogram_has_one_frame_per_hop() {
        let samples = vec![0.1f32; 4096];
        let spec = framed_magnitude_spectrum(&samples, 2048, 512);
        let mel = mel_spectrogram(&spec, 22_050, 2048, 40);
        assert_eq!(mel.len(), spec.frames.len());
        assert_eq!(mel[0].len(), 40);
    }

    #[test]
    fn dct_preserves_dc_component() {
        let input = vec![1.0f32; 10];
        let out = dct_ii(&input, 3);
        assert!(out[0] > 0.0);
    }
}
