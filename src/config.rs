//! Single immutable configuration record threaded through every component.
//!
//! No process-wide mutable state: a `MatcherConfig` is built once (from CLI
//! flags layered over these defaults) and shared behind an `Arc` from there on.

use std::sync::Arc;

/// Per-feature fusion weights. Must sum to 1.0 (checked in `MatcherConfig::validate`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureWeights {
    pub mfcc: f64,
    pub chroma: f64,
    pub spectral: f64,
    pub rhythm: f64,
}

impl FeatureWeights {
    pub fn sum(&self) -> f64 {
        self.mfcc + self.chroma + self.spectral + self.rhythm
    }
}

/// Per-feature exponential-decay scale constants for distance→similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleConstants {
    pub mfcc: f64,
    pub chroma: f64,
    pub spectral: f64,
}

/// Confidence classification gaps (score-gap thresholds, descending).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGaps {
    pub high: f64,
    pub medium: f64,
}

/// The full set of tunable constants named in the spec's external-interfaces
/// section. All fields are overridable at deploy time; defaults reproduce the
/// spec's reference values exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// Target mono sample rate for all analysis, in Hz.
    pub sample_rate: u32,
    /// Seconds of audio head used for fingerprinting.
    pub head_seconds: f32,
    /// Number of MFCC coefficients.
    pub n_mfcc: usize,
    /// Number of chroma bins.
    pub n_chroma: usize,
    /// Number of spectral-contrast bands (including the DC band).
    pub n_spectral_bands: usize,
    /// FFT window size for framed analysis.
    pub fft_size: usize,
    /// Hop size between frames.
    pub hop_size: usize,

    pub feature_weights: FeatureWeights,
    pub scale: ScaleConstants,
    pub similarity_threshold: f64,
    pub confidence_gaps: ConfidenceGaps,

    /// DTW: hard cap on number of time frames per matrix before scoring.
    pub max_frames: usize,
    /// DTW: hard cap on Tx * Ty cells before allocating the cost matrix.
    pub max_cells: usize,
    /// DTW: Sakoe-Chiba band radius.
    pub sakoe_chiba_band: usize,

    /// Worker pool size; never exceeds `min(4, available_parallelism)` unless
    /// explicitly raised by the caller (the cap exists for memory safety).
    pub max_workers: usize,
    /// HTTP fetch retry attempts (total attempt budget, not retries-after-first).
    pub retry_attempts: u32,
    /// Backoff unit between retries, in seconds; actual backoff is
    /// `retry_delay_sec * attempt_index`.
    pub retry_delay_sec: u64,
    /// HTTP read timeout.
    pub http_timeout_sec: u64,
    /// Persist a checkpoint every N completed candidates.
    pub checkpoint_interval: usize,
    /// Minimum byte count for a downloaded body to be considered non-corrupt.
    pub min_body_bytes: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            head_seconds: 20.0,
            n_mfcc: 20,
            n_chroma: 12,
            n_spectral_bands: 7,
            fft_size: 2048,
            hop_size: 512,
            feature_weights: FeatureWeights {
                mfcc: 0.20,
                chroma: 0.45,
                spectral: 0.20,
                rhythm: 0.15,
            },
            scale: ScaleConstants {
                mfcc: 0.24,
                chroma: 1.52,
                spectral: 0.73,
            },
            similarity_threshold: 80.0,
            confidence_gaps: ConfidenceGaps {
                high: 15.0,
                medium: 10.0,
            },
            max_frames: 300,
            max_cells: 90_000,
            sakoe_chiba_band: 20,
            max_workers: default_max_workers(),
            retry_attempts: 3,
            retry_delay_sec: 1,
            http_timeout_sec: 30,
            checkpoint_interval: 10,
            min_body_bytes: 1024,
        }
    }
}

fn default_max_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.min(4)
}

impl MatcherConfig {
    /// Validate internal consistency. The spec's weight-closure law (§8.4)
    /// is enforced here rather than trusted.
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.feature_weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(format!("feature weights must sum to 1.0, got {sum}"));
        }
        if self.max_workers == 0 {
            return Err("max_workers must be >= 1".into());
        }
        if self.sakoe_chiba_band == 0 {
            return Err("sakoe_chiba_band must be >= 1".into());
        }
        Ok(())
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
