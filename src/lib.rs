//! # trackmatch
//!
//! Multi-feature audio fingerprint matcher: identifies which reference
//! track (a campaign song) a downloaded short-form-video clip's soundtrack
//! was derived from.
//!
//! Pipeline: fetch + decode the candidate's audio head, extract MFCC/
//! chroma/spectral-contrast matrices plus a scalar tempo, score each against
//! every catalog reference via DTW and tempo-ratio comparison, fuse the
//! per-feature similarities into one score with a confidence margin, and
//! accept or reject against a fixed threshold.

pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod dtw;
pub mod error;
pub mod features;
pub mod fusion;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod rhythm;
pub mod store;
pub mod summary;

pub use config::MatcherConfig;
pub use error::MatcherError;
pub use fusion::{Confidence, FeatureScores, FusionResult};
