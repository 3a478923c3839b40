//! Error taxonomy. Kinds map directly to the spec's error-handling table;
//! `MatcherError` is the *kind*, not a wire type — most variants never
//! propagate past a worker task, they're recorded on the `MatchResult` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("feature extraction failed: {0}")]
    FeatureFailed(String),

    #[error("dtw failed: {0}")]
    DtwFailed(String),

    #[error("system error: {0}")]
    SystemError(String),

    #[error("sink update failed: {0}")]
    SinkUpdateFailed(String),

    #[error("reference catalog is empty")]
    CatalogEmpty,

    #[error("interrupted")]
    Interrupt,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The subset of `MatcherError` that can be attached to a per-candidate
/// `MatchResult` without aborting the run (everything except `CatalogEmpty`,
/// which is fatal at startup, and `Interrupt`, which is propagated).
impl MatcherError {
    pub fn kind(&self) -> &'static str {
        match self {
            MatcherError::FetchFailed { .. } => "FETCH_FAILED",
            MatcherError::DecodeFailed(_) => "DECODE_FAILED",
            MatcherError::FeatureFailed(_) => "FEATURE_FAILED",
            MatcherError::DtwFailed(_) => "DTW_FAILED",
            MatcherError::SystemError(_) => "SYSTEM_ERROR",
            MatcherError::SinkUpdateFailed(_) => "SINK_UPDATE_FAILED",
            MatcherError::CatalogEmpty => "CATALOG_EMPTY",
            MatcherError::Interrupt => "INTERRUPT",
            MatcherError::Io(_) => "SYSTEM_ERROR",
            MatcherError::Serde(_) => "SYSTEM_ERROR",
        }
    }
}
