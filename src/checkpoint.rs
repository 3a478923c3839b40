//! Checkpoint persistence (spec §6): the sole source of resume state. Owned
//! exclusively by the driver thread; every write is a full-file replacement
//! via write-then-rename so a crash mid-write can never leave a torn file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MatcherError;
use crate::fusion::{Confidence, FeatureScores, FusionResult};

/// One candidate's outcome, recorded exactly once per run (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate_id: String,
    pub ref_id: Option<String>,
    pub combined_score: f64,
    pub per_feature_scores: FeatureScoresDto,
    pub second_best: f64,
    pub score_gap: f64,
    pub confidence: String,
    pub error: Option<String>,
}

/// Serializable mirror of `fusion::FeatureScores` (kept separate so the
/// scoring types don't need to carry serde derives).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureScoresDto {
    pub mfcc: f64,
    pub chroma: f64,
    pub spectral: f64,
    pub rhythm: f64,
}

impl From<FeatureScores> for FeatureScoresDto {
    fn from(s: FeatureScores) -> Self {
        Self { mfcc: s.mfcc, chroma: s.chroma, spectral: s.spectral, rhythm: s.rhythm }
    }
}

impl MatchResult {
    pub fn from_fusion(candidate_id: String, result: &FusionResult) -> Self {
        Self {
            candidate_id,
            ref_id: result.ref_id.clone(),
            combined_score: result.combined_score,
            per_feature_scores: result.per_feature_scores.into(),
            second_best: result.second_best,
            score_gap: result.score_gap,
            confidence: result.confidence.as_str().to_string(),
            error: None,
        }
    }

    pub fn error_only(candidate_id: String, error: &MatcherError) -> Self {
        Self {
            candidate_id,
            ref_id: None,
            combined_score: 0.0,
            per_feature_scores: FeatureScoresDto { mfcc: 0.0, chroma: 0.0, spectral: 0.0, rhythm: 0.0 },
            second_best: 0.0,
            score_gap: 0.0,
            confidence: Confidence::Low.as_str().to_string(),
            error: Some(error.kind().to_string()),
        }
    }

    pub fn was_accepted(&self) -> bool {
        self.ref_id.is_some() && self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub processed_videos: Vec<String>,
    pub results: Vec<MatchResult>,
    pub last_updated: i64,
}

impl Checkpoint {
    pub fn empty() -> Self {
        Self { processed_videos: Vec::new(), results: Vec::new(), last_updated: 0 }
    }

    pub fn processed_ids(&self) -> std::collections::HashSet<&str> {
        self.processed_videos.iter().map(|s| s.as_str()).collect()
    }
}

/// Load `checkpoint.json` from `path`, or synthesize an empty checkpoint if
/// it doesn't exist yet (spec 4.F step 1).
pub fn load(path: &Path) -> Result<Checkpoint, MatcherError> {
    if !path.exists() {
        return Ok(Checkpoint::empty());
    }
    let data = fs::read_to_string(path).map_err(MatcherError::Io)?;
    serde_json::from_str(&data).map_err(MatcherError::Serde)
}

/// Persist `checkpoint` to `path` via write-then-rename: the new content is
/// written to a sibling temp file in the same directory (so the rename is
/// same-filesystem and therefore atomic), then renamed over `path`.
pub fn save(path: &Path, checkpoint: &Checkpoint) -> Result<(), MatcherError> {
    let data = serde_json::to_vec_pretty(checkpoint).map_err(MatcherError::Serde)?;
    let tmp_path = sibling_tmp_path(path);
    fs::write(&tmp_path, &data).map_err(MatcherError::Io)?;
    fs::rename(&tmp_path, path).map_err(MatcherError::Io)?;
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{file_name}.tmp"))
}
