//! Fusion & Confidence (spec 4.E): combine per-feature similarities into a
//! single score per reference, rank references, and classify confidence from
//! the margin to the runner-up.

use crate::config::MatcherConfig;

/// Per-feature similarity breakdown for one candidate-vs-reference pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureScores {
    pub mfcc: f64,
    pub chroma: f64,
    pub spectral: f64,
    pub rhythm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// A single reference's fused score, before ranking.
#[derive(Debug, Clone)]
pub struct ScoredReference {
    pub ref_id: String,
    pub per_feature: FeatureScores,
    pub combined: f64,
}

/// Final fusion result for one candidate against the whole catalog.
#[derive(Debug, Clone)]
pub struct FusionResult {
    pub ref_id: Option<String>,
    pub combined_score: f64,
    pub per_feature_scores: FeatureScores,
    pub second_best: f64,
    pub score_gap: f64,
    pub confidence: Confidence,
    pub accepted: bool,
}

/// Weighted sum per spec 4.E: `0.20*mfcc + 0.45*chroma + 0.20*spectral + 0.15*rhythm`.
pub fn combined_score(scores: &FeatureScores, cfg: &MatcherConfig) -> f64 {
    let w = &cfg.feature_weights;
    w.mfcc * scores.mfcc + w.chroma * scores.chroma + w.spectral * scores.spectral + w.rhythm * scores.rhythm
}

/// Rank scored references descending by combined score, compute the gap to
/// the runner-up, classify confidence, and apply the acceptance threshold.
/// Confidence is diagnostic only — it never gates acceptance (spec 4.E).
pub fn fuse(mut candidates: Vec<ScoredReference>, cfg: &MatcherConfig) -> FusionResult {
    candidates.sort_by(|a, b| b.combined.partial_cmp(&a.combined).unwrap_or(std::cmp::Ordering::Equal));

    let Some(best) = candidates.first().cloned() else {
        return FusionResult {
            ref_id: None,
            combined_score: 0.0,
            per_feature_scores: FeatureScores { mfcc: 0.0, chroma: 0.0, spectral: 0.0, rhythm: 0.0 },
            second_best: 0.0,
            score_gap: 0.0,
            confidence: Confidence::Low,
            accepted: false,
        };
    };

    let second_best = candidates.get(1).map(|r| r.combined).unwrap_or(0.0);
    let score_gap = best.combined - second_best;

    let confidence = if score_gap >= cfg.confidence_gaps.high {
        Confidence::High
    } else if score_gap >= cfg.confidence_gaps.medium {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    let accepted = best.combined >= cfg.similarity_threshold;

    FusionResult {
        ref_id: Some(best.ref_id),
        combined_score: best.combined,
        per_feature_scores: best.per_feature,
        second_best,
        score_gap,
        confidence,
        accepted,
    }
}
