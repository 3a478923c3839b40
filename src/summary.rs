//! Run summary (spec §6 `results.json`): a human-readable report over the
//! accumulated results, not consumed by the system itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checkpoint::MatchResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AverageFeatureScores {
    pub mfcc: f64,
    pub chroma: f64,
    pub spectral: f64,
    pub rhythm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_candidates: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub errors: usize,
    pub confidence_distribution: ConfidenceDistribution,
    pub average_accepted_feature_scores: AverageFeatureScores,
    pub accepted_results: Vec<MatchResult>,
    pub rejected_results: Vec<MatchResult>,
    pub error_results: Vec<MatchResult>,
    pub error_kind_counts: BTreeMap<String, usize>,
}

/// Build the run summary from the accumulated results. `accepted` means a
/// match was both ref-assigned and free of a sink-update error; a candidate
/// whose match was accepted by fusion but hit `SINK_UPDATE_FAILED` still
/// counts as an error (spec 4.F step 4 — it's still marked processed, but
/// it's not a clean success).
pub fn build(results: &[MatchResult]) -> RunSummary {
    let mut accepted_results = Vec::new();
    let mut rejected_results = Vec::new();
    let mut error_results = Vec::new();
    let mut error_kind_counts: BTreeMap<String, usize> = BTreeMap::new();

    for r in results {
        if let Some(kind) = &r.error {
            *error_kind_counts.entry(kind.clone()).or_insert(0) += 1;
            error_results.push(r.clone());
        } else if r.ref_id.is_some() {
            accepted_results.push(r.clone());
        } else {
            rejected_results.push(r.clone());
        }
    }

    let mut confidence_distribution = ConfidenceDistribution { high: 0, medium: 0, low: 0 };
    for r in &accepted_results {
        match r.confidence.as_str() {
            "high" => confidence_distribution.high += 1,
            "medium" => confidence_distribution.medium += 1,
            _ => confidence_distribution.low += 1,
        }
    }

    let n = accepted_results.len().max(1) as f64;
    let mut sums = (0.0, 0.0, 0.0, 0.0);
    for r in &accepted_results {
        sums.0 += r.per_feature_scores.mfcc;
        sums.1 += r.per_feature_scores.chroma;
        sums.2 += r.per_feature_scores.spectral;
        sums.3 += r.per_feature_scores.rhythm;
    }
    let average_accepted_feature_scores = if accepted_results.is_empty() {
        AverageFeatureScores { mfcc: 0.0, chroma: 0.0, spectral: 0.0, rhythm: 0.0 }
    } else {
        AverageFeatureScores {
            mfcc: sums.0 / n,
            chroma: sums.1 / n,
            spectral: sums.2 / n,
            rhythm: sums.3 / n,
        }
    };

    RunSummary {
        total_candidates: results.len(),
        accepted: accepted_results.len(),
        rejected: rejected_results.len(),
        errors: error_results.len(),
        confidence_distribution,
        average_accepted_feature_scores,
        accepted_results,
        rejected_results,
        error_results,
        error_kind_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::FeatureScoresDto;

    fn result(candidate_id: &str, ref_id: Option<&str>, confidence: &str, error: Option<&str>) -> MatchResult {
        MatchResult {
            candidate_id: candidate_id.to_string(),
            ref_id: ref_id.map(|s| s.to_string()),
            combined_score: 90.0,
            per_feature_scores: FeatureScoresDto { mfcc: 80.0, chroma: 95.0, spectral: 85.0, rhythm: 70.0 },
            second_best: 60.0,
            score_gap: 30.0,
            confidence: confidence.to_string(),
            error: error.map(|s| s.to_string()),
        }
    }

    #[test]
    fn classifies_accepted_rejected_and_error_results() {
        let results = vec![
            result("c1", Some("R1"), "high", None),
            result("c2", None, "low", None),
            result("c3", None, "low", Some("FETCH_FAILED")),
        ];
        let summary = build(&results);
        assert_eq!(summary.total_candidates, 3);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.error_kind_counts.get("FETCH_FAILED"), Some(&1));
    }

    #[test]
    fn averages_only_over_accepted_results() {
        let results = vec![result("c1", Some("R1"), "high", None), result("c2", Some("R2"), "high", None)];
        let summary = build(&results);
        assert_eq!(summary.average_accepted_feature_scores.chroma, 95.0);
    }

    #[test]
    fn empty_results_yields_zeroed_summary() {
        let summary = build(&[]);
        assert_eq!(summary.total_candidates, 0);
        assert_eq!(summary.average_accepted_feature_scores.mfcc, 0.0);
    }
}
