//! External store client (spec §6): the candidate backlog and match-sink
//! this matcher talks to. A trait plus an HTTP/`ureq` implementation, so the
//! pipeline can be driven against a fake store in tests without a live
//! endpoint.

use serde::{Deserialize, Serialize};

use crate::config::MatcherConfig;
use crate::error::MatcherError;

/// One unmatched candidate as returned by `list_unmatched_candidates`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: String,
    pub media_url: String,
    pub external_video_id: String,
    pub owner_handle: String,
}

/// Pluggable candidate backlog + match sink. The pipeline treats both
/// endpoints as opaque (spec §6); `set_candidate_match` must be idempotent
/// since the pipeline may retry it via checkpointed re-run.
pub trait CandidateStore: Send + Sync {
    fn list_unmatched_candidates(&self) -> Result<Vec<Candidate>, MatcherError>;
    fn set_candidate_match(&self, candidate_id: &str, ref_id: &str) -> Result<(), MatcherError>;
}

/// HTTP-backed store: deploy-key bearer auth over a JSON API.
pub struct HttpCandidateStore {
    base_url: String,
    token: String,
    agent: ureq::Agent,
}

impl HttpCandidateStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, cfg: &MatcherConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_read(std::time::Duration::from_secs(cfg.http_timeout_sec))
            .build();
        Self { base_url: base_url.into(), token: token.into(), agent }
    }
}

#[derive(Debug, Deserialize)]
struct ListUnmatchedResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
struct SetMatchRequest<'a> {
    candidate_id: &'a str,
    ref_id: &'a str,
}

impl CandidateStore for HttpCandidateStore {
    fn list_unmatched_candidates(&self) -> Result<Vec<Candidate>, MatcherError> {
        let url = format!("{}/candidates/unmatched", self.base_url);
        let resp = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .call()
            .map_err(|e| MatcherError::SystemError(format!("list_unmatched_candidates failed: {e}")))?;

        let body: ListUnmatchedResponse = resp
            .into_json()
            .map_err(|e| MatcherError::SystemError(format!("invalid candidate list response: {e}")))?;
        Ok(body.candidates)
    }

    fn set_candidate_match(&self, candidate_id: &str, ref_id: &str) -> Result<(), MatcherError> {
        let url = format!("{}/candidates/match", self.base_url);
        let req = SetMatchRequest { candidate_id, ref_id };
        self.agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .send_json(&req)
            .map_err(|e| MatcherError::SinkUpdateFailed(format!("set_candidate_match failed: {e}")))?;
        Ok(())
    }
}
