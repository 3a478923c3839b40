//! Media Loader (spec component A): fetch candidate audio over HTTP, decode
//! to normalized mono PCM, truncated to a fixed head duration.

pub mod decode;
pub mod fetch;

use crate::config::MatcherConfig;
use crate::error::MatcherError;

/// Fetch + decode a candidate's media URL to a mono PCM head, per spec 4.A.
/// The scratch file backing the download is deleted before this function
/// returns, regardless of outcome.
pub fn load_candidate_pcm(url: &str, cfg: &MatcherConfig) -> Result<Vec<f32>, MatcherError> {
    let scratch = fetch::fetch(url, cfg)?;
    decode::decode_head(scratch.path(), cfg.sample_rate, cfg.head_seconds)
    // `scratch` drops here, deleting the temp file unconditionally.
}
