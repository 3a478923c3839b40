//! HTTP fetch of candidate media to a scratch file, with retry, a size guard
//! against corrupted downloads, and a probe-decode corruption check.
//!
//! The scratch file is a `tempfile::NamedTempFile`: it is deleted the moment
//! it goes out of scope, which gives every exit path — success, error, panic,
//! interrupt — the cleanup guarantee the spec requires without a manual
//! `Drop` impl of our own.

use std::io::{Read, Write};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::warn;

use crate::config::MatcherConfig;
use crate::error::MatcherError;
use crate::media::decode;

/// A downloaded, probe-verified scratch file. Deleting it is automatic on
/// drop; callers never need to remember to clean up.
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }
}

/// Fetch `url` to a scratch file, retrying on transient failure. Contract:
/// spec 4.A steps 1-4.
pub fn fetch(url: &str, cfg: &MatcherConfig) -> Result<ScratchFile, MatcherError> {
    let mut last_reason = String::from("no attempts made");

    for attempt in 1..=cfg.retry_attempts {
        match try_fetch_once(url, cfg) {
            Ok(scratch) => return Ok(scratch),
            Err(reason) => {
                warn!(url, attempt, %reason, "fetch attempt failed");
                last_reason = reason;
                if attempt < cfg.retry_attempts {
                    std::thread::sleep(Duration::from_secs(cfg.retry_delay_sec * attempt as u64));
                }
            }
        }
    }

    Err(MatcherError::FetchFailed {
        url: url.to_string(),
        reason: last_reason,
    })
}

fn try_fetch_once(url: &str, cfg: &MatcherConfig) -> Result<ScratchFile, String> {
    let agent = ureq::AgentBuilder::new()
        .timeout_read(Duration::from_secs(cfg.http_timeout_sec))
        .build();

    let response = agent.get(url).call().map_err(|e| e.to_string())?;

    let suffix = guess_suffix(url);
    let mut scratch = tempfile::Builder::new()
        .prefix("trackmatch-")
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| e.to_string())?;

    let mut body = response.into_reader();
    let mut buf = [0u8; 64 * 1024];
    let mut total: usize = 0;
    loop {
        let n = body.read(&mut buf).map_err(|e| e.to_string())?;
        if n == 0 {
            break;
        }
        scratch.write_all(&buf[..n]).map_err(|e| e.to_string())?;
        total += n;
    }
    scratch.flush().map_err(|e| e.to_string())?;

    if total < cfg.min_body_bytes {
        return Err(format!("body too small ({total} bytes), treating as corrupted"));
    }

    decode::probe_decodable(scratch.path(), 0.1, cfg.sample_rate).map_err(|e| e.to_string())?;

    Ok(ScratchFile { file: scratch })
}

/// Best-effort extension guess from the URL path, so symphonia's probe has a
/// hint to narrow codec detection. Falls back to a generic suffix.
fn guess_suffix(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('.').next() {
        Some(ext) if ext.len() <= 4 && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => ".audio".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn tiny_wav_bytes() -> Vec<u8> {
        let samples: Vec<i16> = (0..22_050)
            .map(|i| ((i as f32 * 0.1).sin() * 1000.0) as i16)
            .collect();
        let mut out = Vec::new();
        let data_len = (samples.len() * 2) as u32;
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&22_050u32.to_le_bytes());
        out.extend_from_slice(&44_100u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// Minimal one-shot HTTP server serving a fixed byte body, for exercising
    /// the fetch/retry/size-guard path without a real network dependency.
    fn serve_once(body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(&body);
            }
        });
        format!("http://{addr}/clip.wav")
    }

    #[test]
    fn fetch_succeeds_on_valid_audio() {
        let url = serve_once(tiny_wav_bytes());
        let cfg = MatcherConfig::default();
        let scratch = fetch(&url, &cfg).unwrap();
        assert!(scratch.path().exists());
    }

    #[test]
    fn fetch_rejects_undersized_body() {
        let url = serve_once(vec![0u8; 10]);
        let mut cfg = MatcherConfig::default();
        cfg.retry_attempts = 1;
        let err = fetch(&url, &cfg).unwrap_err();
        assert_eq!(err.kind(), "FETCH_FAILED");
    }

    #[test]
    fn scratch_file_deleted_on_drop() {
        let url = serve_once(tiny_wav_bytes());
        let cfg = MatcherConfig::default();
        let scratch = fetch(&url, &cfg).unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }
}
