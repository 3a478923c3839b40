//! Reference Catalog Loader (spec 4.E / external interfaces §6): scans a
//! root directory one level deep, treating each immediate subdirectory as one
//! reference track (`ref_id` = directory name), extracting its feature
//! bundle once up front so every candidate comparison is a cheap read.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::config::MatcherConfig;
use crate::error::MatcherError;
use crate::features::{self, FeatureBundle};
use crate::media;

const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a"];

#[derive(Debug)]
pub struct Reference {
    pub ref_id: String,
    pub features: FeatureBundle,
}

#[derive(Debug)]
pub struct Catalog {
    pub references: Vec<Reference>,
}

impl Catalog {
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

/// Load the catalog from `root`. Each immediate subdirectory becomes one
/// reference; within it, audio files are tried in directory order and the
/// first one that decodes and extracts cleanly is kept (multiple files in a
/// reference directory are treated as redundant copies, not distinct
/// segments — a later one is tried only if an earlier one fails). A
/// subdirectory that yields no usable file is skipped with a warning, not a
/// fatal error. Aborts with `CatalogEmpty` only if *no* reference survives.
pub fn load(root: &Path, cfg: &MatcherConfig) -> Result<Catalog, MatcherError> {
    let mut references = Vec::new();

    let entries = fs::read_dir(root).map_err(MatcherError::Io)?;
    for entry in entries {
        let entry = entry.map_err(MatcherError::Io)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let ref_id = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if ref_id.is_empty() {
            continue;
        }

        match load_one_reference(&path, cfg) {
            Some(features) => references.push(Reference { ref_id, features }),
            None => warn!(ref_id = %ref_id, "reference directory yielded no usable audio file, skipping"),
        }
    }

    if references.is_empty() {
        return Err(MatcherError::CatalogEmpty);
    }

    Ok(Catalog { references })
}

fn load_one_reference(dir: &Path, cfg: &MatcherConfig) -> Option<FeatureBundle> {
    let mut files: Vec<_> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_allowed_extension(p))
        .collect();
    files.sort();

    for path in files {
        match extract_from_file(&path, cfg) {
            Ok(bundle) => return Some(bundle),
            Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable reference file"),
        }
    }
    None
}

fn extract_from_file(path: &Path, cfg: &MatcherConfig) -> Result<FeatureBundle, MatcherError> {
    let samples = media::decode::decode_head(path, cfg.sample_rate, cfg.head_seconds)?;
    features::extract_features(&samples, cfg)
}

fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
