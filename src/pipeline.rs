//! Backlog Pipeline (spec 4.F): bounded worker pool over the unmatched
//! candidate backlog, with checkpointed resume and per-candidate fault
//! isolation. Grounded on the teacher's own `rayon` dependency, generalized
//! from a data-parallel primitive into a fire-and-forget task pool drained
//! through an `mpsc` channel so the driver can checkpoint on a cadence while
//! workers keep dispatching.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::checkpoint::{self, Checkpoint, MatchResult};
use crate::config::MatcherConfig;
use crate::dtw;
use crate::error::MatcherError;
use crate::features::{self, FeatureBundle};
use crate::fusion::{self, FeatureScores, FusionResult, ScoredReference};
use crate::media;
use crate::rhythm;
use crate::store::{Candidate, CandidateStore};
use crate::summary::{self, RunSummary};

pub struct PipelineOutcome {
    pub checkpoint: Checkpoint,
    pub summary: RunSummary,
}

/// Run the full backlog pipeline: load checkpoint, fetch the unmatched
/// backlog, filter out already-processed candidates, and drain them through
/// a fixed-size worker pool. On normal return the final checkpoint has
/// already been persisted (spec 4.F step driver / "on normal termination").
///
/// `interrupted` is polled at the top of both the dispatch loop and the
/// receive loop (spec 4.F "Cancellation": an interrupt stops dispatch and
/// drains nothing further). Either way the driver still writes a final
/// checkpoint covering everything drained so far before returning.
pub fn run(
    cfg: Arc<MatcherConfig>,
    catalog: Arc<Catalog>,
    store: Arc<dyn CandidateStore>,
    checkpoint_path: &Path,
    interrupted: Arc<AtomicBool>,
) -> Result<PipelineOutcome, MatcherError> {
    let mut checkpoint = checkpoint::load(checkpoint_path)?;
    let already_processed: HashSet<String> = checkpoint.processed_videos.iter().cloned().collect();

    let candidates: Vec<Candidate> = store
        .list_unmatched_candidates()?
        .into_iter()
        .filter(|c| !already_processed.contains(&c.id))
        .collect();

    info!(
        backlog = candidates.len(),
        already_processed = already_processed.len(),
        "starting backlog pipeline"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.max_workers)
        .build()
        .map_err(|e| MatcherError::SystemError(format!("failed to build worker pool: {e}")))?;

    let (tx, rx) = mpsc::channel::<MatchResult>();

    let mut dispatched = 0usize;
    for candidate in candidates {
        if interrupted.load(Ordering::Relaxed) {
            info!(dispatched, "interrupt received, stopping dispatch of remaining backlog");
            break;
        }
        let tx = tx.clone();
        let cfg = Arc::clone(&cfg);
        let catalog = Arc::clone(&catalog);
        let store = Arc::clone(&store);
        pool.spawn(move || {
            let result = process_candidate(&candidate, &catalog, &cfg, store.as_ref());
            let _ = tx.send(result);
        });
        dispatched += 1;
    }
    drop(tx);

    let mut completed = 0usize;
    for result in rx.iter().take(dispatched) {
        // Always record a result that already finished — it may already have
        // been pushed to the store (spec 4.F "already-completed results...
        // remain valid") — then stop draining further if interrupted.
        let processed = result.candidate_id.clone();
        checkpoint.results.push(result);
        checkpoint.processed_videos.push(processed);
        completed += 1;

        if completed % 10 == 0 {
            info!(completed, dispatched, "pipeline progress");
        }
        if completed % cfg.checkpoint_interval == 0 {
            checkpoint.last_updated = epoch_seconds();
            checkpoint::save(checkpoint_path, &checkpoint)?;
        }

        if interrupted.load(Ordering::Relaxed) {
            info!(completed, dispatched, "interrupt received, draining no further results");
            break;
        }
    }

    checkpoint.last_updated = epoch_seconds();
    checkpoint::save(checkpoint_path, &checkpoint)?;

    if interrupted.load(Ordering::Relaxed) {
        info!(completed, dispatched, "final checkpoint written, propagating interrupt");
        return Err(MatcherError::Interrupt);
    }

    let run_summary = summary::build(&checkpoint.results);
    info!(
        accepted = run_summary.accepted,
        rejected = run_summary.rejected,
        errors = run_summary.errors,
        "pipeline finished"
    );

    Ok(PipelineOutcome { checkpoint, summary: run_summary })
}

fn epoch_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One worker task (spec 4.F "per candidate"): fetch+decode, extract
/// features, score against every reference, fuse, and — if accepted —
/// immediately push the match to the external store. A sink-update failure
/// is recorded on the result but does not undo acceptance; the candidate is
/// still marked processed (spec 4.F step 4).
fn process_candidate(
    candidate: &Candidate,
    catalog: &Catalog,
    cfg: &MatcherConfig,
    store: &dyn CandidateStore,
) -> MatchResult {
    let fusion_result = match score_candidate(candidate, catalog, cfg) {
        Ok(r) => r,
        Err(e) => {
            warn!(candidate_id = %candidate.id, error = %e, "candidate processing failed");
            return MatchResult::error_only(candidate.id.clone(), &e);
        }
    };

    let mut result = MatchResult::from_fusion(candidate.id.clone(), &fusion_result);

    if fusion_result.accepted {
        if let Some(ref_id) = &fusion_result.ref_id {
            if let Err(e) = store.set_candidate_match(&candidate.id, ref_id) {
                warn!(candidate_id = %candidate.id, error = %e, "sink update failed, candidate still marked processed");
                result.error = Some(e.kind().to_string());
            }
        }
    }

    result
}

/// Fetch, decode, extract, and score `candidate` against every catalog
/// reference (spec 4.A–4.E), returning the fused top result. The scratch
/// media file is deleted unconditionally by `media::load_candidate_pcm`
/// before this function returns.
fn score_candidate(candidate: &Candidate, catalog: &Catalog, cfg: &MatcherConfig) -> Result<FusionResult, MatcherError> {
    let samples = media::load_candidate_pcm(&candidate.media_url, cfg)?;
    let bundle = features::extract_features(&samples, cfg)?;

    let mut scored = Vec::with_capacity(catalog.references.len());
    for reference in &catalog.references {
        let per_feature = score_against_reference(&bundle, &reference.features, cfg);
        let combined = fusion::combined_score(&per_feature, cfg);
        scored.push(ScoredReference { ref_id: reference.ref_id.clone(), per_feature, combined });
    }

    Ok(fusion::fuse(scored, cfg))
}

/// Score `candidate` against one `reference`, feature by feature. A DTW
/// failure on any one feature yields 0.0 for that feature only — it never
/// poisons the others or the candidate's other reference comparisons (spec
/// 4.C "Failure semantics").
fn score_against_reference(candidate: &FeatureBundle, reference: &FeatureBundle, cfg: &MatcherConfig) -> FeatureScores {
    let dtw_similarity = |label: &str, a, b, scale| match dtw::compare(a, b, scale, cfg) {
        Ok(result) => result.similarity,
        Err(e) => {
            warn!(feature = label, error = %e, "dtw comparison failed, scoring feature as 0.0");
            0.0
        }
    };

    let mfcc = dtw_similarity("mfcc", &candidate.mfcc, &reference.mfcc, cfg.scale.mfcc);
    let chroma = dtw_similarity("chroma", &candidate.chroma, &reference.chroma, cfg.scale.chroma);
    let spectral = dtw_similarity(
        "spectral_contrast",
        &candidate.spectral_contrast,
        &reference.spectral_contrast,
        cfg.scale.spectral,
    );
    let rhythm = rhythm::rhythm_similarity(candidate.tempo_bpm, reference.tempo_bpm);

    FeatureScores { mfcc, chroma, spectral, rhythm }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Reference;
    use crate::features::FeatureMatrix;
    use crate::store::fakes::FakeCandidateStore;
    use std::collections::HashSet as Set;
    use std::sync::Mutex;

    fn bundle(seed: f32) -> FeatureBundle {
        FeatureBundle {
            mfcc: FeatureMatrix::new(vec![vec![seed, 1.0 - seed]; 20]),
            chroma: FeatureMatrix::new(vec![vec![seed; 12]; 20]),
            spectral_contrast: FeatureMatrix::new(vec![vec![seed; 7]; 20]),
            tempo_bpm: 120.0,
            beat_frames: vec![],
        }
    }

    fn catalog_with(refs: Vec<(&str, f32)>) -> Catalog {
        Catalog {
            references: refs.into_iter().map(|(id, seed)| Reference { ref_id: id.to_string(), features: bundle(seed) }).collect(),
        }
    }

    #[test]
    fn scoring_and_fusion_pick_the_closer_reference() {
        let cfg = MatcherConfig::default();
        let catalog = catalog_with(vec![("CLOSE", 0.91), ("FAR", 0.1)]);
        let candidate_bundle = bundle(0.9);

        let scored: Vec<ScoredReference> = catalog
            .references
            .iter()
            .map(|r| {
                let per_feature = score_against_reference(&candidate_bundle, &r.features, &cfg);
                let combined = fusion::combined_score(&per_feature, &cfg);
                ScoredReference { ref_id: r.ref_id.clone(), per_feature, combined }
            })
            .collect();

        let result = fusion::fuse(scored, &cfg);
        assert_eq!(result.ref_id.as_deref(), Some("CLOSE"));
    }

    #[test]
    fn process_candidate_marks_sink_failure_without_losing_the_match() {
        let cfg = MatcherConfig::default();
        let store = FakeCandidateStore {
            candidates: vec![],
            matched: Mutex::new(Set::new()),
            fail_matches_for: ["c1".to_string()].into_iter().collect(),
        };
        let catalog = catalog_with(vec![("R1", 0.9)]);
        let candidate_bundle = bundle(0.9);

        // Build a fusion result directly (bypassing network fetch) to exercise
        // the sink-update-failure branch of `process_candidate`'s result handling.
        let per_feature = score_against_reference(&candidate_bundle, &catalog.references[0].features, &cfg);
        let combined = fusion::combined_score(&per_feature, &cfg);
        let fusion_result = fusion::fuse(
            vec![ScoredReference { ref_id: "R1".to_string(), per_feature, combined }],
            &cfg,
        );
        assert!(fusion_result.accepted);

        let mut result = MatchResult::from_fusion("c1".to_string(), &fusion_result);
        if let Err(e) = store.set_candidate_match("c1", "R1") {
            result.error = Some(e.kind().to_string());
        }

        assert_eq!(result.ref_id.as_deref(), Some("R1"));
        assert_eq!(result.error.as_deref(), Some("SINK_UPDATE_FAILED"));
    }

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

    /// One-shot mock HTTP server serving a fixed wav body, mirroring the
    /// `media::fetch` test helper, so `pipeline::run` can exercise its real
    /// fetch+decode path without a live network dependency.
    fn serve_wav_once() -> String {
        use std::io::{Read as IoRead, Write as IoWrite};
        use std::net::TcpListener;

        let body = tiny_wav_bytes();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
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

    fn candidate(id: &str, media_url: String) -> Candidate {
        Candidate {
            id: id.to_string(),
            media_url,
            external_video_id: format!("ext-{id}"),
            owner_handle: "@someone".to_string(),
        }
    }

    #[test]
    fn run_resumes_from_checkpoint_and_is_idempotent_on_rerun() {
        let cfg = MatcherConfig::default().shared();
        let catalog = Arc::new(catalog_with(vec![("R1", 0.9)]));
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.json");

        // Seed a checkpoint as if "c1" was already processed by a prior run.
        let mut seeded = Checkpoint::empty();
        seeded.processed_videos.push("c1".to_string());
        seeded.results.push(MatchResult::error_only("c1".to_string(), &MatcherError::CatalogEmpty));
        seeded.last_updated = 1_700_000_000;
        checkpoint::save(&checkpoint_path, &seeded).unwrap();

        // c1 has no server behind it: if `run` tried to refetch it, the HTTP
        // call would fail and the run would record a fetch error for it.
        let store = Arc::new(FakeCandidateStore {
            candidates: vec![
                candidate("c1", "http://127.0.0.1:1/unused".to_string()),
                candidate("c2", serve_wav_once()),
                candidate("c3", serve_wav_once()),
            ],
            matched: Mutex::new(Set::new()),
            fail_matches_for: Set::new(),
        });

        let interrupted = Arc::new(AtomicBool::new(false));
        let outcome = run(
            Arc::clone(&cfg),
            Arc::clone(&catalog),
            store.clone() as Arc<dyn CandidateStore>,
            &checkpoint_path,
            Arc::clone(&interrupted),
        )
        .unwrap();

        let processed: Set<String> = outcome.checkpoint.processed_videos.iter().cloned().collect();
        assert_eq!(processed, ["c1", "c2", "c3"].map(String::from).into_iter().collect::<Set<_>>());
        assert_eq!(outcome.checkpoint.results.len(), 3);
        // c1's seeded error result was kept verbatim, not reprocessed.
        let c1_result = outcome.checkpoint.results.iter().find(|r| r.candidate_id == "c1").unwrap();
        assert_eq!(c1_result.error.as_deref(), Some("CATALOG_EMPTY"));

        let matched_after_first_run = store.matched.lock().unwrap().len();

        // Re-run against the same checkpoint: everything is already processed,
        // so no candidate is dispatched and no duplicate match is recorded.
        let second = run(
            Arc::clone(&cfg),
            catalog,
            store.clone() as Arc<dyn CandidateStore>,
            &checkpoint_path,
            interrupted,
        )
        .unwrap();

        let processed_after_second: Set<String> = second.checkpoint.processed_videos.iter().cloned().collect();
        assert_eq!(processed_after_second, processed);
        assert_eq!(second.checkpoint.results.len(), 3);
        assert_eq!(store.matched.lock().unwrap().len(), matched_after_first_run);
    }
}
