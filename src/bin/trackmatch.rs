//! `trackmatch`: run the backlog pipeline once against a reference catalog
//! and an external candidate store, then exit.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use trackmatch::catalog;
use trackmatch::config::MatcherConfig;
use trackmatch::logging;
use trackmatch::pipeline;
use trackmatch::store::{CandidateStore, HttpCandidateStore};

#[derive(Parser, Debug)]
#[command(name = "trackmatch")]
#[command(about = "Audio fingerprint matcher for campaign-song attribution")]
#[command(version)]
struct Args {
    /// Root directory of the reference catalog (one subdirectory per reference track).
    #[arg(long)]
    reference_dir: PathBuf,

    /// Directory for checkpoint.json, results.json, and matcher.log.
    #[arg(long, default_value = "./output")]
    output_dir: PathBuf,

    /// Base URL of the external candidate store.
    #[arg(long, env = "TRACKMATCH_STORE_URL")]
    store_url: String,

    /// Deploy-key bearer token for the external candidate store.
    #[arg(long, env = "TRACKMATCH_STORE_TOKEN")]
    store_token: String,

    /// Worker pool size; defaults to min(4, available CPUs) if unset.
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::fs::create_dir_all(&args.output_dir).context("creating output directory")?;
    logging::init(&args.output_dir.join("matcher.log")).context("initializing logging")?;

    let mut cfg = MatcherConfig::default();
    if let Some(workers) = args.workers {
        cfg.max_workers = workers;
    }
    cfg.validate().map_err(anyhow::Error::msg).context("invalid configuration")?;
    let cfg = cfg.shared();

    info!(reference_dir = %args.reference_dir.display(), "loading reference catalog");
    let loaded = catalog::load(&args.reference_dir, &cfg);
    let loaded = match loaded {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load reference catalog");
            return Err(e.into());
        }
    };
    info!(references = loaded.references.len(), "reference catalog loaded");
    let catalog = Arc::new(loaded);

    let store: Arc<dyn CandidateStore> =
        Arc::new(HttpCandidateStore::new(args.store_url.clone(), args.store_token.clone(), &cfg));

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_for_handler = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        warn!("received interrupt, finishing in-flight work and writing final checkpoint");
        interrupted_for_handler.store(true, Ordering::Relaxed);
    })
    .context("installing Ctrl-C handler")?;

    let checkpoint_path = args.output_dir.join("checkpoint.json");
    let outcome = pipeline::run(Arc::clone(&cfg), catalog, store, &checkpoint_path, interrupted)?;

    let results_path = args.output_dir.join("results.json");
    let results_json = serde_json::to_vec_pretty(&outcome.summary).context("serializing results.json")?;
    std::fs::write(&results_path, results_json).context("writing results.json")?;

    info!(
        accepted = outcome.summary.accepted,
        rejected = outcome.summary.rejected,
        errors = outcome.summary.errors,
        "run complete"
    );

    Ok(())
}
