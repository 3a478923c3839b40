//! Dual-sink logging (spec §6 `matcher.log`): INFO by default, overridable
//! via `RUST_LOG`, duplicated to stdout and an append-only log file.
//!
//! Grounded on the `registry().with(EnvFilter).with(fmt::layer())` wiring
//! used by the teacher's `wkmp-ap` binary, extended with a second `fmt`
//! layer writing to the log file instead of a single combined sink.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone)]
struct SharedFile(Arc<File>);

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        (&*self.0).flush()
    }
}

/// Install the global subscriber. Must be called once, before any other
/// component logs. `log_path` is opened in append mode so repeated runs
/// never truncate prior history.
pub fn init(log_path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    let shared = SharedFile(Arc::new(file));

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter())
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_target(false).with_writer(move || shared.clone()))
        .init();

    Ok(())
}
