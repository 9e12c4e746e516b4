//! Diagnostic log sink used by the wallet loader.
//!
//! The loader writes one formatted line per classified failure before it
//! returns control to the caller. The sink is an explicit capability rather
//! than ambient global state so tests can inject an in-memory sink and
//! assert on exact lines.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{error, warn};

/// Receiver for diagnostic log lines.
pub trait DiagnosticSink: Send + Sync {
    /// Append one formatted line to the diagnostic log.
    fn append(&self, line: &str);
}

/// Production sink that forwards lines through the `tracing` pipeline.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn append(&self, line: &str) {
        error!(target: "walletdb", "{line}");
    }
}

/// Sink that appends lines to a debug log file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DiagnosticSink for FileSink {
    fn append(&self, line: &str) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(err) = result {
            warn!(path = %self.path.display(), %err, "failed to append diagnostic log line");
        }
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line appended so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether any appended line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn append(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.to_string());
    }
}
