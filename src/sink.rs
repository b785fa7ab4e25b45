//! Streaming sinks: incremental consumers of response deltas.
//!
//! A sink receives text fragments in emission order while an attempt streams.
//! Write failures are logged, never propagated; the sink must not be able to
//! fail an otherwise healthy attempt.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::LlmError;

/// Incremental consumer of streamed text fragments.
pub trait DeltaSink: Send {
    /// Called once per fragment, in emission order.
    fn on_delta(&mut self, fragment: &str);

    /// Called once after the stream completes.
    fn finish(&mut self) {}
}

/// Which sink a streamed attempt gets.
#[derive(Debug, Clone)]
pub enum SinkPolicy {
    /// Echo fragments to stdout as they arrive.
    Console,
    /// Write fragments to a per-attempt file, flushed per fragment so partial
    /// output survives a crash.
    Transcript { dir: PathBuf },
}

impl SinkPolicy {
    /// Open a concrete sink for one attempt. Transcript files are named
    /// uniquely per run and per attempt.
    pub fn open(&self, attempt_id: u64) -> Result<Box<dyn DeltaSink>, LlmError> {
        match self {
            Self::Console => Ok(Box::new(ConsoleSink)),
            Self::Transcript { dir } => {
                let path = transcript_path(dir, attempt_id);
                std::fs::create_dir_all(dir).map_err(|e| {
                    LlmError::InvalidInput(format!(
                        "cannot create transcript dir {}: {e}",
                        dir.display()
                    ))
                })?;
                let file = File::create(&path).map_err(|e| {
                    LlmError::InvalidInput(format!(
                        "cannot create transcript file {}: {e}",
                        path.display()
                    ))
                })?;
                tracing::debug!(attempt_id, path = %path.display(), "streaming to transcript");
                Ok(Box::new(TranscriptSink { file, path }))
            }
        }
    }
}

fn transcript_path(dir: &Path, attempt_id: u64) -> PathBuf {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(char::from)
        .collect();
    dir.join(format!("attempt_{attempt_id}_{suffix}.txt"))
}

struct ConsoleSink;

impl DeltaSink for ConsoleSink {
    fn on_delta(&mut self, fragment: &str) {
        let mut out = std::io::stdout().lock();
        if out.write_all(fragment.as_bytes()).and_then(|()| out.flush()).is_err() {
            tracing::warn!("stdout sink write failed");
        }
    }

    fn finish(&mut self) {
        // Newline after the streamed body so the next log line starts clean.
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(b"\n").and_then(|()| out.flush());
    }
}

struct TranscriptSink {
    file: File,
    path: PathBuf,
}

impl DeltaSink for TranscriptSink {
    fn on_delta(&mut self, fragment: &str) {
        if self
            .file
            .write_all(fragment.as_bytes())
            .and_then(|()| self.file.flush())
            .is_err()
        {
            tracing::warn!(path = %self.path.display(), "transcript write failed");
        }
    }

    fn finish(&mut self) {
        tracing::debug!(path = %self.path.display(), "transcript complete");
    }
}
