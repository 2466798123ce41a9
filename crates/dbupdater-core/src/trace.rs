//! Optional trace log.
//!
//! A line-oriented sink handed to the controller at construction. When
//! disabled every call is a no-op; when enabled each line is prefixed with a
//! timestamp (in brackets for parsing). Write failures are logged through
//! `tracing` and otherwise ignored: the trace never influences a run.

use std::{
    fmt,
    fs::File,
    io::{LineWriter, Write},
    path::Path,
    sync::{Arc, Mutex},
};

use crate::{Error, Result};

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Observability context for one run.
#[derive(Clone, Default)]
pub struct Trace {
    sink: Option<Sink>,
}

impl Trace {
    /// A trace that records nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Trace into any writer.
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Some(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    /// Trace into `path`, truncating whatever a previous run left there.
    pub fn to_file(path: &Path) -> Result<Self> {
        File::create(path)
            .map(|file| Self::to_writer(LineWriter::new(file)))
            .map_err(|e| {
                Error::IoError(format!(
                    "Failed to create trace log {}: {e}",
                    path.display()
                ))
            })
    }

    pub const fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Append one timestamped line.
    pub fn line(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!(target: "dbupdater::trace", "{message}");

        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        self.write(&format!("[{timestamp}] {message}\n"));
    }

    /// Append an empty separator line.
    pub fn blank(&self) {
        self.write("\n");
    }

    fn write(&self, text: &str) {
        let Some(sink) = &self.sink else {
            return;
        };

        let written = sink
            .lock()
            .map_err(|_| std::io::Error::other("trace sink poisoned"))
            .and_then(|mut writer| writer.write_all(text.as_bytes()));

        if let Err(e) = written {
            tracing::warn!("Failed to write to trace log: {e}");
        }
    }

    /// Flush buffered lines, e.g. before the process exits.
    pub fn flush(&self) {
        if let Some(sink) = &self.sink {
            if let Ok(mut writer) = sink.lock() {
                if let Err(e) = writer.flush() {
                    tracing::warn!("Failed to flush trace log: {e}");
                }
            }
        }
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
