//! Best-effort evaluation diagnostics file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

/// Appends timestamped blocks to an optional file. Never fails the caller.
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    path: Option<PathBuf>,
}

impl DebugLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `entry` under a `[timestamp] stage` header.
    pub fn write(&self, stage: &str, entry: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let block = format!("[{stamp}] {stage}\n{entry}\n\n");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(block.as_bytes()));
        if let Err(err) = result {
            debug!(path = %path.display(), err = %err, "debug log write failed");
        }
    }
}
