//! Background auto-indexing worker.

use std::sync::Arc;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use crate::io::auto_index::AutoIndexer;

/// Runs indexing passes on a dedicated thread.
///
/// At most one pass waits in the queue: a trigger that arrives while a pass is
/// already pending is coalesced into it. Failures are logged, never returned
/// to the triggering command.
pub struct IndexWorker {
    sender: Option<SyncSender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl IndexWorker {
    pub fn spawn(indexer: Arc<AutoIndexer>) -> Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<()>(1);
        let handle = thread::Builder::new()
            .name("auto-index".to_string())
            .spawn(move || {
                while receiver.recv().is_ok() {
                    match indexer.run_pass() {
                        Ok(stored) => debug!(stored, "auto-index pass finished"),
                        Err(err) => warn!(err = %format!("{err:#}"), "auto-index pass failed"),
                    }
                }
            })
            .context("spawn auto-index worker")?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Request an indexing pass without waiting for it.
    pub fn trigger(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(()) {
            Ok(()) => debug!("auto-index pass queued"),
            Err(TrySendError::Full(())) => debug!("auto-index pass already queued"),
            Err(TrySendError::Disconnected(())) => warn!("auto-index worker is gone"),
        }
    }

    /// Finish queued work and stop the thread.
    pub fn shutdown(&mut self) -> Result<()> {
        self.sender.take();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("auto-index worker panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for IndexWorker {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(err = %err, "auto-index worker shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::auto_index::{ChangeDetector, TrackRules};
    use crate::io::config::AutoIndexConfig;
    use crate::test_support::{FixedEmbedder, MemoryStore};

    #[test]
    fn queued_pass_runs_before_shutdown_returns() {
        let temp = tempfile::tempdir().expect("tempdir");
        let rules = TrackRules::from_config(&AutoIndexConfig::default())
            .expect("rules")
            .with_enabled(true);
        let detector = ChangeDetector::new(temp.path(), rules);
        detector.take_snapshot().expect("snapshot");
        let store = Arc::new(MemoryStore::default());
        let indexer = Arc::new(AutoIndexer::new(
            detector,
            Arc::new(FixedEmbedder::default()),
            store.clone(),
            "auto_indexed",
        ));

        std::fs::write(temp.path().join("notes.md"), "hello").expect("write");
        let mut worker = IndexWorker::spawn(indexer.clone()).expect("spawn");
        worker.trigger();
        worker.trigger();
        worker.shutdown().expect("shutdown");

        let docs = store.documents("auto_indexed");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "hello");
        assert!(docs[0].id.starts_with("auto_notes.md_"));
        assert!(indexer.detector().detect_changes().expect("detect").is_empty());
    }

    #[test]
    fn trigger_after_shutdown_is_ignored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let rules = TrackRules::from_config(&AutoIndexConfig::default()).expect("rules");
        let indexer = Arc::new(AutoIndexer::new(
            ChangeDetector::new(temp.path(), rules),
            Arc::new(FixedEmbedder::default()),
            Arc::new(MemoryStore::default()),
            "auto_indexed",
        ));
        let mut worker = IndexWorker::spawn(indexer).expect("spawn");
        worker.shutdown().expect("shutdown");
        worker.trigger();
        worker.shutdown().expect("second shutdown");
    }
}
