//! Change detection and indexing of files touched by executed commands.
//!
//! [`ChangeDetector`] owns the last snapshot of trackable files and diffs the
//! working tree against it. [`AutoIndexer`] embeds changed files into the
//! auto-index collection and then resets the baseline.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::io::config::AutoIndexConfig;
use crate::io::embeddings::Embedder;
use crate::io::vector_store::VectorStore;

/// Which files the detector tracks.
#[derive(Debug, Clone)]
pub struct TrackRules {
    enabled: bool,
    max_file_size: u64,
    excludes: GlobSet,
    /// Directory names from `dir/*` patterns, excluded wherever they appear.
    excluded_dirs: Vec<String>,
    /// Lowercased extensions including the leading dot.
    extensions: Vec<String>,
}

impl TrackRules {
    pub fn from_config(cfg: &AutoIndexConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut excluded_dirs = Vec::new();
        for pattern in &cfg.exclude_patterns {
            let glob =
                Glob::new(pattern).with_context(|| format!("invalid exclude pattern {pattern}"))?;
            builder.add(glob);
            if let Some(dir) = pattern.strip_suffix("/*").filter(|d| !d.is_empty()) {
                excluded_dirs.push(dir.to_string());
            }
        }
        Ok(Self {
            enabled: cfg.enabled,
            max_file_size: cfg.max_file_size,
            excludes: builder.build().context("build exclude patterns")?,
            excluded_dirs,
            extensions: cfg.extensions.iter().map(|e| e.to_lowercase()).collect(),
        })
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `rel_path` (forward slashes, relative to the root) is excluded.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        if self.excludes.is_match(rel_path) {
            return true;
        }
        self.excluded_dirs.iter().any(|dir| {
            rel_path == dir
                || rel_path.starts_with(&format!("{dir}/"))
                || rel_path.contains(&format!("/{dir}/"))
        })
    }

    /// Full trackability check for a regular file of `size` bytes.
    pub fn should_track(&self, rel_path: &str, size: u64) -> bool {
        if !self.enabled || size > self.max_file_size || self.is_excluded(rel_path) {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        match extension_of(rel_path) {
            Some(ext) => self.extensions.iter().any(|allowed| *allowed == ext),
            None => false,
        }
    }
}

fn extension_of(rel_path: &str) -> Option<String> {
    Path::new(rel_path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// Recorded state of one tracked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Hex-encoded SHA-256 of the contents.
    pub hash: String,
}

/// Owns the last-known snapshot of trackable files under a root directory.
#[derive(Debug)]
pub struct ChangeDetector {
    root: PathBuf,
    rules: TrackRules,
    snapshot: RwLock<HashMap<String, FileRecord>>,
}

impl ChangeDetector {
    pub fn new(root: impl Into<PathBuf>, rules: TrackRules) -> Self {
        Self {
            root: root.into(),
            rules,
            snapshot: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rules(&self) -> &TrackRules {
        &self.rules
    }

    /// Replace the snapshot with a full walk of the root.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn take_snapshot(&self) -> Result<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| anyhow!("snapshot lock poisoned"))?;
        let fresh = self.scan()?;
        debug!(files = fresh.len(), "snapshot taken");
        *guard = fresh;
        Ok(())
    }

    /// Paths that are new or whose contents differ from the snapshot.
    ///
    /// The snapshot is not modified. Files deleted since the snapshot are not
    /// reported.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn detect_changes(&self) -> Result<Vec<String>> {
        let guard = self
            .snapshot
            .read()
            .map_err(|_| anyhow!("snapshot lock poisoned"))?;
        let current = self.scan()?;
        let mut changed: Vec<String> = current
            .into_iter()
            .filter(|(path, record)| guard.get(path).is_none_or(|old| old.hash != record.hash))
            .map(|(path, _)| path)
            .collect();
        changed.sort();
        debug!(changed = changed.len(), "changes detected");
        Ok(changed)
    }

    /// Paths currently held in the snapshot, sorted.
    pub fn tracked_paths(&self) -> Result<Vec<String>> {
        let guard = self
            .snapshot
            .read()
            .map_err(|_| anyhow!("snapshot lock poisoned"))?;
        let mut paths: Vec<String> = guard.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }

    fn scan(&self) -> Result<HashMap<String, FileRecord>> {
        let meta = fs::metadata(&self.root)
            .with_context(|| format!("stat index root {}", self.root.display()))?;
        if !meta.is_dir() {
            return Err(anyhow!("index root {} is not a directory", self.root.display()));
        }

        let mut files = HashMap::new();
        if !self.rules.enabled {
            return Ok(files);
        }
        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || relative_key(&self.root, entry.path())
                    .is_none_or(|rel| !self.rules.is_excluded(&rel))
        });
        for entry in walker {
            // Unreadable entries are skipped.
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = relative_key(&self.root, entry.path()) else {
                continue;
            };
            let Ok(meta) = entry.metadata() else { continue };
            if !self.rules.should_track(&rel, meta.len()) {
                continue;
            }
            let Ok(hash) = hash_file(entry.path()) else {
                continue;
            };
            files.insert(
                rel,
                FileRecord {
                    size: meta.len(),
                    modified: meta.modified().ok(),
                    hash,
                },
            );
        }
        Ok(files)
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Embeds changed files into the auto-index collection.
pub struct AutoIndexer {
    detector: ChangeDetector,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl AutoIndexer {
    pub fn new(
        detector: ChangeDetector,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            detector,
            embedder,
            store,
            collection: collection.into(),
        }
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Detect and index in one pass. Returns the number of files stored.
    pub fn run_pass(&self) -> Result<usize> {
        let changed = self.detector.detect_changes()?;
        self.index_changed_files(&changed)
    }

    /// Embed and store each file, then reset the snapshot.
    ///
    /// A file that cannot be read, embedded or stored is skipped with a
    /// warning; the snapshot is still reset afterwards.
    #[instrument(skip_all, fields(files = paths.len()))]
    pub fn index_changed_files(&self, paths: &[String]) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }
        info!(files = %paths.join(", "), "auto-indexing changed files");
        let mut stored = 0;
        for rel in paths {
            match self.index_file(rel) {
                Ok(()) => stored += 1,
                Err(err) => warn!(path = %rel, err = %format!("{err:#}"), "auto-index skipped file"),
            }
        }
        self.detector.take_snapshot()?;
        Ok(stored)
    }

    fn index_file(&self, rel: &str) -> Result<()> {
        let full = self.detector.root().join(rel);
        let bytes = fs::read(&full).with_context(|| format!("read {}", full.display()))?;
        let content = String::from_utf8_lossy(&bytes);
        let vector = self.embedder.embed(&content).context("embed file")?;
        let id = auto_document_id(rel, Utc::now().timestamp());
        self.store
            .upsert(&self.collection, &id, &content, &vector)
            .context("store file")
    }
}

/// Document id for an auto-indexed file: `auto_<path with / as _>_<unix secs>`.
pub fn auto_document_id(rel_path: &str, unix_secs: i64) -> String {
    format!("auto_{}_{unix_secs}", rel_path.replace('/', "_"))
}
