//! Bulk indexing of documents into the corpus collection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use crate::core::chunker::chunk_text;
use crate::io::embeddings::Embedder;
use crate::io::vector_store::VectorStore;

/// Extensions indexed when none are given (without the leading dot).
pub const DEFAULT_FORMATS: [&str; 9] = ["txt", "md", "go", "py", "js", "ts", "json", "yaml", "yml"];

/// Files under `root` whose extension is in `formats`, sorted.
///
/// Without `recursive` only the top level of `root` is listed. A file `root`
/// is returned as-is when its extension matches.
pub fn collect_files(root: &Path, formats: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let formats: Vec<String> = formats
        .iter()
        .map(|f| f.trim().trim_start_matches('.').to_lowercase())
        .filter(|f| !f.is_empty())
        .collect();
    let mut walker = WalkDir::new(root).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| formats.contains(&ext));
        if matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Totals from one indexing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub files_indexed: usize,
    pub chunks_stored: usize,
    /// Files that failed, with the error text.
    pub failures: Vec<(PathBuf, String)>,
}

/// Chunks, embeds and stores documents.
pub struct DocumentIndexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentIndexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
            chunk_size,
            chunk_overlap,
        }
    }

    /// Index one file; returns the number of chunks stored.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn index_file(&self, path: &Path) -> Result<usize> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        let chunks = chunk_text(&text, self.chunk_size, self.chunk_overlap);
        for (i, chunk) in chunks.iter().enumerate() {
            let vector = self
                .embedder
                .embed(chunk)
                .with_context(|| format!("embed chunk {i}"))?;
            let id = format!("{}_chunk_{i}", path.display());
            self.store
                .upsert(&self.collection, &id, chunk, &vector)
                .with_context(|| format!("store chunk {i}"))?;
        }
        Ok(chunks.len())
    }

    /// Index every file, continuing past per-file failures.
    pub fn index_files(&self, files: &[PathBuf]) -> IndexSummary {
        let mut summary = IndexSummary::default();
        for (i, path) in files.iter().enumerate() {
            info!(n = i + 1, total = files.len(), path = %path.display(), "indexing file");
            match self.index_file(path) {
                Ok(chunks) => {
                    summary.files_indexed += 1;
                    summary.chunks_stored += chunks;
                }
                Err(err) => {
                    warn!(path = %path.display(), err = %format!("{err:#}"), "indexing failed");
                    summary.failures.push((path.clone(), format!("{err:#}")));
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedEmbedder, MemoryStore};

    fn formats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn collects_matching_files_at_requested_depth() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a.md"), "x").expect("write");
        fs::write(temp.path().join("b.bin"), "x").expect("write");
        fs::create_dir(temp.path().join("sub")).expect("mkdir");
        fs::write(temp.path().join("sub/c.TXT"), "x").expect("write");

        let top = collect_files(temp.path(), &formats(&["md", ".txt"]), false).expect("collect");
        assert_eq!(top, vec![temp.path().join("a.md")]);

        let all = collect_files(temp.path(), &formats(&["md", "txt"]), true).expect("collect");
        assert_eq!(all, vec![temp.path().join("a.md"), temp.path().join("sub/c.TXT")]);
    }

    #[test]
    fn stores_each_chunk_with_positional_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("notes.txt");
        fs::write(&path, "abcdefghij").expect("write");
        let store = Arc::new(MemoryStore::default());
        let indexer =
            DocumentIndexer::new(Arc::new(FixedEmbedder::default()), store.clone(), "documents", 4, 1);

        let summary = indexer.index_files(&[path.clone(), temp.path().join("missing.txt")]);
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.chunks_stored, 3);
        assert_eq!(summary.failures.len(), 1);

        let docs = store.documents("documents");
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
        assert_eq!(docs[2].id, format!("{}_chunk_2", path.display()));
    }
}
