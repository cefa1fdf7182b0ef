//! Per-file text extraction with a memo table
//!
//! Extraction runs on the blocking pool. Results are memoized per
//! `(path, filename)` so repeated retrievals over the same course do not
//! re-read or re-parse files.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::pdf::{extract_pdf_text, extract_printable_text};

/// How a file's bytes are turned into text, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    /// Read as lossy UTF-8
    Text,
    /// Content-stream parsing
    Pdf,
    /// Printable-run heuristic over raw bytes
    Binary,
}

impl ExtractionKind {
    /// Detect from the user-facing filename
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "txt" | "md" | "csv" | "json" | "py" | "ts" | "tsx" | "js" => Self::Text,
            "pdf" => Self::Pdf,
            _ => Self::Binary,
        }
    }
}

/// Extract text from a file on disk
pub fn extract_file(path: &Path, filename: &str) -> std::io::Result<String> {
    let raw = std::fs::read(path)?;
    Ok(match ExtractionKind::from_filename(filename) {
        ExtractionKind::Text => String::from_utf8_lossy(&raw).into_owned(),
        ExtractionKind::Pdf => extract_pdf_text(&raw),
        ExtractionKind::Binary => extract_printable_text(&raw),
    })
}

/// Memoizing document text extractor
pub struct DocumentTextExtractor {
    memo: DashMap<(PathBuf, String), Arc<str>>,
    max_entries: usize,
}

impl DocumentTextExtractor {
    /// Create an extractor keeping at most `max_entries` memoized results
    pub fn new(max_entries: usize) -> Self {
        Self {
            memo: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Extract text, returning an empty string when the file cannot be read
    pub async fn extract(&self, path: &Path, filename: &str) -> Arc<str> {
        let key = (path.to_path_buf(), filename.to_string());
        if let Some(hit) = self.memo.get(&key) {
            return Arc::clone(hit.value());
        }

        let (path_owned, name_owned) = key.clone();
        let result =
            tokio::task::spawn_blocking(move || extract_file(&path_owned, &name_owned)).await;

        let text: Arc<str> = match result {
            Ok(Ok(text)) => Arc::from(text),
            Ok(Err(e)) => {
                tracing::warn!("Could not read {} ({}): {}", filename, path.display(), e);
                return Arc::from("");
            }
            Err(e) => {
                tracing::warn!("Extraction task for {} failed: {}", filename, e);
                return Arc::from("");
            }
        };

        if self.memo.len() >= self.max_entries {
            tracing::debug!("Extraction memo full ({} entries), clearing", self.memo.len());
            self.memo.clear();
        }
        self.memo.insert(key, Arc::clone(&text));
        text
    }

    /// Number of memoized extractions
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

impl Default for DocumentTextExtractor {
    fn default() -> Self {
        Self::new(256)
    }
}
