//! Source records, resolved sources and chunks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of indexable source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Uploaded course document
    Document,
    /// Course video (transcript text)
    Video,
}

impl SourceKind {
    /// Prefix used in source ids
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Video => "video",
        }
    }
}

/// Document metadata as stored by the storage collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub tenant_id: i64,
    pub course_id: Option<i64>,
    /// Original filename, shown to users
    pub filename: String,
    /// Location of the uploaded bytes
    pub file_path: Option<PathBuf>,
    pub uploaded_at: DateTime<Utc>,
}

/// Video metadata as stored by the storage collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: i64,
    pub tenant_id: i64,
    pub course_id: Option<i64>,
    pub title: Option<String>,
    pub youtube_url: Option<String>,
    /// `upload` for locally stored media, anything else for linked media
    pub source_type: String,
    pub file_path: Option<PathBuf>,
    /// Stored transcript, if one was resolved before
    pub transcript: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Display name: title, then URL, then the source id
    pub fn display_name(&self) -> String {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.youtube_url.as_deref().filter(|u| !u.trim().is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| Source::make_id(SourceKind::Video, self.id))
    }

    /// Whether the media lives on local disk and can be transcribed
    pub fn is_upload(&self) -> bool {
        self.source_type.eq_ignore_ascii_case("upload")
    }
}

/// A source resolved for one retrieval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// `document:<id>` or `video:<id>`
    pub id: String,
    pub kind: SourceKind,
    pub tenant_id: i64,
    pub course_id: Option<i64>,
    pub name: String,
    pub raw_text: String,
}

impl Source {
    /// Build a source id from its kind and record id
    pub fn make_id(kind: SourceKind, record_id: i64) -> String {
        format!("{}:{}", kind.prefix(), record_id)
    }
}

/// Relation of a chunk to its siblings (parent-child chunking only)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkRelation {
    #[default]
    None,
    /// A large context window
    Parent { parent_index: usize },
    /// A small window inside a parent
    Child { parent_index: usize, position: usize },
}

/// A passage of one source, ready for scoring
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `<source id>:<ordinal>`, stable across re-chunking
    pub id: String,
    pub source_id: String,
    pub source_name: String,
    /// Course of the source, `None` for tenant-wide material
    #[serde(default)]
    pub course_id: Option<i64>,
    pub text: String,
    /// Position within the source's chunk list
    pub ordinal: usize,
    /// Whitespace-normalized excerpt shown to callers
    pub snippet: String,
    #[serde(default)]
    pub relation: ChunkRelation,
}

impl Chunk {
    /// Deterministic chunk id
    pub fn make_id(source_id: &str, ordinal: usize) -> String {
        format!("{}:{}", source_id, ordinal)
    }
}

/// A chunk with its retrieval scores, all in [0, 1]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub keyword_score: f32,
    pub semantic_score: f32,
    /// Strategy-dependent blend of the two
    pub combined_score: f32,
}
