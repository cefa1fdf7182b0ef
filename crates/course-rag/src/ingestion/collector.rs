//! Source collection for one retrieval request
//!
//! Documents are read through the memoizing extractor. Videos use their
//! stored transcript, or are transcribed on demand when the media was
//! uploaded and still exists on disk. A fresh transcript is saved back to
//! storage best-effort.

use std::sync::Arc;

use super::extractor::DocumentTextExtractor;
use super::pdf::normalize_extracted_text;
use crate::error::Result;
use crate::providers::{TenantStore, TranscriptResolver};
use crate::types::{DegradedReason, DocumentRecord, Source, SourceKind, VideoRecord};

/// Sources of one request plus what went wrong while gathering them
#[derive(Debug, Default)]
pub struct CollectedSources {
    pub sources: Vec<Source>,
    pub degraded: Vec<DegradedReason>,
}

/// Gathers the indexable text of a tenant's course material
pub struct SourceCollector {
    store: Arc<dyn TenantStore>,
    extractor: Arc<DocumentTextExtractor>,
    transcriber: Arc<dyn TranscriptResolver>,
    max_documents: usize,
    max_videos: usize,
}

impl SourceCollector {
    pub fn new(
        store: Arc<dyn TenantStore>,
        extractor: Arc<DocumentTextExtractor>,
        transcriber: Arc<dyn TranscriptResolver>,
        max_documents: usize,
        max_videos: usize,
    ) -> Self {
        Self {
            store,
            extractor,
            transcriber,
            max_documents,
            max_videos,
        }
    }

    /// Collect documents then videos, most recent first, skipping empty text
    ///
    /// Fails only when the store cannot list the records.
    pub async fn collect(&self, tenant_id: i64, course_id: Option<i64>) -> Result<CollectedSources> {
        let documents = self
            .store
            .documents(tenant_id, course_id, self.max_documents)
            .await?;
        let videos = self
            .store
            .videos(tenant_id, course_id, self.max_videos)
            .await?;

        let mut collected = CollectedSources::default();

        for doc in &documents {
            let text = self.document_text(doc).await;
            if text.trim().is_empty() {
                tracing::debug!("Skipping document {} ({}): no text", doc.id, doc.filename);
                continue;
            }
            collected.sources.push(Source {
                id: Source::make_id(SourceKind::Document, doc.id),
                kind: SourceKind::Document,
                tenant_id: doc.tenant_id,
                course_id: doc.course_id,
                name: doc.filename.clone(),
                raw_text: text,
            });
        }

        for video in &videos {
            let text = match self.video_text(video).await {
                Ok(text) => text,
                Err(reason) => {
                    tracing::warn!("Video {} skipped: {}", video.id, reason);
                    collected.degraded.push(reason);
                    continue;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            collected.sources.push(Source {
                id: Source::make_id(SourceKind::Video, video.id),
                kind: SourceKind::Video,
                tenant_id: video.tenant_id,
                course_id: video.course_id,
                name: video.display_name(),
                raw_text: text,
            });
        }

        tracing::debug!(
            "Collected {} sources for tenant {} course {:?} ({} documents, {} videos listed)",
            collected.sources.len(),
            tenant_id,
            course_id,
            documents.len(),
            videos.len()
        );
        Ok(collected)
    }

    async fn document_text(&self, doc: &DocumentRecord) -> String {
        match &doc.file_path {
            Some(path) => self.extractor.extract(path, &doc.filename).await.to_string(),
            None => String::new(),
        }
    }

    async fn video_text(&self, video: &VideoRecord) -> std::result::Result<String, DegradedReason> {
        if let Some(transcript) = video.transcript.as_deref() {
            if !transcript.trim().is_empty() {
                return Ok(transcript.to_string());
            }
        }

        let source_id = Source::make_id(SourceKind::Video, video.id);
        if !video.is_upload() {
            // linked media without a stored transcript has nothing to index
            return Ok(String::new());
        }
        let Some(path) = video.file_path.as_deref() else {
            return Err(DegradedReason::TranscriptUnavailable(format!(
                "{}: upload has no file path",
                source_id
            )));
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(DegradedReason::TranscriptUnavailable(format!(
                "{}: media file missing",
                source_id
            )));
        }

        let transcript = self
            .transcriber
            .transcribe(path)
            .await
            .map(|raw| normalize_extracted_text(&raw))
            .map_err(|e| DegradedReason::TranscriptUnavailable(format!("{}: {}", source_id, e)))?;

        if !transcript.is_empty() {
            if let Err(e) = self.store.save_transcript(video.id, &transcript).await {
                tracing::warn!("Failed to save transcript for video {}: {}", video.id, e);
            }
        }
        Ok(transcript)
    }
}
