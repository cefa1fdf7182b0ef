//! Transcript resolution for uploaded videos

use async_trait::async_trait;
use std::path::Path;

use crate::error::{Error, Result};

/// Turns a locally stored media file into transcript text
#[async_trait]
pub trait TranscriptResolver: Send + Sync {
    async fn transcribe(&self, media_path: &Path) -> Result<String>;

    fn name(&self) -> &str;
}

/// Resolver used when no transcription backend is configured
pub struct NoTranscription;

#[async_trait]
impl TranscriptResolver for NoTranscription {
    async fn transcribe(&self, media_path: &Path) -> Result<String> {
        Err(Error::Config(format!(
            "no transcription backend configured for {}",
            media_path.display()
        )))
    }

    fn name(&self) -> &str {
        "none"
    }
}
