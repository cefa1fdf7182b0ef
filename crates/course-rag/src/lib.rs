//! course-rag: tenant-scoped retrieval and grounding over course materials
//!
//! Answers a question using only a tenant's uploaded documents and video
//! transcripts. Candidates are chunked per request with the tenant's
//! strategy, ranked by a blend of keyword overlap and vector similarity, and
//! gated by a grounding threshold. Below the threshold the engine refuses
//! instead of letting the LLM answer from general knowledge.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod tenant;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::RagConfig;
pub use engine::{Answer, RagEngine, ReindexReport};
pub use error::{Error, Result};
pub use tenant::{TenantConfigResolver, TenantRetrievalConfig};
pub use types::{AnswerResult, AskRequest, AskResponse, DegradedReason, SourceRef, StrategyMetadata};
