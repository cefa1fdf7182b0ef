//! Core types for the retrieval engine

pub mod degraded;
pub mod document;
pub mod query;
pub mod response;

pub use degraded::DegradedReason;
pub use document::{Chunk, ChunkRelation, DocumentRecord, ScoredChunk, Source, SourceKind, VideoRecord};
pub use query::AskRequest;
pub use response::{AnswerResult, AskResponse, SourceRef, StrategyMetadata};
