//! Turning course material into indexable text
//!
//! Extraction recovers text from uploaded files, the collector gathers one
//! tenant's sources per request, and the chunkers split each source into
//! passages.

pub mod chunking;
pub mod collector;
pub mod extractor;
pub mod pdf;

pub use chunking::{Chunker, ChunkingStrategy, EmptyInputError, Passage};
pub use collector::{CollectedSources, SourceCollector};
pub use extractor::{DocumentTextExtractor, ExtractionKind};
pub use pdf::{extract_pdf_text, normalize_extracted_text};
