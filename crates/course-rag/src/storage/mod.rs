//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for tenant settings, course material
//! metadata and the precomputed chunk embedding index.

mod database;
mod vector_index;

pub(crate) use database::has_column;
pub use database::{decode_vector, encode_vector, SqliteStore};
pub use vector_index::SqliteVectorIndex;
