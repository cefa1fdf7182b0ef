//! Answer caching
//!
//! A bounded in-process tier in front of an optional shared tier. Both are
//! advisory: a miss or a backing-store error means recomputing the answer.

mod answer_cache;
mod shared;

pub use answer_cache::{cache_key, AnswerCache, CacheLookup, CacheStats};
pub use shared::{SharedCache, SqliteSharedCache};
