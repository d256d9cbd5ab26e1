//! Input resolution and result caching

pub mod cache;
pub mod resolver;

pub use cache::{cache_key, CacheEntry, CacheStats, CacheStore, MemoryCache};
pub use resolver::{content_hash, expand_inputs, materialize, resolve_path, ResolvedPdf};
