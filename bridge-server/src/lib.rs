//! # Server Bridge Implementations
//!
//! Default implementations of bridge traits for the server deployment.
//!
//! ## Overview
//!
//! - `ObjectStorage` over pre-signed URLs using `reqwest` ([`HttpObjectStorage`])
//! - `CacheStore` as an in-process LRU with per-entry TTL ([`LruTtlCache`])
//! - `ObjectStorage` held in memory for local runs and tests ([`InMemoryObjectStorage`])
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_server::{HttpObjectStorage, LruTtlCache};
//! use std::sync::Arc;
//!
//! let storage = HttpObjectStorage::new(signer, "d111111abcdef8.cloudfront.net")?;
//! let cache = LruTtlCache::new(10_000);
//! ```

mod http_storage;
mod memory_cache;
mod memory_storage;

pub use http_storage::{HttpObjectStorage, RetryPolicy};
pub use memory_cache::LruTtlCache;
pub use memory_storage::{InMemoryObjectStorage, StoredObject};
