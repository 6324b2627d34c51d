//! # Host Bridge Traits
//!
//! Abstractions over the external collaborators the image pipeline depends on.
//!
//! ## Overview
//!
//! This crate defines the contract between the core and the managed services it
//! runs against. Each trait represents a capability the core requires but does
//! not own: the blob store, the distributed cache, the browser push channel,
//! and the host's clock and log pipeline.
//!
//! ## Traits
//!
//! ### Storage
//! - [`ObjectStorage`](storage::ObjectStorage) - Originals and derivatives, public URLs
//! - [`UrlSigner`](storage::UrlSigner) - Pre-signed URL issuance
//! - [`CacheStore`](cache::CacheStore) - TTL key-value cache
//!
//! ### Delivery
//! - [`ProgressChannel`](push::ProgressChannel) - Fire-and-forget progress to live clients
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Implementations
//!
//! | Environment | Implementation Crate | Status |
//! |-------------|---------------------|--------|
//! | Server      | `bridge-server`     | ✅ In Progress |
//! | Tests       | `bridge-server` in-memory adapters | ✅ |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for consistent
//! error handling. Implementations should:
//!
//! - Convert transport-specific errors to `BridgeError`
//! - Report missing objects as `BridgeError::NotFound`
//! - Never include signed URLs or credentials in error messages
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks. Implementations must ensure thread safety.

pub mod cache;
pub mod error;
pub mod push;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use cache::CacheStore;
pub use push::{ProgressChannel, ProgressRecord};
pub use storage::{
    derivative_name, object_key, AssetKind, ObjectStorage, PresignedUrl, SignMethod, SignRequest,
    UrlSigner, DERIVATIVE_CONTENT_TYPE, DERIVATIVE_PREFIX,
};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
