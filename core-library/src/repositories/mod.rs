//! Repository traits and their implementations
//!
//! Each store sits behind an `async_trait` so the pipeline can swap the
//! in-memory implementations used locally for hosted ones.

pub mod metadata;
pub mod timing;
pub mod user;

pub use metadata::{InMemoryMetadataStore, MetadataStore};
pub use timing::{SqliteTimingStore, TimingStore};
pub use user::{InMemoryUserStore, UserStore};
