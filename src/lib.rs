//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `core-imaging`). Host applications
//! can depend on `imgpipe-workspace` and enable the documented features without
//! needing to wire each crate individually.

#[cfg(feature = "server-shims")]
pub use core_service;

#[cfg(feature = "imaging")]
pub use core_imaging;
