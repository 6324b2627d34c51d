//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the image pipeline core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system, which also carries progress to live clients
//!
//! ## Overview
//!
//! This crate contains the core runtime utilities that other modules depend on.
//! It establishes the logging conventions, the typed configuration loaded at
//! startup, and the event broadcasting mechanism used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
