//! Placedown - coordinated export caching and streaming for place data
//!
//! This library builds compressed export artifacts (Linked Places feature
//! collections and tab-separated tables) from streams of place records,
//! caching them on disk behind a distributed single-writer lock so that
//! expensive builds happen once per artifact.
//!
//! # High-Level API
//!
//! The [`service`] module is the front door:
//!
//! ```ignore
//! use placedown::cache::{CacheKey, EntityType, ExportFormat};
//! use placedown::service::ExportService;
//! use placedown::stream::BufferSink;
//! use tokio_util::sync::CancellationToken;
//!
//! let key = CacheKey::new(EntityType::Dataset, 42, ExportFormat::Feature);
//! let mut sink = BufferSink::new();
//! let outcome = service.serve(&key, &mut sink, &CancellationToken::new())?;
//! ```

pub mod cache;
pub mod config;
pub mod export;
pub mod geometry;
pub mod logging;
pub mod runner;
pub mod service;
pub mod source;
pub mod stream;

/// Version of the Placedown library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
