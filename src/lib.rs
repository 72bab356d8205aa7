//! # Freshet
//!
//! A feed synchronization and filtering engine.
//!
//! ## Architecture
//!
//! Freshet follows a modular pipeline architecture:
//!
//! ```text
//! Engine → Fetcher → Normalizer → Filters → History → Store
//! ```
//!
//! - [`engine`]: scheduling, the bounded worker pool, and state merging
//! - [`fetcher`]: HTTP client with ETag/conditional request support
//! - [`normalizer`]: converts RSS/Atom feeds to unified domain models and
//!   sanitizes entry text
//! - [`query`]: the boolean keyword filter language
//! - [`store`]: crash-safe snapshot persistence
//!
//! ## Quick Start
//!
//! ```bash
//! # Subscribe to a feed (polling cadence is inferred)
//! freshet add https://blog.rust-lang.org/feed.xml
//!
//! # Only surface items mentioning Rust in the title
//! freshet filter add "+title:rust"
//!
//! # Poll everything that is due
//! freshet update
//!
//! # Keep polling in the foreground
//! freshet watch
//! ```

/// Application context and error handling.
///
/// [`AppContext`](app::AppContext) wires together all components:
/// config, store, fetcher, normalizer, manager.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Layered configuration, loaded once from
/// `~/.config/freshet/config.toml` over compiled-in defaults.
pub mod config;

/// Core domain models.
///
/// - [`Feed`](domain::Feed): one subscription with its dedup cache
/// - [`Item`](domain::Item): one syndicated entry
/// - [`Filter`](domain::Filter): a keyword query plus feed scope
pub mod domain;

/// The synchronization engine: scheduling, the bounded worker pool,
/// filtering, purging, and snapshot conversion.
pub mod engine;

/// HTTP fetching with conditional request support.
pub mod fetcher;

/// Polling-interval inference for newly added feeds.
pub mod interval;

/// Feed parsing and text sanitization.
pub mod normalizer;

/// The boolean keyword filter language: lexer, parser, AST, evaluator.
pub mod query;

/// Crash-safe snapshot persistence with three-file rotation.
pub mod store;
