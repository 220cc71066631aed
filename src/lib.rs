//! # Estuary
//!
//! The ingestion and persistence core of an offline-first RSS/Atom reader.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → Parser → SyncScheduler → LocalStore ← CacheManager
//! ```
//!
//! - [`parser`]: RSS 2.0 / Atom 1.0 documents into one normalized model
//! - [`store`]: versioned, indexed SQLite document store with quota accounting
//! - [`cache`]: retention policy and quota-driven eviction
//! - [`sync`]: batched refresh, auto-refresh timer and the offline queue
//!
//! ## Quick Start
//!
//! ```bash
//! # Subscribe
//! estuary add https://blog.rust-lang.org/feed.xml
//!
//! # Refresh everything
//! estuary update
//!
//! # Unread articles
//! estuary list --items --unread
//!
//! # Keep refreshing in the foreground
//! estuary daemon --interval 30m
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// fetcher, sync scheduler and cache manager.
pub mod app;

/// Quota monitoring and retention-policy eviction.
pub mod cache;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/estuary/config.toml`.
pub mod config;

/// Foreground daemon for periodic refresh and maintenance.
pub mod daemon;

/// Core records: [`Feed`](domain::Feed), [`Article`](domain::Article),
/// [`Category`](domain::Category), user settings and sync state.
pub mod domain;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for feed fetching
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Feed parsing and normalization.
pub mod parser;

/// Persistence.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`LocalStore`](store::LocalStore): SQLite implementation
/// - [`StoreExt`](store::StoreExt): queries and user actions on top of any store
pub mod store;

/// Refresh scheduling and the offline operation queue.
pub mod sync;
