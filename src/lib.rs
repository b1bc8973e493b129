//! Resumable, bounded-concurrency business scraping orchestrator.
//!
//! Walks a country → state → city hierarchy, fetches business listings per
//! leaf with at most K concurrent sessions, deduplicates by identity key,
//! persists a completion tree so interrupted runs resume cheaply, and writes
//! full export snapshots at every state boundary.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod services;
pub mod traits;
pub mod types;

pub use error::{Result, ScraperError};
pub use orchestrator::Orchestrator;
