//! Error types shared by the cache store, the upstream sources and the synchronizer.
//!
//! The `CacheError` enum covers every failure the ticker cache can surface:
//! rejected search input, upstream fetch problems, missing rows, persistence
//! failures and configuration mistakes. Backends convert their driver errors
//! into one of these variants at the boundary so callers only match on one type.
use std::io;

use thiserror::Error;

/// Unified error type for the ticker cache workspace.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The query does not name a known tradable symbol. No state was mutated.
    #[error("Invalid search query: {0}")]
    InvalidSymbol(String),

    /// Quote, news or symbol source unreachable, timed out or returned a non-success status.
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// Upstream answered with HTTP 429.
    #[error("Upstream rate limit hit: {0}")]
    RateLimited(String),

    /// No cached row exists for the symbol.
    #[error("Ticker not found: {0}")]
    NotFound(String),

    /// Persistence layer unreachable or a statement failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Settings failed validation at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Another refresh cycle is still writing rows.
    #[error("A refresh cycle is already running")]
    RefreshInProgress,

    /// I/O error from reading seed files and the like.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheError {
    /// Whether a long-running loop may keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CacheError::Config(_))
    }

    /// Whether the error came from an upstream collaborator rather than the store.
    pub fn is_upstream(&self) -> bool {
        matches!(self, CacheError::UpstreamFetch(_) | CacheError::RateLimited(_))
    }
}
