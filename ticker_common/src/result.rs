//! Result type alias shared across the workspace.
//!
//! Defaults the error type to `CacheError`, so functions can simply return `Result<T>`.
use crate::error::CacheError;

/// Workspace-wide `Result` alias with `CacheError` as the default error.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
