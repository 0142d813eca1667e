//!
//! Common types and utilities shared by the ticker cache service.
//!
//! This crate aggregates:
//! - `error` — unified error type `CacheError` used across the workspace.
//! - `result` — handy `Result<T, CacheError>` alias.
//! - `tickers` — the normalized `Symbol` type and symbol file parsing.
//! - `quote` — upstream quotes, cache rows and the two-decimal rounding rule.
//! - `news` — read-only market news articles.
#![warn(missing_docs)]
pub mod error;
pub mod news;
pub mod quote;
pub mod result;
pub mod tickers;

pub use error::CacheError;
pub use quote::{Quote, TickerRow, TickerUpdate};
pub use result::Result;
pub use tickers::Symbol;
