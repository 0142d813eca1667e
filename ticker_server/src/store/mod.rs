//! Persistence for cached ticker rows.
//!
//! The table is the cache: there is no extra in-process layer on top of a
//! backend. Each operation is a single atomic statement (or one critical section
//! for the in-memory backend), so concurrent searches and the refresh task can
//! share one store without further locking.

use async_trait::async_trait;
use ticker_common::{Result, Symbol, TickerRow, TickerUpdate};

pub mod memory;
pub mod postgres;

pub use memory::MemoryTickerStore;
pub use postgres::PgTickerStore;

/// Ticker cache table.
#[async_trait]
pub trait TickerStore: Send + Sync {
    /// Insert the row if the symbol is absent, otherwise overwrite the price fields.
    ///
    /// Popularity is only written when `update.popularity_count` is set; a fresh
    /// row without one starts at zero.
    async fn upsert(&self, update: &TickerUpdate) -> Result<()>;

    /// Fails with `NotFound` when no row exists.
    async fn read_one(&self, symbol: &Symbol) -> Result<TickerRow>;

    /// Every cached symbol, in no particular order.
    async fn read_all_symbols(&self) -> Result<Vec<Symbol>>;

    /// Add one to the counter and return the new value.
    ///
    /// Fails with `NotFound` when no row exists; callers upsert first.
    async fn increment_popularity(&self, symbol: &Symbol) -> Result<i64>;

    /// Up to `limit` rows, most searched first, ties by symbol.
    async fn top_by_popularity(&self, limit: usize) -> Result<Vec<TickerRow>>;
}
