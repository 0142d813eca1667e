//! In-memory ticker table.
//!
//! Backs `--memory` runs and the test suite. One mutex guards the whole map;
//! every trait operation finishes inside a single critical section, which gives
//! the same per-row atomicity as the SQL backend's single statements.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use ticker_common::{CacheError, Result, Symbol, TickerRow, TickerUpdate};

use super::TickerStore;

/// Ticker table held in process memory.
#[derive(Default)]
pub struct MemoryTickerStore {
    rows: Mutex<HashMap<Symbol, TickerRow>>,
    writes: AtomicU64,
}

impl MemoryTickerStore {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful write operations so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of cached rows.
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    /// Whether no row is cached.
    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<Symbol, TickerRow>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TickerStore for MemoryTickerStore {
    async fn upsert(&self, update: &TickerUpdate) -> Result<()> {
        let now = Utc::now();
        let mut rows = self.rows();
        rows.entry(update.symbol.clone())
            .and_modify(|row| {
                row.current_price = update.current_price;
                row.percent_change = update.percent_change;
                row.change = update.change;
                if let Some(count) = update.popularity_count {
                    row.popularity_count = count;
                }
                row.last_updated = now;
            })
            .or_insert_with(|| TickerRow {
                symbol: update.symbol.clone(),
                current_price: update.current_price,
                percent_change: update.percent_change,
                change: update.change,
                popularity_count: update.popularity_count.unwrap_or(0),
                last_updated: now,
            });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_one(&self, symbol: &Symbol) -> Result<TickerRow> {
        self.rows()
            .get(symbol)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(symbol.to_string()))
    }

    async fn read_all_symbols(&self) -> Result<Vec<Symbol>> {
        Ok(self.rows().keys().cloned().collect())
    }

    async fn increment_popularity(&self, symbol: &Symbol) -> Result<i64> {
        let mut rows = self.rows();
        let row = rows
            .get_mut(symbol)
            .ok_or_else(|| CacheError::NotFound(symbol.to_string()))?;
        row.popularity_count += 1;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(row.popularity_count)
    }

    async fn top_by_popularity(&self, limit: usize) -> Result<Vec<TickerRow>> {
        let mut rows: Vec<TickerRow> = self.rows().values().cloned().collect();
        rows.sort_by(|a, b| {
            b.popularity_count
                .cmp(&a.popularity_count)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn update(symbol: &str, price: f64) -> TickerUpdate {
        TickerUpdate {
            symbol: Symbol::parse(symbol).unwrap(),
            current_price: price,
            percent_change: 0.58,
            change: 1.01,
            popularity_count: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryTickerStore::new();
        let row = update("AAPL", 172.35);
        store.upsert(&row).await.unwrap();
        store.upsert(&row).await.unwrap();

        assert_eq!(store.len(), 1);
        let cached = store.read_one(&row.symbol).await.unwrap();
        assert!(cached.matches(&row));
        assert_eq!(cached.popularity_count, 0);
    }

    #[tokio::test]
    async fn upsert_then_read_round_trips() {
        let store = MemoryTickerStore::new();
        let row = update("MSFT", 410.12).with_popularity(7);
        store.upsert(&row).await.unwrap();

        let cached = store.read_one(&row.symbol).await.unwrap();
        assert!(cached.matches(&row));
        assert_eq!(cached.popularity_count, 7);
    }

    #[tokio::test]
    async fn update_without_popularity_keeps_counter() {
        let store = MemoryTickerStore::new();
        let symbol = Symbol::parse("TSLA").unwrap();
        store.upsert(&update("TSLA", 200.0)).await.unwrap();
        store.increment_popularity(&symbol).await.unwrap();
        store.increment_popularity(&symbol).await.unwrap();

        store.upsert(&update("TSLA", 201.5)).await.unwrap();
        let cached = store.read_one(&symbol).await.unwrap();
        assert_eq!(cached.current_price, 201.5);
        assert_eq!(cached.popularity_count, 2);
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let store = MemoryTickerStore::new();
        let symbol = Symbol::parse("NFLX").unwrap();
        assert!(matches!(store.read_one(&symbol).await, Err(CacheError::NotFound(_))));
        assert!(matches!(
            store.increment_popularity(&symbol).await,
            Err(CacheError::NotFound(_))
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryTickerStore::new());
        let symbol = Symbol::parse("AMZN").unwrap();
        store.upsert(&update("AMZN", 180.0)).await.unwrap();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = Arc::clone(&store);
                let symbol = symbol.clone();
                tokio::spawn(async move { store.increment_popularity(&symbol).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.read_one(&symbol).await.unwrap().popularity_count, 64);
    }

    #[tokio::test]
    async fn top_orders_by_count_then_symbol() {
        let store = MemoryTickerStore::new();
        store.upsert(&update("AAPL", 1.0).with_popularity(3)).await.unwrap();
        store.upsert(&update("MSFT", 1.0).with_popularity(5)).await.unwrap();
        store.upsert(&update("AMZN", 1.0).with_popularity(3)).await.unwrap();
        store.upsert(&update("QQQ", 1.0)).await.unwrap();

        let top: Vec<String> = store
            .top_by_popularity(3)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.symbol.to_string())
            .collect();
        assert_eq!(top, vec!["MSFT", "AAPL", "AMZN"]);

        let mut all = store.read_all_symbols().await.unwrap();
        all.sort();
        assert_eq!(all.len(), 4);
    }
}
