//! Cache synchronizer.
//!
//! Owns every write to the ticker table. Three paths reach it:
//!
//! - `handle_search` — a user query: normalize, validate against the symbol
//!   directory, fetch, upsert, count the search, return the quote.
//! - `refresh_all` — the periodic cycle: re-fetch every cached symbol and
//!   overwrite its prices, never its popularity. One symbol failing does not
//!   stop the batch.
//! - `seed_popular_stocks` / `ticker_info` / `landing_tickers` — make sure the
//!   landing page has rows, re-fetching missing or stale ones.
//!
//! Values written to the cache and values returned to callers are both rounded
//! to two decimals, so a search result always matches what the table shows.
//!
//! Store writes within one search are not transactional. If the popularity bump
//! fails after the upsert succeeded, the prices stay updated and the counter
//! simply misses that search.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use ticker_common::{CacheError, Quote, Result, Symbol, TickerRow, TickerUpdate};
use tokio::sync::Mutex;

use crate::source::{QuoteSource, SymbolDirectory};
use crate::store::TickerStore;

/// Tuning knobs for the synchronizer.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Upper bound on one upstream call.
    pub fetch_timeout: Duration,
    /// Rows older than this are re-fetched before being served.
    pub stale_after: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            fetch_timeout: Duration::from_secs(10),
            stale_after: Duration::from_secs(300),
        }
    }
}

/// Successful search: the normalized symbol and its rounded quote.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Normalized form of the query.
    pub symbol: Symbol,
    /// Quote with price, change and percent change rounded like the cache.
    pub quote: Quote,
    /// Counter after this search, `None` when the bump failed.
    pub popularity_count: Option<i64>,
}

/// Outcome of a batch over many symbols.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Rows written.
    pub updated: usize,
    /// Symbols left alone (already cached when seeding).
    pub skipped: usize,
    /// Symbols whose fetch or write failed.
    pub failed: Vec<Symbol>,
}

/// Reconciles upstream quotes with the ticker table.
pub struct CacheSynchronizer {
    quotes: Arc<dyn QuoteSource>,
    directory: Arc<dyn SymbolDirectory>,
    store: Arc<dyn TickerStore>,
    options: SyncOptions,
    refresh_guard: Mutex<()>,
}

impl CacheSynchronizer {
    /// Wire the synchronizer to its collaborators.
    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        directory: Arc<dyn SymbolDirectory>,
        store: Arc<dyn TickerStore>,
        options: SyncOptions,
    ) -> Self {
        CacheSynchronizer {
            quotes,
            directory,
            store,
            options,
            refresh_guard: Mutex::new(()),
        }
    }

    /// Turn a raw query into a validated, cached and counted quote.
    ///
    /// Fails with `InvalidSymbol` (nothing written) when the query does not name
    /// a tradable symbol, and with `UpstreamFetch` (nothing written) when the
    /// directory or the quote cannot be fetched.
    pub async fn handle_search(&self, raw_query: &str) -> Result<SearchResult> {
        let symbol = Symbol::parse(raw_query)?;

        let known = self.bounded(&symbol, self.directory.contains(&symbol)).await?;
        if !known {
            info!("Search query was invalid: {}", symbol);
            return Err(CacheError::InvalidSymbol(symbol.to_string()));
        }
        info!("Search query was a valid symbol: {}", symbol);

        let quote = self.fetch(&symbol).await?;
        self.store
            .upsert(&TickerUpdate::from_quote(symbol.clone(), &quote))
            .await?;

        let popularity_count = match self.store.increment_popularity(&symbol).await {
            Ok(count) => {
                debug!("Popularity of {} is now {}", symbol, count);
                Some(count)
            }
            Err(e) => {
                warn!("Could not count search for {}: {}", symbol, e);
                None
            }
        };

        Ok(SearchResult {
            symbol,
            quote: quote.rounded(),
            popularity_count,
        })
    }

    /// Re-fetch every cached symbol and overwrite its prices.
    ///
    /// Per-symbol failures are logged and listed in the report. Fails with
    /// `RefreshInProgress` without touching the table if another cycle is still
    /// running, and with `Store` if the symbol list cannot be read.
    pub async fn refresh_all(&self) -> Result<BatchReport> {
        let _guard = self
            .refresh_guard
            .try_lock()
            .map_err(|_| CacheError::RefreshInProgress)?;

        let symbols = self.store.read_all_symbols().await?;
        let mut report = BatchReport::default();

        for symbol in symbols {
            match self.fetch_and_store(&symbol).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    warn!("Refresh skipped {}: {}", symbol, e);
                    report.failed.push(symbol);
                }
            }
        }

        info!(
            "Refresh cycle done: {} updated, {} failed",
            report.updated,
            report.failed.len()
        );
        Ok(report)
    }

    /// Make sure each symbol has a row, fetching only the missing ones.
    pub async fn seed_popular_stocks(&self, symbols: &[Symbol]) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        for symbol in symbols {
            match self.store.read_one(symbol).await {
                Ok(_) => {
                    report.skipped += 1;
                    continue;
                }
                Err(CacheError::NotFound(_)) => {}
                Err(e) => {
                    warn!("Seeding could not read {}: {}", symbol, e);
                    report.failed.push(symbol.clone());
                    continue;
                }
            }

            match self.fetch_and_store(symbol).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    warn!("Seeding skipped {}: {}", symbol, e);
                    report.failed.push(symbol.clone());
                }
            }
        }

        info!(
            "Seeded {} symbols ({} already cached, {} failed)",
            report.updated,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }

    /// The cached row, exactly as stored.
    pub async fn read_one(&self, symbol: &Symbol) -> Result<TickerRow> {
        self.store.read_one(symbol).await
    }

    /// The row for `symbol`, fetched first when it is missing or stale.
    ///
    /// A stale row is still returned if the upstream re-fetch fails. A missing
    /// row whose fetch fails is an `UpstreamFetch` error.
    pub async fn ticker_info(&self, symbol: &Symbol) -> Result<TickerRow> {
        let stale = match self.store.read_one(symbol).await {
            Ok(row) if !self.is_stale(&row) => return Ok(row),
            Ok(row) => Some(row),
            Err(CacheError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        match self.fetch_and_store(symbol).await {
            Ok(()) => self.store.read_one(symbol).await,
            Err(e) => match stale {
                Some(row) if e.is_upstream() => {
                    warn!("Serving stale row for {}: {}", symbol, e);
                    Ok(row)
                }
                _ => Err(e),
            },
        }
    }

    /// Rows for the landing page: the `count` most searched symbols, padded
    /// with `defaults` when fewer have been searched.
    ///
    /// Symbols that cannot be resolved are logged and left out.
    pub async fn landing_tickers(&self, defaults: &[Symbol], count: usize) -> Result<Vec<TickerRow>> {
        let mut symbols: Vec<Symbol> = self
            .store
            .top_by_popularity(count)
            .await?
            .into_iter()
            .filter(|row| row.popularity_count > 0)
            .map(|row| row.symbol)
            .collect();
        for symbol in defaults {
            if symbols.len() >= count {
                break;
            }
            if !symbols.contains(symbol) {
                symbols.push(symbol.clone());
            }
        }

        let mut rows = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            match self.ticker_info(symbol).await {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Landing ticker {} unavailable: {}", symbol, e),
            }
        }
        Ok(rows)
    }

    fn is_stale(&self, row: &TickerRow) -> bool {
        let max_age = chrono::Duration::from_std(self.options.stale_after)
            .unwrap_or(chrono::Duration::MAX);
        row.is_stale(Utc::now(), max_age)
    }

    /// Fetch a quote, bounded by the configured timeout.
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote> {
        self.bounded(symbol, self.quotes.fetch_quote(symbol)).await
    }

    /// Run one upstream call under `fetch_timeout`, folding every failure into
    /// `UpstreamFetch`.
    async fn bounded<T, F>(&self, symbol: &Symbol, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.options.fetch_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(upstream(symbol, e)),
            Err(_) => Err(CacheError::UpstreamFetch(format!(
                "{}: timed out after {:?}",
                symbol, self.options.fetch_timeout
            ))),
        }
    }

    /// Fetch and overwrite prices, leaving popularity untouched.
    async fn fetch_and_store(&self, symbol: &Symbol) -> Result<()> {
        let quote = self.fetch(symbol).await?;
        self.store
            .upsert(&TickerUpdate::from_quote(symbol.clone(), &quote))
            .await
    }
}

/// Fold any collaborator failure into `UpstreamFetch`.
fn upstream(symbol: &Symbol, err: CacheError) -> CacheError {
    match err {
        CacheError::UpstreamFetch(_) => err,
        other => CacheError::UpstreamFetch(format!("{}: {}", symbol, other)),
    }
}
