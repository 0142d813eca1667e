//! Finnhub REST client.
//!
//! Implements all three collaborator traits over the `/quote`, `/stock/symbol`
//! and `/news` endpoints. Every request carries the client-wide timeout; a
//! timeout, a transport failure or a non-2xx status becomes `UpstreamFetch`,
//! except HTTP 429 which is reported as `RateLimited`.
//!
//! The exchange symbol listing is several megabytes, so the directory keeps the
//! last successful download for `symbol_ttl` and reuses it between searches.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use ticker_common::news::{Article, NewsCategory};
use ticker_common::{CacheError, Quote, Result, Symbol};
use tokio::sync::RwLock;

use super::{NewsSource, QuoteSource, SymbolDirectory};

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Longest upstream body echoed back in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Entry of the `/stock/symbol` listing; the other fields are ignored.
#[derive(Debug, Deserialize)]
struct SymbolEntry {
    symbol: String,
}

struct CachedSymbols {
    fetched_at: Instant,
    symbols: Arc<HashSet<Symbol>>,
}

/// HTTP client for the Finnhub API.
pub struct FinnhubClient {
    client: Client,
    base_url: String,
    api_key: String,
    exchange: String,
    symbol_ttl: Duration,
    symbols: RwLock<Option<CachedSymbols>>,
}

impl FinnhubClient {
    /// Build a client with a fixed per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        exchange: impl Into<String>,
        timeout: Duration,
        symbol_ttl: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            exchange: exchange.into(),
            symbol_ttl,
            symbols: RwLock::new(None),
        })
    }

    /// GET `path` with `query` plus the API token and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CacheError::UpstreamFetch(format!("{}: undecodable body: {}", path, e)))
    }

    async fn cached_symbols(&self) -> Option<Arc<HashSet<Symbol>>> {
        let guard = self.symbols.read().await;
        guard
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.symbol_ttl)
            .map(|cached| Arc::clone(&cached.symbols))
    }
}

fn transport_error(path: &str, err: reqwest::Error) -> CacheError {
    if err.is_timeout() {
        CacheError::UpstreamFetch(format!("{}: request timed out", path))
    } else {
        CacheError::UpstreamFetch(format!("{}: {}", path, err))
    }
}

/// Map a non-success status to the error taxonomy.
fn status_error(status: StatusCode, body: &str) -> CacheError {
    let body: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    if status == StatusCode::TOO_MANY_REQUESTS {
        CacheError::RateLimited(body)
    } else {
        CacheError::UpstreamFetch(format!("status {}: {}", status.as_u16(), body))
    }
}

fn collect_symbols(entries: Vec<SymbolEntry>) -> HashSet<Symbol> {
    let mut skipped = 0usize;
    let symbols: HashSet<Symbol> = entries
        .into_iter()
        .filter_map(|entry| match Symbol::parse(&entry.symbol) {
            Ok(symbol) => Some(symbol),
            Err(_) => {
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        debug!("Skipped {} unparseable symbols from listing", skipped);
    }
    symbols
}

#[async_trait]
impl QuoteSource for FinnhubClient {
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote> {
        let quote: Quote = self.get_json("/quote", &[("symbol", symbol.as_str())]).await?;
        if quote.is_empty() {
            return Err(CacheError::UpstreamFetch(format!("no quote data for {}", symbol)));
        }
        Ok(quote)
    }
}

#[async_trait]
impl SymbolDirectory for FinnhubClient {
    async fn list_symbols(&self) -> Result<Arc<HashSet<Symbol>>> {
        if let Some(symbols) = self.cached_symbols().await {
            return Ok(symbols);
        }

        let mut guard = self.symbols.write().await;
        // Another search may have refilled the listing while we waited.
        if let Some(cached) = guard.as_ref().filter(|c| c.fetched_at.elapsed() < self.symbol_ttl) {
            return Ok(Arc::clone(&cached.symbols));
        }

        match self
            .get_json::<Vec<SymbolEntry>>("/stock/symbol", &[("exchange", self.exchange.as_str())])
            .await
        {
            Ok(entries) => {
                let symbols = Arc::new(collect_symbols(entries));
                info!("Loaded {} symbols for exchange {}", symbols.len(), self.exchange);
                *guard = Some(CachedSymbols {
                    fetched_at: Instant::now(),
                    symbols: Arc::clone(&symbols),
                });
                Ok(symbols)
            }
            Err(e) => match guard.as_ref() {
                Some(stale) => {
                    warn!("Symbol listing refresh failed, keeping previous copy: {}", e);
                    Ok(Arc::clone(&stale.symbols))
                }
                None => Err(e),
            },
        }
    }
}

#[async_trait]
impl NewsSource for FinnhubClient {
    async fn market_news(&self, category: NewsCategory) -> Result<Vec<Article>> {
        let category = category.to_string();
        self.get_json("/news", &[("category", category.as_str())]).await
    }
}
