//! Upstream collaborators of the cache.
//!
//! - `QuoteSource` — current quote for one symbol.
//! - `SymbolDirectory` — the set of tradable symbols used to validate search input.
//! - `NewsSource` — read-only market news.
//!
//! Two implementations live here: `finnhub` talks to the REST API, `simulated`
//! produces random-walk quotes for offline runs. Both are built once at startup
//! and handed to the synchronizer as trait objects.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ticker_common::news::{Article, NewsCategory};
use ticker_common::{Quote, Result, Symbol};

pub mod finnhub;
pub mod simulated;

pub use finnhub::FinnhubClient;
pub use simulated::SimulatedMarket;

/// Fetches a current quote for a symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fails with `UpstreamFetch` or `RateLimited`.
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote>;
}

/// Lists the tradable symbols.
#[async_trait]
pub trait SymbolDirectory: Send + Sync {
    /// Every symbol currently accepted as a search target.
    async fn list_symbols(&self) -> Result<Arc<HashSet<Symbol>>>;

    /// Whether `symbol` is tradable.
    async fn contains(&self, symbol: &Symbol) -> Result<bool> {
        Ok(self.list_symbols().await?.contains(symbol))
    }
}

/// Market news feed.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Latest headlines in `category`, newest first.
    async fn market_news(&self, category: NewsCategory) -> Result<Vec<Article>>;
}

/// The three collaborators bundled for wiring.
#[derive(Clone)]
pub struct Sources {
    /// Quote lookups.
    pub quotes: Arc<dyn QuoteSource>,
    /// Search validation.
    pub directory: Arc<dyn SymbolDirectory>,
    /// Market headlines.
    pub news: Arc<dyn NewsSource>,
}

impl Sources {
    /// Use one value for all three roles.
    pub fn from_shared<T>(source: Arc<T>) -> Self
    where
        T: QuoteSource + SymbolDirectory + NewsSource + 'static,
    {
        Sources {
            quotes: source.clone(),
            directory: source.clone(),
            news: source,
        }
    }
}
