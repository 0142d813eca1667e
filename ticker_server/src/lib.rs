//! Ticker cache service.
//!
//! Keeps a table of the last known quote per stock symbol in step with an
//! upstream quote API, and counts how often each symbol is searched:
//!
//! - `source` — upstream collaborators (REST client and offline simulator).
//! - `store` — the ticker table (Postgres or in-memory).
//! - `sync` — `CacheSynchronizer`, the only writer of the table.
//! - `refresher` — the cancellable periodic refresh task.
//! - `config` / `args` — validated settings built from CLI flags and environment.
#![warn(missing_docs)]
pub mod args;
pub mod config;
pub mod refresher;
pub mod source;
pub mod store;
pub mod sync;

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use log::info;
use ticker_common::tickers::SymbolParser;
use ticker_common::{Result, Symbol};

use crate::config::{Settings, SourceKind, StoreKind};
use crate::source::{FinnhubClient, SimulatedMarket, Sources};
use crate::store::{MemoryTickerStore, PgTickerStore, TickerStore};
use crate::sync::CacheSynchronizer;

/// Everything the subcommands need, built once at startup.
pub struct Service {
    /// Upstream collaborators, also used directly for news.
    pub sources: Sources,
    /// The ticker table.
    pub store: Arc<dyn TickerStore>,
    /// The only writer of `store`.
    pub sync: Arc<CacheSynchronizer>,
}

impl Service {
    /// Construct the upstream client, the store and the synchronizer from settings.
    pub async fn build(settings: &Settings) -> Result<Self> {
        let sources = match &settings.source {
            SourceKind::Finnhub { api_key, base_url } => {
                let client = FinnhubClient::new(
                    base_url.as_str(),
                    api_key.as_str(),
                    settings.symbol_exchange.as_str(),
                    settings.fetch_timeout,
                    settings.symbol_list_ttl,
                )?;
                Sources::from_shared(Arc::new(client))
            }
            SourceKind::Simulated => Sources::from_shared(Arc::new(SimulatedMarket::new())),
        };

        let store: Arc<dyn TickerStore> = match settings.store {
            StoreKind::Postgres => Arc::new(PgTickerStore::connect(&settings.database).await?),
            StoreKind::Memory => {
                info!("Using in-memory ticker table");
                Arc::new(MemoryTickerStore::new())
            }
        };

        let sync = Arc::new(CacheSynchronizer::new(
            Arc::clone(&sources.quotes),
            Arc::clone(&sources.directory),
            Arc::clone(&store),
            settings.sync_options(),
        ));

        Ok(Service { sources, store, sync })
    }
}

/// Landing symbols followed by any symbols from the seed file, without repeats.
pub fn seed_symbols(settings: &Settings) -> Result<Vec<Symbol>> {
    let mut symbols = settings.landing_symbols.clone();
    if let Some(path) = &settings.seed_file {
        let file = File::open(path)?;
        for symbol in Symbol::parse_from_file(BufReader::new(file))? {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
    }
    Ok(symbols)
}
