// Shared fakes for the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ticker_common::{CacheError, Quote, Result, Symbol};
use ticker_server::source::{QuoteSource, SymbolDirectory};
use ticker_server::store::MemoryTickerStore;
use ticker_server::sync::{CacheSynchronizer, SyncOptions};

pub fn sym(s: &str) -> Symbol {
    Symbol::parse(s).unwrap()
}

pub fn quote(price: f64, change: f64, percent_change: f64) -> Quote {
    Quote {
        current_price: price,
        change,
        percent_change,
        high: price + 1.0,
        low: price - 1.0,
        open: price - change,
        previous_close: price - change,
        timestamp: 1_700_000_000,
    }
}

/// Quote source and symbol directory driven by a script.
#[derive(Default)]
pub struct ScriptedMarket {
    quotes: Mutex<HashMap<Symbol, Quote>>,
    failing: Mutex<HashSet<Symbol>>,
    listed: Mutex<HashSet<Symbol>>,
    directory_down: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
    directory_delay: Mutex<Option<Duration>>,
    pub quote_calls: AtomicUsize,
}

impl ScriptedMarket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// List `symbol` and serve `quote` for it.
    pub fn set_quote(&self, symbol: &str, quote: Quote) {
        let symbol = sym(symbol);
        self.listed.lock().unwrap().insert(symbol.clone());
        self.quotes.lock().unwrap().insert(symbol, quote);
    }

    /// Keep `symbol` listed but fail every fetch for it.
    pub fn fail(&self, symbol: &str) {
        let symbol = sym(symbol);
        self.listed.lock().unwrap().insert(symbol.clone());
        self.failing.lock().unwrap().insert(symbol);
    }

    pub fn recover(&self, symbol: &str) {
        self.failing.lock().unwrap().remove(&sym(symbol));
    }

    pub fn set_directory_down(&self, down: bool) {
        *self.directory_down.lock().unwrap() = down;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_directory_delay(&self, delay: Duration) {
        *self.directory_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for ScriptedMarket {
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(symbol) {
            return Err(CacheError::UpstreamFetch(format!("status 502: {}", symbol)));
        }
        self.quotes
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| CacheError::UpstreamFetch(format!("no quote data for {}", symbol)))
    }
}

#[async_trait]
impl SymbolDirectory for ScriptedMarket {
    async fn list_symbols(&self) -> Result<Arc<HashSet<Symbol>>> {
        let delay = *self.directory_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.directory_down.lock().unwrap() {
            return Err(CacheError::UpstreamFetch("symbol listing unreachable".into()));
        }
        Ok(Arc::new(self.listed.lock().unwrap().clone()))
    }
}

pub fn synchronizer(
    market: &Arc<ScriptedMarket>,
    store: &Arc<MemoryTickerStore>,
    options: SyncOptions,
) -> CacheSynchronizer {
    CacheSynchronizer::new(market.clone(), market.clone(), store.clone(), options)
}
