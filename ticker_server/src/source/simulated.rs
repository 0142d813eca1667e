//! Offline market used when no API key is configured.
//!
//! Keeps one price per symbol of a fixed universe and moves it by a small random
//! walk on every fetch, so repeated searches and refresh cycles show movement.
//! Change and percent change are computed against the opening price of the
//! simulated session. Day high/low track the walk.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use rand::Rng;
use ticker_common::news::{Article, NewsCategory};
use ticker_common::{CacheError, Quote, Result, Symbol};

use super::{NewsSource, QuoteSource, SymbolDirectory};

/// Symbols traded by the simulated market.
pub const UNIVERSE: [&str; 16] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "QQQ", "JPM", "V", "NFLX", "DIS",
    "INTC", "COST", "NKE", "ORCL",
];

/// Price every symbol opens the session at.
const INITIAL_PRICE: f64 = 100.0;

#[derive(Debug, Clone, Copy)]
struct Session {
    open: f64,
    last: f64,
    high: f64,
    low: f64,
}

impl Session {
    fn opening(price: f64) -> Self {
        Session {
            open: price,
            last: price,
            high: price,
            low: price,
        }
    }
}

/// Random-walk quote generator implementing every upstream role.
pub struct SimulatedMarket {
    symbols: Arc<HashSet<Symbol>>,
    sessions: Mutex<HashMap<Symbol, Session>>,
}

impl Default for SimulatedMarket {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedMarket {
    /// Create a market over [`UNIVERSE`].
    pub fn new() -> Self {
        let symbols: HashSet<Symbol> = UNIVERSE
            .iter()
            .filter_map(|s| Symbol::parse(s).ok())
            .collect();
        let sessions = symbols
            .iter()
            .map(|s| (s.clone(), Session::opening(INITIAL_PRICE)))
            .collect();
        info!("Simulated market opened with {} symbols", symbols.len());
        SimulatedMarket {
            symbols: Arc::new(symbols),
            sessions: Mutex::new(sessions),
        }
    }

    /// Calculate the next price using a small random walk around `current_price`.
    ///
    /// The change is sampled uniformly from `[-1%, +1%]` and the result is clamped
    /// to a minimum positive value.
    pub fn next_price(current_price: f64) -> f64 {
        let mut rng = rand::rng();
        let change: f64 = rng.random_range(-0.01..0.01);
        let new_price = current_price * (1.0 + change);
        new_price.max(0.01)
    }

    fn tick(&self, symbol: &Symbol) -> Option<Session> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let session = sessions.get_mut(symbol)?;
        session.last = Self::next_price(session.last);
        session.high = session.high.max(session.last);
        session.low = session.low.min(session.last);
        Some(*session)
    }
}

#[async_trait]
impl QuoteSource for SimulatedMarket {
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote> {
        let session = self
            .tick(symbol)
            .ok_or_else(|| CacheError::UpstreamFetch(format!("no quote data for {}", symbol)))?;
        let change = session.last - session.open;
        Ok(Quote {
            current_price: session.last,
            change,
            percent_change: change / session.open * 100.0,
            high: session.high,
            low: session.low,
            open: session.open,
            previous_close: session.open,
            timestamp: Utc::now().timestamp(),
        })
    }
}

#[async_trait]
impl SymbolDirectory for SimulatedMarket {
    async fn list_symbols(&self) -> Result<Arc<HashSet<Symbol>>> {
        Ok(Arc::clone(&self.symbols))
    }
}

#[async_trait]
impl NewsSource for SimulatedMarket {
    async fn market_news(&self, category: NewsCategory) -> Result<Vec<Article>> {
        let now = Utc::now().timestamp();
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let mut movers: Vec<(&Symbol, f64)> = sessions
            .iter()
            .map(|(symbol, s)| (symbol, (s.last - s.open) / s.open * 100.0))
            .collect();
        movers.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.cmp(b.0)));

        Ok(movers
            .into_iter()
            .enumerate()
            .map(|(i, (symbol, pct))| Article {
                category: category.to_string(),
                datetime: now,
                headline: format!("{} moves {:+.2}% in simulated trading", symbol, pct),
                id: i as i64 + 1,
                related: symbol.to_string(),
                source: "simulator".to_string(),
                ..Article::default()
            })
            .collect())
    }
}
