mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{ScriptedMarket, quote, sym, synchronizer};
use ticker_common::{CacheError, Result, Symbol, TickerRow, TickerUpdate};
use ticker_server::refresher::Refresher;
use ticker_server::store::{MemoryTickerStore, TickerStore};
use ticker_server::sync::{CacheSynchronizer, SyncOptions};

#[tokio::test(start_paused = true)]
async fn refreshes_on_each_interval() {
    let market = ScriptedMarket::new();
    let store = Arc::new(MemoryTickerStore::new());
    let sync = Arc::new(synchronizer(&market, &store, SyncOptions::default()));
    market.set_quote("AAPL", quote(170.0, 1.0, 0.5));
    sync.handle_search("AAPL").await.unwrap();

    market.set_quote("AAPL", quote(171.0, 2.0, 1.18));
    let refresher = Refresher::start(Arc::clone(&sync), Duration::from_secs(60));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.read_one(&sym("AAPL")).await.unwrap().current_price, 170.0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(store.read_one(&sym("AAPL")).await.unwrap().current_price, 171.0);

    market.set_quote("AAPL", quote(172.0, 3.0, 1.77));
    tokio::time::sleep(Duration::from_secs(60)).await;
    let row = store.read_one(&sym("AAPL")).await.unwrap();
    assert_eq!(row.current_price, 172.0);
    assert_eq!(row.popularity_count, 1);

    refresher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failing_cycles_keep_the_loop_alive() {
    let market = ScriptedMarket::new();
    let store = Arc::new(MemoryTickerStore::new());
    let sync = Arc::new(synchronizer(&market, &store, SyncOptions::default()));
    market.set_quote("TSLA", quote(200.0, 1.0, 0.5));
    sync.handle_search("TSLA").await.unwrap();

    market.fail("TSLA");
    let refresher = Refresher::start(Arc::clone(&sync), Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(store.read_one(&sym("TSLA")).await.unwrap().current_price, 200.0);

    market.recover("TSLA");
    market.set_quote("TSLA", quote(205.0, 6.0, 3.0));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.read_one(&sym("TSLA")).await.unwrap().current_price, 205.0);

    refresher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_a_running_cycle() {
    let market = ScriptedMarket::new();
    let store = Arc::new(MemoryTickerStore::new());
    let sync = Arc::new(synchronizer(&market, &store, SyncOptions::default()));
    market.set_quote("AAPL", quote(170.0, 1.0, 0.5));
    sync.handle_search("AAPL").await.unwrap();
    market.set_delay(Duration::from_secs(5));

    let refresher = Refresher::start(Arc::clone(&sync), Duration::from_secs(1));
    while market.calls() < 2 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let writes = store.write_count();

    refresher.stop().await;

    assert_eq!(store.write_count(), writes);
    assert!(sync.refresh_all().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_ends_the_loop() {
    let market = ScriptedMarket::new();
    let store = Arc::new(MemoryTickerStore::new());
    let sync = Arc::new(synchronizer(&market, &store, SyncOptions::default()));
    market.set_quote("AAPL", quote(170.0, 1.0, 0.5));
    sync.handle_search("AAPL").await.unwrap();

    drop(Refresher::start(Arc::clone(&sync), Duration::from_secs(1)));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(market.calls(), 1);
}

/// Store whose symbol listing always fails with a fixed error.
struct BrokenListing {
    error: fn() -> CacheError,
    reads: AtomicUsize,
}

#[async_trait]
impl TickerStore for BrokenListing {
    async fn upsert(&self, _update: &TickerUpdate) -> Result<()> {
        Ok(())
    }

    async fn read_one(&self, symbol: &Symbol) -> Result<TickerRow> {
        Err(CacheError::NotFound(symbol.to_string()))
    }

    async fn read_all_symbols(&self) -> Result<Vec<Symbol>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err((self.error)())
    }

    async fn increment_popularity(&self, symbol: &Symbol) -> Result<i64> {
        Err(CacheError::NotFound(symbol.to_string()))
    }

    async fn top_by_popularity(&self, _limit: usize) -> Result<Vec<TickerRow>> {
        Ok(Vec::new())
    }
}

fn broken_sync(market: &Arc<ScriptedMarket>, store: &Arc<BrokenListing>) -> Arc<CacheSynchronizer> {
    Arc::new(CacheSynchronizer::new(
        market.clone(),
        market.clone(),
        store.clone(),
        SyncOptions::default(),
    ))
}

#[tokio::test(start_paused = true)]
async fn store_errors_are_retried_on_the_next_tick() {
    let market = ScriptedMarket::new();
    let store = Arc::new(BrokenListing {
        error: || CacheError::Store("connection refused".into()),
        reads: AtomicUsize::new(0),
    });

    let refresher = Refresher::start(broken_sync(&market, &store), Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(35)).await;

    assert_eq!(store.reads.load(Ordering::SeqCst), 3);
    assert!(!refresher.is_finished());
    refresher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn configuration_errors_end_the_loop() {
    let market = ScriptedMarket::new();
    let store = Arc::new(BrokenListing {
        error: || CacheError::Config("database credentials rejected".into()),
        reads: AtomicUsize::new(0),
    });

    let refresher = Refresher::start(broken_sync(&market, &store), Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(35)).await;

    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    assert!(refresher.is_finished());
    refresher.stop().await;
}
