//! Ticker cache service binary.
//!
//! Wires the upstream client, the ticker table and the synchronizer together,
//! then runs one subcommand:
//!
//! - `serve` — seed the landing symbols, then refresh every cached row on a
//!   fixed interval until Ctrl+C.
//! - `search <query>` — validate, fetch, cache and count one search.
//! - `show <symbol>` — print a cached row, fetching it first if missing or stale.
//! - `refresh` — run one refresh cycle.
//! - `top [count]` — print the landing-page tickers.
//! - `news [category] [count]` — print market headlines.
//!
//! Only startup problems (bad settings, no database) end the process with an
//! error; everything after that is logged per operation.
#![warn(missing_docs)]
use clap::Parser;
use log::{error, info, warn};
use ticker_common::{CacheError, Quote, Result, Symbol, TickerRow};
use tokio::signal;

use ticker_server::args::{Args, Command};
use ticker_server::config::Settings;
use ticker_server::refresher::Refresher;
use ticker_server::{Service, seed_symbols};

#[tokio::main]
async fn main() -> Result<(), CacheError> {
    dotenv::dotenv().ok();
    init_logger();
    let args = Args::parse();
    let settings = Settings::from_args(&args)?;
    let service = Service::build(&settings).await?;

    match args.command {
        Command::Serve => serve(&service, &settings).await,
        Command::Search { query } => match service.sync.handle_search(&query).await {
            Ok(result) => {
                print_quote(&result.symbol, &result.quote);
                if let Some(count) = result.popularity_count {
                    println!("searched {} time(s)", count);
                }
                Ok(())
            }
            Err(CacheError::InvalidSymbol(q)) => {
                println!("Invalid search query: {}", q);
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Show { symbol } => {
            let symbol = Symbol::parse(&symbol)?;
            print_row(&service.sync.ticker_info(&symbol).await?);
            Ok(())
        }
        Command::Refresh => {
            let report = service.sync.refresh_all().await?;
            println!("{} updated, {} failed", report.updated, report.failed.len());
            Ok(())
        }
        Command::Top { count } => {
            for row in service.sync.landing_tickers(&settings.landing_symbols, count).await? {
                print_row(&row);
            }
            Ok(())
        }
        Command::News { category, count } => {
            let articles = service.sources.news.market_news(category).await?;
            for article in articles.iter().take(count) {
                println!("[{}] {}  {}", article.source, article.headline, article.url);
            }
            Ok(())
        }
    }
}

async fn serve(service: &Service, settings: &Settings) -> Result<()> {
    let seeds = seed_symbols(settings)?;
    let report = service.sync.seed_popular_stocks(&seeds).await?;
    if !report.failed.is_empty() {
        warn!("{} landing symbols could not be seeded", report.failed.len());
    }

    let refresher = Refresher::start(service.sync.clone(), settings.refresh_interval);
    info!("Serving. Press Ctrl+C to exit.");

    let outcome = signal::ctrl_c().await;
    match &outcome {
        Ok(()) => info!("Ctrl+C received. Shutting down..."),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
    refresher.stop().await;
    outcome.map_err(CacheError::from)
}

fn print_quote(symbol: &Symbol, quote: &Quote) {
    println!(
        "QUOTE: {} Price={:.2} Change={:+.2} ({:+.2}%) Open={:.2} High={:.2} Low={:.2} PrevClose={:.2}",
        symbol,
        quote.current_price,
        quote.change,
        quote.percent_change,
        quote.open,
        quote.high,
        quote.low,
        quote.previous_close
    );
}

fn print_row(row: &TickerRow) {
    println!(
        "{:<8} {:>10.2} {:>+8.2} {:>+7.2}%  searched={} updated={}",
        row.symbol.as_str(),
        row.current_price,
        row.change,
        row.percent_change,
        row.popularity_count,
        row.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
