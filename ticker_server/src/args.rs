//! Command-line arguments for the ticker cache service.
//!
//! Every connection and tuning option can also come from the environment (a
//! `.env` file is loaded first), so a deployment only needs to set variables.
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ticker_common::news::NewsCategory;
use ticker_common::tickers::DEFAULT_LANDING;

use crate::source::finnhub::DEFAULT_BASE_URL;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Stock ticker cache: search, refresh and popularity tracking", long_about = None)]
pub struct Args {
    /// Database host.
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    /// Database port.
    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    /// Database user.
    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    /// Database password.
    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub db_password: String,

    /// Database name.
    #[arg(long, env = "DB_NAME", default_value = "tickers")]
    pub db_name: String,

    /// Maximum pooled database connections.
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// Upstream API key.
    #[arg(long, env = "STOCK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Secondary API key, used when the primary one is unset.
    #[arg(long, env = "STOCK_API_KEY2", hide_env_values = true, hide = true)]
    pub api_key_fallback: Option<String>,

    /// Upstream REST root.
    #[arg(long, env = "STOCK_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// Exchange whose listing validates search input.
    #[arg(long, env = "SYMBOL_EXCHANGE", default_value = "US")]
    pub symbol_exchange: String,

    /// Seconds between refresh cycles.
    #[arg(long, env = "REFRESH_INTERVAL_SECONDS", default_value_t = 60)]
    pub refresh_interval_seconds: u64,

    /// Timeout of every upstream request, in seconds.
    #[arg(long, env = "FETCH_TIMEOUT_SECONDS", default_value_t = 10)]
    pub fetch_timeout_seconds: u64,

    /// How long a downloaded symbol listing is reused, in seconds.
    #[arg(long, env = "SYMBOL_LIST_TTL_SECONDS", default_value_t = 3600)]
    pub symbol_list_ttl_seconds: u64,

    /// Age after which a cached row is re-fetched before being shown, in seconds.
    #[arg(long, env = "STALE_AFTER_SECONDS", default_value_t = 300)]
    pub stale_after_seconds: u64,

    /// Landing-page symbols, comma separated.
    #[arg(long, env = "LANDING_SYMBOLS", value_delimiter = ',', default_values = DEFAULT_LANDING)]
    pub landing_symbols: Vec<String>,

    /// Extra symbols to seed at startup, one per line.
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// Use the offline simulated market instead of the upstream API.
    #[arg(long)]
    pub simulate: bool,

    /// Keep the cache in process memory instead of Postgres.
    #[arg(long)]
    pub memory: bool,

    /// Action to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Service actions.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Seed the landing symbols and refresh the cache on a timer until Ctrl+C.
    Serve,
    /// Validate a query, fetch and cache its quote, and count the search.
    Search {
        /// Raw search text, case-insensitive.
        query: String,
    },
    /// Show the cached row for a symbol, fetching it if missing or stale.
    Show {
        /// Ticker symbol.
        symbol: String,
    },
    /// Run one refresh cycle over every cached symbol.
    Refresh,
    /// Show the landing-page tickers: most searched first, padded with defaults.
    Top {
        /// Number of tickers to show.
        #[arg(default_value_t = 4)]
        count: usize,
    },
    /// Print market news headlines.
    News {
        /// News category.
        #[arg(value_enum, default_value_t = NewsCategory::General)]
        category: NewsCategory,
        /// Number of headlines to print.
        #[arg(default_value_t = 10)]
        count: usize,
    },
}
