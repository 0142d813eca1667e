//! Validated runtime settings.
//!
//! `Settings` is built once from [`Args`] at startup. Nothing else in the crate
//! reads the environment; the synchronizer only receives [`SyncOptions`].

use std::path::PathBuf;
use std::time::Duration;

use ticker_common::{CacheError, Result, Symbol};

use crate::args::Args;
use crate::sync::SyncOptions;

/// Where quotes, symbols and news come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// REST API authenticated with an API key.
    Finnhub {
        /// API token sent with every request.
        api_key: String,
        /// API root, overridable for tests and proxies.
        base_url: String,
    },
    /// Offline random-walk market.
    Simulated,
}

/// Which table backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// The `ticker_index` table in Postgres.
    Postgres,
    /// A process-local map, lost on exit.
    Memory,
}

/// Postgres connection parameters.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database name.
    pub name: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long to wait for a free connection.
    pub acquire_timeout: Duration,
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Postgres connection, only used with [`StoreKind::Postgres`].
    pub database: DatabaseSettings,
    /// Upstream provider.
    pub source: SourceKind,
    /// Cache backend.
    pub store: StoreKind,
    /// Exchange code whose listing validates searches.
    pub symbol_exchange: String,
    /// Period of the background refresh.
    pub refresh_interval: Duration,
    /// Upper bound on one upstream call.
    pub fetch_timeout: Duration,
    /// How long a downloaded symbol listing is reused.
    pub symbol_list_ttl: Duration,
    /// Age after which a cached row is re-fetched before being served.
    pub stale_after: Duration,
    /// Normalized landing-page symbols, without repeats.
    pub landing_symbols: Vec<Symbol>,
    /// Optional file with extra symbols to seed.
    pub seed_file: Option<PathBuf>,
}

fn positive_secs(name: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(CacheError::Config(format!("{} must be greater than zero", name)));
    }
    Ok(Duration::from_secs(secs))
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(String::from)
}

impl Settings {
    /// Validate arguments into settings.
    pub fn from_args(args: &Args) -> Result<Self> {
        let refresh_interval = positive_secs("refresh_interval_seconds", args.refresh_interval_seconds)?;
        let fetch_timeout = positive_secs("fetch_timeout_seconds", args.fetch_timeout_seconds)?;
        let symbol_list_ttl = positive_secs("symbol_list_ttl_seconds", args.symbol_list_ttl_seconds)?;
        let stale_after = positive_secs("stale_after_seconds", args.stale_after_seconds)?;

        let source = if args.simulate {
            SourceKind::Simulated
        } else {
            let api_key = non_blank(args.api_key.as_ref())
                .or_else(|| non_blank(args.api_key_fallback.as_ref()))
                .ok_or_else(|| {
                    CacheError::Config(
                        "api key must be set (STOCK_API_KEY or --api-key), or pass --simulate".into(),
                    )
                })?;
            SourceKind::Finnhub {
                api_key,
                base_url: args.api_base_url.trim().to_string(),
            }
        };

        let store = if args.memory {
            StoreKind::Memory
        } else {
            StoreKind::Postgres
        };
        if store == StoreKind::Postgres {
            if args.db_name.trim().is_empty() {
                return Err(CacheError::Config("db_name must not be empty".into()));
            }
            if args.db_host.trim().is_empty() {
                return Err(CacheError::Config("db_host must not be empty".into()));
            }
            if args.db_max_connections == 0 {
                return Err(CacheError::Config("db_max_connections must be greater than zero".into()));
            }
        }

        let mut landing_symbols: Vec<Symbol> = Vec::new();
        for raw in args.landing_symbols.iter().filter(|s| !s.trim().is_empty()) {
            let symbol = Symbol::parse(raw)
                .map_err(|e| CacheError::Config(format!("landing_symbols: {}", e)))?;
            if !landing_symbols.contains(&symbol) {
                landing_symbols.push(symbol);
            }
        }

        Ok(Settings {
            database: DatabaseSettings {
                host: args.db_host.trim().to_string(),
                port: args.db_port,
                user: args.db_user.clone(),
                password: args.db_password.clone(),
                name: args.db_name.trim().to_string(),
                max_connections: args.db_max_connections,
                acquire_timeout: fetch_timeout,
            },
            source,
            store,
            symbol_exchange: args.symbol_exchange.trim().to_ascii_uppercase(),
            refresh_interval,
            fetch_timeout,
            symbol_list_ttl,
            stale_after,
            landing_symbols,
            seed_file: args.seed_file.clone(),
        })
    }

    /// Options handed to the synchronizer.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            fetch_timeout: self.fetch_timeout,
            stale_after: self.stale_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use ticker_common::tickers::DEFAULT_LANDING;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["ticker_server"];
        argv.extend_from_slice(extra);
        argv.push("refresh");
        let mut args = Args::try_parse_from(argv).unwrap();
        args.api_key = None;
        args.api_key_fallback = None;
        args
    }

    #[test]
    fn simulated_memory_run_needs_no_credentials() {
        let settings = Settings::from_args(&args(&["--simulate", "--memory"])).unwrap();
        assert_eq!(settings.source, SourceKind::Simulated);
        assert_eq!(settings.store, StoreKind::Memory);
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = Settings::from_args(&args(&["--memory"])).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn fallback_key_is_used() {
        let mut args = args(&["--memory"]);
        args.api_key = Some("  ".into());
        args.api_key_fallback = Some("second".into());
        let settings = Settings::from_args(&args).unwrap();
        match settings.source {
            SourceKind::Finnhub { api_key, .. } => assert_eq!(api_key, "second"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut args = args(&["--simulate", "--memory"]);
        args.refresh_interval_seconds = 0;
        assert!(matches!(Settings::from_args(&args), Err(CacheError::Config(_))));
    }

    #[test]
    fn empty_db_name_is_rejected_for_postgres() {
        let mut args = args(&["--simulate"]);
        args.db_name = " ".into();
        assert!(matches!(Settings::from_args(&args), Err(CacheError::Config(_))));
    }

    #[test]
    fn landing_symbols_are_normalized_and_deduplicated() {
        let mut args = args(&["--simulate", "--memory"]);
        args.landing_symbols = vec!["aapl".into(), " msft".into(), "AAPL".into(), "".into()];
        let settings = Settings::from_args(&args).unwrap();
        let names: Vec<&str> = settings.landing_symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn landing_symbols_default_to_the_index_and_megacaps() {
        let settings = Settings::from_args(&args(&["--simulate", "--memory"])).unwrap();
        let names: Vec<&str> = settings.landing_symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(names, DEFAULT_LANDING);
    }

    #[test]
    fn bad_landing_symbol_is_a_config_error() {
        let mut args = args(&["--simulate", "--memory"]);
        args.landing_symbols = vec!["NOT A SYMBOL".into()];
        assert!(matches!(Settings::from_args(&args), Err(CacheError::Config(_))));
    }

    #[test]
    fn sync_options_carry_timeouts() {
        let mut args = args(&["--simulate", "--memory"]);
        args.fetch_timeout_seconds = 3;
        args.stale_after_seconds = 30;
        let options = Settings::from_args(&args).unwrap().sync_options();
        assert_eq!(options.fetch_timeout, Duration::from_secs(3));
        assert_eq!(options.stale_after, Duration::from_secs(30));
    }
}
