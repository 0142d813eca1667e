//! Postgres ticker table.
//!
//! All writes rely on Postgres row locking: the upsert is one
//! `INSERT .. ON CONFLICT (symbol) DO UPDATE` statement and the popularity bump
//! is one `UPDATE .. SET popularity_count = popularity_count + 1`, so concurrent
//! searches and refresh cycles never lose an increment or leave a half-written row.
//! Prices are stored as `NUMERIC(14, 2)` and read back as `FLOAT8`.

use async_trait::async_trait;
use log::{debug, info};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use ticker_common::{CacheError, Result, Symbol, TickerRow, TickerUpdate};

use super::TickerStore;
use crate::config::DatabaseSettings;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS ticker_index (
        symbol TEXT PRIMARY KEY,
        current_price NUMERIC(14, 2) NOT NULL,
        percent_change NUMERIC(14, 2) NOT NULL,
        change NUMERIC(14, 2) NOT NULL,
        popularity_count BIGINT NOT NULL DEFAULT 0 CHECK (popularity_count >= 0),
        last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const CREATE_POPULARITY_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_ticker_index_popularity
    ON ticker_index (popularity_count DESC, symbol)
"#;

const UPSERT: &str = r#"
    INSERT INTO ticker_index
        (symbol, current_price, percent_change, change, popularity_count, last_updated)
    VALUES ($1, $2::NUMERIC, $3::NUMERIC, $4::NUMERIC, COALESCE($5, 0), NOW())
    ON CONFLICT (symbol) DO UPDATE SET
        current_price = EXCLUDED.current_price,
        percent_change = EXCLUDED.percent_change,
        change = EXCLUDED.change,
        popularity_count = COALESCE($5, ticker_index.popularity_count),
        last_updated = EXCLUDED.last_updated
"#;

const SELECT_COLUMNS: &str = r#"
    SELECT symbol,
           current_price::FLOAT8 AS current_price,
           percent_change::FLOAT8 AS percent_change,
           change::FLOAT8 AS change,
           popularity_count,
           last_updated
    FROM ticker_index
"#;

fn store_error(e: sqlx::Error) -> CacheError {
    CacheError::Store(e.to_string())
}

/// Ticker table backed by a shared connection pool.
pub struct PgTickerStore {
    pool: PgPool,
}

impl PgTickerStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from settings and make sure the table exists.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.name);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(store_error)?;
        info!(
            "Connected to {}@{}:{}/{}",
            settings.user, settings.host, settings.port, settings.name
        );

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Get database pool reference
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the ticker table and its popularity index if absent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        sqlx::query(CREATE_POPULARITY_INDEX)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        debug!("ticker_index schema ready");
        Ok(())
    }

    fn row_to_ticker(row: &PgRow) -> Result<TickerRow> {
        let symbol: String = row.try_get("symbol").map_err(store_error)?;
        Ok(TickerRow {
            symbol: Symbol::parse(&symbol)
                .map_err(|_| CacheError::Store(format!("malformed symbol in table: {:?}", symbol)))?,
            current_price: row.try_get("current_price").map_err(store_error)?,
            percent_change: row.try_get("percent_change").map_err(store_error)?,
            change: row.try_get("change").map_err(store_error)?,
            popularity_count: row.try_get("popularity_count").map_err(store_error)?,
            last_updated: row.try_get("last_updated").map_err(store_error)?,
        })
    }
}

#[async_trait]
impl TickerStore for PgTickerStore {
    async fn upsert(&self, update: &TickerUpdate) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(update.symbol.as_str())
            .bind(update.current_price)
            .bind(update.percent_change)
            .bind(update.change)
            .bind(update.popularity_count)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        debug!("Upserted ticker row for {}", update.symbol);
        Ok(())
    }

    async fn read_one(&self, symbol: &Symbol) -> Result<TickerRow> {
        let query = format!("{} WHERE symbol = $1", SELECT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(symbol.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        match row {
            Some(row) => Self::row_to_ticker(&row),
            None => Err(CacheError::NotFound(symbol.to_string())),
        }
    }

    async fn read_all_symbols(&self) -> Result<Vec<Symbol>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT symbol FROM ticker_index")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter()
            .map(|(symbol,)| {
                Symbol::parse(&symbol)
                    .map_err(|_| CacheError::Store(format!("malformed symbol in table: {:?}", symbol)))
            })
            .collect()
    }

    async fn increment_popularity(&self, symbol: &Symbol) -> Result<i64> {
        let count: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE ticker_index
            SET popularity_count = popularity_count + 1
            WHERE symbol = $1
            RETURNING popularity_count
            "#,
        )
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        count
            .map(|(count,)| count)
            .ok_or_else(|| CacheError::NotFound(symbol.to_string()))
    }

    async fn top_by_popularity(&self, limit: usize) -> Result<Vec<TickerRow>> {
        let query = format!(
            "{} ORDER BY popularity_count DESC, symbol ASC LIMIT $1",
            SELECT_COLUMNS
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.iter().map(Self::row_to_ticker).collect()
    }
}
