//! Ticker symbols and helpers shared by the store, the sources and the CLI.
//!
//! A `Symbol` is always trimmed and uppercase. Every search query goes through
//! [`Symbol::parse`] before it is checked against the symbol directory, so
//! `aapl`, ` AAPL ` and `AAPL` all resolve to the same cache row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use crate::error::CacheError;

/// Longest symbol accepted from user input.
pub const MAX_SYMBOL_LEN: usize = 32;

/// Symbols shown on the landing page when nothing has been searched yet.
pub const DEFAULT_LANDING: [&str; 4] = ["QQQ", "TSLA", "AMZN", "AAPL"];

/// Uppercase-normalized stock ticker identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Normalizes raw input into a symbol.
    ///
    /// Surrounding whitespace is dropped and letters are uppercased. Empty input,
    /// overlong input and characters that never appear in exchange tickers are
    /// rejected with `InvalidSymbol`; whether the symbol actually trades is a
    /// separate check against the directory.
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() || normalized.len() > MAX_SYMBOL_LEN {
            return Err(CacheError::InvalidSymbol(raw.trim().to_string()));
        }
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '^' | '=');
        if !normalized.chars().all(allowed) {
            return Err(CacheError::InvalidSymbol(raw.trim().to_string()));
        }
        Ok(Symbol(normalized))
    }

    /// Borrow the normalized text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trait providing file parsing for symbols.
pub trait SymbolParser {
    /// Parses symbols from a buffered reader.
    ///
    /// Each non-empty line may hold one or more symbols separated by commas or
    /// whitespace. Lines starting with `#` are skipped. Returns an error if any
    /// entry cannot be normalized.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Symbol>, CacheError>;
}

impl SymbolParser for Symbol {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, CacheError> {
        let mut symbols: Vec<Symbol> = Vec::new();

        for line_result in reader.lines() {
            let line = line_result?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }

            for entry in trimmed_line.split(|c: char| c == ',' || c.is_whitespace()) {
                if entry.is_empty() {
                    continue;
                }
                let symbol = entry.parse::<Self>()?;
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
        }
        Ok(symbols)
    }
}
