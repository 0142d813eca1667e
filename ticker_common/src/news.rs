//! Market news payloads.
//!
//! News is read-only: articles are fetched on demand and passed straight to the
//! caller, nothing here touches the ticker cache.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// News feed categories offered upstream.
#[allow(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    Hash,
    Eq,
    PartialEq,
)]
#[clap(rename_all = "lower")]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum NewsCategory {
    #[default]
    General,
    Forex,
    Crypto,
    Merger,
}

/// One market news article.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    /// Upstream category label.
    pub category: String,
    /// Publication time in seconds since the Unix epoch.
    pub datetime: i64,
    /// Title line.
    pub headline: String,
    /// Upstream article id.
    pub id: i64,
    /// Thumbnail URL, empty when absent.
    pub image: String,
    /// Comma separated symbols the article mentions.
    pub related: String,
    /// Publisher name.
    pub source: String,
    /// Short teaser text.
    pub summary: String,
    /// Link to the full article.
    pub url: String,
}
