//! Datasets fetched from the market-data provider.
//!
//! Field names follow the provider's JSON payloads so a dataset can be
//! decoded from the API response and written back out unchanged. Unknown
//! fields are ignored and missing ones default.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The two datasets acquired every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Weekly adjusted stock time series
    Stock,

    /// News sentiment feed
    News,
}

impl DatasetKind {
    /// Short name used in artifact names and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::News => "news",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetched dataset. Immutable once fetched.
///
/// Serializes as the bare provider payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Dataset {
    Stock(StockSeries),
    News(NewsFeed),
}

impl Dataset {
    pub fn kind(&self) -> DatasetKind {
        match self {
            Self::Stock(_) => DatasetKind::Stock,
            Self::News(_) => DatasetKind::News,
        }
    }
}

impl From<StockSeries> for Dataset {
    fn from(series: StockSeries) -> Self {
        Self::Stock(series)
    }
}

impl From<NewsFeed> for Dataset {
    fn from(feed: NewsFeed) -> Self {
        Self::News(feed)
    }
}

/// Weekly adjusted time series for one symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockSeries {
    #[serde(rename = "Meta Data", default)]
    pub meta_data: Option<SeriesMetaData>,

    /// Week ending date -> bar
    #[serde(rename = "Weekly Adjusted Time Series", default)]
    pub weekly: BTreeMap<String, WeeklyBar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetaData {
    #[serde(rename = "1. Information", default)]
    pub information: String,

    #[serde(rename = "2. Symbol", default)]
    pub symbol: String,

    #[serde(rename = "3. Last Refreshed", default)]
    pub last_refreshed: String,

    #[serde(rename = "4. Time Zone", default)]
    pub time_zone: String,
}

/// Prices are kept as the provider's decimal strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBar {
    #[serde(rename = "1. open", default)]
    pub open: String,

    #[serde(rename = "2. high", default)]
    pub high: String,

    #[serde(rename = "3. low", default)]
    pub low: String,

    #[serde(rename = "4. close", default)]
    pub close: String,

    #[serde(rename = "5. adjusted close", default)]
    pub adjusted_close: String,

    #[serde(rename = "6. volume", default)]
    pub volume: String,

    #[serde(rename = "7. dividend amount", default)]
    pub dividend_amount: String,
}

/// News sentiment feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsFeed {
    #[serde(default)]
    pub items: String,

    #[serde(default)]
    pub sentiment_score_definition: String,

    #[serde(default)]
    pub relevance_score_definition: String,

    #[serde(default)]
    pub feed: Vec<NewsItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub time_published: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub banner_image: Option<String>,

    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub category_within_source: String,

    #[serde(default)]
    pub source_domain: String,

    #[serde(default)]
    pub topics: Vec<NewsTopic>,

    #[serde(default)]
    pub overall_sentiment_score: f64,

    #[serde(default)]
    pub overall_sentiment_label: String,

    #[serde(default)]
    pub ticker_sentiment: Vec<TickerSentiment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsTopic {
    #[serde(default)]
    pub topic: String,

    #[serde(default)]
    pub relevance_score: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerSentiment {
    #[serde(default)]
    pub ticker: String,

    #[serde(default)]
    pub relevance_score: String,

    #[serde(default)]
    pub ticker_sentiment_score: String,

    #[serde(default)]
    pub ticker_sentiment_label: String,
}
