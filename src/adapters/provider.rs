//! HTTP client for the market-data provider.
//!
//! Stock data comes from `TIME_SERIES_WEEKLY_ADJUSTED`, news from
//! `NEWS_SENTIMENT`. A 4xx response is a client error carrying its status;
//! every other failure is reported without one. Retrying is left to the
//! cycle trigger.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::AcquisitionClient;
use crate::config::ProviderSettings;
use crate::domain::{Dataset, DatasetKind, NewsFeed, StockSeries};
use crate::error::AcquisitionError;

/// Provider client for stock series and news sentiment
pub struct AlphaVantageClient {
    base_url: String,
    api_token: String,
    symbol: String,
    client: reqwest::Client,
}

impl AlphaVantageClient {
    /// Create a new client
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        symbol: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            symbol: symbol.into(),
            client,
        })
    }

    /// Create from resolved settings
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, reqwest::Error> {
        Self::new(
            settings.base_url.clone(),
            settings.api_token.clone(),
            settings.symbol.clone(),
            Duration::from_secs(settings.timeout_seconds),
        )
    }

    /// Query parameters for one dataset (without the api key)
    fn query(&self, kind: DatasetKind) -> [(&'static str, &str); 2] {
        match kind {
            DatasetKind::Stock => [
                ("function", "TIME_SERIES_WEEKLY_ADJUSTED"),
                ("symbol", self.symbol.as_str()),
            ],
            DatasetKind::News => [
                ("function", "NEWS_SENTIMENT"),
                ("tickers", self.symbol.as_str()),
            ],
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, kind: DatasetKind) -> Result<T, AcquisitionError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query(kind))
            .query(&[("apikey", self.api_token.as_str())])
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
            .send()
            .await
            .map_err(|e| AcquisitionError::new(kind, format!("request failed: {}", e)))?;

        let status = response.status();
        debug!(%kind, status = status.as_u16(), "Provider responded");

        if status.is_client_error() {
            return Err(AcquisitionError::client_error(kind, status.as_u16()));
        }
        if !status.is_success() {
            return Err(AcquisitionError::new(
                kind,
                format!("provider returned status {}", status.as_u16()),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AcquisitionError::new(kind, format!("invalid response body: {}", e)))
    }
}

#[async_trait]
impl AcquisitionClient for AlphaVantageClient {
    async fn fetch(&self, kind: DatasetKind) -> Result<Dataset, AcquisitionError> {
        info!(%kind, symbol = %self.symbol, "Pulling data from provider");
        let dataset = match kind {
            DatasetKind::Stock => Dataset::from(self.get_json::<StockSeries>(kind).await?),
            DatasetKind::News => Dataset::from(self.get_json::<NewsFeed>(kind).await?),
        };
        Ok(dataset)
    }
}
