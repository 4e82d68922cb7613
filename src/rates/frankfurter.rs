//! Frankfurter FX rate source using ECB daily reference rates.
//!
//! The API accepts any supported base via `from=`, so no cross-rate math is
//! needed here. No API key is required.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::source::RateSource;
use crate::config::RatesConfig;

const FRANKFURTER_BASE_URL: &str = "https://api.frankfurter.app";

/// Response from the `/latest` endpoint.
#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    #[allow(dead_code)]
    amount: f64,
    base: String,
    date: NaiveDate,
    /// Units of each currency per one unit of `base`.
    rates: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct FrankfurterRateSource {
    client: Client,
    base_url: String,
}

impl FrankfurterRateSource {
    /// Creates a new Frankfurter source with a default HTTP client.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: FRANKFURTER_BASE_URL.to_string(),
        }
    }

    /// Creates a source with the timeout and URL from config.
    pub fn from_config(config: &RatesConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("nestegg/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client).with_base_url(&config.api_url))
    }

    /// Creates a new Frankfurter source with a custom HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: FRANKFURTER_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for FrankfurterRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RateSource for FrankfurterRateSource {
    async fn fetch_latest(&self, base: &str, quotes: &[String]) -> Result<HashMap<String, f64>> {
        if quotes.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/latest", self.base_url);
        let symbols = quotes.join(",");

        let response = self
            .client
            .get(&url)
            .query(&[("from", base), ("to", symbols.as_str())])
            .send()
            .await
            .with_context(|| format!("Frankfurter request failed for base {base}"))?
            .error_for_status()?
            .json::<FrankfurterResponse>()
            .await
            .context("Failed to parse Frankfurter response")?;

        debug!(
            base = %response.base,
            date = %response.date,
            rates = response.rates.len(),
            "fetched latest rates"
        );

        Ok(response
            .rates
            .into_iter()
            .map(|(code, value)| (code.to_ascii_uppercase(), value))
            .collect())
    }

    fn name(&self) -> &str {
        "frankfurter"
    }
}
