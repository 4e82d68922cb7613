use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::source::RateSource;
use crate::clock::{Clock, SystemClock};
use crate::models::{normalize_currency_code, ExchangeRate};
use crate::staleness::{check_rate_staleness, log_rate_staleness};
use crate::storage::Storage;
use crate::valuation::{rates_from_slice, RatesMap};

/// Default time-to-live for stored rates (6 hours).
const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Keeps stored exchange rates fresh and serves them as a lookup map.
pub struct RateService {
    storage: Arc<dyn Storage>,
    source: Arc<dyn RateSource>,
    base_currency: String,
    extra_currencies: Vec<String>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl RateService {
    pub fn new(
        storage: Arc<dyn Storage>,
        source: Arc<dyn RateSource>,
        base_currency: &str,
    ) -> Self {
        Self {
            storage,
            source,
            base_currency: normalize_currency_code(base_currency),
            extra_currencies: Vec::new(),
            ttl: DEFAULT_TTL,
            clock: Arc::new(SystemClock),
        }
    }

    /// Currencies to refresh even when no account currently holds them.
    pub fn with_extra_currencies(mut self, currencies: Vec<String>) -> Self {
        self.extra_currencies = currencies;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Stored rates as a lookup map, refreshing first when they are stale.
    ///
    /// The base currency is always present with a rate of 1.
    pub async fn rates_map(&self) -> Result<RatesMap> {
        let rates = self.ensure_fresh().await?;
        Ok(rates_from_slice(&rates, &self.base_currency))
    }

    /// Stored rates without triggering a refresh.
    pub async fn list_rates(&self) -> Result<Vec<ExchangeRate>> {
        self.storage.list_exchange_rates().await
    }

    /// Refresh when stale and return what is stored afterwards.
    ///
    /// Only currencies in use decide staleness. A failed refresh is logged and
    /// the existing rates are returned as-is.
    pub async fn ensure_fresh(&self) -> Result<Vec<ExchangeRate>> {
        let codes = self.currencies_in_use().await?;
        let rates = self.storage.list_exchange_rates().await?;
        let check = check_rate_staleness(&rates, &codes, self.ttl, self.clock.now());
        log_rate_staleness(&check, codes.len());
        if !check.is_stale {
            return Ok(rates);
        }

        match self.refresh_codes(&codes).await {
            Ok(0) => Ok(rates),
            Ok(_) => self.storage.list_exchange_rates().await,
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    error = %e,
                    "exchange rate refresh failed; serving stored rates"
                );
                Ok(rates)
            }
        }
    }

    /// Codes held by any account plus configured extras, without the base.
    async fn currencies_in_use(&self) -> Result<Vec<String>> {
        let mut codes: Vec<String> = self
            .storage
            .account_currency_codes()
            .await?
            .iter()
            .chain(self.extra_currencies.iter())
            .map(|c| normalize_currency_code(c))
            .filter(|c| !c.is_empty() && *c != self.base_currency)
            .collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }

    /// Fetch the latest quotes for every currency in use and upsert them.
    ///
    /// Returns the number of rates written.
    pub async fn refresh(&self) -> Result<usize> {
        let codes = self.currencies_in_use().await?;
        self.refresh_codes(&codes).await
    }

    async fn refresh_codes(&self, codes: &[String]) -> Result<usize> {
        if codes.is_empty() {
            debug!("no foreign currencies in use; skipping rate refresh");
            return Ok(0);
        }

        let quotes = self
            .source
            .fetch_latest(&self.base_currency, codes)
            .await
            .with_context(|| format!("Failed to fetch rates from {}", self.source.name()))?;

        let now = self.clock.now();
        let mut rates = Vec::with_capacity(codes.len());
        for code in codes {
            match quotes.get(code) {
                Some(&per_base) => match ExchangeRate::from_units_per_base(code, per_base, now) {
                    Some(rate) => rates.push(rate),
                    None => warn!(currency = %code, quote = per_base, "ignoring invalid quote"),
                },
                None => warn!(currency = %code, source = self.source.name(), "no quote returned"),
            }
        }

        self.storage.upsert_exchange_rates(&rates).await?;
        info!(
            base = %self.base_currency,
            requested = codes.len(),
            stored = rates.len(),
            source = self.source.name(),
            "exchange rates refreshed"
        );
        Ok(rates.len())
    }
}
