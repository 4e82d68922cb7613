#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use nestegg::clock::{Clock, FixedClock};
use nestegg::models::{Account, Id, NewSnapshot};
use nestegg::rates::{NoopRateSource, RateService, RateSource};
use nestegg::storage::Storage;

pub const BASE: &str = "CNY";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
}

pub fn days_ago(n: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(n)).unwrap()
}

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::on(today()))
}

/// Rate source with canned quotes that counts how often it is called.
pub struct StubRateSource {
    quotes: HashMap<String, f64>,
    fail: bool,
    calls: AtomicUsize,
    requested: std::sync::Mutex<Vec<Vec<String>>>,
}

impl StubRateSource {
    pub fn new(quotes: &[(&str, f64)]) -> Self {
        Self {
            quotes: quotes.iter().map(|(c, v)| (c.to_string(), *v)).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
            requested: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<Vec<String>> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl RateSource for StubRateSource {
    async fn fetch_latest(&self, _base: &str, quotes: &[String]) -> Result<HashMap<String, f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(quotes.to_vec());
        if self.fail {
            anyhow::bail!("rate API unavailable");
        }
        Ok(self.quotes.clone())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

pub fn rate_service(storage: Arc<dyn Storage>, source: Arc<dyn RateSource>) -> Arc<RateService> {
    Arc::new(RateService::new(storage, source, BASE).with_clock(clock()))
}

pub fn offline_rates(storage: Arc<dyn Storage>) -> Arc<RateService> {
    rate_service(storage, Arc::new(NoopRateSource))
}

pub async fn put_account(
    storage: &dyn Storage,
    owner: &str,
    currency: &str,
    balance_minor: i64,
) -> Result<Account> {
    let account = Account::new(owner, format!("{owner} {currency}"), currency, balance_minor);
    storage.save_account(&account).await?;
    Ok(account)
}

pub fn snapshot(user: &str, date: NaiveDate, total: i64) -> NewSnapshot {
    NewSnapshot::new(Id::from(user), date, total, BASE, clock().now())
}
