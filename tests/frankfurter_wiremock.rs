mod support;

use std::sync::Arc;

use anyhow::Result;
use nestegg::rates::{FrankfurterRateSource, RateService, RateSource};
use nestegg::storage::{MemoryStorage, Storage};
use rust_decimal::Decimal;
use support::{clock, put_account};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LATEST_BODY: &str = r#"{
    "amount": 1.0,
    "base": "CNY",
    "date": "2026-03-13",
    "rates": {
        "EUR": 0.125,
        "USD": 0.2
    }
}"#;

#[tokio::test]
async fn frankfurter_latest_sends_base_and_symbols() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .and(query_param("from", "CNY"))
        .and(query_param("to", "EUR,USD"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LATEST_BODY, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let source = FrankfurterRateSource::new().with_base_url(server.uri());
    let quotes = source
        .fetch_latest("CNY", &["EUR".to_string(), "USD".to_string()])
        .await?;

    assert_eq!(quotes.len(), 2);
    assert!((quotes["USD"] - 0.2).abs() < 1e-12);
    Ok(())
}

#[tokio::test]
async fn frankfurter_http_error_is_reported() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = FrankfurterRateSource::new().with_base_url(server.uri());
    let result = source.fetch_latest("CNY", &["USD".to_string()]).await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn rate_service_stores_inverted_frankfurter_quotes() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .and(query_param("from", "CNY"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LATEST_BODY, "application/json"))
        .mount(&server)
        .await;

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    put_account(storage.as_ref(), "mei", "USD", 100).await?;
    put_account(storage.as_ref(), "jun", "EUR", 100).await?;
    let source = Arc::new(FrankfurterRateSource::new().with_base_url(server.uri()));
    let service = RateService::new(storage, source, "CNY").with_clock(clock());

    let rates = service.rates_map().await?;

    assert_eq!(rates.get("USD"), Some(&Decimal::from(5)));
    assert_eq!(rates.get("EUR"), Some(&Decimal::from(8)));
    assert_eq!(rates.get("CNY"), Some(&Decimal::ONE));
    Ok(())
}

#[tokio::test]
async fn unreachable_api_leaves_base_rate_only() -> Result<()> {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    put_account(storage.as_ref(), "mei", "USD", 100).await?;
    let source = Arc::new(FrankfurterRateSource::new().with_base_url(uri));
    let service = RateService::new(storage, source, "CNY").with_clock(clock());

    let rates = service.rates_map().await?;
    assert_eq!(rates.len(), 1);
    assert_eq!(rates.get("CNY"), Some(&Decimal::ONE));
    Ok(())
}
