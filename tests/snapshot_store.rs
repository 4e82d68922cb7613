mod support;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use nestegg::clock::Clock;
use nestegg::models::{ExchangeRate, Id, Scope, TrendPoint};
use nestegg::storage::{query_snapshots, MemoryStorage, SqliteStorage, Storage};
use rust_decimal::Decimal;
use support::{clock, days_ago, put_account, snapshot, today, BASE};

fn backends() -> Result<Vec<(&'static str, Arc<dyn Storage>)>> {
    Ok(vec![
        ("memory", Arc::new(MemoryStorage::new()) as Arc<dyn Storage>),
        ("sqlite", Arc::new(SqliteStorage::open_in_memory()?) as Arc<dyn Storage>),
    ])
}

#[tokio::test]
async fn upsert_keeps_one_row_per_user_and_day() -> Result<()> {
    for (name, storage) in backends()? {
        let first = storage.upsert_snapshot(&snapshot("mei", today(), 1000)).await?;
        let second = storage.upsert_snapshot(&snapshot("mei", today(), 2500)).await?;

        assert_eq!(first.id, second.id, "{name}");
        assert_eq!(second.total_balance_minor, 2500, "{name}");

        let rows = storage
            .user_snapshots(&Id::from("mei"), today(), today())
            .await?;
        assert_eq!(rows.len(), 1, "{name}");
        assert_eq!(rows[0].total_balance_minor, 2500, "{name}");
        assert_eq!(storage.count_snapshots(&Scope::All).await?, 1, "{name}");
    }
    Ok(())
}

#[tokio::test]
async fn replace_for_date_aggregates_every_owner() -> Result<()> {
    for (name, storage) in backends()? {
        put_account(storage.as_ref(), "mei", "CNY", 100000).await?;
        put_account(storage.as_ref(), "mei", "USD", 1000).await?;
        // No EUR rate stored: counted 1:1.
        put_account(storage.as_ref(), "jun", "EUR", 500).await?;
        let usd = ExchangeRate::new("USD", Decimal::from_str("7.2")?, clock().now());
        storage.upsert_exchange_rates(&[usd]).await?;

        storage
            .insert_snapshots(&[snapshot("ghost", today(), 42), snapshot("mei", today(), 1)])
            .await?;
        storage
            .insert_snapshots(&[snapshot("mei", days_ago(1), 99)])
            .await?;

        let written = storage
            .replace_snapshots_for_date(today(), BASE, clock().now())
            .await?;
        assert_eq!(written, 2, "{name}");

        let mei = storage.user_snapshots(&Id::from("mei"), today(), today()).await?;
        assert_eq!(mei.len(), 1, "{name}");
        assert_eq!(mei[0].total_balance_minor, 107200, "{name}");
        assert_eq!(mei[0].currency_code, BASE, "{name}");

        let jun = storage.user_snapshots(&Id::from("jun"), today(), today()).await?;
        assert_eq!(jun[0].total_balance_minor, 500, "{name}");

        let ghost = storage.user_snapshots(&Id::from("ghost"), today(), today()).await?;
        assert!(ghost.is_empty(), "{name}: rows for the date are replaced");

        let yesterday = storage
            .user_snapshots(&Id::from("mei"), days_ago(1), days_ago(1))
            .await?;
        assert_eq!(yesterday[0].total_balance_minor, 99, "{name}: other dates untouched");
    }
    Ok(())
}

#[tokio::test]
async fn insert_never_overwrites_existing_days() -> Result<()> {
    for (name, storage) in backends()? {
        storage.upsert_snapshot(&snapshot("mei", today(), 100000)).await?;
        let inserted = storage
            .insert_snapshots(&[snapshot("mei", today(), 1), snapshot("mei", days_ago(1), 2)])
            .await?;

        assert_eq!(inserted, 1, "{name}");
        let rows = storage
            .user_snapshots(&Id::from("mei"), days_ago(1), today())
            .await?;
        assert_eq!(rows.len(), 2, "{name}");
        assert_eq!(rows[0].total_balance_minor, 100000, "{name}");
    }
    Ok(())
}

#[tokio::test]
async fn scopes_are_isolated() -> Result<()> {
    for (name, storage) in backends()? {
        storage
            .insert_snapshots(&[
                snapshot("mei", today(), 100000),
                snapshot("jun", today(), 200000),
                snapshot("jun", days_ago(1), 150000),
            ])
            .await?;

        let mei = query_snapshots(storage.as_ref(), &Scope::User(Id::from("mei")), days_ago(5), today())
            .await?;
        assert_eq!(mei, vec![TrendPoint::new(today(), 100000)], "{name}");

        let all = query_snapshots(storage.as_ref(), &Scope::All, today(), today()).await?;
        assert_eq!(all, vec![TrendPoint::new(today(), 300000)], "{name}");

        assert_eq!(storage.count_snapshots(&Scope::User(Id::from("jun"))).await?, 2, "{name}");
        assert_eq!(storage.count_snapshots(&Scope::All).await?, 3, "{name}");

        let keys = storage.snapshot_keys(&Scope::User(Id::from("mei"))).await?;
        assert_eq!(keys.len(), 1, "{name}");
        assert!(keys.contains(&(Id::from("mei"), today())), "{name}");
    }
    Ok(())
}

#[tokio::test]
async fn native_order_is_newest_first() -> Result<()> {
    for (name, storage) in backends()? {
        let rows: Vec<_> = (0..5).map(|i| snapshot("mei", days_ago(i), 10)).collect();
        storage.insert_snapshots(&rows).await?;

        let points = query_snapshots(
            storage.as_ref(),
            &Scope::User(Id::from("mei")),
            days_ago(4),
            today(),
        )
        .await?;
        assert_eq!(points.first().map(|p| p.date), Some(today()), "{name}");
        assert_eq!(points.last().map(|p| p.date), Some(days_ago(4)), "{name}");
    }
    Ok(())
}

#[tokio::test]
async fn account_writes_and_currency_codes() -> Result<()> {
    for (name, storage) in backends()? {
        let savings = put_account(storage.as_ref(), "mei", "usd", 100).await?;
        put_account(storage.as_ref(), "jun", "CNY", 100).await?;
        put_account(storage.as_ref(), "jun", "USD", 100).await?;

        assert_eq!(storage.account_currency_codes().await?, vec!["CNY", "USD"], "{name}");
        assert_eq!(storage.list_accounts(Some(&Id::from("jun"))).await?.len(), 2, "{name}");
        assert_eq!(storage.list_accounts(None).await?.len(), 3, "{name}");

        assert!(storage.delete_account(&savings.id).await?, "{name}");
        assert!(!storage.delete_account(&savings.id).await?, "{name}");
        assert!(storage.get_account(&savings.id).await?.is_none(), "{name}");
    }
    Ok(())
}
