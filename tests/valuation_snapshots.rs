mod support;

use std::sync::Arc;

use anyhow::Result;
use assetbook::clock::FixedClock;
use assetbook::error::LedgerError;
use assetbook::market_data::MemoryExchangeRateStore;
use assetbook::models::{Account, AssetClass, Id};
use assetbook::portfolio::{HoldingsService, TotalValuationService, ValuationLineItem};
use assetbook::storage::MemoryStorage;
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use support::{buy, day, sell, MockPriceSource};

struct Fixture {
    storage: Arc<MemoryStorage>,
    holdings: Arc<HoldingsService>,
    valuation: TotalValuationService,
}

async fn fixture() -> Fixture {
    let storage = Arc::new(MemoryStorage::new());
    let rates = Arc::new(MemoryExchangeRateStore::new());
    let updated = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    // one TWD buys 0.03125 USD, so 1 USD is worth 32 TWD
    rates.upsert_rate("TWD", "USD", dec!(0.03125), updated).await;
    rates.upsert_rate("USD", "TWD", dec!(32), updated).await;

    let prices = Arc::new(
        MockPriceSource::new("mock")
            .with_price(AssetClass::Stock, "AAPL", dec!(150), "USD")
            .with_price(AssetClass::Stock, "MSFT", dec!(400), "USD"),
    );
    let holdings = Arc::new(HoldingsService::new(storage.clone(), prices, rates.clone()));
    let valuation = TotalValuationService::new(storage.clone(), holdings.clone(), rates)
        .with_clock(Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 20, 23, 0, 0).unwrap(),
        )));

    Fixture {
        storage,
        holdings,
        valuation,
    }
}

#[tokio::test]
async fn total_converts_holdings_and_accounts_into_display_currency() -> Result<()> {
    let f = fixture().await;
    let alice = Id::from("alice");
    f.storage.set_display_currency(&alice, "twd").await;
    f.storage
        .append_trades(&[buy("AAPL", dec!(2), dec!(100), 1).with_user(alice.clone())])
        .await;
    f.storage
        .save_account(&Account::new(alice.clone(), "Savings", "TWD", dec!(1000)))
        .await;
    f.storage
        .save_account(&Account::new(alice.clone(), "Travel", "EUR", dec!(50)))
        .await;

    let total = f.valuation.valuate_user(&alice).await?;

    assert_eq!(total.currency, "TWD");
    assert_eq!(total.total_value, dec!(10600));
    assert_eq!(total.line_items.len(), 2);
    assert!(matches!(
        &total.line_items[0],
        ValuationLineItem::Holding { converted, .. } if *converted == dec!(9600)
    ));
    assert_eq!(total.skipped.len(), 1);
    assert_eq!(total.skipped[0].currency, "EUR");
    assert_eq!(total.as_of, Utc.with_ymd_and_hms(2024, 3, 20, 23, 0, 0).unwrap());
    Ok(())
}

#[tokio::test]
async fn users_without_profile_currency_fall_back_to_default() -> Result<()> {
    let f = fixture().await;
    let carol = Id::from("carol");
    f.storage
        .append_trades(&[buy("MSFT", dec!(1), dec!(300), 2).with_user(carol.clone())])
        .await;

    assert_eq!(f.holdings.display_currency(&carol).await?, "USD");

    let holdings = f.holdings.list_holdings(&carol).await?;
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].total_value_in_display_currency, Some(dec!(400)));
    assert_eq!(holdings[0].gain_loss, dec!(100));
    Ok(())
}

#[tokio::test]
async fn list_holdings_surfaces_ledger_errors() {
    let f = fixture().await;
    let bob = Id::from("bob");
    f.storage
        .append_trades(&[
            buy("AAPL", dec!(1), dec!(100), 1).with_user(bob.clone()),
            sell("AAPL", dec!(5), dec!(120), 2).with_user(bob.clone()),
        ])
        .await;

    let err = f.holdings.list_holdings(&bob).await.unwrap_err();
    let ledger = err
        .downcast_ref::<LedgerError>()
        .expect("ledger error is preserved");
    assert!(matches!(ledger, LedgerError::InsufficientHolding { .. }));
}

#[tokio::test]
async fn account_summaries_leave_unconvertible_balances_empty() -> Result<()> {
    let f = fixture().await;
    let alice = Id::from("alice");
    f.storage.set_display_currency(&alice, "TWD").await;
    f.storage
        .save_account(&Account::new(alice.clone(), "Brokerage", "USD", dec!(10)))
        .await;
    f.storage
        .save_account(&Account::new(alice.clone(), "Travel", "JPY", dec!(5000)))
        .await;

    let mut summaries = f.holdings.account_summaries(&alice).await?;
    summaries.sort_by(|a, b| a.name.cmp(&b.name));

    assert_eq!(summaries[0].name, "Brokerage");
    assert_eq!(summaries[0].balance_in_display_currency, Some(dec!(320)));
    assert_eq!(summaries[1].name, "Travel");
    assert_eq!(summaries[1].balance_in_display_currency, None);
    Ok(())
}

#[tokio::test]
async fn snapshot_run_skips_failing_users_and_is_queryable() -> Result<()> {
    let f = fixture().await;
    let alice = Id::from("alice");
    let bob = Id::from("bob");
    let carol = Id::from("carol");

    f.storage.set_display_currency(&alice, "TWD").await;
    f.storage
        .save_account(&Account::new(alice.clone(), "Savings", "TWD", dec!(1000)))
        .await;
    f.storage
        .append_trades(&[sell("AAPL", dec!(1), dec!(100), 1).with_user(bob.clone())])
        .await;
    f.storage
        .save_account(&Account::new(carol.clone(), "Checking", "USD", dec!(500)))
        .await;

    assert_eq!(f.valuation.record_daily_snapshots(day(18)).await?, 2);

    f.storage
        .save_account(&Account::new(alice.clone(), "Cash", "USD", dec!(1)))
        .await;
    assert_eq!(f.valuation.record_today().await?, 2);
    // same day again replaces the row
    assert_eq!(f.valuation.record_today().await?, 2);

    let alice_values = f.valuation.daily_values(&alice, day(1), day(31)).await?;
    assert_eq!(alice_values.len(), 2);
    assert_eq!(alice_values[0].date, day(18));
    assert_eq!(alice_values[0].total_value, dec!(1000));
    assert_eq!(alice_values[1].date, day(20));
    assert_eq!(alice_values[1].total_value, dec!(1032));
    assert_eq!(alice_values[1].currency, "TWD");

    let only_first = f.valuation.daily_values(&alice, day(18), day(19)).await?;
    assert_eq!(only_first.len(), 1);

    assert!(f.valuation.daily_values(&bob, day(1), day(31)).await?.is_empty());
    let carol_values = f.valuation.daily_values(&carol, day(1), day(31)).await?;
    assert_eq!(carol_values.len(), 2);
    assert_eq!(carol_values[0].total_value, dec!(500));
    assert_eq!(carol_values[0].currency, "USD");
    Ok(())
}
