mod support;

use std::str::FromStr;

use rust_decimal::Decimal;

use sentinel::signal::CrossingKind;
use sentinel::signal::model::Timeframe;
use sentinel::store::{EventQuery, SignalRepository, SqlxSignalRepository};
use support::{event, setup_db, watch};

async fn repo() -> SqlxSignalRepository {
    let db = setup_db().await;
    SqlxSignalRepository::new(db.pool.clone())
}

#[tokio::test]
async fn append_then_query_returns_newest_first() {
    let repo = repo().await;

    let a = repo
        .append_event(&event("BTCUSDT", CrossingKind::OversoldEnter, 1_000), 5_000)
        .await
        .unwrap();
    let b = repo
        .append_event(&event("BTCUSDT", CrossingKind::OversoldExit, 3_000), 5_001)
        .await
        .unwrap();
    let c = repo
        .append_event(&event("ETHUSDT", CrossingKind::OverboughtEnter, 2_000), 5_002)
        .await
        .unwrap();
    assert!(a < b && b < c);

    let all = repo.query_events(&EventQuery::recent(10)).await.unwrap();
    let ids: Vec<i64> = all.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![b, c, a]);

    let first = &all[0];
    assert_eq!(first.event.symbol, "BTCUSDT");
    assert_eq!(first.event.kind, CrossingKind::OversoldExit);
    assert_eq!(first.event.timeframe, Timeframe::M5);
    assert_eq!(first.event.occurred_ms, 3_000);
    assert_eq!(first.created_ms, 5_001);
    assert!(!first.event.is_backfilled);

    assert_eq!(repo.count_events().await.unwrap(), 3);
}

#[tokio::test]
async fn filters_by_pair_and_inclusive_time_bounds() {
    let repo = repo().await;

    for ts in [1_000, 2_000, 3_000, 4_000] {
        repo.append_event(&event("BTCUSDT", CrossingKind::OversoldEnter, ts), ts)
            .await
            .unwrap();
    }
    repo.append_event(&event("ETHUSDT", CrossingKind::OversoldEnter, 2_500), 2_500)
        .await
        .unwrap();

    let q = EventQuery::for_pair("BTCUSDT", Timeframe::M5, 10).between(2_000, 3_000);
    let rows = repo.query_events(&q).await.unwrap();
    let times: Vec<u64> = rows.iter().map(|r| r.event.occurred_ms).collect();
    assert_eq!(times, vec![3_000, 2_000]);

    let other_tf = EventQuery::for_pair("BTCUSDT", Timeframe::H1, 10);
    assert!(repo.query_events(&other_tf).await.unwrap().is_empty());

    let limited = repo.query_events(&EventQuery::recent(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn price_keeps_decimal_precision() {
    let repo = repo().await;

    let mut e = event("SHIBUSDT", CrossingKind::OverboughtEnter, 10);
    e.price = Decimal::from_str("0.00000912345678").unwrap();
    repo.append_event(&e, 11).await.unwrap();

    let rows = repo.query_events(&EventQuery::recent(1)).await.unwrap();
    assert_eq!(rows[0].event.price, e.price);
    assert_eq!(rows[0].event.oscillator_value, e.oscillator_value);
}

#[tokio::test]
async fn watch_config_is_absent_then_upserted() {
    let repo = repo().await;
    assert!(repo.get_watch_config().await.unwrap().is_none());

    let mut cfg = watch(&["BTCUSDT", "ETHUSDT"], true);
    repo.save_watch_config(&cfg).await.unwrap();
    assert_eq!(repo.get_watch_config().await.unwrap(), Some(cfg.clone()));

    cfg.symbols = vec!["SOLUSDT".to_string()];
    cfg.timeframe = Timeframe::H4;
    cfg.notifications_enabled = false;
    repo.save_watch_config(&cfg).await.unwrap();
    assert_eq!(repo.get_watch_config().await.unwrap(), Some(cfg));
}

#[tokio::test]
async fn subscriber_upsert_keeps_approval() {
    let repo = repo().await;

    repo.upsert_subscriber(100, "alice", 1).await.unwrap();
    repo.upsert_subscriber(200, "bob", 2).await.unwrap();
    assert!(repo.set_subscriber_approval(100, true).await.unwrap());

    // Re-registration only refreshes the username.
    repo.upsert_subscriber(100, "alice_renamed", 3).await.unwrap();

    let approved = repo.list_subscribers(true).await.unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].chat_id, 100);
    assert_eq!(approved[0].username, "alice_renamed");
    assert!(approved[0].approved);
    assert_eq!(approved[0].created_ms, 1);

    assert_eq!(repo.list_subscribers(false).await.unwrap().len(), 2);
    assert!(!repo.set_subscriber_approval(999, true).await.unwrap());
}
