use chrono::NaiveDate;
use roll_tracker::model::{AlertLevel, OptionData, OptionEntry, OwnerId, SentMarker, Ticker};
use roll_tracker::store::{JsonFileStore, MemoryStore, PositionStore, StoreError};
use rust_decimal_macros::dec;
use std::str::FromStr;

fn acme() -> Ticker {
    Ticker::from_str("ACME").unwrap()
}

fn position(owner: &str) -> OptionData {
    let expiry = NaiveDate::from_ymd_opt(2026, 12, 18).unwrap();
    let mut p = OptionData::new(OwnerId::new(owner), acme(), dec!(110), expiry);
    p.future = vec![
        OptionEntry::contract(&acme(), NaiveDate::from_ymd_opt(2027, 1, 15).unwrap(), dec!(115)),
        OptionEntry::sentinel(),
    ];
    p
}

fn marker(owner: &str, level: AlertLevel) -> SentMarker {
    SentMarker {
        owner: OwnerId::new(owner),
        ticker: acme(),
        level,
    }
}

#[tokio::test]
async fn json_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("positions.json");
    {
        let store = JsonFileStore::open(&path).unwrap();
        store.upsert_position(&position("u1")).await.unwrap();
        store
            .set_alert_enabled(&OwnerId::new("u1"), &acme(), true)
            .await
            .unwrap();
        store.insert_sent_marker(&marker("u1", AlertLevel::Three)).await.unwrap();
    }

    let reopened = JsonFileStore::open(&path).unwrap();
    let positions = reopened.positions(None).await.unwrap();
    assert_eq!(positions, vec![position("u1")]);
    assert!(positions[0].future[1].is_sentinel());
    assert!(reopened.alert_enablement(None).await.unwrap()[0].enabled);
    assert_eq!(
        reopened.sent_markers(None).await.unwrap(),
        vec![marker("u1", AlertLevel::Three)]
    );
}

#[tokio::test]
async fn missing_file_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("absent.json")).unwrap();
    assert!(store.positions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_marker_is_rejected_and_not_persisted_twice() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("positions.json");
    let store = JsonFileStore::open(&path).unwrap();
    store.insert_sent_marker(&marker("u1", AlertLevel::Four)).await.unwrap();

    let err = store
        .insert_sent_marker(&marker("u1", AlertLevel::Four))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::AlreadyExists {
            level: AlertLevel::Four,
            ..
        }
    ));
    store.insert_sent_marker(&marker("u2", AlertLevel::Four)).await.unwrap();

    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.sent_markers(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn corrupt_file_is_an_encoding_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("positions.json");
    std::fs::write(&path, b"{ not json").unwrap();
    assert!(matches!(
        JsonFileStore::open(&path),
        Err(StoreError::Encoding(_))
    ));
}

#[tokio::test]
async fn owner_filter_and_cascading_delete() {
    let store = MemoryStore::new();
    let u1 = OwnerId::new("u1");
    store.upsert_position(&position("u1")).await.unwrap();
    store.upsert_position(&position("u2")).await.unwrap();
    store.set_alert_enabled(&u1, &acme(), true).await.unwrap();
    store.insert_sent_marker(&marker("u1", AlertLevel::One)).await.unwrap();
    store.insert_sent_marker(&marker("u2", AlertLevel::One)).await.unwrap();

    assert_eq!(store.positions(Some(&u1)).await.unwrap().len(), 1);
    assert_eq!(store.positions(None).await.unwrap().len(), 2);

    let mut moved = position("u1");
    moved.strike = dec!(120);
    store.upsert_position(&moved).await.unwrap();
    assert_eq!(store.positions(Some(&u1)).await.unwrap()[0].strike, dec!(120));

    store.delete_position(&u1, &acme()).await.unwrap();
    assert!(store.positions(Some(&u1)).await.unwrap().is_empty());
    assert!(store.alert_enablement(Some(&u1)).await.unwrap().is_empty());
    assert!(store.sent_markers(Some(&u1)).await.unwrap().is_empty());
    assert_eq!(store.sent_markers(None).await.unwrap().len(), 1);
}
