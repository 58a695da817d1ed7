mod common;

use chrono::{Duration, Utc};
use engine::{EngineError, HistoryEventType, HistoryFilter, MoneyCents, TransferCmd};

use common::*;

#[tokio::test]
async fn users_read_only_their_own_history() {
    let (engine, db) = engine_with_db().await;
    funded_card(&engine, &db, &alice(), 1_000).await;
    let b = funded_card(&engine, &db, &bob(), 0).await;
    engine.block_card(&bob(), b.id).await.unwrap();

    let mine = engine
        .history(&alice(), &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert!(mine.iter().all(|r| r.user_id.as_deref() == Some(ALICE)));

    let err = engine
        .history(
            &alice(),
            &HistoryFilter {
                user_id: Some(BOB.to_string()),
                ..HistoryFilter::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine
        .history(
            &alice(),
            &HistoryFilter {
                card_id: Some(b.id),
                ..HistoryFilter::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let everything = engine
        .history(&root(), &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(everything.len(), 3);
}

#[tokio::test]
async fn history_filters_by_event_and_time_range() {
    let (engine, db) = engine_with_db().await;
    let a = funded_card(&engine, &db, &alice(), 1_000).await;
    let b = funded_card(&engine, &db, &bob(), 0).await;
    engine
        .create_transfer(TransferCmd::new(a.id, b.id, MoneyCents::new(250), alice()))
        .await
        .unwrap();

    let transfers = engine
        .history(
            &root(),
            &HistoryFilter {
                event_types: Some(vec![HistoryEventType::Transfer]),
                ..HistoryFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(transfers.len(), 1);

    let now = Utc::now();
    let window = engine
        .history(
            &root(),
            &HistoryFilter {
                from: Some(now - Duration::hours(1)),
                to: Some(now + Duration::hours(1)),
                ..HistoryFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(window.len(), 3);

    let future = engine
        .history(
            &root(),
            &HistoryFilter {
                from: Some(now + Duration::hours(1)),
                ..HistoryFilter::default()
            },
        )
        .await
        .unwrap();
    assert!(future.is_empty());

    let limited = engine
        .history(
            &root(),
            &HistoryFilter {
                limit: Some(2),
                ..HistoryFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn invalid_history_filters_are_rejected() {
    let (engine, _db) = engine_with_db().await;
    let now = Utc::now();

    let err = engine
        .history(
            &root(),
            &HistoryFilter {
                from: Some(now),
                to: Some(now),
                ..HistoryFilter::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .history(
            &root(),
            &HistoryFilter {
                event_types: Some(Vec::new()),
                ..HistoryFilter::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}
