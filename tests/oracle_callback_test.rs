mod common;

use axum::http::StatusCode;
use common::*;
use slotmine::Amount;
use std::time::Duration;

fn random_bytes(last: u8) -> String {
    let mut bytes = [0u8; 32];
    bytes[31] = last;
    format!("0x{}", hex::encode(bytes))
}

async fn callback(
    app: &TestApp,
    token: Option<&str>,
    sequence_number: u64,
    bytes: &str,
) -> (StatusCode, serde_json::Value) {
    app.send_json(
        "POST",
        "/v1/oracle/callback",
        token,
        serde_json::json!({
            "sequenceNumber": sequence_number,
            "randomBytes": bytes,
        }),
    )
    .await
}

#[tokio::test]
async fn test_callback_requires_token() {
    let app = setup_test_app(&[]).await;
    let (status, _) = callback(&app, None, 1, &random_bytes(0)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = callback(&app, Some("wrong"), 1, &random_bytes(0)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_callback_sets_multiplier() {
    let app = setup_test_app(&[]).await;
    let (_, body) = app.takeover(0, ALICE, 0, "0").await;
    let seq = body["sequenceNumber"].as_u64().unwrap();

    app.clock.advance(5);
    // Default table is 1,2,3,5,10; 3 mod 5 selects 5x.
    let (status, body) = callback(&app, Some(ORACLE_TOKEN), seq, &random_bytes(3)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");

    let (_, slot) = app.get("/v1/slots/0").await;
    assert_eq!(slot["multiplier"], "5000000000000000000");
    assert_eq!(slot["lastMultiplierTime"], T0 + 5);
    assert_eq!(slot["refreshFee"], "0");

    let stored = app.repo.get_slot(0).await.unwrap().unwrap();
    assert_eq!(stored.multiplier, Amount::from_whole(5));
    assert!(app.repo.list_pending().await.unwrap().is_empty());

    // Redelivery is orphaned and harmless.
    let (status, body) = callback(&app, Some(ORACLE_TOKEN), seq, &random_bytes(0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "orphaned");
    let (_, slot) = app.get("/v1/slots/0").await;
    assert_eq!(slot["multiplier"], "5000000000000000000");
}

#[tokio::test]
async fn test_stale_callback_is_ignored() {
    let app = setup_test_app(&[]).await;
    let (_, first) = app.takeover(0, ALICE, 0, "0").await;
    let stale_seq = first["sequenceNumber"].as_u64().unwrap();
    app.clock.advance(3600);
    let (status, _) = app.takeover(0, BOB, 1, "0").await;
    assert_eq!(status, StatusCode::OK);

    let (_, before) = app.get("/v1/slots/0").await;
    let (status, body) = callback(&app, Some(ORACLE_TOKEN), stale_seq, &random_bytes(4)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "stale");

    let (_, after) = app.get("/v1/slots/0").await;
    assert_eq!(after["multiplier"], before["multiplier"]);
    assert_eq!(after["lastMultiplierTime"], before["lastMultiplierTime"]);
}

#[tokio::test]
async fn test_malformed_random_bytes() {
    let app = setup_test_app(&[]).await;
    let (status, _) = callback(&app, Some(ORACLE_TOKEN), 1, "0xzz").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = callback(&app, Some(ORACLE_TOKEN), 1, "0xabcd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_local_dispatcher_fulfills_requests() {
    let app = setup_test_app(&[]).await;
    app.takeover(0, ALICE, 0, "0").await;
    assert_eq!(app.node.oracle.outstanding_len(), 1);

    let dispatched = app.node.dispatcher().dispatch_pending().await;
    assert_eq!(dispatched, 1);

    let (_, slot) = app.get("/v1/slots/0").await;
    assert_eq!(slot["lastMultiplierTime"], T0);
    assert!(app.repo.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_spawned_dispatcher_runs_in_background() {
    let app = setup_test_app(&[]).await;
    let handle = app.node.spawn_dispatcher();
    app.takeover(0, ALICE, 0, "0").await;

    // The callback may be journaled before the takeover's own pending row;
    // either way nothing is left outstanding.
    let mut settled = false;
    for _ in 0..50 {
        let (_, slot) = app.get("/v1/slots/0").await;
        let pending = app.repo.list_pending().await.unwrap();
        if slot["lastMultiplierTime"] == T0 && pending.is_empty() {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    handle.abort();
    assert!(settled);
    assert_eq!(app.node.oracle.outstanding_len(), 0);
}
