mod common;

use axum::http::StatusCode;
use common::*;
use slotmine::{Address, Amount};

const MIN_INIT_PRICE: &str = "1000000000000000";

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_two_takeovers_mint_reward_to_first_holder() {
    let app = setup_test_app(&[]).await;

    let (status, body) = app.takeover(0, ALICE, 0, "0").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["price"], "0");
    assert_eq!(body["slot"]["epochId"], 1);
    assert_eq!(body["slot"]["initPrice"], MIN_INIT_PRICE);
    assert_eq!(body["slot"]["miner"], ALICE);
    assert_eq!(body["slot"]["state"], "held");
    assert!(body["sequenceNumber"].is_u64());

    app.clock.advance(1800);
    let (_, price) = app.get("/v1/slots/0/price").await;
    assert_eq!(price["price"], "500000000000000");

    let (status, body) = app.takeover(0, BOB, 1, "500000000000000").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["price"], "500000000000000");
    assert_eq!(body["minted"], "7200000000000000000000");
    assert_eq!(body["previousMiner"], ALICE);
    assert_eq!(body["slot"]["epochId"], 2);
    assert_eq!(body["slot"]["initPrice"], MIN_INIT_PRICE);

    assert_eq!(
        app.node.reward.balance_of(&addr(ALICE)),
        Amount::from_whole(7200)
    );
    // Alice also collected the holder share of Bob's payment.
    let alice = app.node.asset.balance_of(&addr(ALICE));
    assert!(alice > Amount::from_whole(1000));
}

#[tokio::test]
async fn test_fee_events_sum_to_price() {
    let app = setup_test_app(&[]).await;
    app.takeover(0, ALICE, 0, "0").await;

    let (status, body) = app
        .send_json(
            "POST",
            "/v1/slots/0/takeover",
            Some(token_for(BOB)),
            serde_json::json!({
                "faction": FACTION,
                "epochId": 1,
                "deadline": T0 + 60,
                "maxPrice": MIN_INIT_PRICE,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let events = body["events"].as_array().unwrap();
    let fees: Vec<(&str, u128)> = events
        .iter()
        .filter(|e| e["type"] == "fee")
        .map(|e| {
            (
                e["recipient"].as_str().unwrap(),
                e["amount"].as_str().unwrap().parse().unwrap(),
            )
        })
        .collect();
    let recipients: Vec<&str> = fees.iter().map(|(r, _)| *r).collect();
    assert_eq!(recipients, vec!["treasury", "team", "faction", "holder"]);
    let total: u128 = fees.iter().map(|(_, a)| a).sum();
    assert_eq!(total, 1_000_000_000_000_000);
    assert_eq!(fees[1].1, 20_000_000_000_000);
    assert_eq!(fees[2].1, 20_000_000_000_000);
    assert_eq!(fees[0].1, 160_000_000_000_000);
}

#[tokio::test]
async fn test_stale_epoch_conflicts() {
    let app = setup_test_app(&[]).await;
    app.takeover(0, ALICE, 0, "0").await;
    app.clock.advance(10);
    let (status, _) = app.takeover(0, BOB, 1, MIN_INIT_PRICE).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.takeover(0, ALICE, 1, MIN_INIT_PRICE).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("epoch"));

    let (_, slot) = app.get("/v1/slots/0").await;
    assert_eq!(slot["epochId"], 2);
    assert_eq!(slot["miner"], BOB);
}

#[tokio::test]
async fn test_expired_deadline_is_rejected() {
    let app = setup_test_app(&[]).await;
    let (status, body) = app
        .send_json(
            "POST",
            "/v1/slots/0/takeover",
            Some(token_for(ALICE)),
            serde_json::json!({
                "epochId": 0,
                "deadline": T0 - 1,
                "maxPrice": "0",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("deadline"));

    let (_, slot) = app.get("/v1/slots/0").await;
    assert_eq!(slot["state"], "vacant");
}

#[tokio::test]
async fn test_validation_errors() {
    let app = setup_test_app(&[]).await;

    let (status, _) = app.takeover(1, ALICE, 0, "0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send_json(
            "POST",
            "/v1/slots/0/takeover",
            Some(token_for(ALICE)),
            serde_json::json!({
                "miner": "0x1234",
                "epochId": 0,
                "deadline": T0 + 60,
                "maxPrice": "0",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.takeover(0, ALICE, 0, "-5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.takeover(0, ALICE, 0, "0").await;
    let (status, body) = app.takeover(0, BOB, 1, "1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("max price"));
}

#[tokio::test]
async fn test_insufficient_funds_is_rejected() {
    let app = setup_test_app(&[]).await;
    app.takeover(0, ALICE, 0, "0").await;
    let (status, body) = app.takeover(0, BROKE, 1, MIN_INIT_PRICE).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("insufficient balance"));
}

#[tokio::test]
async fn test_takeover_is_journaled() {
    let app = setup_test_app(&[]).await;
    app.takeover(0, ALICE, 0, "0").await;
    app.clock.advance(100);
    app.takeover(0, BOB, 1, MIN_INIT_PRICE).await;

    let (status, body) = app.get("/v1/slots/0/events?limit=100").await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"]["type"].as_str().unwrap())
        .collect();
    // Newest first: second takeover's request, takeover, mint, fees, then the first takeover.
    assert_eq!(
        kinds,
        vec![
            "multiplierRequested",
            "takeover",
            "minted",
            "fee",
            "fee",
            "fee",
            "multiplierRequested",
            "takeover",
        ]
    );

    let (_, limited) = app.get("/v1/slots/0/events?limit=2").await;
    assert_eq!(limited["events"].as_array().unwrap().len(), 2);

    let stored = app.repo.get_slot(0).await.unwrap().unwrap();
    assert_eq!(stored.epoch_id, 2);
    assert_eq!(stored.miner, addr(BOB));
    assert_eq!(app.repo.list_pending().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_refresh_fee_quote_and_payment() {
    let app = setup_test_app(&[("ENTROPY_FEE", "0.01")]).await;
    let (_, quote) = app.get("/v1/slots/0/refresh-fee").await;
    assert_eq!(quote["fee"], "10000000000000000");

    let (status, _) = app.takeover(0, ALICE, 0, "0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send_json(
            "POST",
            "/v1/slots/0/takeover",
            Some(token_for(ALICE)),
            serde_json::json!({
                "epochId": 0,
                "deadline": T0 + 60,
                "maxPrice": "0",
                "attachedFee": "20000000000000000",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(
        app.node.oracle.collected_fees(),
        Amount::new_const(10_000_000_000_000_000)
    );
}

#[tokio::test]
async fn test_payer_comes_from_account_token() {
    let app = setup_test_app(&[]).await;
    app.takeover(0, BOB, 0, "0").await;
    app.clock.advance(10);
    let alice_before = app.node.asset.balance_of(&addr(ALICE));

    let spoofed = serde_json::json!({
        "caller": ALICE,
        "miner": BOB,
        "epochId": 1,
        "deadline": T0 + 60,
        "maxPrice": MIN_INIT_PRICE,
    });
    let (status, _) = app
        .send_json("POST", "/v1/slots/0/takeover", None, spoofed.clone())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send_json(
            "POST",
            "/v1/slots/0/takeover",
            Some(token_for("0x0000000000000000000000000000000000000001")),
            spoofed.clone(),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, slot) = app.get("/v1/slots/0").await;
    assert_eq!(slot["epochId"], 1);

    // A body naming another payer is ignored; the token holder pays.
    let (status, body) = app
        .send_json(
            "POST",
            "/v1/slots/0/takeover",
            Some(token_for(BOB)),
            spoofed,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let takeover = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["type"] == "takeover")
        .unwrap();
    assert_eq!(takeover["caller"], BOB);
    assert_eq!(app.node.asset.balance_of(&addr(ALICE)), alice_before);
}
