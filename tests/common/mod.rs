#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use slotmine::api::{self, AppState};
use slotmine::config::Config;
use slotmine::db::init_db;
use slotmine::orchestration::{Clock, ManualClock, Node};
use slotmine::{Repository, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const T0: u64 = 1_700_000_000;
pub const OWNER: &str = "0x00000000000000000000000000000000000000aa";
pub const TREASURY: &str = "0x00000000000000000000000000000000000000bb";
pub const TEAM: &str = "0x00000000000000000000000000000000000000cc";
pub const FACTION: &str = "0x00000000000000000000000000000000000000dd";
pub const ALICE: &str = "0x000000000000000000000000000000000000a11c";
pub const BOB: &str = "0x0000000000000000000000000000000000000b0b";
pub const BROKE: &str = "0x00000000000000000000000000000000000000ee";
pub const ADMIN_TOKEN: &str = "admin-secret";
pub const ORACLE_TOKEN: &str = "oracle-secret";

/// Bearer token of a test account; unknown accounts get a token nobody owns.
pub fn token_for(account: &str) -> &'static str {
    match account {
        ALICE => "alice-token",
        BOB => "bob-token",
        BROKE => "broke-token",
        _ => "unknown-token",
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub clock: Arc<ManualClock>,
    pub node: Node,
    pub repo: Arc<Repository>,
    _temp: TempDir,
}

pub async fn setup_test_app(extra: &[(&str, &str)]) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let mut env: HashMap<String, String> = HashMap::new();
    for (k, v) in [
        ("DATABASE_PATH", db_path.as_str()),
        ("OWNER", OWNER),
        ("TREASURY", TREASURY),
        ("TEAM", TEAM),
        ("FACTIONS", FACTION),
        ("DEPLOY_TIME", "1700000000"),
        ("FULFILLMENT_DELAY_MS", "0"),
        ("ADMIN_TOKEN", ADMIN_TOKEN),
        ("ORACLE_CALLBACK_TOKEN", ORACLE_TOKEN),
    ] {
        env.insert(k.to_string(), v.to_string());
    }
    env.insert(
        "ACCOUNT_TOKENS".to_string(),
        [ALICE, BOB, BROKE]
            .iter()
            .map(|account| format!("{}:{}", account, token_for(account)))
            .collect::<Vec<_>>()
            .join(","),
    );
    env.insert(
        "GENESIS_BALANCES".to_string(),
        format!("{}:1000,{}:1000", ALICE, BOB),
    );
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    let config = Config::from_env_map(env).unwrap();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let clock = Arc::new(ManualClock::new(Timestamp::new(T0)));
    let node = Node::build(&config, Some(repo.clone()), clock.clone()).unwrap();
    let state = AppState::new(repo.clone(), config, node.service.clone());

    TestApp {
        router: api::create_router(state),
        clock,
        node,
        repo,
        _temp: temp_dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        self.send(request).await
    }

    pub async fn takeover(
        &self,
        index: u32,
        caller: &str,
        epoch_id: u64,
        max_price: &str,
    ) -> (StatusCode, serde_json::Value) {
        let deadline = self.clock.now().as_secs() + 60;
        self.send_json(
            "POST",
            &format!("/v1/slots/{}/takeover", index),
            Some(token_for(caller)),
            serde_json::json!({
                "epochId": epoch_id,
                "deadline": deadline,
                "maxPrice": max_price,
                "uri": "ipfs://slot",
            }),
        )
        .await
    }
}
