pub mod admin;
pub mod health;
pub mod oracle;
pub mod protocol;
pub mod slots;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Address, Amount};
use crate::error::AppError;
use crate::orchestration::SlotService;
use axum::http::{header, HeaderMap};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub service: Arc<SlotService>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, service: Arc<SlotService>) -> Self {
        Self {
            repo,
            config,
            service,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/slots/:index", get(slots::get_slot))
        .route("/v1/slots/:index/price", get(slots::get_price))
        .route("/v1/slots/:index/refresh-fee", get(slots::get_refresh_fee))
        .route("/v1/slots/:index/events", get(slots::get_events))
        .route("/v1/slots/:index/takeover", post(slots::post_takeover))
        .route("/v1/ups", get(protocol::get_ups))
        .route("/v1/multipliers", get(protocol::get_multipliers))
        .route("/v1/config", get(protocol::get_config))
        .route("/v1/oracle/callback", post(oracle::post_callback))
        .route("/v1/admin/capacity", put(admin::put_capacity))
        .route("/v1/admin/treasury", put(admin::put_treasury))
        .route("/v1/admin/team", put(admin::put_team))
        .route("/v1/admin/factions", put(admin::put_faction))
        .route("/v1/admin/multipliers", put(admin::put_multipliers))
        .layer(cors)
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Check `Authorization: Bearer <expected>`.
pub(crate) fn require_bearer(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let token = bearer_token(headers)?;
    if !constant_time_eq(token, expected) {
        return Err(AppError::Forbidden("invalid token".into()));
    }
    Ok(())
}

/// Resolve the paying account from its bearer token.
///
/// Every configured token is compared, so the time taken does not depend on
/// which one matched.
pub(crate) fn authenticate_account(
    headers: &HeaderMap,
    accounts: &[(Address, String)],
) -> Result<Address, AppError> {
    let token = bearer_token(headers)?;
    let mut matched = None;
    for (account, expected) in accounts {
        if constant_time_eq(token, expected) {
            matched = Some(*account);
        }
    }
    matched.ok_or_else(|| AppError::Forbidden("unknown account token".into()))
}

pub(crate) fn parse_address(field: &str, raw: &str) -> Result<Address, AppError> {
    raw.parse::<Address>()
        .map_err(|e| AppError::BadRequest(format!("Invalid {}: {}", field, e)))
}

/// Amounts travel as decimal strings of base units.
pub(crate) fn parse_amount(field: &str, raw: &str) -> Result<Amount, AppError> {
    raw.parse::<Amount>()
        .map_err(|e| AppError::BadRequest(format!("Invalid {}: {}", field, e)))
}
