//! Owner setters. The admin token authenticates the configured owner.

use crate::api::{parse_address, parse_amount, require_bearer, AppState};
use crate::domain::Event;
use crate::engine::AdminReceipt;
use crate::error::AppError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CapacityBody {
    pub capacity: u32,
}

#[derive(Debug, Deserialize)]
pub struct TreasuryBody {
    pub treasury: String,
}

#[derive(Debug, Deserialize)]
pub struct TeamBody {
    /// Zero address disables the team share.
    pub team: String,
}

#[derive(Debug, Deserialize)]
pub struct FactionBody {
    pub faction: String,
    pub whitelisted: bool,
}

#[derive(Debug, Deserialize)]
pub struct MultipliersBody {
    /// Base units, `1000000000000000000` is 1x.
    pub multipliers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub event: Event,
}

impl From<AdminReceipt> for AdminResponse {
    fn from(receipt: AdminReceipt) -> Self {
        Self {
            event: receipt.event,
        }
    }
}

pub async fn put_capacity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CapacityBody>,
) -> Result<Json<AdminResponse>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;
    let receipt = state
        .service
        .set_capacity(state.config.owner, body.capacity)
        .await?;
    Ok(Json(receipt.into()))
}

pub async fn put_treasury(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TreasuryBody>,
) -> Result<Json<AdminResponse>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;
    let treasury = parse_address("treasury", &body.treasury)?;
    let receipt = state
        .service
        .set_treasury(state.config.owner, treasury)
        .await?;
    Ok(Json(receipt.into()))
}

pub async fn put_team(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TeamBody>,
) -> Result<Json<AdminResponse>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;
    let team = parse_address("team", &body.team)?;
    let receipt = state.service.set_team(state.config.owner, team).await?;
    Ok(Json(receipt.into()))
}

pub async fn put_faction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FactionBody>,
) -> Result<Json<AdminResponse>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;
    let faction = parse_address("faction", &body.faction)?;
    let receipt = state
        .service
        .set_faction(state.config.owner, faction, body.whitelisted)
        .await?;
    Ok(Json(receipt.into()))
}

pub async fn put_multipliers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MultipliersBody>,
) -> Result<Json<AdminResponse>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;
    let multipliers = body
        .multipliers
        .iter()
        .map(|raw| parse_amount("multipliers", raw))
        .collect::<Result<Vec<_>, _>>()?;
    let receipt = state
        .service
        .set_multipliers(state.config.owner, multipliers)
        .await?;
    Ok(Json(receipt.into()))
}
