use crate::api::{authenticate_account, parse_address, parse_amount, AppState};
use crate::db::StoredEvent;
use crate::domain::{Address, Amount, Event, SequenceNumber, Slot, SlotState, Timestamp};
use crate::engine::TakeoverRequest;
use crate::error::AppError;
use crate::orchestration::SlotView;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

const DEFAULT_EVENTS_LIMIT: u32 = 50;
const MAX_EVENTS_LIMIT: u32 = 500;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDto {
    pub index: u32,
    pub state: SlotState,
    pub epoch_id: u64,
    pub init_price: Amount,
    pub start_time: Timestamp,
    pub ups: Amount,
    pub multiplier: Amount,
    pub last_multiplier_time: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner: Option<Address>,
    pub uri: String,
}

impl SlotDto {
    fn new(index: u32, slot: Slot) -> Self {
        Self {
            index,
            state: slot.state(),
            epoch_id: slot.epoch_id,
            init_price: slot.init_price,
            start_time: slot.start_time,
            ups: slot.ups,
            multiplier: slot.multiplier,
            last_multiplier_time: slot.last_multiplier_time,
            miner: slot.miner.non_zero(),
            uri: slot.uri,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotResponse {
    #[serde(flatten)]
    pub slot: SlotDto,
    pub price: Amount,
    pub refresh_fee: Amount,
}

impl From<SlotView> for SlotResponse {
    fn from(view: SlotView) -> Self {
        Self {
            slot: SlotDto::new(view.index, view.slot),
            price: view.price,
            refresh_fee: view.refresh_fee,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub index: u32,
    pub price: Amount,
    pub at: Timestamp,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshFeeResponse {
    pub index: u32,
    pub fee: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    pub index: u32,
    pub events: Vec<StoredEvent>,
}

/// Takeover body. Addresses are `0x` hex, amounts are base-unit strings.
/// The payer is the account behind the bearer token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoverBody {
    /// Defaults to the payer.
    pub miner: Option<String>,
    pub faction: Option<String>,
    pub epoch_id: u64,
    pub deadline: u64,
    pub max_price: String,
    #[serde(default)]
    pub uri: String,
    pub attached_fee: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoverResponse {
    pub price: Amount,
    pub minted: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_miner: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<SequenceNumber>,
    pub slot: SlotDto,
    pub events: Vec<Event>,
}

pub async fn get_slot(
    Path(index): Path<u32>,
    State(state): State<AppState>,
) -> Result<Json<SlotResponse>, AppError> {
    let view = state.service.slot(index)?;
    Ok(Json(view.into()))
}

pub async fn get_price(
    Path(index): Path<u32>,
    State(state): State<AppState>,
) -> Result<Json<PriceResponse>, AppError> {
    let at = state.service.now();
    let price = state.service.price(index)?;
    Ok(Json(PriceResponse { index, price, at }))
}

pub async fn get_refresh_fee(
    Path(index): Path<u32>,
    State(state): State<AppState>,
) -> Json<RefreshFeeResponse> {
    Json(RefreshFeeResponse {
        index,
        fee: state.service.refresh_fee(index),
    })
}

pub async fn get_events(
    Path(index): Path<u32>,
    Query(params): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Result<Json<EventsResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_EVENTS_LIMIT)
        .clamp(1, MAX_EVENTS_LIMIT);
    let events = state.repo.query_slot_events(index, limit).await?;
    Ok(Json(EventsResponse { index, events }))
}

pub async fn post_takeover(
    Path(index): Path<u32>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TakeoverBody>,
) -> Result<Json<TakeoverResponse>, AppError> {
    let caller = authenticate_account(&headers, &state.config.account_tokens)?;
    let miner = match body.miner.as_deref() {
        Some(raw) => parse_address("miner", raw)?,
        None => caller,
    };
    let faction = match body.faction.as_deref() {
        Some("") | None => None,
        Some(raw) => Some(parse_address("faction", raw)?),
    };
    let attached_fee = match body.attached_fee.as_deref() {
        Some(raw) => parse_amount("attachedFee", raw)?,
        None => Amount::ZERO,
    };

    let request = TakeoverRequest {
        caller,
        miner,
        faction,
        index,
        epoch_id: body.epoch_id,
        deadline: Timestamp::new(body.deadline),
        max_price: parse_amount("maxPrice", &body.max_price)?,
        uri: body.uri,
        attached_fee,
    };

    let receipt = state.service.takeover(request).await?;
    Ok(Json(TakeoverResponse {
        price: receipt.price,
        minted: receipt.minted,
        previous_miner: receipt.previous_miner,
        sequence_number: receipt.sequence_number,
        slot: SlotDto::new(receipt.slot_index, receipt.slot),
        events: receipt.events,
    }))
}
