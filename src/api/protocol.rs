//! Protocol-wide views: emission rate, multiplier table, configuration.

use crate::api::AppState;
use crate::domain::{Address, Amount, Timestamp};
use crate::engine::EmissionSchedule;
use crate::orchestration::registry_address;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsResponse {
    pub ups: Amount,
    pub halvings: u64,
    pub at: Timestamp,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipliersResponse {
    pub multipliers: Vec<Amount>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub registry: Address,
    pub owner: Address,
    pub capacity: u32,
    pub treasury: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<Address>,
    pub factions: Vec<Address>,
    pub multipliers: Vec<Amount>,
    pub emission: EmissionSchedule,
    pub total_minted: Amount,
    pub pending_requests: usize,
}

pub async fn get_ups(State(state): State<AppState>) -> Json<UpsResponse> {
    let at = state.service.now();
    let view = state.service.config();
    Json(UpsResponse {
        ups: view.schedule.global_ups(at),
        halvings: view.schedule.halvings(at),
        at,
    })
}

pub async fn get_multipliers(State(state): State<AppState>) -> Json<MultipliersResponse> {
    Json(MultipliersResponse {
        multipliers: state.service.multipliers(),
    })
}

pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let view = state.service.config();
    let config = &view.config;
    Json(ConfigResponse {
        registry: registry_address(),
        owner: config.owner(),
        capacity: config.capacity(),
        treasury: config.treasury(),
        team: config.team(),
        factions: config.factions().copied().collect(),
        multipliers: config.multipliers().to_vec(),
        emission: view.schedule,
        total_minted: view.total_minted,
        pending_requests: view.pending_requests,
    })
}
