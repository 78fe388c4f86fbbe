use crate::api::{require_bearer, AppState};
use crate::domain::SequenceNumber;
use crate::error::AppError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Delivery from a remote entropy provider.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackBody {
    pub sequence_number: SequenceNumber,
    /// 32 bytes, hex, optional `0x`.
    pub random_bytes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub sequence_number: SequenceNumber,
    pub outcome: &'static str,
}

/// Stale and unknown deliveries still answer 200 so the provider stops retrying.
pub async fn post_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CallbackBody>,
) -> Result<Json<CallbackResponse>, AppError> {
    require_bearer(&headers, &state.config.oracle_callback_token)?;

    let raw = body.random_bytes.trim_start_matches("0x");
    let random_bytes = hex::decode(raw)
        .map_err(|e| AppError::BadRequest(format!("Invalid randomBytes: {}", e)))?;
    if random_bytes.len() != 32 {
        return Err(AppError::BadRequest(format!(
            "randomBytes must be 32 bytes, got {}",
            random_bytes.len()
        )));
    }

    let receipt = state
        .service
        .fulfill(body.sequence_number, &random_bytes)
        .await;

    Ok(Json(CallbackResponse {
        sequence_number: body.sequence_number,
        outcome: receipt.outcome.name(),
    }))
}
