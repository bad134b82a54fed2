use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, warn};

use chirpy_types::api::PolkaWebhookRequest;

use crate::error::{ApiError, run_blocking};
use crate::state::AppState;
use crate::tokens::extract_api_key;

const USER_UPGRADED: &str = "user.upgraded";

/// Payment provider callback. Any event other than `user.upgraded` is
/// acknowledged and ignored. The API key is checked before the body is
/// looked at.
pub async fn polka_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PolkaWebhookRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let key = extract_api_key(&headers)?;
    if state.polka_key.as_deref() != Some(key) {
        warn!("Rejected webhook with unknown API key");
        return Err(ApiError::Unauthorized("Invalid API key".into()));
    }

    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if req.event != USER_UPGRADED {
        debug!("Ignoring webhook event {}", req.event);
        return Ok(StatusCode::NO_CONTENT);
    }

    let accounts = state.accounts.clone();
    run_blocking(move || accounts.upgrade(req.data.user_id)).await?;

    Ok(StatusCode::NO_CONTENT)
}
