use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use chirpy_types::api::{CredentialsRequest, LoginResponse, RefreshResponse};

use crate::error::{ApiError, run_blocking};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::tokens::extract_bearer_token;

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.accounts.clone();
    let user = run_blocking(move || accounts.register(&req.email, &req.password)).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.accounts.clone();
    let user =
        run_blocking(move || accounts.update_profile(auth.id, &req.email, &req.password)).await?;

    Ok(Json(user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.accounts.clone();
    let session = run_blocking(move || accounts.login(&req.email, &req.password)).await?;

    Ok(Json(LoginResponse {
        user: session.user,
        token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

/// Exchange the refresh token in the Authorization header for a new access
/// token.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = extract_bearer_token(&headers)?.to_string();
    let accounts = state.accounts.clone();
    let token = run_blocking(move || accounts.refresh(&refresh_token)).await?;

    Ok(Json(RefreshResponse { token }))
}

pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = extract_bearer_token(&headers)?.to_string();
    let accounts = state.accounts.clone();
    run_blocking(move || accounts.revoke(&refresh_token)).await?;

    Ok(StatusCode::NO_CONTENT)
}
