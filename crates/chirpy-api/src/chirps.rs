use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use chirpy_types::api::{ChirpQuery, CreateChirpRequest};

use crate::error::{ApiError, run_blocking};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn create_chirp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateChirpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let chirps = state.chirps.clone();
    let chirp = run_blocking(move || chirps.post(auth.id, &req.body)).await?;

    Ok((StatusCode::CREATED, Json(chirp)))
}

/// All chirps, ascending by id unless `sort=desc`. `author_id` narrows the
/// list to one author.
pub async fn list_chirps(
    State(state): State<AppState>,
    Query(query): Query<ChirpQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let chirps = state.chirps.clone();
    let list = run_blocking(move || chirps.list(query.author_id, query.sort)).await?;

    Ok(Json(list))
}

pub async fn get_chirp(
    State(state): State<AppState>,
    Path(chirp_id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let chirps = state.chirps.clone();
    let chirp = run_blocking(move || chirps.get(chirp_id)).await?;

    Ok(Json(chirp))
}

pub async fn delete_chirp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(chirp_id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let chirps = state.chirps.clone();
    run_blocking(move || chirps.delete(auth.id, chirp_id))
        .await
        .map_err(|e| match e {
            ApiError::Forbidden(_) => {
                ApiError::Forbidden("You can only delete your own chirps".into())
            }
            other => other,
        })?;

    Ok(StatusCode::NO_CONTENT)
}
