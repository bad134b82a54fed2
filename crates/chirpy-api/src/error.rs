use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use chirpy_types::api::ErrorResponse;

use crate::ledger::LedgerError;
use crate::tokens::TokenError;

/// Errors as the HTTP layer reports them. Rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &str) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.as_str()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.as_str()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.as_str()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = self.parts();
        (status, Json(ErrorResponse { error: msg.to_string() })).into_response()
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Missing | TokenError::Malformed | TokenError::Invalid => {
                debug!("Rejected credentials: {}", e);
                ApiError::Unauthorized(e.to_string())
            }
            TokenError::Signing(_) => {
                error!("{}", e);
                ApiError::Internal
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(what) => ApiError::NotFound(format!("{} not found", capitalize(what))),
            LedgerError::AlreadyExists(what) => {
                ApiError::Conflict(format!("{} already exists", capitalize(what)))
            }
            LedgerError::Invalid(msg) => ApiError::BadRequest(msg.to_string()),
            LedgerError::Unauthorized => ApiError::Forbidden("Not allowed".into()),
            LedgerError::InvalidCredentials => ApiError::Unauthorized("Invalid credentials".into()),
            LedgerError::TooLong => ApiError::BadRequest("Chirp is too long".into()),
            LedgerError::Token(e) => e.into(),
            LedgerError::Credential(_) | LedgerError::Storage(_) => {
                error!("Request failed: {}", e);
                ApiError::Internal
            }
        }
    }
}

/// Run blocking datastore work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
