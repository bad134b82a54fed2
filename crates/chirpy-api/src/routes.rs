use std::path::Path;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, chirps, metrics, webhooks};

/// Build the full HTTP surface. Static files under `static_dir` are served
/// at `/app` and counted for the admin metrics page.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    let file_routes = Router::new()
        .nest_service("/app", ServeDir::new(static_dir))
        .layer(middleware::from_fn_with_state(state.clone(), metrics::count_hits));

    let public_routes = Router::new()
        .route("/api/healthz", get(metrics::healthz))
        .route("/api/reset", get(metrics::reset))
        .route("/admin/metrics", get(metrics::metrics))
        .route("/api/users", post(auth::create_user))
        .route("/api/login", post(auth::login))
        .route("/api/refresh", post(auth::refresh))
        .route("/api/revoke", post(auth::revoke))
        .route("/api/chirps", get(chirps::list_chirps))
        .route("/api/chirps/{chirp_id}", get(chirps::get_chirp))
        .route("/api/polka/webhooks", post(webhooks::polka_webhook))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/users", put(auth::update_user))
        .route("/api/chirps", post(chirps::create_chirp))
        .route("/api/chirps/{chirp_id}", delete(chirps::delete_chirp))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(file_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
