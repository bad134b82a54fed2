use std::sync::atomic::Ordering;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{Html, IntoResponse, Response},
};

use crate::state::AppState;

/// Count every request that reaches the static file tree.
pub async fn count_hits(State(state): State<AppState>, req: Request, next: Next) -> Response {
    state.file_server_hits.fetch_add(1, Ordering::Relaxed);
    next.run(req).await
}

pub async fn healthz() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "OK")
}

pub async fn metrics(State(state): State<AppState>) -> Html<String> {
    let hits = state.file_server_hits.load(Ordering::Relaxed);
    Html(format!(
        "<html>
<body>
    <h1>Welcome, Chirpy Admin</h1>
    <p>Chirpy has been visited {} times!</p>
</body>
</html>
",
        hits
    ))
}

pub async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    state.file_server_hits.store(0, Ordering::Relaxed);
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Hits reset to 0.",
    )
}
