pub mod auth;
pub mod chirps;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod state;
pub mod tokens;
pub mod webhooks;

pub use routes::router;
pub use state::{AppState, AppStateInner};
