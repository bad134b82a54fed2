use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use chirpy_db::Datastore;

use crate::ledger::{AccountDirectory, ChirpLedger};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub accounts: AccountDirectory,
    pub chirps: ChirpLedger,
    /// Shared with the payment provider. Webhooks are refused when unset.
    pub polka_key: Option<String>,
    /// Requests served from the static file tree since start or last reset.
    pub file_server_hits: AtomicU64,
}

impl AppStateInner {
    pub fn new(db: Arc<Datastore>, jwt_secret: &str, polka_key: Option<String>) -> AppState {
        Arc::new(Self {
            accounts: AccountDirectory::new(db.clone(), jwt_secret),
            chirps: ChirpLedger::new(db),
            polka_key,
            file_server_hits: AtomicU64::new(0),
        })
    }
}
