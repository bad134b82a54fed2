mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use chirpy_api::AppStateInner;
use chirpy_db::Datastore;

use crate::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present, before clap reads env fallbacks
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chirpy_server=debug,chirpy_api=debug,chirpy_db=debug,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    cli.validate()?;

    if cli.debug {
        warn!("Debug mode: starting from an empty database");
        Datastore::reset(&cli.db_path)?;
    }

    let mut db = Datastore::open(&cli.db_path)?;
    if let Some(ms) = cli.lock_timeout_ms {
        db = db.with_lock_timeout(Duration::from_millis(ms));
    }

    if cli.polka_key.is_none() {
        warn!("POLKA_KEY is unset; payment webhooks will be rejected");
    }

    let state = AppStateInner::new(Arc::new(db), &cli.jwt_secret, cli.polka_key.clone());
    let app = chirpy_api::router(state, &cli.static_dir);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Chirpy server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
