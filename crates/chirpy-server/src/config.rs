use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

/// JWT secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Chirpy API server.
///
/// Every option can also be set through the environment (or a `.env` file).
#[derive(Parser, Debug)]
#[command(name = "chirpy", version, about)]
pub struct Cli {
    /// Address to bind to
    #[arg(long, env = "CHIRPY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "CHIRPY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path to the JSON database file
    #[arg(long, env = "CHIRPY_DB_PATH", default_value = "database.json")]
    pub db_path: PathBuf,

    /// Directory served under /app
    #[arg(long, env = "CHIRPY_STATIC_DIR", default_value = ".")]
    pub static_dir: PathBuf,

    /// Secret used to sign access and refresh tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// API key the payment provider sends with webhooks
    #[arg(long, env = "POLKA_KEY", hide_env_values = true)]
    pub polka_key: Option<String>,

    /// Give up on a datastore operation after waiting this long for the lock
    #[arg(long, env = "CHIRPY_LOCK_TIMEOUT_MS")]
    pub lock_timeout_ms: Option<u64>,

    /// Delete the database file before starting
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        let secret = self.jwt_secret.trim();
        if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret) {
            bail!("JWT_SECRET is empty or still a placeholder; set it in your .env file");
        }
        Ok(())
    }
}
