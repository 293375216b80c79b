//! Runtime configuration. All knobs are externally supplied via environment
//! variables with documented defaults so deployments can rotate secrets and
//! tune thresholds without a rebuild.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Development-only signing secret used when `CLINICA_TOKEN_SECRET` is unset.
const DEV_TOKEN_SECRET: &str = "clinica-dev-secret";

#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the persisted JSON document.
    pub store_path: PathBuf,
    /// HMAC secret for session token signing.
    pub token_secret: Vec<u8>,
    /// Token lifetime from issue to expiry.
    pub token_ttl: Duration,
    /// Issuer identity embedded in every token.
    pub issuer: String,
    /// Supplies with stock strictly below this count as low-stock.
    pub low_stock_threshold: f64,
    /// Sessions idle longer than this are swept by maintenance.
    pub idle_session_threshold: Duration,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_secs(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok()).unwrap_or(default);
    Duration::from_secs(secs)
}

impl Config {
    pub fn from_env() -> Self {
        let token_secret = match std::env::var("CLINICA_TOKEN_SECRET") {
            Ok(s) if !s.is_empty() => s.into_bytes(),
            _ => {
                warn!(target: "clinica::config", "CLINICA_TOKEN_SECRET unset, using development secret");
                DEV_TOKEN_SECRET.as_bytes().to_vec()
            }
        };
        let low_stock_threshold = std::env::var("CLINICA_LOW_STOCK")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(50.0);
        Self {
            store_path: PathBuf::from(env_or("CLINICA_DB_FILE", "data/clinica.json")),
            token_secret,
            token_ttl: env_secs("CLINICA_TOKEN_TTL_SECS", 24 * 60 * 60),
            issuer: env_or("CLINICA_ISSUER", "clinica"),
            low_stock_threshold,
            idle_session_threshold: env_secs("CLINICA_SESSION_IDLE_SECS", 24 * 60 * 60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/clinica.json"),
            token_secret: DEV_TOKEN_SECRET.as_bytes().to_vec(),
            token_ttl: Duration::from_secs(24 * 60 * 60),
            issuer: "clinica".to_string(),
            low_stock_threshold: 50.0,
            idle_session_threshold: Duration::from_secs(24 * 60 * 60),
        }
    }
}
