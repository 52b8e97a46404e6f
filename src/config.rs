//! Configuration loaded from environment variables.
//!
//! Values are read once at startup; a `.env` file is honored for local
//! development.

use std::env;
use std::time::Duration;

/// Default periodic sync cadence (6 hours).
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 6 * 60 * 60;
/// Default bound for a single remote upsert/delete.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
/// Endpoint that answers 204 only on a validated internet path.
pub const DEFAULT_PROBE_URL: &str = "https://clients3.google.com/generate_204";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file backing the local store
    pub db_path: String,
    /// GCP project holding the Firestore database
    pub gcp_project_id: String,
    /// Owner the background daemon syncs (signed-in account)
    pub owner_id: Option<String>,
    /// Per-call bound on remote upserts/deletes
    pub remote_timeout: Duration,
    /// Periodic sync cadence
    pub sync_interval: Duration,
    /// How often the watcher probes reachability
    pub reachability_poll: Duration,
    /// Base delay for retrying a failed pass
    pub retry_base: Duration,
    /// Connectivity validation endpoint
    pub probe_url: String,
    /// Bound on a single connectivity probe
    pub probe_timeout: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            gcp_project_id: "test-project".to_string(),
            owner_id: None,
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            reachability_poll: Duration::from_secs(60),
            retry_base: Duration::from_secs(30),
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            db_path: env::var("VITALITY_DB_PATH")
                .unwrap_or_else(|_| "vitality_vault.db".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GCP_PROJECT_ID"))?,
            owner_id: env::var("SYNC_OWNER_ID")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            remote_timeout: secs_from_env("REMOTE_TIMEOUT_SECS", DEFAULT_REMOTE_TIMEOUT_SECS),
            sync_interval: secs_from_env("SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS),
            reachability_poll: secs_from_env("REACHABILITY_POLL_SECS", 60),
            retry_base: secs_from_env("RETRY_BASE_SECS", 30),
            probe_url: env::var("PROBE_URL").unwrap_or_else(|_| DEFAULT_PROBE_URL.to_string()),
            probe_timeout: secs_from_env("PROBE_TIMEOUT_SECS", 5),
        })
    }
}

/// Read a positive number of seconds, falling back to `default` when the
/// variable is missing, unparsable or zero.
fn secs_from_env(name: &str, default: u64) -> Duration {
    let secs = env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(default);
    Duration::from_secs(secs)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
