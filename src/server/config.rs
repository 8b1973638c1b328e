/**
 * Server Configuration
 *
 * Loads server configuration from environment variables with sensible
 * local-development defaults.
 *
 * # Variables
 *
 * - `FILE_STORAGE_PATH` - mirror root directory; defaults to
 *   `collabfs-files` under the platform data directory
 * - `DATABASE_URL` - SQLite URL for the content store; defaults to an
 *   on-disk database created on first run
 * - `SERVER_PORT` - listen port, default 4000
 * - `APP_ENV` - `development` (default) or `production`; gates diagnostic
 *   detail in save-error payloads
 *
 * # Error Handling
 *
 * Malformed values fall back to their defaults with a logged warning;
 * configuration never prevents server startup.
 */

use std::path::PathBuf;

/// Deployment mode, controlling diagnostic detail in error events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_env() -> Self {
        match std::env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Self::Production,
            Ok(other) if !other.is_empty() && other != "development" && other != "dev" => {
                tracing::warn!("Unrecognized APP_ENV '{other}', assuming development");
                Self::Development
            }
            _ => Self::Development,
        }
    }
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root directory of the filesystem mirror
    pub storage_root: PathBuf,
    /// SQLite URL of the content store
    pub database_url: String,
    /// TCP port the gateway listens on
    pub port: u16,
    /// Deployment mode
    pub environment: Environment,
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn from_env() -> Self {
        let storage_root = std::env::var("FILE_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_storage_root());

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://collabfs.db?mode=rwc".to_string());

        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|raw| match raw.parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    tracing::warn!("Invalid SERVER_PORT '{raw}', using default");
                    None
                }
            })
            .unwrap_or(4000);

        Self {
            storage_root,
            database_url,
            port,
            environment: Environment::from_env(),
        }
    }

    /// Whether error payloads may include diagnostic detail
    pub fn include_error_detail(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Platform data directory fallback for the mirror root
fn default_storage_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("collabfs-files")
}
