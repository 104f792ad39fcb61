//! Configuration loader for Marianna.
//!
//! Reads `config.toml` from the data directory (`~/.marianna/` by default)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing or malformed. Environment variables override the file.

use std::path::Path;

use marianna_types::config::AppConfig;
use secrecy::SecretString;

/// Environment variable holding the generator API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable selecting the SQLite database.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`AppConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_app_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Apply environment overrides using `lookup` (normally `std::env::var`).
///
/// Only non-empty values override.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
        config.storage.database_url = Some(url);
    }
}

/// Read the generator API key from the environment, if set.
pub fn gemini_api_key(lookup: impl Fn(&str) -> Option<String>) -> Option<SecretString> {
    lookup(GEMINI_API_KEY_ENV)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

/// `std::env::var` shaped for [`apply_env_overrides`] and [`gemini_api_key`].
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
