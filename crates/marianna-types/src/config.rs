//! Application configuration types for Marianna.
//!
//! `AppConfig` represents the top-level `config.toml` in the data directory.
//! All fields have sensible defaults, so an empty or missing file is valid.

use serde::{Deserialize, Serialize};

use crate::persona::PersonaPolicy;

/// Top-level configuration.
///
/// Loaded from `~/.marianna/config.toml`. Secrets (the generator API key)
/// are never read from this file; they come from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub persona: PersonaPolicy,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Persistence settings.
///
/// When `database_url` is absent the process runs on the in-memory store;
/// `DATABASE_URL` in the environment takes precedence over this field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    /// Directory name (relative to the data dir) or absolute path for uploads.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    /// Upper bound for a single uploaded media file.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            uploads_dir: default_uploads_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// External text generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound on a single generator call before falling back.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Background delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Pause between consecutive fragments of one burst.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Capacity of the pending-turn queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}
