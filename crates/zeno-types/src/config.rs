//! Server configuration types for Zeno.
//!
//! `ServerConfig` represents the `zeno.toml` file that controls the listen
//! address, storage location, provider endpoints, retry pacing and the
//! per-client request cap. All fields have defaults, so an empty file (or
//! no file) yields a runnable configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::llm::ProviderFamily;
use crate::policy::DEFAULT_MODEL_TIMEOUT_SECS;

/// Top-level configuration for the Zeno server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// sqlx connection string for the SQLite database.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Retry backoff base: attempt `n` waits `base^n` seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: f64,

    #[serde(default = "default_model_timeout_secs")]
    pub default_model_timeout_secs: u64,

    /// TCP connect timeout for provider HTTP clients.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// When set, admin routes require this key.
    #[serde(default)]
    pub admin_api_key: Option<String>,

    /// JSON routing policy file watched for changes.
    #[serde(default)]
    pub policy_file: Option<PathBuf>,

    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_database_url() -> String {
    "sqlite://zeno.db?mode=rwc".to_string()
}

fn default_backoff_base_secs() -> f64 {
    1.5
}

fn default_model_timeout_secs() -> u64 {
    DEFAULT_MODEL_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            backoff_base_secs: default_backoff_base_secs(),
            default_model_timeout_secs: default_model_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            rate_limit: RateLimitConfig::default(),
            admin_api_key: None,
            policy_file: None,
            log_json: false,
            providers: ProvidersConfig::default(),
        }
    }
}

/// Per-client sliding-window request cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Provider endpoints, one section per family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Family used for models whose policy entry names none.
    #[serde(default = "default_family")]
    pub default_family: ProviderFamily,

    #[serde(default = "default_gemini")]
    pub gemini: ProviderEndpoint,

    #[serde(default = "default_openai_compatible")]
    pub openai_compatible: ProviderEndpoint,
}

fn default_family() -> ProviderFamily {
    ProviderFamily::OpenAiCompatible
}

fn default_gemini() -> ProviderEndpoint {
    ProviderEndpoint {
        base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        api_key_env: "GOOGLE_API_KEY".to_string(),
    }
}

fn default_openai_compatible() -> ProviderEndpoint {
    ProviderEndpoint {
        base_url: "https://openrouter.ai/api/v1".to_string(),
        api_key_env: "OPENROUTER_API_KEY".to_string(),
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_family: default_family(),
            gemini: default_gemini(),
            openai_compatible: default_openai_compatible(),
        }
    }
}

/// Base URL plus the name of the environment variable holding the API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub api_key_env: String,
}
