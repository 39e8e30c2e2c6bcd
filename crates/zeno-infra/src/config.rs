//! Server configuration loader.
//!
//! Reads `zeno.toml` (or an explicit path) into [`ServerConfig`] and
//! applies environment overrides (`DATABASE_URL`, `ZENO_HOST`, `ZENO_PORT`).
//! A missing file means defaults.

use std::path::Path;

use zeno_types::config::ServerConfig;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "zeno.toml";

/// Errors reading an existing configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Read configuration from `path`.
///
/// A missing file yields the defaults. An unreadable or unparsable file is
/// an error; callers log it and fall back to [`ServerConfig::default`].
pub async fn read_server_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(ServerConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                reason: err.to_string(),
            });
        }
    };

    toml::from_str::<ServerConfig>(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(config: &mut ServerConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
        config.database_url = url;
    }
    if let Some(host) = lookup("ZENO_HOST").filter(|v| !v.is_empty()) {
        config.host = host;
    }
    if let Some(port) = lookup("ZENO_PORT") {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(err) => tracing::warn!("Ignoring ZENO_PORT={port}: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_server_config(&tmp.path().join(DEFAULT_CONFIG_FILE))
            .await
            .unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.database_url, "sqlite://zeno.db?mode=rwc");
    }

    #[tokio::test]
    async fn valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        tokio::fs::write(
            &path,
            r#"
port = 9001
admin_api_key = "letmein"

[rate_limit]
max_requests = 3
window_secs = 10
"#,
        )
        .await
        .unwrap();

        let config = read_server_config(&path).await.unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.admin_api_key.as_deref(), Some("letmein"));
        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.rate_limit.window_secs, 10);
    }

    #[tokio::test]
    async fn invalid_toml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        tokio::fs::write(&path, "port = \"not a number").await.unwrap();

        let err = read_server_config(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ServerConfig::default();
        apply_env_overrides(&mut config, |name| match name {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            "ZENO_HOST" => Some("127.0.0.1".to_string()),
            "ZENO_PORT" => Some("8123".to_string()),
            _ => None,
        });
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8123);
    }

    #[test]
    fn bad_port_override_is_ignored() {
        let mut config = ServerConfig::default();
        apply_env_overrides(&mut config, |name| {
            (name == "ZENO_PORT").then(|| "eighty".to_string())
        });
        assert_eq!(config.port, 8000);
    }
}
