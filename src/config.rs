use crate::constants::{
    DEFAULT_BANNER, DEFAULT_BUFFER_SIZE, DEFAULT_CLIENT_PORT, DEFAULT_CONTROL_TIMEOUT_SECS,
    DEFAULT_DATA_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_ROOT_DIR, DEFAULT_SERVER_HOST,
    DEFAULT_SERVER_PORT,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub root_dir: String,
    pub pasv_address: Option<String>, // Address advertised in 227 replies
    pub data_timeout_secs: u64,
    pub buffer_size: usize,
    pub banner: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub control_timeout_secs: u64,
    pub data_timeout_secs: u64,
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_SERVER_HOST),
            port: DEFAULT_SERVER_PORT,
            root_dir: String::from(DEFAULT_ROOT_DIR),
            pasv_address: None,
            data_timeout_secs: DEFAULT_DATA_TIMEOUT_SECS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            banner: String::from(DEFAULT_BANNER),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_SERVER_HOST),
            port: DEFAULT_CLIENT_PORT,
            control_timeout_secs: DEFAULT_CONTROL_TIMEOUT_SECS,
            data_timeout_secs: DEFAULT_DATA_TIMEOUT_SECS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_secs)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 2200
            root_dir = "/srv/ftp"

            [client]
            idle_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 2200);
        assert_eq!(config.server.root_dir, "/srv/ftp");
        assert_eq!(config.server.host, DEFAULT_SERVER_HOST);
        assert!(config.server.pasv_address.is_none());
        assert_eq!(config.client.port, DEFAULT_CLIENT_PORT);
        assert_eq!(config.client.idle_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::load_from_file("/nonexistent/sandftp.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read configuration file"));
    }
}
