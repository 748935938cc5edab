//! Server configuration loaded from `transporter.toml`.
//!
//! Values missing from the file fall back to defaults. The `DATABASE_URL` and
//! `BIND_ADDR` environment variables take precedence over the file.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const CONFIG_PATH: &str = "transporter.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read transporter.toml: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse transporter.toml: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite connection URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Page size when a list request does not pass `limit`.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Hard cap on requested page sizes.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// How many movers the ranking endpoint returns.
    #[serde(default = "default_top_movers_limit")]
    pub top_movers_limit: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite:transporters.db?mode=rwc".to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    100
}

fn default_top_movers_limit() -> u32 {
    3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: default_database_url(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            top_movers_limit: default_top_movers_limit(),
        }
    }
}

impl ServerConfig {
    /// Load `transporter.toml` from the working directory, falling back to
    /// defaults if the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new(CONFIG_PATH);
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<ServerConfig>(&contents)?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.database_url = url;
            }
        }
        if let Ok(addr) = std::env::var("BIND_ADDR") {
            if !addr.is_empty() {
                config.bind_addr = addr;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.top_movers_limit, 3);
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let toml_str = r#"
            bind_addr = "127.0.0.1:8080"
            top_movers_limit = 10
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.top_movers_limit, 10);
        assert_eq!(config.default_page_size, 10);
    }
}
