// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading via Figment for layered merging.
//!
//! Merge order (later overrides earlier): compiled defaults, then
//! `~/.config/declarest/declarest.toml`, then `./declarest.toml`, then
//! `DECLAREST_*` environment variables.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use declarest_core::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token accepted for authed resources (None = no verifier).
    #[serde(default)]
    pub bearer_token: Option<String>,
}

/// Storage engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// Path of the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("declarest/declarest.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        StorageSection {
            database_path: default_database_path(),
        }
    }
}

/// Load configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<AppConfig, Error> {
    Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("declarest/declarest.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("declarest.toml"))
        .merge(env_provider())
        .extract()
        .map_err(|e| Error::Config(e.to_string()))
}

/// Load configuration from a TOML string only, for tests.
pub fn load_config_from_str(toml_content: &str) -> Result<AppConfig, Error> {
    Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
        .map_err(|e| Error::Config(e.to_string()))
}

/// Environment provider using explicit `map()` for section-to-dot mapping;
/// `Env::split("_")` would misparse keys that themselves contain
/// underscores (DECLAREST_SERVER_BEARER_TOKEN -> server.bearer_token).
fn env_provider() -> Env {
    Env::prefixed("DECLAREST_").map(|key| {
        let mapped = key
            .as_str()
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(config.server.bearer_token.is_none());
    }

    #[test]
    fn toml_sections_override_defaults() {
        let config = load_config_from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            bearer_token = "s3cret"

            [storage]
            database_path = "/tmp/engine.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bearer_token.as_deref(), Some("s3cret"));
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/engine.db"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_config_from_str("[server]\nhots = \"typo\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
