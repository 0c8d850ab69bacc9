//! Configuration resolution for `RChat` clients.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/rchat/settings.json)
//! 3. Explicit config file
//! 4. Environment variables (highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::session::SearchWindow;

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Participant-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name embedded in every sent payload.
    pub username: String,
    pub log_level: String,
    pub log_json: bool,
    /// Generate 6-digit chat codes instead of 512-bit ones.
    pub numeric_codes: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: "anonymous".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            numeric_codes: false,
        }
    }
}

/// Delivery and decryption tuning for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds without an ack before a send is retried.
    pub retry_timeout_secs: u64,
    /// Resends before a message is abandoned.
    pub max_retries: u32,
    /// Ratchet indices searched behind the current index.
    pub search_behind: u64,
    /// Ratchet indices searched from the current index onward.
    pub search_ahead: u64,
    /// Inbound frames larger than this are rejected unparsed.
    pub max_inbound_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_timeout_secs: 2,
            max_retries: 3,
            search_behind: 5,
            search_ahead: 20,
            max_inbound_bytes: 1024 * 1024, // 1 MB
        }
    }
}

impl SessionConfig {
    pub const fn search_window(&self) -> SearchWindow {
        SearchWindow {
            behind: self.search_behind,
            ahead: self.search_ahead,
        }
    }
}

impl Config {
    /// Reject settings the session engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.client.username.trim().is_empty() {
            return Err(Error::Config("username must not be empty".into()));
        }
        if self.session.search_ahead == 0 {
            return Err(Error::Config(
                "search_ahead must be at least 1, the search window would be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution, then validate it.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    // Explicit file wins over the global one and must exist
    if let Some(path) = explicit_path {
        config = load_config_file(path)?;
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config.validate()?;
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".rchat").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/rchat/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("rchat").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Read one settings file. Missing sections and fields keep their defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply `RCHAT_*` overrides. `lookup` resolves a variable name; values that
/// fail to parse are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("RCHAT_USERNAME") {
        config.client.username = val;
    }
    if let Some(val) = lookup("RCHAT_LOG_LEVEL") {
        config.client.log_level = val;
    }
    if let Some(n) = lookup("RCHAT_RETRY_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.session.retry_timeout_secs = n;
    }
    if let Some(n) = lookup("RCHAT_MAX_RETRIES").and_then(|v| v.parse().ok()) {
        config.session.max_retries = n;
    }
    if let Some(n) = lookup("RCHAT_SEARCH_AHEAD").and_then(|v| v.parse().ok()) {
        config.session.search_ahead = n;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_match_delivery_policy() {
        let config = Config::default();
        assert_eq!(config.session.retry_timeout_secs, 2);
        assert_eq!(config.session.max_retries, 3);
        assert_eq!(config.session.search_window(), SearchWindow { behind: 5, ahead: 20 });
        assert_eq!(config.session.max_inbound_bytes, 1024 * 1024);
        assert_eq!(config.client.username, "anonymous");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"client": {{"username": "alice"}}, "session": {{"max_retries": 5}}}}"#)
            .unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.client.username, "alice");
        assert_eq!(config.client.log_level, "info");
        assert_eq!(config.session.max_retries, 5);
        assert_eq!(config.session.search_ahead, 20);
    }

    #[test]
    fn invalid_json_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_config_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("parse")));
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(load_config(Some(&missing)), Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_apply_and_skip_garbage() {
        let vars: HashMap<&str, &str> = [
            ("RCHAT_USERNAME", "bob"),
            ("RCHAT_MAX_RETRIES", "7"),
            ("RCHAT_SEARCH_AHEAD", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(ToString::to_string));
        assert_eq!(config.client.username, "bob");
        assert_eq!(config.session.max_retries, 7);
        assert_eq!(config.session.search_ahead, 20);
    }

    #[test]
    fn validate_rejects_empty_username_and_window() {
        let mut config = Config::default();
        config.client.username = "  ".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.search_ahead = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.max_retries = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn serializes_back_to_same_config() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<Config>(&json).unwrap(), config);
    }
}
