//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! identity provider endpoint and project, backend URL, where tokens are
//! stored, and the last email used to log in.
//!
//! Configuration is stored at `~/.config/fintrack/config.json`. Environment
//! variables (`FINTRACK_*`) override the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;
use crate::auth::{
    CredentialStore, FileStore, KeyringStore, MemoryStore, SessionIdentity, TokenValidator,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "fintrack";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default identity provider endpoint
const DEFAULT_IDENTITY_ENDPOINT: &str = "https://cloud.appwrite.io/v1";

/// Longest accepted refresh leeway (one day)
const MAX_REFRESH_LEEWAY_SECS: i64 = 24 * 60 * 60;

/// Where session tokens are kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    Memory,
    #[default]
    File,
    Keyring,
}

impl FromStr for TokenStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            other => Err(anyhow::anyhow!(
                "Unknown token store '{}' (expected memory, file or keyring)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub identity_endpoint: String,
    pub project_id: Option<String>,
    pub api_base_url: String,
    pub token_store: TokenStoreKind,
    /// Refresh tokens this many seconds before they expire
    pub refresh_leeway_secs: i64,
    pub last_email: Option<String>,
    /// Account id of the last login, used to find its token on logout
    pub last_account_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity_endpoint: DEFAULT_IDENTITY_ENDPOINT.to_string(),
            project_id: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_store: TokenStoreKind::default(),
            refresh_leeway_secs: 0,
            last_email: None,
            last_account_id: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .check_leeway()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `FINTRACK_*` overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(endpoint) = lookup("FINTRACK_IDENTITY_ENDPOINT") {
            self.identity_endpoint = endpoint;
        }
        if let Some(project) = lookup("FINTRACK_PROJECT_ID") {
            self.project_id = Some(project);
        }
        if let Some(url) = lookup("FINTRACK_API_URL") {
            self.api_base_url = url;
        }
        if let Some(kind) = lookup("FINTRACK_TOKEN_STORE") {
            self.token_store = kind.parse()?;
        }
        if let Some(leeway) = lookup("FINTRACK_REFRESH_LEEWAY_SECS") {
            self.refresh_leeway_secs = leeway
                .trim()
                .parse()
                .with_context(|| format!("Invalid FINTRACK_REFRESH_LEEWAY_SECS '{}'", leeway))?;
            self.check_leeway()?;
        }
        Ok(())
    }

    fn check_leeway(&self) -> Result<()> {
        if !(0..=MAX_REFRESH_LEEWAY_SECS).contains(&self.refresh_leeway_secs) {
            return Err(anyhow::anyhow!(
                "refresh_leeway_secs must be between 0 and {} (got {})",
                MAX_REFRESH_LEEWAY_SECS,
                self.refresh_leeway_secs
            ));
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn project_id(&self) -> Result<&str> {
        self.project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No identity provider project configured (set FINTRACK_PROJECT_ID)"
                )
            })
    }

    pub fn validator(&self) -> TokenValidator {
        let secs = self.refresh_leeway_secs.clamp(0, MAX_REFRESH_LEEWAY_SECS);
        TokenValidator::with_leeway(Duration::seconds(secs))
    }

    /// Identity of the last successful login, if one was recorded.
    pub fn last_identity(&self) -> Option<SessionIdentity> {
        self.last_account_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(SessionIdentity::new)
    }

    /// Build the configured token store.
    pub fn token_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match self.token_store {
            TokenStoreKind::Memory => Arc::new(MemoryStore::new()),
            TokenStoreKind::File => Arc::new(FileStore::new(self.cache_dir()?)),
            TokenStoreKind::Keyring => Arc::new(KeyringStore::new()),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.token_store, TokenStoreKind::File);
        assert!(config.project_id().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            project_id: Some("proj".to_string()),
            token_store: TokenStoreKind::Keyring,
            last_email: Some("ana@example.com".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.project_id().unwrap(), "proj");
        assert_eq!(loaded.token_store, TokenStoreKind::Keyring);
        assert_eq!(loaded.last_email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"token_store":"memory"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.token_store, TokenStoreKind::Memory);
        assert_eq!(config.identity_endpoint, DEFAULT_IDENTITY_ENDPOINT);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FINTRACK_API_URL", "https://api.example.com"),
            ("FINTRACK_PROJECT_ID", "p1"),
            ("FINTRACK_TOKEN_STORE", "Keyring"),
            ("FINTRACK_REFRESH_LEEWAY_SECS", "30"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.project_id().unwrap(), "p1");
        assert_eq!(config.token_store, TokenStoreKind::Keyring);
        assert_eq!(config.refresh_leeway_secs, 30);
    }

    #[test]
    fn test_out_of_range_leeway_is_rejected() {
        for bad in ["9999999999999999", "-5", "86401"] {
            let mut config = Config::default();
            let result = config.apply_overrides(|k| {
                (k == "FINTRACK_REFRESH_LEEWAY_SECS").then(|| bad.to_string())
            });
            assert!(result.is_err(), "{}", bad);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"refresh_leeway_secs":9999999999999999}"#).unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_validator_clamps_leeway() {
        let config = Config {
            refresh_leeway_secs: i64::MAX,
            ..Config::default()
        };
        assert_eq!(
            config.validator().leeway(),
            Duration::seconds(MAX_REFRESH_LEEWAY_SECS)
        );

        let config = Config {
            refresh_leeway_secs: -30,
            ..Config::default()
        };
        assert_eq!(config.validator().leeway(), Duration::zero());
    }

    #[test]
    fn test_last_identity() {
        let mut config = Config::default();
        assert!(config.last_identity().is_none());

        config.last_account_id = Some(String::new());
        assert!(config.last_identity().is_none());

        config.last_account_id = Some("65a1f0c2e4b7".to_string());
        assert_eq!(config.last_identity(), Some(SessionIdentity::new("65a1f0c2e4b7")));
    }

    #[test]
    fn test_bad_override_is_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|k| {
            (k == "FINTRACK_TOKEN_STORE").then(|| "cookie-jar".to_string())
        });
        assert!(result.is_err());
    }
}
