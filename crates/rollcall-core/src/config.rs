//! Configuration management.
//!
//! Stored at `<config_dir>/rollcall/config.json`. Environment variables (and a
//! `.env` file, when present) override the file:
//!
//! - `ROLLCALL_BACKEND`: `embedded` or `remote`
//! - `ROLLCALL_DATA_DIR`: directory for the embedded store
//! - `ROLLCALL_REMOTE_URL`: base URL of the hosted service
//! - `ROLLCALL_REMOTE_KEY`: service key; falls back to the OS keychain entry
//!   written by `Config::remember_remote_key`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::KeyStore;

/// Application name used for config/data directory paths
const APP_NAME: &str = "rollcall";

const CONFIG_FILE: &str = "config.json";

pub const ENV_BACKEND: &str = "ROLLCALL_BACKEND";
pub const ENV_DATA_DIR: &str = "ROLLCALL_DATA_DIR";
pub const ENV_REMOTE_URL: &str = "ROLLCALL_REMOTE_URL";
pub const ENV_REMOTE_KEY: &str = "ROLLCALL_REMOTE_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Embedded,
    Remote,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" | "local" => Ok(BackendKind::Embedded),
            "remote" | "hosted" => Ok(BackendKind::Remote),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

/// Ministry codes with special meaning during registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinistryCodes {
    /// Every registered child is enrolled here
    pub default_program: String,
    /// Selecting this ministry triggers competition enrollment
    pub competition: String,
}

impl Default for MinistryCodes {
    fn default() -> Self {
        Self {
            default_program: "min_sunday".to_string(),
            competition: "bible-bee".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub data_dir: Option<PathBuf>,
    pub remote_url: Option<String>,
    /// Prefer the keychain; this is for throwaway environments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_api_key: Option<String>,
    pub ministry_codes: MinistryCodes,
}

impl Config {
    /// Load the config file, then apply `.env` and environment overrides
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
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

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply overrides from `lookup`, normally the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(backend) = present(ENV_BACKEND) {
            self.backend = backend
                .parse()
                .with_context(|| format!("Invalid {}", ENV_BACKEND))?;
        }
        if let Some(dir) = present(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = present(ENV_REMOTE_URL) {
            self.remote_url = Some(url);
        }
        if let Some(key) = present(ENV_REMOTE_KEY) {
            self.remote_api_key = Some(key);
        }
        Ok(())
    }

    /// Directory for the embedded store
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn remote_url(&self) -> Result<&str> {
        self.remote_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("{} is not set", ENV_REMOTE_URL))
    }

    /// Service key from config/environment, else the keychain entry for the URL
    pub fn remote_api_key(&self) -> Result<String> {
        if let Some(ref key) = self.remote_api_key {
            return Ok(key.clone());
        }
        let url = self.remote_url()?;
        KeyStore::get(url).with_context(|| format!("No service key for {} (set {})", url, ENV_REMOTE_KEY))
    }

    /// Save a service key in the keychain under the configured remote URL
    pub fn remember_remote_key(&self, api_key: &str) -> Result<()> {
        let url = self.remote_url()?;
        if api_key.trim().is_empty() {
            anyhow::bail!("Refusing to store an empty service key for {}", url);
        }
        KeyStore::store(url, api_key)?;
        debug!(url = url, "Stored service key");
        Ok(())
    }

    /// Remove the keychain entry for the configured remote URL
    pub fn forget_remote_key(&self) -> Result<()> {
        let url = self.remote_url()?;
        KeyStore::delete(url)?;
        debug!(url = url, "Removed service key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Remote".parse::<BackendKind>().unwrap(), BackendKind::Remote);
        assert_eq!("embedded".parse::<BackendKind>().unwrap(), BackendKind::Embedded);
        assert!("sqlite".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = Config {
            remote_url: Some("https://file.example.org".to_string()),
            ..Default::default()
        };
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BACKEND, "remote"),
            (ENV_REMOTE_URL, "https://env.example.org"),
            (ENV_REMOTE_KEY, "service-key"),
            (ENV_DATA_DIR, "  "),
        ]);
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend, BackendKind::Remote);
        assert_eq!(config.remote_url().unwrap(), "https://env.example.org");
        assert_eq!(config.remote_api_key().unwrap(), "service-key");
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall").join(CONFIG_FILE);
        let config = Config {
            data_dir: Some(dir.path().join("data")),
            ministry_codes: MinistryCodes {
                competition: "bee-2025".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_and_partial_file_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(missing, Config::default());

        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"backend": "remote"}"#).unwrap();
        let partial = Config::load_from(&path).unwrap();
        assert_eq!(partial.backend, BackendKind::Remote);
        assert_eq!(partial.ministry_codes.default_program, "min_sunday");
    }

    #[test]
    fn test_keychain_calls_need_a_remote_url() {
        let config = Config::default();
        let err = config.remember_remote_key("service-key").unwrap_err();
        assert!(err.to_string().contains(ENV_REMOTE_URL));
        assert!(config.forget_remote_key().is_err());

        let with_url = Config {
            remote_url: Some("https://db.example.org".to_string()),
            ..Default::default()
        };
        assert!(with_url.remember_remote_key("  ").is_err());
    }
}
