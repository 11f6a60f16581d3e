use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::{provider::ProviderId, summary::BandScheme};

/// Environment variable that overrides the configured GES DISC token.
pub const GESDISC_TOKEN_ENV: &str = "GES_DISC_BEARER_TOKEN";

/// Configuration for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Bearer token sent as `Authorization: Bearer <token>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Override for the provider's base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// How much history to fetch and how to reduce it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Years before last year to include; last year is always included.
    pub years: u16,
    /// Upper bound on concurrent per-year requests.
    pub concurrency: usize,
    pub bands: BandScheme,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            years: 40,
            concurrency: 8,
            bands: BandScheme::default(),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Example TOML:
    /// [providers.gesdisc]
    /// token = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        if cfg.history.concurrency == 0 {
            return Err(anyhow!("history.concurrency must be at least 1"));
        }
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "almanac", "almanac-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    fn provider_config_mut(&mut self, id: ProviderId) -> &mut ProviderConfig {
        self.providers.entry(id.as_str().to_string()).or_default()
    }

    /// Set or replace a provider's bearer token.
    pub fn set_provider_token(&mut self, id: ProviderId, token: String) {
        self.provider_config_mut(id).token = Some(token);
    }

    pub fn set_provider_base_url(&mut self, id: ProviderId, base_url: String) {
        self.provider_config_mut(id).base_url = Some(base_url);
    }

    /// Returns the configured token for a provider, if present and non-blank.
    pub fn provider_token(&self, id: ProviderId) -> Option<&str> {
        self.provider_config(id)
            .and_then(|cfg| cfg.token.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn provider_base_url(&self, id: ProviderId) -> Option<&str> {
        self.provider_config(id).and_then(|cfg| cfg.base_url.as_deref())
    }

    /// GES DISC token: the environment wins over the config file.
    pub fn gesdisc_token(&self) -> Option<String> {
        std::env::var(GESDISC_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.provider_token(ProviderId::GesDisc).map(str::to_owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn defaults_when_sections_missing() {
        let cfg = Config::from_toml("").expect("empty config is valid");

        assert!(cfg.providers.is_empty());
        assert_eq!(cfg.history, HistoryConfig::default());
        assert_eq!(cfg.history.years, 40);
        assert_eq!(cfg.history.bands, BandScheme::EightHour);
    }

    #[test]
    fn parses_full_config() {
        let cfg = Config::from_toml(
            r#"
            [providers.gesdisc]
            token = "SECRET"

            [providers.power]
            base_url = "http://localhost:8080/api"

            [history]
            years = 10
            concurrency = 2
            bands = "daypart"
            "#,
        )
        .expect("config must parse");

        assert_eq!(cfg.provider_token(ProviderId::GesDisc), Some("SECRET"));
        assert_eq!(cfg.provider_token(ProviderId::Power), None);
        assert_eq!(cfg.provider_base_url(ProviderId::Power), Some("http://localhost:8080/api"));
        assert_eq!(cfg.history.years, 10);
        assert_eq!(cfg.history.concurrency, 2);
        assert_eq!(cfg.history.bands, BandScheme::Daypart);
    }

    #[test]
    fn partial_history_keeps_other_defaults() {
        let cfg = Config::from_toml("[history]\nyears = 5\n").unwrap();
        assert_eq!(cfg.history.years, 5);
        assert_eq!(cfg.history.concurrency, 8);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = Config::from_toml("[history]\nconcurrency = 0\n").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn blank_token_counts_as_unset() {
        let mut cfg = Config::default();
        cfg.set_provider_token(ProviderId::GesDisc, "   ".into());
        assert_eq!(cfg.provider_token(ProviderId::GesDisc), None);

        cfg.set_provider_token(ProviderId::GesDisc, "abc".into());
        assert_eq!(cfg.provider_token(ProviderId::GesDisc), Some("abc"));
    }

    #[test]
    fn toml_roundtrip_preserves_settings() {
        let mut cfg = Config::default();
        cfg.set_provider_token(ProviderId::GesDisc, "TOKEN".into());
        cfg.history.bands = BandScheme::Daypart;

        let text = toml::to_string_pretty(&cfg).unwrap();
        let back = Config::from_toml(&text).unwrap();

        assert_eq!(back.provider_token(ProviderId::GesDisc), Some("TOKEN"));
        assert_eq!(back.history.bands, BandScheme::Daypart);
    }
}
