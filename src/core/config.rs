use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RateApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RateApiConfig {
    fn default() -> Self {
        RateApiConfig {
            base_url: "https://open.er-api.com".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Currency all fetched rates are expressed against.
    pub reference: String,
    /// Decimal digits currency results are rounded to.
    pub precision: u32,
    pub freshness_hours: i64,
    pub provider: RateApiConfig,
}

impl CurrencyConfig {
    /// Age after which cached rates are refetched.
    pub fn freshness_window(&self) -> Result<chrono::Duration> {
        if self.freshness_hours < 0 {
            return Err(anyhow!(
                "currency.freshness_hours must not be negative, got {}",
                self.freshness_hours
            ));
        }
        chrono::Duration::try_hours(self.freshness_hours).ok_or_else(|| {
            anyhow!(
                "currency.freshness_hours is out of range: {}",
                self.freshness_hours
            )
        })
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        CurrencyConfig {
            reference: "USD".to_string(),
            precision: 2,
            freshness_hours: 24,
            provider: RateApiConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            enabled: true,
            limit: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub currency: CurrencyConfig,
    pub history: HistoryConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    /// Loads the default config file, or defaults when there is none yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "convbuddy", "convbuddy")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "convbuddy", "convbuddy")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
