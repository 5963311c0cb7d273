//! Configuration loading and validation.
//!
//! Every endpoint, format string and cache name the pipeline uses lives
//! here, so tests and alternate deployments can substitute them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::fetch::HttpConfig;
use crate::storage::StorageConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Retail sales API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailConfig {
    /// Scheme and host of the API
    #[serde(default = "default_retail_base_url")]
    pub base_url: String,

    /// Path prefix of the listing endpoints
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Page limit for the page-number fetch variant
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// chrono format of `sale_date`
    #[serde(default = "default_sale_date_format")]
    pub sale_date_format: String,
}

fn default_retail_base_url() -> String {
    "https://python.zach.lol".to_string()
}

fn default_api_path() -> String {
    "/api/v1/".to_string()
}

fn default_max_pages() -> usize {
    3
}

fn default_sale_date_format() -> String {
    "%a, %d %b %Y %H:%M:%S %Z".to_string()
}

impl Default for RetailConfig {
    fn default() -> Self {
        Self {
            base_url: default_retail_base_url(),
            api_path: default_api_path(),
            max_pages: default_max_pages(),
            sale_date_format: default_sale_date_format(),
        }
    }
}

/// Energy dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// Location of the daily German power CSV
    #[serde(default = "default_energy_url")]
    pub url: String,

    /// chrono format of the `date` column
    #[serde(default = "default_energy_date_format")]
    pub date_format: String,
}

fn default_energy_url() -> String {
    "https://raw.githubusercontent.com/jenfly/opsd/master/opsd_germany_daily.csv".to_string()
}

fn default_energy_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            url: default_energy_url(),
            date_format: default_energy_date_format(),
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds; unset waits indefinitely
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

fn default_user_agent() -> String {
    format!("retail-prep/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_seconds: None,
        }
    }
}

/// Logical cache names for each dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_items")]
    pub items: String,

    #[serde(default = "default_stores")]
    pub stores: String,

    #[serde(default = "default_sales")]
    pub sales: String,

    /// Merged retail table
    #[serde(default = "default_merged")]
    pub merged: String,

    #[serde(default = "default_energy")]
    pub energy: String,

    /// Write a metadata sidecar next to each cached table
    #[serde(default)]
    pub write_metadata: bool,
}

fn default_items() -> String {
    "items".to_string()
}

fn default_stores() -> String {
    "stores".to_string()
}

fn default_sales() -> String {
    "sales".to_string()
}

fn default_merged() -> String {
    "big_df".to_string()
}

fn default_energy() -> String {
    "opsd_germany_daily".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            items: default_items(),
            stores: default_stores(),
            sales: default_sales(),
            merged: default_merged(),
            energy: default_energy(),
            write_metadata: false,
        }
    }
}

impl CacheConfig {
    /// Every dataset name, sources before the merged table.
    pub fn all(&self) -> [&str; 5] {
        [
            self.items.as_str(),
            self.stores.as_str(),
            self.sales.as_str(),
            self.merged.as_str(),
            self.energy.as_str(),
        ]
    }

    /// Names whose cached tables are built from `name`.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        if name == self.items || name == self.stores || name == self.sales {
            vec![self.merged.as_str()]
        } else {
            Vec::new()
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the cache files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub retail: RetailConfig,

    #[serde(default)]
    pub energy: EnergyConfig,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            retail: RetailConfig::default(),
            energy: EnergyConfig::default(),
            http: HttpSettings::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retail_base_url()?;
        self.energy_url()?;

        if self.retail.max_pages == 0 {
            return Err(ConfigError::ValidationError(
                "retail.max_pages must be greater than 0".to_string(),
            ));
        }

        if HeaderValue::from_str(&self.http.user_agent).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "http.user_agent {:?} is not a valid header value",
                self.http.user_agent
            )));
        }

        if self.http.timeout_seconds == Some(0) {
            return Err(ConfigError::ValidationError(
                "http.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        let names = self.cache.all();
        if names.iter().any(|n| n.is_empty()) {
            return Err(ConfigError::ValidationError(
                "cache names must not be empty".to_string(),
            ));
        }
        if names.iter().collect::<HashSet<_>>().len() != names.len() {
            return Err(ConfigError::ValidationError(
                "cache names must be distinct".to_string(),
            ));
        }

        Ok(())
    }

    pub fn retail_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.retail.base_url).map_err(|e| {
            ConfigError::ValidationError(format!(
                "retail.base_url {}: {}",
                self.retail.base_url, e
            ))
        })
    }

    pub fn energy_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.energy.url).map_err(|e| {
            ConfigError::ValidationError(format!("energy.url {}: {}", self.energy.url, e))
        })
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(self.data_dir.clone()).with_metadata(self.cache.write_metadata)
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: self.http.timeout_seconds.map(Duration::from_secs),
            user_agent: self.http.user_agent.clone(),
        }
    }
}
