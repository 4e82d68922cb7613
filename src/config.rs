use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::models::parse_currency_code;

const DEFAULT_DATABASE_FILE: &str = "nestegg.sqlite3";

/// Default base currency for every stored total.
fn default_base_currency() -> String {
    "CNY".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Display/output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Number of minor-unit digits in the base currency.
    pub currency_decimals: u32,

    /// When true, render amounts with thousands separators.
    pub currency_grouping: bool,

    /// Optional currency symbol (e.g. "¥"). Without one the code is appended.
    pub currency_symbol: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_decimals: 2,
            currency_grouping: true,
            currency_symbol: None,
        }
    }
}

/// Default rate freshness window (6 hours).
fn default_rate_ttl() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_api_url() -> String {
    "https://api.frankfurter.app".to_string()
}

/// Exchange rate refresh configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// How old stored rates can be before an upstream refresh is attempted.
    #[serde(
        default = "default_rate_ttl",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub ttl: Duration,

    /// Base URL of the Frankfurter-compatible rate API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub request_timeout: Duration,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            ttl: default_rate_ttl(),
            api_url: default_api_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Trend history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendsConfig {
    /// Below this many stored snapshots a scope is backfilled.
    pub sparsity_threshold: u64,

    /// Days of history the seeder generates, today included.
    pub seed_window_days: u32,

    /// Below this many points a virtual series is returned instead.
    pub min_points: usize,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            sparsity_threshold: 10,
            seed_window_days: 90,
            min_points: 5,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database. If relative, resolved from the config
    /// file location. Defaults to `nestegg.sqlite3` next to the config file.
    pub database: Option<PathBuf>,

    /// Currency every total is stored in (e.g., "CNY").
    #[serde(default = "default_base_currency")]
    pub base_currency: String,

    /// IANA time zone used to decide which calendar day "today" is.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Currencies to keep rates for even when no account holds them.
    pub currencies: Vec<String>,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub rates: RatesConfig,

    #[serde(default)]
    pub trends: TrendsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            base_currency: default_base_currency(),
            timezone: default_timezone(),
            currencies: Vec::new(),
            display: DisplayConfig::default(),
            rates: RatesConfig::default(),
            trends: TrendsConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the database path against `config_dir`.
    pub fn resolve_database(&self, config_dir: &Path) -> PathBuf {
        match &self.database {
            Some(db) if db.is_absolute() => db.clone(),
            Some(db) => config_dir.join(db),
            None => config_dir.join(DEFAULT_DATABASE_FILE),
        }
    }
}

/// Loaded configuration with resolved paths and validated values.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub database_path: PathBuf,
    pub base_currency: String,
    pub timezone: Tz,
    /// Extra currencies, normalized, without the base currency.
    pub currencies: Vec<String>,
    pub display: DisplayConfig,
    pub rates: RatesConfig,
    pub trends: TrendsConfig,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./nestegg.toml` if it exists in current directory
/// 2. `~/.local/share/nestegg/nestegg.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("nestegg.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("nestegg").join("nestegg.toml");
    }

    local_config
}

impl ResolvedConfig {
    fn from_config(config: Config, config_dir: &Path) -> Result<Self> {
        let base_currency = parse_currency_code(&config.base_currency)
            .with_context(|| format!("Invalid base_currency {:?}", config.base_currency))?;
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid timezone {:?}: {e}", config.timezone))?;

        let mut currencies = Vec::with_capacity(config.currencies.len());
        for code in &config.currencies {
            let code = parse_currency_code(code)
                .with_context(|| format!("Invalid entry in currencies: {code:?}"))?;
            if code != base_currency && !currencies.contains(&code) {
                currencies.push(code);
            }
        }
        currencies.sort();

        Ok(Self {
            database_path: config.resolve_database(config_dir),
            base_currency,
            timezone,
            currencies,
            display: config.display,
            rates: config.rates,
            trends: config.trends,
        })
    }

    /// Load and resolve config from a file path.
    ///
    /// The database path is resolved relative to the config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;
        Self::from_config(config, config_dir)
    }

    /// Load config, falling back to defaults if the file doesn't exist.
    ///
    /// Without a file the database lives in the config file's intended
    /// parent directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };
        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Self::from_config(Config::default(), config_dir)
    }
}
