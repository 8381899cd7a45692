//! Pipeline configuration.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults (station registry, 1994-02-01..2024-01-31, 3 retries, 5s delay)
//! 2. TOML file at `$HIDRO_CONFIG`, else `./hidropipeline.toml` if present
//! 3. Environment variables (`HIDRO_*`, plus `AZURE_CONNECTION_STRING`)
//!
//! The result is validated once and then only ever shared by reference.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::model::{Dataset, DateRange};
use crate::retry::RetryPolicy;
use crate::stations;

pub const DEFAULT_ANA_BASE_URL: &str = "http://telemetriaws1.ana.gov.br/ServiceANA.asmx";
pub const DEFAULT_CONTAINER_NAME: &str = "hidropipeline-raw";
pub const DEFAULT_CONFIG_FILE: &str = "./hidropipeline.toml";
pub const ENV_PREFIX: &str = "HIDRO_";
pub const AZURE_CONNECTION_STRING_VAR: &str = "AZURE_CONNECTION_STRING";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Levels accepted for `log_level`, matching `tracing` level names.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("start_date {start} is after end_date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("max_retries must be at least 1")]
    ZeroRetries,
    #[error("Invalid {dataset} station code: {code:?}")]
    InvalidStation { dataset: Dataset, code: String },
    #[error("The environment variable AZURE_CONNECTION_STRING is not set")]
    MissingCredential,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Immutable settings for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub flow_stations: Vec<String>,
    pub rain_stations: Vec<String>,
    pub raw_path: PathBuf,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub azure_conn_string: Option<String>,
    pub azure_container_name: String,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    /// Abort at startup when no Azure credential is configured.
    pub require_cloud: bool,
    pub ana_base_url: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flow_stations: stations::default_codes(Dataset::Flow),
            rain_stations: stations::default_codes(Dataset::Rainfall),
            raw_path: PathBuf::from("./data/raw"),
            start_date: NaiveDate::from_ymd_opt(1994, 2, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap_or_default(),
            azure_conn_string: None,
            azure_container_name: DEFAULT_CONTAINER_NAME.to_string(),
            max_retries: 3,
            retry_delay_seconds: 5,
            require_cloud: true,
            ana_base_url: DEFAULT_ANA_BASE_URL.to_string(),
            request_timeout_secs: 120,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Shape of the TOML file; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    flow_stations: Option<Vec<String>>,
    rain_stations: Option<Vec<String>>,
    raw_path: Option<PathBuf>,
    start_date: Option<String>,
    end_date: Option<String>,
    azure_conn_string: Option<String>,
    azure_container_name: Option<String>,
    max_retries: Option<u32>,
    retry_delay_seconds: Option<u64>,
    require_cloud: Option<bool>,
    ana_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load from file and process environment, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_file_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the given TOML file. Not validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults overlaid with TOML content. Not validated.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content)?;
        let mut config = Self::default();
        config.merge(file)?;
        Ok(config)
    }

    fn merge(&mut self, file: FileConfig) -> Result<(), ConfigError> {
        if let Some(v) = file.flow_stations {
            self.flow_stations = v;
        }
        if let Some(v) = file.rain_stations {
            self.rain_stations = v;
        }
        if let Some(v) = file.raw_path {
            self.raw_path = v;
        }
        if let Some(v) = file.start_date {
            self.start_date = parse_date("start_date", &v)?;
        }
        if let Some(v) = file.end_date {
            self.end_date = parse_date("end_date", &v)?;
        }
        if let Some(v) = file.azure_conn_string {
            self.azure_conn_string = non_empty(v);
        }
        if let Some(v) = file.azure_container_name {
            self.azure_container_name = v;
        }
        if let Some(v) = file.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = file.retry_delay_seconds {
            self.retry_delay_seconds = v;
        }
        if let Some(v) = file.require_cloud {
            self.require_cloud = v;
        }
        if let Some(v) = file.ana_base_url {
            self.ana_base_url = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if file.log_file.is_some() {
            self.log_file = file.log_file;
        }
        Ok(())
    }

    /// Apply `HIDRO_*` and `AZURE_CONNECTION_STRING` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = lookup(AZURE_CONNECTION_STRING_VAR) {
            self.azure_conn_string = non_empty(v);
        }
        if let Some(v) = var("FLOW_STATIONS") {
            self.flow_stations = split_list(&v);
        }
        if let Some(v) = var("RAIN_STATIONS") {
            self.rain_stations = split_list(&v);
        }
        if let Some(v) = var("RAW_PATH") {
            self.raw_path = PathBuf::from(v);
        }
        if let Some(v) = var("START_DATE") {
            self.start_date = parse_date("HIDRO_START_DATE", &v)?;
        }
        if let Some(v) = var("END_DATE") {
            self.end_date = parse_date("HIDRO_END_DATE", &v)?;
        }
        if let Some(v) = var("CONTAINER_NAME") {
            self.azure_container_name = v;
        }
        if let Some(v) = var("MAX_RETRIES") {
            self.max_retries = parse_number("HIDRO_MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("RETRY_DELAY_SECONDS") {
            self.retry_delay_seconds = parse_number("HIDRO_RETRY_DELAY_SECONDS", &v)?;
        }
        if let Some(v) = var("REQUIRE_CLOUD") {
            self.require_cloud = parse_bool("HIDRO_REQUIRE_CLOUD", &v)?;
        }
        if let Some(v) = var("ANA_BASE_URL") {
            self.ana_base_url = v;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("HIDRO_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = var("LOG_FILE") {
            self.log_file = non_empty(v).map(PathBuf::from);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.date_range()?;
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "log_level".to_string(),
                value: self.log_level.clone(),
                reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }
        let all = self
            .flow_stations
            .iter()
            .map(|c| (Dataset::Flow, c))
            .chain(self.rain_stations.iter().map(|c| (Dataset::Rainfall, c)));
        for (dataset, code) in all {
            if !stations::is_valid_station_code(code) {
                return Err(ConfigError::InvalidStation {
                    dataset,
                    code: code.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn date_range(&self) -> Result<DateRange, ConfigError> {
        DateRange::new(self.start_date, self.end_date).ok_or(ConfigError::InvalidDateRange {
            start: self.start_date,
            end: self.end_date,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_seconds))
    }

    pub fn stations(&self, dataset: Dataset) -> &[String] {
        match dataset {
            Dataset::Flow => &self.flow_stations,
            Dataset::Rainfall => &self.rain_stations,
        }
    }

    /// Enforce `require_cloud`: hybrid runs refuse to start without a credential.
    pub fn check_credentials(&self) -> Result<(), ConfigError> {
        if self.require_cloud && self.azure_conn_string.is_none() {
            return Err(ConfigError::MissingCredential);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(format!("{}CONFIG", ENV_PREFIX)) {
        return Some(PathBuf::from(path));
    }
    let default = Path::new(DEFAULT_CONFIG_FILE);
    default.exists().then(|| default.to_path_buf())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
