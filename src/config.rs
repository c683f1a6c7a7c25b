//! Settings for the data sources and the dashboard.
//!
//! Values are read from `secrets.toml` in the working directory when it exists, falling back to
//! the environment for anything the file leaves out. Keys are the same in both places.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

pub const ENV_PORT: &str = "PORT";
pub const ENV_GBFS_BASE_URL: &str = "GBFS_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const ENV_CACHE_TTL_SECS: &str = "CACHE_TTL_SECS";
pub const ENV_CITY_TIMEZONE: &str = "CITY_TIMEZONE";
pub const ENV_MAP_CENTER_LAT: &str = "MAP_CENTER_LAT";
pub const ENV_MAP_CENTER_LON: &str = "MAP_CENTER_LON";
pub const ENV_SNOWFLAKE_ACCOUNT: &str = "SNOWFLAKE_ACCOUNT";
pub const ENV_SNOWFLAKE_TOKEN: &str = "SNOWFLAKE_TOKEN";
pub const ENV_SNOWFLAKE_TOKEN_TYPE: &str = "SNOWFLAKE_TOKEN_TYPE";
pub const ENV_SNOWFLAKE_DATABASE: &str = "SNOWFLAKE_DATABASE";
pub const ENV_SNOWFLAKE_SCHEMA: &str = "SNOWFLAKE_SCHEMA";
pub const ENV_SNOWFLAKE_WAREHOUSE: &str = "SNOWFLAKE_WAREHOUSE";
pub const ENV_SNOWFLAKE_ROLE: &str = "SNOWFLAKE_ROLE";
pub const ENV_SNOWFLAKE_BASE_URL: &str = "SNOWFLAKE_BASE_URL";

pub const DEFAULT_CONFIG_FILE_NAME: &str = "secrets.toml";
pub const DEFAULT_PORT: u16 = 8085;
pub const DEFAULT_GBFS_BASE_URL: &str = "https://gbfs.divvybikes.com/gbfs/en/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CITY_TIMEZONE: Tz = chrono_tz::America::Chicago;
pub const DEFAULT_MAP_CENTER: (f64, f64) = (41.8781, -87.6298);
pub const DEFAULT_SNOWFLAKE_TOKEN_TYPE: &str = "OAUTH";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub gbfs_base_url: String,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    /// Decides which day's partition of the gold table is "today"
    pub city_timezone: Tz,
    /// `(lat, lon)` the map centers on when there are no stations to fit
    pub map_center: (f64, f64),
    pub warehouse: Option<WarehouseConfig>,
}

/// Connection to the Snowflake SQL API. Credentials are passed through as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub account: String,
    pub token: String,
    pub token_type: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub role: Option<String>,
    /// Overrides `https://{account}.snowflakecomputing.com`, for private link hosts
    pub base_url: Option<String>,
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("account", &self.account)
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    ReadConfigFile { path: String, message: String },
    #[error("failed to parse {path}: {message}")]
    ParseConfigFile { path: String, message: String },
    #[error("{key} is required when SNOWFLAKE_ACCOUNT and SNOWFLAKE_TOKEN are set")]
    MissingWarehouseSetting { key: &'static str },
    #[error("{key} is set but empty")]
    Empty { key: &'static str },
    #[error("{key}={value} is not valid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Config {
    pub fn from_default_sources() -> Result<Config, ConfigError> {
        let config_path = Path::new(DEFAULT_CONFIG_FILE_NAME);
        if config_path.exists() {
            return Config::from_config_file(config_path);
        }
        Config::from_env()
    }

    pub fn from_config_file(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::ReadConfigFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let table: toml::Table =
            toml::from_str(&content).map_err(|err| ConfigError::ParseConfigFile {
                path: path.display().to_string(),
                message: err.to_string(),
            })?;
        if let Some((key, _)) = table.iter().find(|(_, value)| toml_value_to_string(value).is_none()) {
            return Err(ConfigError::ParseConfigFile {
                path: path.display().to_string(),
                message: format!(
                    "{} is not a plain value, settings are top level keys named like the environment variables (SNOWFLAKE_ACCOUNT = \"...\")",
                    key
                ),
            });
        }

        Config::from_env_with(|key| {
            table
                .get(key)
                .and_then(toml_value_to_string)
                .or_else(|| std::env::var(key).ok())
        })
    }

    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with<F>(mut getter: F) -> Result<Config, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let port = parsed(&mut getter, ENV_PORT)?.unwrap_or(DEFAULT_PORT);
        let gbfs_base_url = optional(&mut getter, ENV_GBFS_BASE_URL)?
            .unwrap_or_else(|| DEFAULT_GBFS_BASE_URL.to_owned());
        let request_timeout = Duration::from_secs(
            parsed(&mut getter, ENV_REQUEST_TIMEOUT_SECS)?.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        );
        let cache_ttl = Duration::from_secs(
            parsed(&mut getter, ENV_CACHE_TTL_SECS)?.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        );
        let city_timezone = match optional(&mut getter, ENV_CITY_TIMEZONE)? {
            Some(value) => value.parse::<Tz>().map_err(|reason| ConfigError::Invalid {
                key: ENV_CITY_TIMEZONE,
                value,
                reason: reason.to_string(),
            })?,
            None => DEFAULT_CITY_TIMEZONE,
        };
        let map_center = (
            parsed(&mut getter, ENV_MAP_CENTER_LAT)?.unwrap_or(DEFAULT_MAP_CENTER.0),
            parsed(&mut getter, ENV_MAP_CENTER_LON)?.unwrap_or(DEFAULT_MAP_CENTER.1),
        );
        let warehouse = WarehouseConfig::from_env_with(&mut getter)?;

        Ok(Config {
            port,
            gbfs_base_url,
            request_timeout,
            cache_ttl,
            city_timezone,
            map_center,
            warehouse,
        })
    }
}

impl WarehouseConfig {
    /// `None` unless both an account and a token are given, the other settings are then
    /// required.
    fn from_env_with<F>(getter: &mut F) -> Result<Option<WarehouseConfig>, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let account = optional(getter, ENV_SNOWFLAKE_ACCOUNT)?;
        let token = optional(getter, ENV_SNOWFLAKE_TOKEN)?;
        let (account, token) = match (account, token) {
            (Some(account), Some(token)) => (account, token),
            _ => return Ok(None),
        };
        Ok(Some(WarehouseConfig {
            account,
            token,
            token_type: optional(getter, ENV_SNOWFLAKE_TOKEN_TYPE)?
                .unwrap_or_else(|| DEFAULT_SNOWFLAKE_TOKEN_TYPE.to_owned()),
            database: required(getter, ENV_SNOWFLAKE_DATABASE)?,
            schema: required(getter, ENV_SNOWFLAKE_SCHEMA)?,
            warehouse: required(getter, ENV_SNOWFLAKE_WAREHOUSE)?,
            role: optional(getter, ENV_SNOWFLAKE_ROLE)?,
            base_url: optional(getter, ENV_SNOWFLAKE_BASE_URL)?,
        }))
    }
}

fn toml_value_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(value) => Some(value.clone()),
        toml::Value::Integer(value) => Some(value.to_string()),
        toml::Value::Float(value) => Some(value.to_string()),
        toml::Value::Boolean(value) => Some(value.to_string()),
        _ => None,
    }
}

fn optional<F>(getter: &mut F, key: &'static str) -> Result<Option<String>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    match getter(key) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty { key }),
        Some(value) => Ok(Some(value.trim().to_owned())),
        None => Ok(None),
    }
}

fn required<F>(getter: &mut F, key: &'static str) -> Result<String, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    optional(getter, key)?.ok_or(ConfigError::MissingWarehouseSetting { key })
}

fn parsed<F, T>(getter: &mut F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional(getter, key)?
        .map(|value| {
            value.parse().map_err(|err: T::Err| ConfigError::Invalid {
                key,
                reason: err.to_string(),
                value,
            })
        })
        .transpose()
}
