//! Application configuration loaded from environment variables.
//!
//! Everything is resolved once at startup into typed enums; the
//! application builder matches on them to pick constructors.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use counter::TfServingConfig;
use thiserror::Error;

/// Errors raised while reading the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value outside its allowed set or format.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    /// A variable required by the selected options is not set.
    #[error("Missing required variable {0}")]
    Missing(&'static str),
}

/// Deployment environment selecting the collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Fake detector and in-memory counts.
    Dev,
    /// TF Serving detector and the configured database.
    Prod,
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(()),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Count repository backend and its connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    MongoDb { url: String, database: String },
    Postgres { url: String },
}

impl StorageConfig {
    /// Short backend name used in logs and the health endpoint.
    pub fn backend_name(&self) -> &'static str {
        match self {
            StorageConfig::Memory => "memory",
            StorageConfig::MongoDb { .. } => "mongodb",
            StorageConfig::Postgres { .. } => "postgres",
        }
    }
}

/// Object detector and its connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorConfig {
    Fake,
    TfServing {
        serving: TfServingConfig,
        label_map: Option<PathBuf>,
    },
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `MAX_UPLOAD_BYTES` — upload size limit (default: 10 MiB)
/// - `ENV` — `dev` or `prod` (default: `dev`)
///
/// In `prod`:
/// - `TFS_HOST`, `TFS_PORT`, `TFS_MODEL`, `TFS_TIMEOUT_SECS`, `LABEL_MAP_PATH`
/// - `DB_TYPE` — `mongodb` (default), `postgres` or `memory`
/// - `MONGO_URL` or `MONGO_HOST` / `MONGO_PORT`, and `MONGO_DB`
/// - `DATABASE_URL` — required for `postgres`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub max_upload_bytes: usize,
    pub environment: Environment,
    pub detector: DetectorConfig,
    pub storage: StorageConfig,
}

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = parse_or(&lookup, "ENV", Environment::Dev)?;

        let (detector, storage) = match environment {
            Environment::Dev => (DetectorConfig::Fake, StorageConfig::Memory),
            Environment::Prod => (detector_from(&lookup)?, storage_from(&lookup)?),
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Text)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            environment,
            detector,
            storage,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            environment: Environment::Dev,
            detector: DetectorConfig::Fake,
            storage: StorageConfig::Memory,
        }
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

fn detector_from<F>(lookup: &F) -> Result<DetectorConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = TfServingConfig::default();
    let serving = TfServingConfig {
        host: lookup("TFS_HOST").unwrap_or(defaults.host),
        port: parse_or(lookup, "TFS_PORT", defaults.port)?,
        model: lookup("TFS_MODEL").unwrap_or(defaults.model),
        timeout: Duration::from_secs(parse_or(
            lookup,
            "TFS_TIMEOUT_SECS",
            defaults.timeout.as_secs(),
        )?),
    };

    Ok(DetectorConfig::TfServing {
        serving,
        label_map: lookup("LABEL_MAP_PATH").map(PathBuf::from),
    })
}

fn storage_from<F>(lookup: &F) -> Result<StorageConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let db_type = lookup("DB_TYPE").unwrap_or_else(|| "mongodb".to_string());
    match db_type.to_ascii_lowercase().as_str() {
        "mongodb" => {
            let url = match lookup("MONGO_URL") {
                Some(url) => url,
                None => {
                    let host = lookup("MONGO_HOST").unwrap_or_else(|| "localhost".to_string());
                    let port: u16 = parse_or(lookup, "MONGO_PORT", 27017)?;
                    format!("mongodb://{host}:{port}")
                }
            };
            Ok(StorageConfig::MongoDb {
                url,
                database: lookup("MONGO_DB").unwrap_or_else(|| "prod_counter".to_string()),
            })
        }
        "postgres" => {
            let url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            Ok(StorageConfig::Postgres { url })
        }
        "memory" => Ok(StorageConfig::Memory),
        _ => Err(ConfigError::InvalidValue {
            var: "DB_TYPE",
            value: db_type,
        }),
    }
}
