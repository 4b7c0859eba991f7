//! Server configuration module.
//!
//! Configuration is layered, later sources winning:
//!
//! ```text
//! defaults  <  caja.toml  <  CAJA_* environment variables
//! ```
//!
//! The TOML file is read from `--config <path>`, else `CAJA_CONFIG`, else
//! `caja.toml` in the platform config directory (skipped when absent).
//!
//! | Variable                          | Field                        |
//! |-----------------------------------|------------------------------|
//! | `CAJA_BIND_ADDR`                  | `bind_addr`                  |
//! | `CAJA_PORT`                       | `port`                       |
//! | `CAJA_DB_PATH`                    | `database_path`              |
//! | `CAJA_DB_MAX_CONNECTIONS`         | `db_max_connections`         |
//! | `CAJA_REPORT_UTC_OFFSET_MINUTES`  | `report_utc_offset_minutes`  |
//! | `CAJA_DEFAULT_TAX_KIND`           | `default_tax_kind`           |

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{FixedOffset, Local};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "caja.toml";
const DATABASE_FILE_NAME: &str = "caja.db";

/// Largest offset from UTC any time zone uses.
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on
    pub bind_addr: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// Offset used to cut report days; `None` uses the host's offset at start-up
    pub report_utc_offset_minutes: Option<i32>,

    /// Tax kind applied to every sale
    pub default_tax_kind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1".to_string(),
            port: 8000,
            database_path: default_database_path(),
            db_max_connections: 5,
            report_utc_offset_minutes: None,
            default_tax_kind: caja_core::DEFAULT_TAX_KIND.to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the file (if any) and the process environment.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path
            .or_else(|| env::var_os("CAJA_CONFIG").map(PathBuf::from))
            .or_else(|| default_config_path().filter(|p| p.exists()));

        let file = match path {
            Some(path) => Some(fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?),
            None => None,
        };

        Self::from_sources(file.as_deref(), |key| env::var(key).ok())
    }

    /// Builds a configuration from TOML text and an environment lookup.
    pub fn from_sources<F>(toml_text: Option<&str>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: ServerConfig = match toml_text {
            Some(text) => toml::from_str(text)?,
            None => ServerConfig::default(),
        };

        if let Some(v) = lookup("CAJA_BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(v) = lookup("CAJA_PORT") {
            config.port = parse_var("CAJA_PORT", &v)?;
        }
        if let Some(v) = lookup("CAJA_DB_PATH") {
            config.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CAJA_DB_MAX_CONNECTIONS") {
            config.db_max_connections = parse_var("CAJA_DB_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("CAJA_REPORT_UTC_OFFSET_MINUTES") {
            config.report_utc_offset_minutes = Some(parse_var("CAJA_REPORT_UTC_OFFSET_MINUTES", &v)?);
        }
        if let Some(v) = lookup("CAJA_DEFAULT_TAX_KIND") {
            config.default_tax_kind = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::Invalid(
                "db_max_connections must be non-zero".to_string(),
            ));
        }

        if let Some(minutes) = self.report_utc_offset_minutes {
            if minutes.abs() > MAX_OFFSET_MINUTES {
                return Err(ConfigError::Invalid(format!(
                    "report_utc_offset_minutes must be within ±{MAX_OFFSET_MINUTES}"
                )));
            }
        }

        caja_core::validation::validate_tax_kind(&self.default_tax_kind)
            .map_err(|e| ConfigError::Invalid(format!("default_tax_kind: {e}")))?;

        Ok(())
    }

    /// `bind_addr:port`
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Offset that cuts report days.
    pub fn report_offset(&self) -> Result<FixedOffset, ConfigError> {
        match self.report_utc_offset_minutes {
            Some(minutes) => FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
                ConfigError::InvalidValue("CAJA_REPORT_UTC_OFFSET_MINUTES".to_string())
            }),
            None => Ok(*Local::now().offset()),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("cl", "caja", "caja-pos")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
        .unwrap_or_else(|| Path::new(".").join(DATABASE_FILE_NAME))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
