//! Configuration loading
//!
//! Connection settings live in a YAML file (`~/.sqlizer.yaml` by default).
//! Environment variables, optionally read from a .env file first, override
//! individual values.

use crate::prelude::{ConnectionParams, SqlizerError};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, trace, warn};

/// File name of the config file in the home directory
pub const CONFIG_FILE_NAME: &str = ".sqlizer.yaml";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 1433;

/// Default config file location
pub fn default_config_path() -> Result<PathBuf, SqlizerError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_FILE_NAME))
        .ok_or_else(|| SqlizerError::Config("Could not determine home directory".to_string()))
}

/// On-disk config file layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
}

/// `server:` section of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, rename = "pass", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ConfigFile {
    /// Read the config file, `None` if it does not exist
    pub fn read(path: &Path) -> Result<Option<Self>, SqlizerError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            error!(path = ?path, error = ?e, "Failed to read config file");
            SqlizerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let file = serde_yaml::from_str(&contents).map_err(|e| {
            error!(path = ?path, error = ?e, "Failed to parse config file");
            SqlizerError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        Ok(Some(file))
    }

    /// Write a new config file; an existing one is only replaced with `force`
    pub fn save_new(&self, path: &Path, force: bool) -> Result<(), SqlizerError> {
        if path.exists() && !force {
            return Err(SqlizerError::Config(format!(
                "Config file {} already exists (use --force to overwrite)",
                path.display()
            )));
        }

        let contents = serde_yaml::to_string(self)
            .map_err(|e| SqlizerError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, contents).map_err(|e| {
            SqlizerError::Config(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!(path = ?path, "Config file written");
        Ok(())
    }
}

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub params: ConnectionParams,
    /// Config file the values were read from, if any
    pub source: Option<PathBuf>,
}

impl DbConfig {
    /// Resolve configuration from a parsed config file and an environment lookup
    ///
    /// Environment variables take precedence over the file:
    /// - DB_HOST (default: localhost)
    /// - DB_PORT (default: 1433)
    /// - DB_USER (required)
    /// - DB_PASSWORD (required)
    pub fn resolve<F>(file: Option<&ConfigFile>, lookup: F) -> Result<ConnectionParams, SqlizerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = file.map(|f| f.server.clone()).unwrap_or_default();

        let host = lookup("DB_HOST").or(server.host).unwrap_or_else(|| {
            trace!("Host not configured, using default");
            DEFAULT_HOST.to_string()
        });

        let port = match lookup("DB_PORT") {
            Some(port_str) => port_str.parse::<u16>().map_err(|e| {
                error!(port = ?port_str, error = ?e, "Invalid DB_PORT value");
                SqlizerError::Config("DB_PORT must be a valid port number".to_string())
            })?,
            None => server.port.unwrap_or_else(|| {
                trace!("Port not configured, using default");
                DEFAULT_PORT
            }),
        };

        let user = lookup("DB_USER").or(server.user).ok_or_else(|| {
            error!("Database user is not configured");
            SqlizerError::Config(
                "server.user (or DB_USER) is required; run `sqlizer config init`".to_string(),
            )
        })?;

        let password = lookup("DB_PASSWORD").or(server.password).ok_or_else(|| {
            error!("Database password is not configured");
            SqlizerError::Config(
                "server.pass (or DB_PASSWORD) is required; run `sqlizer config init`".to_string(),
            )
        })?;

        debug!(host = ?host, port = ?port, user = ?user, "Configuration resolved");

        Ok(ConnectionParams {
            host,
            port,
            user,
            password,
        })
    }

    /// Load a .env file, the config file, and then apply environment overrides
    pub fn load(config_path: &Path, env_file: &Path) -> Result<Self, SqlizerError> {
        if env_file.exists() {
            debug!(path = ?env_file, "Loading environment file");
            dotenvy::from_path(env_file).map_err(|e| {
                error!(path = ?env_file, error = ?e, "Failed to load environment file");
                SqlizerError::Config(format!("Failed to load {}: {}", env_file.display(), e))
            })?;
        } else {
            trace!(path = ?env_file, "Environment file not found, using existing environment");
        }

        let file = ConfigFile::read(config_path)?;
        if file.is_none() {
            warn!(path = ?config_path, "Config file not found, using environment only");
        }

        let params = Self::resolve(file.as_ref(), |key| env::var(key).ok())?;

        Ok(Self {
            params,
            source: file.map(|_| config_path.to_path_buf()),
        })
    }

    /// Connection description with password redacted (for logs and messages)
    pub fn redacted_connection_string(&self) -> String {
        format!(
            "server=tcp:{},{};user={};password=***",
            self.params.host, self.params.port, self.params.user
        )
    }
}
