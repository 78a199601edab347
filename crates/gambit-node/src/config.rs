//! # Node configuration
//!
//! Environment-variable overrides on top of sensible defaults, validated
//! with [`validator`], mirroring the teacher's `GUTS_*` table with a
//! `GAMBIT_*` prefix.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `GAMBIT_BIND_ADDR` | Swarm listen address | `0.0.0.0:9000` |
//! | `GAMBIT_RENDEZVOUS_DIR` | Filesystem rendezvous directory | `./data/rendezvous` |
//! | `GAMBIT_DATA_DIR` | Game log + snapshot storage root | `./data` |
//! | `GAMBIT_LOG_LEVEL` | Log level | `info` |
//! | `GAMBIT_LOG_FORMAT` | Log format (`json`/`pretty`) | `pretty` |
//! | `GAMBIT_PRIVATE_KEY` | Ed25519 secret key (hex), generated if unset | *none* |
//! | `GAMBIT_ENGINE_BINARY` | Path to a UCI-like analyzer binary | *none* |
//!
//! An optional `--config <file>` TOML file can set any subset of the same
//! fields; [`NodeConfig::load`] layers it under the environment variables,
//! which always win.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use validator::Validate;

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable's value could not be parsed.
    #[error("failed to parse environment variable {key}: {message}")]
    EnvParse {
        /// The offending variable's name.
        key: String,
        /// A human-readable parse failure reason.
        message: String,
    },

    /// A structural validation rule was violated.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Node-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct NodeConfig {
    /// Swarm transport listen address.
    pub bind_addr: SocketAddr,

    /// Directory the filesystem rendezvous backend watches.
    pub rendezvous_dir: PathBuf,

    /// Root directory for per-game logs and snapshots.
    pub data_dir: PathBuf,

    /// Log level (`trace`/`debug`/`info`/`warn`/`error`).
    #[validate(length(min = 1))]
    pub log_level: String,

    /// Log format (`json` or `pretty`).
    #[validate(length(min = 1))]
    pub log_format: String,

    /// Hex-encoded Ed25519 secret key; a fresh identity is generated if
    /// absent.
    pub private_key: Option<String>,

    /// Path to a UCI-like analyzer binary, for the `engine` subcommand.
    pub engine_binary: Option<PathBuf>,
}

/// The subset of `NodeConfig` fields a TOML config file may set; every
/// field is optional so a file only needs to mention what it overrides.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    bind_addr: Option<String>,
    rendezvous_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    log_level: Option<String>,
    log_format: Option<String>,
    private_key: Option<String>,
    engine_binary: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().expect("valid default address"),
            rendezvous_dir: PathBuf::from("./data/rendezvous"),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            private_key: None,
            engine_binary: None,
        }
    }
}

impl NodeConfig {
    /// Builds a config from defaults overridden by any `GAMBIT_*`
    /// environment variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.merge_env()?;
        Ok(config)
    }

    /// Loads a config from an optional TOML file, then layers any
    /// `GAMBIT_*` environment variables on top. Falls back to
    /// [`NodeConfig::default`] when `path` is `None`.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.merge_env()?;
        Ok(config)
    }

    /// Reads a TOML file into a `NodeConfig`, layered on top of the
    /// built-in defaults so a file only needs to set the fields it wants
    /// to override.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to read {}: {e}", path.display())))?;

        let overrides: FileOverrides = built
            .try_deserialize()
            .map_err(|e| ConfigError::Invalid(format!("malformed config file: {e}")))?;

        let mut config = Self::default();
        if let Some(bind_addr) = overrides.bind_addr {
            config.bind_addr = bind_addr.parse().map_err(|_| {
                ConfigError::Invalid(format!("invalid bind_addr '{bind_addr}' in config file"))
            })?;
        }
        if let Some(dir) = overrides.rendezvous_dir {
            config.rendezvous_dir = dir;
        }
        if let Some(dir) = overrides.data_dir {
            config.data_dir = dir;
        }
        if let Some(level) = overrides.log_level {
            config.log_level = level;
        }
        if let Some(format) = overrides.log_format {
            config.log_format = format;
        }
        if let Some(key) = overrides.private_key {
            config.private_key = Some(key);
        }
        if let Some(path) = overrides.engine_binary {
            config.engine_binary = Some(path);
        }
        Ok(config)
    }

    /// Applies any set `GAMBIT_*` environment variables onto `self`.
    fn merge_env(&mut self) -> Result<(), ConfigError> {
        let config = self;

        if let Ok(addr) = std::env::var("GAMBIT_BIND_ADDR") {
            config.bind_addr = addr.parse().map_err(|_| ConfigError::EnvParse {
                key: "GAMBIT_BIND_ADDR".to_string(),
                message: "invalid socket address".to_string(),
            })?;
        }
        if let Ok(dir) = std::env::var("GAMBIT_RENDEZVOUS_DIR") {
            config.rendezvous_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("GAMBIT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("GAMBIT_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(format) = std::env::var("GAMBIT_LOG_FORMAT") {
            config.log_format = format;
        }
        if let Ok(key) = std::env::var("GAMBIT_PRIVATE_KEY") {
            config.private_key = Some(key);
        }
        if let Ok(path) = std::env::var("GAMBIT_ENGINE_BINARY") {
            config.engine_binary = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Validates structural rules beyond what `#[validate(...)]` can
    /// express on its own.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid log level '{}', expected one of {:?}",
                self.log_level, valid_levels
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid log format '{}', expected one of {:?}",
                self.log_format, valid_formats
            )));
        }

        if let Some(ref key) = self.private_key {
            let bytes = hex::decode(key).map_err(|_| {
                ConfigError::Invalid("private_key is not valid hex".to_string())
            })?;
            if bytes.len() != 32 {
                return Err(ConfigError::Invalid(format!(
                    "private_key must decode to 32 bytes, got {}",
                    bytes.len()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(NodeConfig::default().validate_config().is_ok());
    }

    #[test]
    fn rejects_bad_log_level() {
        let mut config = NodeConfig::default();
        config.log_level = "shouting".to_string();
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn rejects_short_private_key() {
        let mut config = NodeConfig::default();
        config.private_key = Some(hex::encode([1u8; 16]));
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn from_file_overrides_only_the_fields_it_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gambit.toml");
        std::fs::write(&path, "log_level = \"debug\"\nbind_addr = \"127.0.0.1:7000\"\n").unwrap();

        let config = NodeConfig::from_file(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:7000");
        assert_eq!(config.data_dir, NodeConfig::default().data_dir);
    }

    #[test]
    fn load_without_a_file_falls_back_to_defaults_plus_env() {
        let config = NodeConfig::load(None).unwrap();
        assert_eq!(config.bind_addr, NodeConfig::default().bind_addr);
    }
}
