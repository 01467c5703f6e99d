//! Engine configuration resolution.
//!
//! Settings are layered: the config file (or defaults), then
//! `STOCKFISH_PATH`, then a binary given on the command line. The result is
//! validated before it is handed to the engine driver.

use std::path::{Path, PathBuf};

use super::EngineConfig;

/// Environment variable naming the engine binary.
pub const ENGINE_PATH_ENV: &str = "STOCKFISH_PATH";

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".chesslab-engine.toml";

/// Where the config file comes from.
#[derive(Debug, Clone)]
enum ConfigSource {
    /// First existing file wins; none means defaults.
    Search(Vec<PathBuf>),
    /// A file the user named. It must exist.
    Explicit(PathBuf),
}

/// Resolves an [`EngineConfig`] from file, environment and command line.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    source: ConfigSource,
    env_binary: Option<String>,
    binary: Option<String>,
}

impl ConfigLoader {
    /// Search `./.chesslab-engine.toml`, then the user config directory.
    /// `STOCKFISH_PATH` is read from the environment.
    #[must_use]
    pub fn new() -> Self {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("chesslab-engine").join("config.toml"));
        }
        Self::from_source(ConfigSource::Search(paths))
    }

    /// Load `path` instead of searching. A missing file is an error.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self::from_source(ConfigSource::Explicit(path))
    }

    fn from_source(source: ConfigSource) -> Self {
        Self {
            source,
            env_binary: std::env::var(ENGINE_PATH_ENV).ok(),
            binary: None,
        }
    }

    /// Replace the value taken from `STOCKFISH_PATH`.
    #[must_use]
    pub fn env_binary(mut self, binary: Option<String>) -> Self {
        self.env_binary = binary;
        self
    }

    /// Binary chosen on the command line. Beats every other source.
    #[must_use]
    pub fn binary(mut self, binary: Option<String>) -> Self {
        self.binary = binary;
        self
    }

    /// Resolve and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if a named file cannot be read,
    /// `ConfigError::ParseError` if a file is not valid TOML for
    /// [`EngineConfig`], and `ConfigError::Invalid` if the merged settings
    /// cannot drive an engine.
    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        let config = match &self.source {
            ConfigSource::Explicit(path) => read_file(path)?,
            ConfigSource::Search(paths) => match paths.iter().find(|p| p.exists()) {
                Some(path) => read_file(path)?,
                None => {
                    tracing::debug!("No config file found, using defaults");
                    EngineConfig::default()
                }
            },
        };

        let config = config
            .with_binary_override(self.env_binary.clone())
            .with_binary_override(self.binary.clone());
        validate(&config)?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    tracing::debug!(path = %path.display(), "Loading config file");
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    let invalid = |field: &'static str, reason: &'static str| -> Result<(), ConfigError> {
        Err(ConfigError::Invalid { field, reason })
    };
    if config.binary.trim().is_empty() {
        return invalid("binary", "must name an executable");
    }
    if config.handshake_timeout_ms == 0 {
        return invalid("handshake_timeout_ms", "must be positive");
    }
    if config.read_timeout_ms == 0 {
        return invalid("read_timeout_ms", "must be positive");
    }
    if config.default_depth == 0 {
        return invalid("default_depth", "must be at least 1");
    }
    if config.default_multipv == 0 {
        return invalid("default_multipv", "must be at least 1");
    }
    Ok(())
}

/// Errors that can occur while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
