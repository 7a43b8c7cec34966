//! Configuration system for the Taskboard store server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard-store/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

use crate::server::DEFAULT_MAX_FRAME_SIZE;
use crate::suggest::CompletionSettings;

/// Errors that can occur when loading store configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure for the store server.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreConfigFile {
    server: ServerFileConfig,
    suggest: SuggestFileConfig,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    data_file: Option<PathBuf>,
    max_frame_size: Option<usize>,
}

/// `[suggest]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SuggestFileConfig {
    api_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the store server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Taskboard document store and suggestion server")]
pub struct StoreCliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "TASKBOARD_STORE_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/taskboard-store/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON data file; records are kept in memory only when unset.
    #[arg(long, env = "TASKBOARD_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Maximum accepted WebSocket frame size in bytes.
    #[arg(long)]
    pub max_frame_size: Option<usize>,

    /// Chat-completion model used for suggestions.
    #[arg(long)]
    pub model: Option<String>,

    /// API key for the completion service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKBOARD_STORE_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Resolved `[suggest]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestConfig {
    /// Chat-completions endpoint.
    pub api_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// API key, if any.
    pub api_key: Option<String>,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.7,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl SuggestConfig {
    /// Settings for the completion client.
    #[must_use]
    pub fn completion_settings(&self) -> CompletionSettings {
        CompletionSettings {
            api_url: self.api_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
            api_key: self.api_key.clone(),
        }
    }
}

/// Fully resolved store server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:9100`).
    pub bind_addr: String,
    /// Data file for persistence; `None` keeps records in memory.
    pub data_file: Option<PathBuf>,
    /// Maximum accepted frame size in bytes.
    pub max_frame_size: usize,
    /// Suggestion service settings.
    pub suggest: SuggestConfig,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9100".to_string(),
            data_file: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            suggest: SuggestConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &StoreCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    fn resolve(cli: &StoreCliArgs, file: &StoreConfigFile) -> Self {
        let defaults = Self::default();
        let suggest = &file.suggest;

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            data_file: cli
                .data_file
                .clone()
                .or_else(|| file.server.data_file.clone()),
            max_frame_size: cli
                .max_frame_size
                .or(file.server.max_frame_size)
                .unwrap_or(defaults.max_frame_size),
            suggest: SuggestConfig {
                api_url: suggest
                    .api_url
                    .clone()
                    .unwrap_or(defaults.suggest.api_url),
                model: cli
                    .model
                    .clone()
                    .or_else(|| suggest.model.clone())
                    .unwrap_or(defaults.suggest.model),
                temperature: suggest
                    .temperature
                    .unwrap_or(defaults.suggest.temperature),
                timeout_secs: suggest
                    .timeout_secs
                    .unwrap_or(defaults.suggest.timeout_secs),
                api_key: cli.api_key.clone(),
            },
            log_level: cli.log_level.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the store server.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<StoreConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(StoreConfigFile::default());
        };
        config_dir.join("taskboard-store").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
