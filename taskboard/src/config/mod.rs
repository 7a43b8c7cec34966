//! Configuration system for the Taskboard client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use taskboard_proto::sync::SortOrder;

use crate::identity::Identity;
use crate::store::remote::RemoteStoreConfig;

/// Errors that can occur when loading configuration.
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

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    user: Option<String>,
    store: StoreFileConfig,
    suggest: SuggestFileConfig,
    board: BoardFileConfig,
}

/// `[store]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    url: Option<String>,
    connect_timeout_secs: Option<u64>,
    write_timeout_secs: Option<u64>,
}

/// `[suggest]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SuggestFileConfig {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

/// `[board]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BoardFileConfig {
    sort_order: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Signed-in user id, if any.
    pub user: Option<String>,
    /// WebSocket URL of the store.
    pub store_url: String,
    /// Timeout for connecting and authenticating, in seconds.
    pub connect_timeout_secs: u64,
    /// Timeout for a single write, in seconds.
    pub write_timeout_secs: u64,
    /// URL of the suggestion endpoint.
    pub suggest_url: String,
    /// Timeout for a suggestion request, in seconds.
    pub suggest_timeout_secs: u64,
    /// Creation-time ordering of tasks.
    pub sort_order: SortOrder,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user: None,
            store_url: "ws://127.0.0.1:9100/ws".to_string(),
            connect_timeout_secs: 10,
            write_timeout_secs: 10,
            suggest_url: "http://127.0.0.1:9100/api/task-suggest".to_string(),
            suggest_timeout_secs: 30,
            sort_order: SortOrder::Ascending,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Merge CLI args (which already include env vars via clap) with
    /// file config and defaults.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        let file_sort = file.board.sort_order.as_deref().and_then(|s| {
            s.parse::<SortOrder>()
                .map_err(|e| tracing::warn!(err = %e, "ignoring [board] sort_order"))
                .ok()
        });

        Self {
            user: cli.user.clone().or_else(|| file.user.clone()),
            store_url: cli
                .store_url
                .clone()
                .or_else(|| file.store.url.clone())
                .unwrap_or(defaults.store_url),
            connect_timeout_secs: file
                .store
                .connect_timeout_secs
                .unwrap_or(defaults.connect_timeout_secs),
            write_timeout_secs: file
                .store
                .write_timeout_secs
                .unwrap_or(defaults.write_timeout_secs),
            suggest_url: cli
                .suggest_url
                .clone()
                .or_else(|| file.suggest.url.clone())
                .unwrap_or(defaults.suggest_url),
            suggest_timeout_secs: file
                .suggest
                .timeout_secs
                .unwrap_or(defaults.suggest_timeout_secs),
            sort_order: cli.sort.or(file_sort).unwrap_or(defaults.sort_order),
        }
    }

    /// The identity this configuration signs in as.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::from(self.user.clone())
    }

    /// Connection settings for the store.
    #[must_use]
    pub fn store_config(&self) -> RemoteStoreConfig {
        RemoteStoreConfig {
            url: self.store_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
        }
    }

    /// Timeout for suggestion requests.
    #[must_use]
    pub const fn suggest_timeout(&self) -> Duration {
        Duration::from_secs(self.suggest_timeout_secs)
    }
}

/// Global CLI arguments shared by every subcommand.
#[derive(clap::Args, Debug, Default)]
pub struct CliArgs {
    /// User id to sign in as; without one the board is read-only.
    #[arg(long, global = true, env = "TASKBOARD_USER")]
    pub user: Option<String>,

    /// WebSocket URL of the store server.
    #[arg(long, global = true, env = "TASKBOARD_STORE_URL")]
    pub store_url: Option<String>,

    /// URL of the suggestion endpoint.
    #[arg(long, global = true, env = "TASKBOARD_SUGGEST_URL")]
    pub suggest_url: Option<String>,

    /// Task ordering by creation time (asc or desc).
    #[arg(long, global = true)]
    pub sort: Option<SortOrder>,

    /// Path to config file (default: `~/.config/taskboard/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info", env = "TASKBOARD_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskboard.log`).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskboard").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.store_url, "ws://127.0.0.1:9100/ws");
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.sort_order, SortOrder::Ascending);
        assert!(!config.identity().signed_in());
    }

    #[test]
    fn toml_parsing_full() {
        let toml_str = r#"
user = "alice"

[store]
url = "ws://board.example:9100/ws"
connect_timeout_secs = 3
write_timeout_secs = 4

[suggest]
url = "http://board.example:9100/api/task-suggest"
timeout_secs = 12

[board]
sort_order = "desc"
"#;
        let file: ConfigFile = toml::from_str(toml_str).unwrap();
        let config = ClientConfig::resolve(&CliArgs::default(), &file);

        assert_eq!(config.user.as_deref(), Some("alice"));
        assert_eq!(config.store_url, "ws://board.example:9100/ws");
        assert_eq!(config.store_config().connect_timeout, Duration::from_secs(3));
        assert_eq!(config.store_config().write_timeout, Duration::from_secs(4));
        assert_eq!(config.suggest_url, "http://board.example:9100/api/task-suggest");
        assert_eq!(config.suggest_timeout(), Duration::from_secs(12));
        assert_eq!(config.sort_order, SortOrder::Descending);
    }

    #[test]
    fn toml_parsing_empty() {
        let file: ConfigFile = toml::from_str("").unwrap();
        let config = ClientConfig::resolve(&CliArgs::default(), &file);
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn invalid_sort_order_falls_back_to_default() {
        let file: ConfigFile = toml::from_str("[board]\nsort_order = \"sideways\"\n").unwrap();
        let config = ClientConfig::resolve(&CliArgs::default(), &file);
        assert_eq!(config.sort_order, SortOrder::Ascending);
    }

    #[test]
    fn cli_overrides_file() {
        let toml_str = r#"
user = "alice"

[store]
url = "ws://file:9100/ws"

[board]
sort_order = "asc"
"#;
        let file: ConfigFile = toml::from_str(toml_str).unwrap();
        let cli = CliArgs {
            user: Some("bob".to_string()),
            store_url: Some("ws://cli:9100/ws".to_string()),
            sort: Some(SortOrder::Descending),
            ..Default::default()
        };
        let config = ClientConfig::resolve(&cli, &file);

        assert_eq!(config.identity().user().map(|u| u.as_str()), Some("bob"));
        assert_eq!(config.store_url, "ws://cli:9100/ws");
        assert_eq!(config.sort_order, SortOrder::Descending);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        assert!(load_config_file(None).is_ok());
    }

    #[test]
    fn explicit_missing_config_file_returns_error() {
        let result = load_config_file(Some(std::path::Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
