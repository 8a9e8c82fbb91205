//! TOML Configuration File Support
//!
//! Centralized configuration loading for the coach client, supporting a TOML
//! configuration file at `~/.config/career-coach/coach.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/career-coach/coach.toml` (typically `~/.config/career-coach/coach.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! base_url = "http://localhost:8000"
//! connect_timeout_secs = 10
//! request_timeout_secs = 120
//!
//! [chat]
//! format_preference = "markdown"
//! auto_tool_selection = true
//! max_history_turns = 0
//! error_message = "Sorry, I encountered an error while processing your request. Please try again."
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::FormatPreference;

/// Apology used when the transport fails or the server sends an empty error
pub const DEFAULT_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// Default coach API address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Coach API base URL
    pub base_url: Option<String>,

    /// Connect timeout in seconds
    pub connect_timeout_secs: Option<u64>,

    /// Whole-request timeout for non-streamed calls, in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Chat section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// `markdown`, `plain` or `code`
    pub format_preference: Option<FormatPreference>,

    /// Let the server pick tools
    pub auto_tool_selection: Option<bool>,

    /// Turns of history sent with each request (0 = all)
    pub max_history_turns: Option<usize>,

    /// Apology text for failed requests
    pub error_message: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachToml {
    /// Server configuration section
    pub server: ServerToml,

    /// Chat configuration section
    pub chat: ChatToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Where and how to reach the coach API
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout for non-streamed calls, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

/// Per-request chat preferences
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatConfig {
    /// Reply format requested from the server
    pub format_preference: FormatPreference,
    /// Let the server pick tools
    pub auto_tool_selection: bool,
    /// Turns of history sent with each request (0 = all)
    pub max_history_turns: usize,
    /// Apology text for failed requests
    pub error_message: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            format_preference: FormatPreference::default(),
            auto_tool_selection: true,
            max_history_turns: 0,
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Centralized configuration for the coach client
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug, Default)]
pub struct CoachConfig {
    /// Server settings
    pub server: ServerConfig,

    /// Chat settings
    pub chat: ChatConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: Option<ConfigSource>,
}

impl CoachConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source.unwrap_or(ConfigSource::Default)
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = Some(source);
    }

    /// Check values that would make every request fail
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.server.base_url).map_err(|e| {
            ConfigError::ValidationError(format!(
                "base_url '{}' is not a valid URL: {e}",
                self.server.base_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "base_url '{}' must be an http(s) URL with a host",
                self.server.base_url
            )));
        }
        if self.server.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/career-coach/coach.toml` or
/// `~/.config/career-coach/coach.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("career-coach").join("coach.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<CoachConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<CoachConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment values through `env`
fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<CoachConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = CoachConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: CoachToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.set_source(ConfigSource::File);

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut CoachConfig, toml: &CoachToml) {
    if let Some(ref url) = toml.server.base_url {
        config.server.base_url.clone_from(url);
    }
    if let Some(secs) = toml.server.connect_timeout_secs {
        config.server.connect_timeout_secs = secs;
    }
    if let Some(secs) = toml.server.request_timeout_secs {
        config.server.request_timeout_secs = secs;
    }

    if let Some(format) = toml.chat.format_preference {
        config.chat.format_preference = format;
    }
    if let Some(enabled) = toml.chat.auto_tool_selection {
        config.chat.auto_tool_selection = enabled;
    }
    if let Some(max) = toml.chat.max_history_turns {
        config.chat.max_history_turns = max;
    }
    if let Some(ref message) = toml.chat.error_message {
        config.chat.error_message.clone_from(message);
    }
}

/// Apply environment variable overrides
///
/// Unparseable values are logged and ignored.
fn apply_env_config<F>(config: &mut CoachConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("COACH_API_URL") {
        config.server.base_url = url;
        config.set_source(ConfigSource::Env);
    }
    if let Some(secs) = env("COACH_CONNECT_TIMEOUT_SECS") {
        match secs.parse::<u64>() {
            Ok(s) => {
                config.server.connect_timeout_secs = s;
                config.set_source(ConfigSource::Env);
            }
            Err(_) => tracing::warn!(value = %secs, "Ignoring invalid COACH_CONNECT_TIMEOUT_SECS"),
        }
    }
    if let Some(format) = env("COACH_FORMAT") {
        match format.parse::<FormatPreference>() {
            Ok(f) => {
                config.chat.format_preference = f;
                config.set_source(ConfigSource::Env);
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring invalid COACH_FORMAT"),
        }
    }
    if let Some(enabled) = env("COACH_AUTO_TOOLS") {
        match enabled.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => {
                config.chat.auto_tool_selection = true;
                config.set_source(ConfigSource::Env);
            }
            "0" | "false" | "no" | "off" => {
                config.chat.auto_tool_selection = false;
                config.set_source(ConfigSource::Env);
            }
            _ => tracing::warn!(value = %enabled, "Ignoring invalid COACH_AUTO_TOOLS"),
        }
    }
    if let Some(max) = env("COACH_MAX_HISTORY") {
        match max.parse::<usize>() {
            Ok(n) => {
                config.chat.max_history_turns = n;
                config.set_source(ConfigSource::Env);
            }
            Err(_) => tracing::warn!(value = %max, "Ignoring invalid COACH_MAX_HISTORY"),
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Format preference override
    pub format_preference: Option<FormatPreference>,

    /// Automatic tool selection override
    pub auto_tool_selection: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set format preference override
    #[must_use]
    pub fn with_format_preference(mut self, format: FormatPreference) -> Self {
        self.format_preference = Some(format);
        self
    }

    /// Set automatic tool selection override
    #[must_use]
    pub fn with_auto_tool_selection(mut self, enabled: bool) -> Self {
        self.auto_tool_selection = Some(enabled);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut CoachConfig) {
        if let Some(ref url) = self.base_url {
            config.server.base_url.clone_from(url);
            config.set_source(ConfigSource::Cli);
        }
        if let Some(format) = self.format_preference {
            config.chat.format_preference = format;
            config.set_source(ConfigSource::Cli);
        }
        if let Some(enabled) = self.auto_tool_selection {
            config.chat.auto_tool_selection = enabled;
            config.set_source(ConfigSource::Cli);
        }
    }
}
