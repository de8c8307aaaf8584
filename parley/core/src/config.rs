//! TOML Configuration File Support
//!
//! Configuration for the shell lives in `~/.config/parley/parley.toml`.
//!
//! # Configuration Priority
//!
//! Values are layered, highest priority first:
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables (`PARLEY_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [session]
//! mode = "text"
//! history_limit = 10
//! farewell = "Goodbye!"
//! transcript_path = "~/parley/conversation_log.json"
//!
//! [voice]
//! enabled = true
//! language = "en-US"
//! speak_replies = true
//! stt_command = "parley-listen --language {language} --timeout {timeout}"
//! tts_command = "espeak -s {rate}"
//! rate = 150
//! listen_timeout_secs = 5
//! recognition_timeout_secs = 10
//!
//! [weather]
//! enabled = true
//! location = "auto"
//! unit = "metric"
//! timeout_secs = 5
//!
//! [[responses]]
//! pattern = "good morning"
//! reply = "Good morning to you too!"
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::DEFAULT_HISTORY_LIMIT;

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

/// Tracks where the configuration came from
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
// Value Types
// =============================================================================

/// How the session reads input
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Speech recognition
    Voice,
    /// Typed console input
    #[default]
    Text,
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "voice" => Ok(Self::Voice),
            "text" => Ok(Self::Text),
            other => Err(ConfigError::ValidationError(format!(
                "unknown mode '{other}' (expected 'voice' or 'text')"
            ))),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voice => write!(f, "voice"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Temperature unit for weather reports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    /// Celsius, km/h
    #[default]
    Metric,
    /// Fahrenheit, mph
    Imperial,
}

impl FromStr for TemperatureUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(ConfigError::ValidationError(format!(
                "unknown unit '{other}' (expected 'metric' or 'imperial')"
            ))),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Input mode ("voice" or "text")
    pub mode: Option<String>,

    /// Turns retained in the conversation ledger
    pub history_limit: Option<usize>,

    /// Reply emitted after an exit phrase
    pub farewell: Option<String>,

    /// Where to save the transcript on shutdown
    pub transcript_path: Option<String>,
}

/// Voice section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceToml {
    /// Whether speech is used at all
    pub enabled: Option<bool>,

    /// Recognition and synthesis language
    pub language: Option<String>,

    /// Whether replies are spoken
    pub speak_replies: Option<bool>,

    /// Speech-to-text command line
    pub stt_command: Option<String>,

    /// Text-to-speech command line
    pub tts_command: Option<String>,

    /// Speech rate in words per minute
    pub rate: Option<u32>,

    /// How long to listen for each utterance
    pub listen_timeout_secs: Option<u64>,

    /// Extra time allowed for finishing a phrase and recognizing it
    pub recognition_timeout_secs: Option<u64>,
}

/// Weather section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherToml {
    /// Whether the weather command is registered
    pub enabled: Option<bool>,

    /// City name, "lat,lon", or "auto"
    pub location: Option<String>,

    /// "metric" or "imperial"
    pub unit: Option<String>,

    /// HTTP timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// One extra fallback pattern
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResponseToml {
    /// Substring to look for
    pub pattern: String,

    /// Reply when it's found
    pub reply: String,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyToml {
    /// Session configuration section
    pub session: SessionToml,

    /// Voice configuration section
    pub voice: VoiceToml,

    /// Weather configuration section
    pub weather: WeatherToml,

    /// Extra fallback patterns, checked after the built-in ones
    pub responses: Vec<ResponseToml>,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Session settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Input mode requested
    pub mode: RunMode,
    /// Turns retained in the conversation ledger
    pub history_limit: usize,
    /// Reply emitted after an exit phrase
    pub farewell: String,
    /// Where to save the transcript on shutdown
    pub transcript_path: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: RunMode::Text,
            history_limit: DEFAULT_HISTORY_LIMIT,
            farewell: "Goodbye!".to_string(),
            transcript_path: None,
        }
    }
}

/// Voice settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceSettings {
    /// Whether speech is used at all
    pub enabled: bool,
    /// Recognition and synthesis language
    pub language: String,
    /// Whether replies are spoken
    pub speak_replies: bool,
    /// Speech-to-text command line (`None` disables voice input)
    pub stt_command: Option<String>,
    /// Text-to-speech command line (`None` disables spoken replies)
    pub tts_command: Option<String>,
    /// Speech rate in words per minute
    pub rate: u32,
    /// Seconds to wait for speech to start
    pub listen_timeout_secs: u64,
    /// Seconds allowed past the listen window for the phrase and recognition
    pub recognition_timeout_secs: u64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en-US".to_string(),
            speak_replies: true,
            stt_command: None,
            tts_command: Some("espeak -s {rate}".to_string()),
            rate: 150,
            listen_timeout_secs: 5,
            recognition_timeout_secs: 10,
        }
    }
}

impl VoiceSettings {
    /// Listen timeout as a duration
    #[must_use]
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_secs)
    }

    /// Grace period after the listen window
    #[must_use]
    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_secs(self.recognition_timeout_secs)
    }
}

/// Weather command settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeatherSettings {
    /// Whether the weather command is registered
    pub enabled: bool,
    /// City name, "lat,lon", or "auto" for IP geolocation
    pub location: String,
    /// Units for the report
    pub unit: TemperatureUnit,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            location: "auto".to_string(),
            unit: TemperatureUnit::Metric,
            timeout_secs: 5,
        }
    }
}

impl WeatherSettings {
    /// HTTP timeout as a duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Centralized configuration for the shell
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug, Default)]
pub struct ParleyConfig {
    /// Session settings
    pub session: SessionSettings,

    /// Voice settings
    pub voice: VoiceSettings,

    /// Weather settings
    pub weather: WeatherSettings,

    /// Extra `(pattern, reply)` fallback pairs
    pub responses: Vec<(String, String)>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: Option<ConfigSource>,
}

impl ParleyConfig {
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

    /// Check values that parse but make no sense
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "session.history_limit must be at least 1".to_string(),
            ));
        }
        if self.session.farewell.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.farewell must not be empty".to_string(),
            ));
        }
        if self.voice.listen_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "voice.listen_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.weather.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "weather.timeout_secs must be at least 1".to_string(),
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
/// Returns `$XDG_CONFIG_HOME/parley/parley.toml` or
/// `~/.config/parley/parley.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("parley").join("parley.toml"))
}

/// Load configuration from the default path and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting configuration is invalid. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<ParleyConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path and the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ParleyConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<ParleyConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ParleyConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ParleyToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
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

    apply_env_config(&mut config, env)?;
    config.validate()?;

    Ok(config)
}

/// Expand a leading `~/` to the home directory
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

/// An empty string in config means "unset"
fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_flag(raw: &str) -> bool {
    raw != "0" && raw.to_lowercase() != "false"
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ParleyConfig, toml: &ParleyToml) -> Result<(), ConfigError> {
    // Session settings
    if let Some(ref mode) = toml.session.mode {
        config.session.mode = mode.parse()?;
    }
    if let Some(limit) = toml.session.history_limit {
        config.session.history_limit = limit;
    }
    if let Some(ref farewell) = toml.session.farewell {
        config.session.farewell = farewell.clone();
    }
    if let Some(ref path) = toml.session.transcript_path {
        config.session.transcript_path = non_empty(path).map(|p| expand_home(&p));
    }

    // Voice settings
    if let Some(enabled) = toml.voice.enabled {
        config.voice.enabled = enabled;
    }
    if let Some(ref language) = toml.voice.language {
        config.voice.language = language.clone();
    }
    if let Some(speak) = toml.voice.speak_replies {
        config.voice.speak_replies = speak;
    }
    if let Some(ref command) = toml.voice.stt_command {
        config.voice.stt_command = non_empty(command);
    }
    if let Some(ref command) = toml.voice.tts_command {
        config.voice.tts_command = non_empty(command);
    }
    if let Some(rate) = toml.voice.rate {
        config.voice.rate = rate;
    }
    if let Some(timeout) = toml.voice.listen_timeout_secs {
        config.voice.listen_timeout_secs = timeout;
    }
    if let Some(timeout) = toml.voice.recognition_timeout_secs {
        config.voice.recognition_timeout_secs = timeout;
    }

    // Weather settings
    if let Some(enabled) = toml.weather.enabled {
        config.weather.enabled = enabled;
    }
    if let Some(ref location) = toml.weather.location {
        config.weather.location = location.clone();
    }
    if let Some(ref unit) = toml.weather.unit {
        config.weather.unit = unit.parse()?;
    }
    if let Some(timeout) = toml.weather.timeout_secs {
        config.weather.timeout_secs = timeout;
    }

    config.responses.extend(
        toml.responses
            .iter()
            .map(|r| (r.pattern.clone(), r.reply.clone())),
    );

    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut ParleyConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(mode) = env("PARLEY_MODE") {
        config.session.mode = mode.parse()?;
        config.set_source(ConfigSource::Env);
    }
    if let Some(limit) = env("PARLEY_HISTORY_LIMIT") {
        if let Ok(n) = limit.parse::<usize>() {
            config.session.history_limit = n;
            config.set_source(ConfigSource::Env);
        }
    }
    if let Some(farewell) = env("PARLEY_FAREWELL") {
        config.session.farewell = farewell;
        config.set_source(ConfigSource::Env);
    }
    if let Some(path) = env("PARLEY_TRANSCRIPT") {
        config.session.transcript_path = non_empty(&path).map(|p| expand_home(&p));
        config.set_source(ConfigSource::Env);
    }

    if let Some(enabled) = env("PARLEY_VOICE") {
        config.voice.enabled = parse_flag(&enabled);
        config.set_source(ConfigSource::Env);
    }
    if let Some(language) = env("PARLEY_LANGUAGE") {
        config.voice.language = language;
        config.set_source(ConfigSource::Env);
    }
    if let Some(command) = env("PARLEY_STT_COMMAND") {
        config.voice.stt_command = non_empty(&command);
        config.set_source(ConfigSource::Env);
    }
    if let Some(command) = env("PARLEY_TTS_COMMAND") {
        config.voice.tts_command = non_empty(&command);
        config.set_source(ConfigSource::Env);
    }
    if let Some(timeout) = env("PARLEY_LISTEN_TIMEOUT") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.voice.listen_timeout_secs = secs;
            config.set_source(ConfigSource::Env);
        }
    }
    if let Some(timeout) = env("PARLEY_RECOGNITION_TIMEOUT") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.voice.recognition_timeout_secs = secs;
            config.set_source(ConfigSource::Env);
        }
    }

    if let Some(location) = env("PARLEY_WEATHER_LOCATION") {
        config.weather.location = location;
        config.weather.enabled = true;
        config.set_source(ConfigSource::Env);
    }

    Ok(())
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Input mode override
    pub mode: Option<RunMode>,

    /// Language override
    pub language: Option<String>,

    /// Voice enabled override
    pub voice_enabled: Option<bool>,

    /// History limit override
    pub history_limit: Option<usize>,

    /// Transcript path override
    pub transcript_path: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set input mode override
    #[must_use]
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set language override
    #[must_use]
    pub fn with_language(mut self, language: String) -> Self {
        self.language = Some(language);
        self
    }

    /// Set voice enabled override
    #[must_use]
    pub fn with_voice_enabled(mut self, enabled: bool) -> Self {
        self.voice_enabled = Some(enabled);
        self
    }

    /// Set history limit override
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Set transcript path override
    #[must_use]
    pub fn with_transcript_path(mut self, path: PathBuf) -> Self {
        self.transcript_path = Some(path);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ParleyConfig) {
        if self.mode.is_some()
            || self.language.is_some()
            || self.voice_enabled.is_some()
            || self.history_limit.is_some()
            || self.transcript_path.is_some()
        {
            config.set_source(ConfigSource::Cli);
        }

        if let Some(mode) = self.mode {
            config.session.mode = mode;
        }
        if let Some(ref language) = self.language {
            config.voice.language = language.clone();
        }
        if let Some(enabled) = self.voice_enabled {
            config.voice.enabled = enabled;
        }
        if let Some(limit) = self.history_limit {
            config.session.history_limit = limit.max(1);
        }
        if let Some(ref path) = self.transcript_path {
            config.session.transcript_path = Some(path.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
