use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Delay between sampling ticks while live.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_ideal_width")]
    pub ideal_width: u32,
    #[serde(default = "default_ideal_height")]
    pub ideal_height: u32,
    /// Initial target color, `#rrggbb`.
    #[serde(default = "default_target")]
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// `"pattern"` or `"images"`.
    #[serde(default = "default_source_mode")]
    pub mode: String,
    /// Image file or directory of images (images mode).
    #[serde(default)]
    pub path: Option<String>,
    /// Colors cycled frame by frame (pattern mode).
    #[serde(default = "default_pattern_colors")]
    pub pattern_colors: Vec<String>,
    #[serde(default = "default_ideal_width")]
    pub width: u32,
    #[serde(default = "default_ideal_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            ideal_width: default_ideal_width(),
            ideal_height: default_ideal_height(),
            target: default_target(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: default_source_mode(),
            path: None,
            pattern_colors: default_pattern_colors(),
            width: default_ideal_width(),
            height: default_ideal_height(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_tick_interval_ms() -> u64 {
    33
}
fn default_ideal_width() -> u32 {
    1280
}
fn default_ideal_height() -> u32 {
    720
}
fn default_target() -> String {
    "#ff0000".into()
}
fn default_source_mode() -> String {
    "pattern".into()
}
fn default_pattern_colors() -> Vec<String> {
    vec!["#808080".into()]
}
fn default_bind() -> String {
    "127.0.0.1:8080".into()
}
fn default_log_level() -> String {
    "info".into()
}
