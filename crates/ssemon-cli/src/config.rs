//! Configuration file handling for ssemon

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ssemon_client::DEFAULT_CONNECT_TIMEOUT;

use crate::output::OutputFormat;

/// Server used when neither the command line nor the config file names one
pub const DEFAULT_SERVER: &str = "http://localhost:8080";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default server URL
    pub server: Option<String>,
    /// Default output format ("text" or "json")
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Connect timeout in seconds
    pub connect_timeout_secs: Option<u64>,
    /// Extra channels to render besides message/sensor-data/end
    pub channels: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ssemon");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        server: Option<&str>,
        output: Option<OutputFormat>,
        no_color: bool,
        channels: &[String],
    ) -> Result<MergedConfig> {
        let output = match (output, self.output.as_deref()) {
            (Some(format), _) => format,
            (None, Some(name)) => name
                .parse()
                .with_context(|| format!("Invalid output format in config: {}", name))?,
            (None, None) => OutputFormat::default(),
        };

        let mut merged_channels = self.channels.clone().unwrap_or_default();
        for channel in channels {
            if !merged_channels.contains(channel) {
                merged_channels.push(channel.clone());
            }
        }

        Ok(MergedConfig {
            server: server
                .map(String::from)
                .or_else(|| self.server.clone())
                .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            output,
            no_color: no_color || self.no_color.unwrap_or(false),
            connect_timeout: self
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            channels: merged_channels,
        })
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub server: String,
    pub output: OutputFormat,
    pub no_color: bool,
    pub connect_timeout: Duration,
    pub channels: Vec<String>,
}
