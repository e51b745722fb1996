use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::classifier;

const ENV_PREFIX: &str = "SERIALS_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse serials: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid name pattern for serial {serial}: {source}")]
    Pattern {
        serial: String,
        #[source]
        source: regex::Error,
    },
    #[error("serial {0} is configured more than once")]
    DuplicateSerial(String),
    #[error("no credentials available, set SERIALS_API_KEY or store an OAuth token")]
    MissingCredentials,
}

/// Runtime settings, read from `SERIALS_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_serials_file")]
    pub serials_file: PathBuf,
    /// Lookback window in days used when a serial has never been scanned.
    #[serde(default = "default_published_after")]
    pub default_published_after: u32,
    /// Skip the actual media download and mark episodes completed right away.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_ytdlp")]
    pub ytdlp: PathBuf,
    /// Seconds between two polls.
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub run_once: bool,
}

fn default_database() -> PathBuf {
    PathBuf::from("serials.db")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_serials_file() -> PathBuf {
    PathBuf::from("serials.json")
}

fn default_published_after() -> u32 {
    7
}

fn default_format() -> String {
    "18".into()
}

fn default_ytdlp() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_interval() -> u64 {
    60 * 60
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::prefixed(ENV_PREFIX).from_env()?)
    }

    #[must_use]
    pub fn default_lookback(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.default_published_after))
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialConfig {
    pub name: String,
    pub channel_id: String,
    pub name_pattern: String,
}

/// A tracked show with its compiled episode pattern.
#[derive(Debug, Clone)]
pub struct Serial {
    pub name: String,
    pub channel_id: String,
    pub name_pattern: Regex,
}

impl TryFrom<SerialConfig> for Serial {
    type Error = ConfigError;

    fn try_from(value: SerialConfig) -> Result<Self, Self::Error> {
        let name_pattern =
            classifier::compile_pattern(&value.name_pattern).map_err(|source| {
                ConfigError::Pattern {
                    serial: value.name.clone(),
                    source,
                }
            })?;
        Ok(Self {
            name: value.name,
            channel_id: value.channel_id,
            name_pattern,
        })
    }
}

pub fn parse_serials(json: &str) -> Result<Vec<Serial>, ConfigError> {
    let configs: Vec<SerialConfig> = serde_json::from_str(json)?;
    let mut names = HashSet::with_capacity(configs.len());
    configs
        .into_iter()
        .map(|config| {
            if !names.insert(config.name.clone()) {
                return Err(ConfigError::DuplicateSerial(config.name));
            }
            Serial::try_from(config)
        })
        .collect()
}

pub fn load_serials(path: &Path) -> Result<Vec<Serial>, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_serials(&json)
}
