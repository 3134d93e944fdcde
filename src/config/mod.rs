//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files with environment variable
//! interpolation, and normalizes the queue source settings.

mod vars;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::prelude::*;
use std::path::Path;
use std::str::FromStr;

use crate::error::{
    ConfigError, InvalidFilterSnafu, NoQueuePrefixesSnafu, ReadFileSnafu, UnknownMessageFormatSnafu,
    UnsetVariablesSnafu, YamlParseSnafu,
};

/// Main configuration structure for the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    /// Metrics configuration (optional, enabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

/// Queue source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// AWS region to connect to (default: us-west-2).
    #[serde(default = "default_region")]
    pub region: String,

    /// S3 bucket the notifications refer to. When set, decoded paths are
    /// keys within this bucket; when unset, the full notification URL is
    /// passed through.
    #[serde(default)]
    pub bucket: Option<String>,

    /// Prefixes of the names of the queues to monitor. At least one is
    /// required; every queue matching any prefix gets its own poller.
    pub queue_prefixes: Vec<String>,

    /// Format of the queue message bodies (default: sns).
    #[serde(default)]
    pub message_format: MessageFormat,

    /// If provided, only file paths matching this regular expression are
    /// forwarded downstream. Non-matching notifications are still deleted.
    #[serde(default)]
    pub file_path_filter: Option<String>,

    /// Endpoint override for SQS-compatible local stacks.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-west-2".to_string()
}

/// Format of the queue message bodies.
///
/// `plain` bodies carry the S3 file path as-is; `sns` bodies are JSON
/// envelopes produced by an SNS subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    Plain,
    #[default]
    Sns,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Plain => "plain",
            MessageFormat::Sns => "sns",
        }
    }
}

impl FromStr for MessageFormat {
    type Err = ConfigError;

    /// Case-insensitive: "SNS" and "sns" are the same format.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "plain" => Ok(MessageFormat::Plain),
            "sns" => Ok(MessageFormat::Sns),
            _ => UnknownMessageFormatSnafu { value }.fail(),
        }
    }
}

impl Serialize for MessageFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

impl Config {
    /// Load configuration from a YAML file, interpolating environment
    /// variables before parsing.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        let expanded =
            vars::expand(&raw).map_err(|names| UnsetVariablesSnafu { names }.build())?;

        let config: Config = serde_yaml::from_str(&expanded).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate()
    }
}

impl SourceConfig {
    /// Validate the queue source settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.queue_prefixes.is_empty(), NoQueuePrefixesSnafu);
        for (index, prefix) in self.queue_prefixes.iter().enumerate() {
            ensure!(
                !prefix.is_empty(),
                crate::error::EmptyQueuePrefixSnafu { index }
            );
        }
        self.compiled_filter()?;
        Ok(())
    }

    /// Compile the file path filter, if one is configured.
    pub fn compiled_filter(&self) -> Result<Option<Regex>, ConfigError> {
        self.file_path_filter
            .as_deref()
            .map(|pattern| Regex::new(pattern).context(InvalidFilterSnafu))
            .transpose()
    }
}
