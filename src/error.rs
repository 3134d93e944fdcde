//! Error types for squall using snafu.
//!
//! One enum per concern, aggregated into the top-level [`SourceError`].
//! The only fatal runtime condition is queue discovery failure; everything
//! past startup degrades to logs and metrics.

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },

    /// Environment variables referenced by the config are not set.
    #[snafu(display("Unset environment variables in config: {}", names.join(", ")))]
    UnsetVariables { names: Vec<String> },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// No queue prefixes configured.
    #[snafu(display("At least one queue prefix is required"))]
    NoQueuePrefixes,

    /// A configured queue prefix is empty.
    #[snafu(display("Queue prefix {index} is empty"))]
    EmptyQueuePrefix { index: usize },

    /// Unrecognized message format value.
    #[snafu(display("Unknown message format {value:?}, expected \"plain\" or \"sns\""))]
    UnknownMessageFormat { value: String },

    /// File path filter is not a valid regular expression.
    #[snafu(display("Invalid file path filter"))]
    InvalidFilter { source: regex::Error },
}

// ============ Decode Errors ============

/// Errors that can occur while decoding a queue notification body.
///
/// A notification that fails to decode is left un-acknowledged so the
/// queue's redelivery policy can retry it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// Body is not the expected SNS JSON envelope.
    #[snafu(display("Notification body is not an SNS envelope"))]
    Envelope { source: serde_json::Error },

    /// The envelope's Message field is not a parseable URL.
    #[snafu(display("Notification message is not a valid URL: {message:?}"))]
    MessageUrl {
        source: url::ParseError,
        message: String,
    },
}

// ============ Queue Errors ============

/// Errors returned by the queue service.
///
/// SDK errors are flattened to strings; callers only dispatch on the
/// operation, never on the underlying service error.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// Queue listing failed.
    #[snafu(display("Failed to list queues with prefix {prefix:?}: {message}"))]
    ListQueues { prefix: String, message: String },

    /// Long-poll receive failed.
    #[snafu(display("Receive failed on {queue_url}: {message}"))]
    Receive { queue_url: String, message: String },

    /// Message deletion (acknowledge) failed.
    #[snafu(display("Delete failed on {queue_url}: {message}"))]
    Delete { queue_url: String, message: String },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Source Error (top-level) ============

/// Top-level errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Queue discovery failed at startup; no pollers were started.
    #[snafu(display("Queue discovery failed"))]
    Discovery { source: QueueError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// A poller task panicked.
    #[snafu(display("Poller task failed"))]
    PollerJoin { source: tokio::task::JoinError },
}
