//! Notification body decoding.
//!
//! Maps a raw queue message body to the S3 file location it announces.
//! Plain bodies are the path itself; SNS bodies are JSON envelopes whose
//! `Message` field is the URL of the file that was produced.

use serde::Deserialize;
use snafu::prelude::*;
use url::Url;

use crate::config::MessageFormat;
use crate::error::{DecodeError, EnvelopeSnafu, MessageUrlSnafu};

/// File location extracted from a queue notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedNotification {
    pub file_path: String,
    /// SNS delivery timestamp, verbatim. Absent for plain messages.
    pub timestamp: Option<String>,
}

/// The subset of the SNS envelope this source reads.
#[derive(Debug, Deserialize)]
struct SnsEnvelope {
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Timestamp", default)]
    timestamp: String,
}

/// Decode a notification body.
///
/// Plain bodies cannot fail. SNS bodies fail when the JSON envelope does
/// not parse or `Message` is not a URL. With a configured bucket the URL's
/// path becomes the file path, with exactly one leading separator
/// stripped; without one the raw `Message` string is passed through.
pub fn decode(
    body: &str,
    format: MessageFormat,
    bucket: Option<&str>,
) -> Result<DecodedNotification, DecodeError> {
    match format {
        MessageFormat::Plain => Ok(DecodedNotification {
            file_path: body.to_string(),
            timestamp: None,
        }),
        MessageFormat::Sns => {
            let SnsEnvelope { message, timestamp } =
                serde_json::from_str(body).context(EnvelopeSnafu)?;

            let url = Url::parse(&message).with_context(|_| MessageUrlSnafu {
                message: message.clone(),
            })?;

            let file_path = if bucket.is_some() {
                url.path().strip_prefix('/').unwrap_or(url.path()).to_string()
            } else {
                message
            };

            let timestamp = (!timestamp.is_empty()).then_some(timestamp);
            Ok(DecodedNotification {
                file_path,
                timestamp,
            })
        }
    }
}
