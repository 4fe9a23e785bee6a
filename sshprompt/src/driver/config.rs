//! Reader configuration.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::channel::Encoding;
use crate::error::DriverError;

/// Instance-level defaults for [`recv_text`](super::InteractiveDriver::recv_text).
///
/// Every field has a default, so a partial config deserializes cleanly:
///
/// ```rust
/// use sshprompt::driver::ReaderConfig;
///
/// let config: ReaderConfig = serde_json::from_str(r#"{
///     "recv_timeout": 5.0,
///     "prompts": ["\\$ $"],
///     "auto_replies": { "[Pp]assword:": "secret\n" }
/// }"#).unwrap();
/// assert_eq!(config.recv_chunk_size, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Text encoding for both directions.
    pub encoding: Encoding,

    /// Maximum bytes taken from the channel per read.
    pub recv_chunk_size: usize,

    /// Idle timeout, measured from the call start or the last auto-reply.
    #[serde(with = "secs_f64")]
    pub recv_timeout: Duration,

    /// Default auto-reply patterns, checked in insertion order.
    pub auto_replies: IndexMap<String, String>,

    /// Default prompt patterns, checked in order.
    pub prompts: Vec<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            recv_chunk_size: 1024,
            recv_timeout: Duration::from_secs(30),
            auto_replies: IndexMap::new(),
            prompts: Vec::new(),
        }
    }
}

impl ReaderConfig {
    /// Reject settings the receive loop cannot run with.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.recv_chunk_size == 0 {
            return Err(DriverError::invalid_argument(
                "recv_chunk_size must be greater than 0",
            ));
        }
        if self.recv_timeout.is_zero() {
            return Err(DriverError::invalid_argument(
                "recv_timeout must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Add a default auto-reply.
    pub fn with_auto_reply(mut self, pattern: impl Into<String>, reply: impl Into<String>) -> Self {
        self.auto_replies.insert(pattern.into(), reply.into());
        self
    }

    /// Add a default prompt pattern.
    pub fn with_prompt(mut self, pattern: impl Into<String>) -> Self {
        self.prompts.push(pattern.into());
        self
    }
}

/// Durations as fractional seconds.
mod secs_f64 {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.encoding, Encoding::Utf8);
        assert_eq!(config.recv_chunk_size, 1024);
        assert_eq!(config.recv_timeout, Duration::from_secs(30));
        assert!(config.auto_replies.is_empty());
        assert!(config.prompts.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let config = ReaderConfig {
            recv_chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DriverError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ReaderConfig {
            recv_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DriverError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ReaderConfig = serde_json::from_str(
            r#"{"encoding": "latin-1", "recv_timeout": 2.5, "prompts": ["prompt>"]}"#,
        )
        .unwrap();
        assert_eq!(config.encoding, Encoding::Latin1);
        assert_eq!(config.recv_timeout, Duration::from_millis(2500));
        assert_eq!(config.prompts, vec!["prompt>".to_string()]);
        assert_eq!(config.recv_chunk_size, 1024);
    }

    #[test]
    fn test_deserialize_rejects_negative_timeout() {
        let result = serde_json::from_str::<ReaderConfig>(r#"{"recv_timeout": -1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_unknown_encoding() {
        let result = serde_json::from_str::<ReaderConfig>(r#"{"encoding": "ebcdic"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_auto_reply_order_survives_round_trip() {
        let config = ReaderConfig::default()
            .with_auto_reply("b", "2")
            .with_auto_reply("a", "1");
        let json = serde_json::to_string(&config).unwrap();
        let back: ReaderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.auto_replies.keys().collect::<Vec<_>>(),
            vec!["b", "a"]
        );
    }
}
