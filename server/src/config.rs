//! Gate configuration
//!
//! Values are loaded from an optional JSON file and then clamped into
//! their supported ranges by [`GateConfig::validated`]. Missing fields take
//! their defaults.

use serde::{Deserialize, Serialize};
use shared::ProtocolVersion;
use std::time::Duration;

/// How long a registry keeps an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    /// Kept until removed or cleared
    Never,
    /// Dropped a fixed time after insertion
    Fixed { seconds: u64 },
    /// Dropped after a period without lookups
    Sliding { seconds: u64 },
}

impl Expiry {
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Expiry::Never => None,
            Expiry::Fixed { seconds } | Expiry::Sliding { seconds } => {
                Some(Duration::from_secs(*seconds))
            }
        }
    }

    pub fn is_sliding(&self) -> bool {
        matches!(self, Expiry::Sliding { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub verification_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub max_login_packets: u32,
    pub max_queue_polls: usize,
    pub queue_poll_interval_ms: u64,
    /// Negative disables compression
    pub compression_threshold: i32,
    pub verified_expiry: Expiry,
    pub blacklist_expiry: Expiry,
    pub reconnect_limit: u32,
    pub reconnect_window_ms: u64,
    pub max_brand_length: usize,
    pub min_protocol: i32,
    pub max_protocol: i32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            verification_timeout_ms: 10_000,
            read_timeout_ms: 3_500,
            max_login_packets: 256,
            max_queue_polls: 30,
            queue_poll_interval_ms: 1_000,
            compression_threshold: 256,
            verified_expiry: Expiry::Sliding { seconds: 24 * 60 * 60 },
            blacklist_expiry: Expiry::Fixed { seconds: 15 * 60 },
            reconnect_limit: 2,
            reconnect_window_ms: 60_000,
            max_brand_length: 64,
            min_protocol: ProtocolVersion::MINIMUM.0,
            max_protocol: ProtocolVersion::MAXIMUM.0,
        }
    }
}

impl GateConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: GateConfig = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamps every field into its supported range.
    pub fn validated(mut self) -> Self {
        self.verification_timeout_ms = self.verification_timeout_ms.clamp(500, 60_000);
        self.read_timeout_ms = self.read_timeout_ms.clamp(500, 30_000);
        self.max_login_packets = self.max_login_packets.clamp(128, 8_192);
        self.max_queue_polls = self.max_queue_polls.clamp(1, 1_000);
        self.queue_poll_interval_ms = self.queue_poll_interval_ms.clamp(50, 10_000);
        self.compression_threshold = self.compression_threshold.clamp(-1, 65_535);
        self.reconnect_limit = self.reconnect_limit.clamp(1, 100);
        self.reconnect_window_ms = self.reconnect_window_ms.clamp(1_000, 600_000);
        self.max_brand_length = self.max_brand_length.clamp(2, 512);
        self.min_protocol = self
            .min_protocol
            .clamp(ProtocolVersion::MINIMUM.0, ProtocolVersion::MAXIMUM.0);
        self.max_protocol = self
            .max_protocol
            .clamp(self.min_protocol, ProtocolVersion::MAXIMUM.0);
        self
    }

    pub fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    pub fn reconnect_window(&self) -> Duration {
        Duration::from_millis(self.reconnect_window_ms)
    }

    pub fn compression_threshold(&self) -> Option<usize> {
        usize::try_from(self.compression_threshold).ok()
    }

    /// Whether clients speaking `version` may be verified
    pub fn accepts(&self, version: ProtocolVersion) -> bool {
        version.is_supported() && (self.min_protocol..=self.max_protocol).contains(&version.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_survive_validation() {
        let config = GateConfig::default();
        assert_eq!(config.clone().validated(), config);
        assert_eq!(config.compression_threshold(), Some(256));
        assert_eq!(config.read_timeout(), Duration::from_millis(3500));
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = GateConfig {
            verification_timeout_ms: 1,
            max_login_packets: 1_000_000,
            max_queue_polls: 0,
            compression_threshold: -50,
            max_brand_length: 0,
            ..GateConfig::default()
        }
        .validated();

        assert_eq!(config.verification_timeout_ms, 500);
        assert_eq!(config.max_login_packets, 8_192);
        assert_eq!(config.max_queue_polls, 1);
        assert_eq!(config.compression_threshold, -1);
        assert_eq!(config.compression_threshold(), None);
        assert_eq!(config.max_brand_length, 2);
    }

    #[test]
    fn test_partial_json() {
        let config = GateConfig::from_json(
            r#"{ "max_queue_polls": 5, "blacklist_expiry": "never", "verified_expiry": { "fixed": { "seconds": 60 } } }"#,
        )
        .unwrap();

        assert_eq!(config.max_queue_polls, 5);
        assert_eq!(config.blacklist_expiry, Expiry::Never);
        assert_eq!(config.verified_expiry.ttl(), Some(Duration::from_secs(60)));
        assert!(!config.verified_expiry.is_sliding());
        assert_eq!(config.read_timeout_ms, 3_500);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(GateConfig::from_json("{ \"max_queue_polls\": \"many\" }").is_err());
    }

    #[test]
    fn test_protocol_window() {
        let config = GateConfig {
            min_protocol: ProtocolVersion::V1_12_2.0,
            ..GateConfig::default()
        }
        .validated();

        assert!(!config.accepts(ProtocolVersion::V1_8));
        assert!(config.accepts(ProtocolVersion::V1_12_2));
        assert!(config.accepts(ProtocolVersion::V1_15_2));
        // Inside the window but not a known release
        assert!(!config.accepts(ProtocolVersion(400)));
    }
}
