use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use ringbridge_frame::{FrameConfig, TrailingBytes, DEFAULT_MAX_FRAME, HEADER_SIZE, WIRE_MAX_PAYLOAD};
use ringbridge_io::IoConfig;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Default ingress port for framed control traffic.
pub const DEFAULT_INGRESS_PORT: u16 = 20787;

/// Default collector port for outbound datagrams.
pub const DEFAULT_COLLECTOR_PORT: u16 = 20788;

/// Relay configuration.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Address the ingress listener binds.
    pub listen_addr: SocketAddr,
    /// Collector endpoint outbound datagrams are sent to.
    pub collector_addr: SocketAddr,
    /// Channel region settings.
    pub io: IoConfig,
    /// Largest ingress frame, header included.
    pub max_frame_size: usize,
    /// Handling of bytes past the end of a frame.
    pub trailing_bytes: TrailingBytes,
    /// Pause between egress polls.
    pub egress_poll_interval_ms: u64,
    /// Most buffers taken from one output channel per poll.
    pub egress_batch: usize,
    /// Read timeout on ingress connections; bounds shutdown latency.
    pub read_poll_interval_ms: u64,
    /// Pause between accept attempts when no client is waiting.
    pub accept_poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_INGRESS_PORT)),
            collector_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_COLLECTOR_PORT)),
            io: IoConfig::default(),
            max_frame_size: DEFAULT_MAX_FRAME,
            trailing_bytes: TrailingBytes::Reject,
            egress_poll_interval_ms: 1000,
            egress_batch: 16,
            read_poll_interval_ms: 200,
            accept_poll_interval_ms: 50,
        }
    }
}

impl BridgeConfig {
    /// Load a configuration file, filling missing keys with defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            RelayError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the relay unable to run.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size <= HEADER_SIZE {
            return Err(RelayError::Config(format!(
                "max_frame_size must exceed the {HEADER_SIZE}-byte header, got {}",
                self.max_frame_size
            )));
        }
        if self.max_frame_size > HEADER_SIZE + WIRE_MAX_PAYLOAD {
            return Err(RelayError::Config(format!(
                "max_frame_size {} exceeds what a 16-bit length can describe",
                self.max_frame_size
            )));
        }
        if self.egress_batch == 0 {
            return Err(RelayError::Config("egress_batch must be non-zero".into()));
        }
        if self.read_poll_interval_ms == 0 {
            return Err(RelayError::Config(
                "read_poll_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Codec settings for one ingress connection.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            trailing: self.trailing_bytes,
            read_timeout: Some(self.read_poll_interval()),
            ..FrameConfig::default()
        }
        .with_max_frame_size(self.max_frame_size)
    }

    pub fn egress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.egress_poll_interval_ms)
    }

    pub fn read_poll_interval(&self) -> Duration {
        Duration::from_millis(self.read_poll_interval_ms)
    }

    pub fn accept_poll_interval(&self) -> Duration {
        Duration::from_millis(self.accept_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_conventions() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.listen_addr.port(), 20787);
        assert_eq!(cfg.collector_addr.port(), 20788);
        assert_eq!(cfg.io.region_name, "example_ipc_app");
        assert_eq!(cfg.frame_config().max_payload_size, 1022);
        assert_eq!(cfg.frame_config().trailing, TrailingBytes::Reject);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: BridgeConfig = serde_json::from_str(
            r#"{"collector_addr":"10.0.0.5:9000","trailing_bytes":"carry-over","io":{"region_name":"lab"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.collector_addr, "10.0.0.5:9000".parse().unwrap());
        assert_eq!(cfg.trailing_bytes, TrailingBytes::CarryOver);
        assert_eq!(cfg.io.region_name, "lab");
        assert_eq!(cfg.io.slot_size, IoConfig::default().slot_size);
        assert_eq!(cfg.egress_batch, 16);
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let cfg = BridgeConfig {
            max_frame_size: 2,
            ..BridgeConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RelayError::Config(_))));

        let cfg = BridgeConfig {
            egress_batch: 0,
            ..BridgeConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn from_json_file_reports_missing_file() {
        let err = BridgeConfig::from_json_file("/nonexistent/ringbridge.json").unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn from_json_file_loads() {
        let path = std::env::temp_dir().join(format!(
            "ringbridge-config-{}-{}.json",
            std::process::id(),
            line!()
        ));
        std::fs::write(&path, r#"{"egress_batch": 4, "max_frame_size": 256}"#).unwrap();
        let cfg = BridgeConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.egress_batch, 4);
        assert_eq!(cfg.frame_config().max_payload_size, 254);
        let _ = std::fs::remove_file(&path);
    }
}
