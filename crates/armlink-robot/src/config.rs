use std::time::Duration;

use armlink_transport::ConnectionSettings;
use serde::{Deserialize, Serialize};

use crate::battery::BatterySource;

/// Default status tick in milliseconds (20 Hz).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;

/// Configuration for a [`RobotLink`](crate::RobotLink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Transport selection and per-variant settings.
    pub settings: ConnectionSettings,
    /// Period of the status tick thread. `None` runs no thread; the caller
    /// drives [`RobotLink::tick`](crate::RobotLink::tick) itself.
    pub tick_interval_ms: Option<u64>,
    pub battery_source: BatterySource,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            settings: ConnectionSettings::default(),
            tick_interval_ms: Some(DEFAULT_TICK_INTERVAL_MS),
            battery_source: BatterySource::default(),
        }
    }
}

impl LinkConfig {
    /// Configuration with no tick thread, for callers that tick manually.
    pub fn manual_tick() -> Self {
        Self {
            tick_interval_ms: None,
            ..Self::default()
        }
    }

    /// Tick period, if the link runs its own tick thread.
    pub fn tick_interval(&self) -> Option<Duration> {
        self.tick_interval_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use armlink_transport::TransportKind;

    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: LinkConfig = serde_json::from_str(
            r#"{"settings":{"kind":"udp","udp":{"port":9100}},"battery_source":"reported"}"#,
        )
        .unwrap();
        assert_eq!(config.settings.kind, TransportKind::Udp);
        assert_eq!(config.settings.udp.port, 9100);
        assert_eq!(config.battery_source, BatterySource::Reported);
        assert_eq!(config.tick_interval(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn null_tick_interval_means_manual_tick() {
        let config: LinkConfig = serde_json::from_str(r#"{"tick_interval_ms":null}"#).unwrap();
        assert_eq!(config, LinkConfig::manual_tick());
        assert_eq!(config.tick_interval(), None);
    }

    #[test]
    fn serializes_tick_interval_in_millis() {
        let json = serde_json::to_value(LinkConfig::default()).unwrap();
        assert_eq!(json["tick_interval_ms"], 50);
        assert_eq!(json["settings"]["kind"], "tcp");
    }
}
