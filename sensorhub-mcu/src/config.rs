//! Hub timing and sizing configuration

use std::time::Duration;

/// Every tunable the hub core uses. Missing fields fall back to defaults,
/// so a stored override only needs the values it changes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Max bytes handed out per drain read
    pub gatt_chunk_len: usize,
    pub scan_duration_ms: u64,
    /// Sleep when the worklist is empty
    pub idle_backoff_ms: u64,
    /// Wait after connect before discovery, peripheral firmware needs it
    pub connect_settle_ms: u64,
    pub preferred_mtu: u16,
    /// Time spent connected to one sensor
    pub dwell_ms: u64,
    /// Extra time the connection task gets before it counts as stuck
    pub dwell_grace_ms: u64,
    /// No stored reading for this long means the hub is wedged
    pub watchdog_window_secs: u64,
    pub connection_task_stack: usize,
    pub wifi_connect_attempts: u32,
    pub wifi_connect_backoff_ms: u64,
    pub keepalive_interval_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            gatt_chunk_len: sensorhub_proto::GATT_CHUNK_LEN,
            scan_duration_ms: 5_000,
            idle_backoff_ms: 500,
            connect_settle_ms: 5_000,
            preferred_mtu: 517,
            dwell_ms: 15_000,
            dwell_grace_ms: 10_000,
            watchdog_window_secs: 600,
            connection_task_stack: 32_000,
            wifi_connect_attempts: 5,
            wifi_connect_backoff_ms: 1_000,
            keepalive_interval_secs: 120,
        }
    }
}

impl HubConfig {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    /// How long the orchestrator waits for the connection task in total
    pub fn dwell_deadline(&self) -> Duration {
        Duration::from_millis(self.dwell_ms + self.dwell_grace_ms)
    }

    pub fn watchdog_window(&self) -> Duration {
        Duration::from_secs(self.watchdog_window_secs)
    }

    pub fn wifi_connect_backoff(&self) -> Duration {
        Duration::from_millis(self.wifi_connect_backoff_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}
