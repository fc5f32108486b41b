use crate::humanize::HumanDuration;
use crate::reading::DeviceId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub devices: DevicesConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Durable reading store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/readings")
}

/// Field devices polled every cycle
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DevicesConfig {
    #[serde(default = "default_device_ids")]
    pub ids: Vec<DeviceId>,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            ids: default_device_ids(),
        }
    }
}

fn default_device_ids() -> Vec<DeviceId> {
    [7, 8, 9, 10, 11].into_iter().map(DeviceId).collect()
}

/// Collector transport
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout: HumanDuration,
    #[serde(default = "default_probe_interval")]
    pub probe_interval: HumanDuration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            topic: default_topic(),
            publish_timeout: default_publish_timeout(),
            probe_interval: default_probe_interval(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8086".to_string()
}

fn default_topic() -> String {
    "smart-meter/".to_string()
}

fn default_publish_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_probe_interval() -> HumanDuration {
    HumanDuration::from_secs(30)
}

/// Cycle timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval")]
    pub interval: HumanDuration,
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout: HumanDuration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            cycle_timeout: default_cycle_timeout(),
        }
    }
}

fn default_interval() -> HumanDuration {
    HumanDuration::from_secs(300) // 5 minutes
}

fn default_cycle_timeout() -> HumanDuration {
    HumanDuration::from_secs(120)
}

/// Retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_max_age")]
    pub max_age: HumanDuration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: default_max_age(),
        }
    }
}

fn default_max_age() -> HumanDuration {
    HumanDuration::from_secs(24 * 3_600)
}

/// Liveness marker
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// File rewritten after every completed cycle
    #[serde(default = "default_ping_path")]
    pub ping_path: PathBuf,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ping_path: default_ping_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ping_path() -> PathBuf {
    PathBuf::from("/tmp/watchdog-ping")
}

/// Optional status endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_status_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: default_status_addr(),
        }
    }
}

fn default_status_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9100))
}
