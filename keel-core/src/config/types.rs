//! Configuration sections

use serde::Deserialize;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub risk: RiskConfig,
    pub log: LogConfig,
}

/// Session and transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Gateway API name, resolved by the gateway factory ("sim", ...)
    pub api: String,
    /// Account the engine trades for; also names the command topic
    pub account_id: u64,
    /// Shared-memory command ring key; 0 selects the topic transport
    pub cmd_queue_key: u32,
    /// Directory holding shared-memory segments
    pub shm_dir: String,
    /// Directory holding topic sockets
    pub topic_dir: String,
}

/// Risk gate settings. Fund and position checks are always on; these
/// knobs bound what they cannot infer from contract metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Global per-order volume cap, 0 = contract bounds only
    pub max_order_volume: i32,
    /// Order submissions per rolling second, 0 = unthrottled
    pub orders_per_sec: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api: "sim".to_string(),
            account_id: 1,
            cmd_queue_key: 0,
            shm_dir: "/dev/shm".to_string(),
            topic_dir: "/tmp".to_string(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_volume: 0,
            orders_per_sec: 0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            risk: RiskConfig::default(),
            log: LogConfig::default(),
        }
    }
}
