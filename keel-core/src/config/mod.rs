//! Configuration loading
//!
//! Defaults, then a TOML file, then `KEEL_`-prefixed environment
//! overrides (e.g. `KEEL_ENGINE__CMD_QUEUE_KEY=66`), then validation.

pub mod types;

pub use types::{Config, EngineConfig, LogConfig, RiskConfig};

use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use std::path::Path;

impl Config {
    /// Load configuration from a TOML file with environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let loaded = ConfigLoader::builder()
            .set_default("engine.api", "sim")?
            .set_default("engine.account_id", 1i64)?
            .set_default("engine.cmd_queue_key", 0i64)?
            .set_default("engine.shm_dir", "/dev/shm")?
            .set_default("engine.topic_dir", "/tmp")?
            .set_default("risk.max_order_volume", 0i64)?
            .set_default("risk.orders_per_sec", 0i64)?
            .set_default("log.level", "info")?
            .set_default("log.json", false)?
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("KEEL").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let cfg: Config = loaded
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.engine.api.is_empty() {
            anyhow::bail!("engine.api must name a gateway");
        }

        if self.engine.account_id == 0 {
            anyhow::bail!("engine.account_id must be non-zero");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log.level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', must be one of: {:?}",
                self.log.level,
                valid_log_levels
            );
        }

        if self.risk.max_order_volume < 0 {
            anyhow::bail!("risk.max_order_volume cannot be negative");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.engine.api = String::new();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.engine.account_id = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.log.level = "loud".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.risk.max_order_volume = -5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keel.toml");
        std::fs::write(
            &path,
            r#"
[engine]
api = "sim"
account_id = 42
cmd_queue_key = 66

[risk]
orders_per_sec = 100
"#,
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.engine.account_id, 42);
        assert_eq!(cfg.engine.cmd_queue_key, 66);
        assert_eq!(cfg.risk.orders_per_sec, 100);
        // Untouched sections keep their defaults
        assert_eq!(cfg.log.level, "info");
    }
}
