//! keel-engine: run the trading engine against a config file.
//!
//! ```bash
//! keel-engine --config keel.toml
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use keel_bins::common;
use keel_core::data::NullPublisher;
use keel_core::engine::TradingEngine;
use keel_core::utils::init_logger;
use keel_core::{ipc, Config};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "keel.toml")]
    config: PathBuf,

    /// Log level override
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let level = args.log_level.as_deref().unwrap_or(&config.log.level);
    init_logger(level, config.log.json);

    tracing::info!(
        "keel-engine starting: api '{}', account {}",
        config.engine.api,
        config.engine.account_id
    );

    let engine = TradingEngine::new(config.clone(), Arc::new(NullPublisher));
    engine.login()?;

    common::install_shutdown_handler(engine.stop_token())?;

    // Shared-memory failures here are fatal by design
    let mut source = ipc::create_source(&config)?;
    let result = engine.run(source.as_mut());

    engine.close();
    result
}
