//! Keel Core - Trading Engine between strategy processes and a broker
//!
//! The engine consumes trading commands over IPC, validates them
//! against risk policy, forwards accepted requests to a broker gateway,
//! and reconciles the gateway's asynchronous callbacks against a live
//! order registry to drive portfolio and account state forward.
//!
//! ## System Architecture
//!
//! ```text
//! ┌────────────┐   shm ring /    ┌──────────────────────────────────┐
//! │ strategies │ ──topic socket─▶│ intake ─▶ execute_cmd            │
//! └────────────┘  TraderCommand  │              │                   │
//!                                │              ▼                   │
//!                                │   ┌──── engine lock ─────────┐   │
//!                                │   │ risk gate                │   │
//!                                │   │ order registry           │   │
//!                                │   │ portfolio + account      │   │
//!                                │   └──────────┬───────────────┘   │
//!                                │              │ send_order        │
//!                                └──────────────┼───────────────────┘
//!                                               ▼
//!                                        ┌────────────┐
//!                     on_* callbacks ◀── │  gateway   │ ──▶ broker
//!                                        └────────────┘
//! ```
//!
//! Ticks flow the other way: `gateway.on_tick` updates the latest-price
//! snapshot (read by risk) and republishes under the human ticker.
//!
//! ## Core Modules
//!
//! - [`core`] - Domain types, wire protocol, contracts, errors
//! - [`engine`] - The trading engine: dispatch, lifecycle, registry
//! - [`risk`] - Pre-trade gate and lifecycle hooks over rule objects
//! - [`gateway`] - Gateway contract + the simulated gateway
//! - [`ipc`] - Command intake: shared-memory ring and topic socket
//! - [`portfolio`] - Account and per-ticker position state
//! - [`data`] - Tick snapshot cache and market-data egress
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keel_core::prelude::*;
//! use std::sync::Arc;
//!
//! let config = Config::load("keel.toml")?;
//! let engine = TradingEngine::new(config.clone(), Arc::new(NullPublisher));
//! engine.login()?;
//!
//! let mut source = keel_core::ipc::create_source(&config)?;
//! engine.run(source.as_mut())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod core;
pub mod data;
pub mod engine;
pub mod gateway;
pub mod ipc;
pub mod portfolio;
pub mod risk;
pub mod utils;

pub use self::config::Config;
pub use self::core::{
    Contract, ContractDirectory, Direction, EngineError, Offset, Order, OrderRequest, OrderStatus,
    OrderType, RiskRejection, StrategyId, TradeType, TraderCommand,
};
pub use self::engine::TradingEngine;
pub use self::gateway::{Gateway, GatewayEvents, SimGateway};
pub use self::risk::{RiskManager, RiskRule};

// Re-export error types
pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::core::{
        Direction, Offset, OrderStatus, OrderType, StrategyId, TradeType, TraderCommand,
    };
    pub use crate::data::{MdSnapshot, NullPublisher, TickData};
    pub use crate::engine::TradingEngine;
    pub use crate::gateway::{Gateway, GatewayEvents, SimGateway};
    pub use crate::ipc::CommandSource;
    pub use crate::{Error, Result};
}
