//! Command intake transports
//!
//! Two interchangeable sources produce identical `TraderCommand`
//! values: a shared-memory SPSC ring (preferred, selected by a positive
//! `cmd_queue_key`) and an account-scoped Unix-socket topic (fallback).
//! The engine's intake loop spins on `poll`; back-off lives in the
//! loop, not the transport, so no source ever drops a message.

pub mod shm_queue;
pub mod topic;

pub use shm_queue::{ShmCommandQueue, RING_CAPACITY};
pub use topic::{TopicCommandClient, TopicCommandSource};

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::core::protocol::{TraderCommand, PROTOCOL_VERSION};

/// Non-blocking command producer feeding the engine.
pub trait CommandSource: Send {
    /// Next command if one is ready.
    fn poll(&mut self) -> Option<TraderCommand>;

    /// Human description for logs.
    fn describe(&self) -> String;
}

/// Select and open the configured transport. Shared-memory failures are
/// fatal by design: a missing IPC segment is unrecoverable.
pub fn create_source(config: &Config) -> Result<Box<dyn CommandSource>> {
    let engine = &config.engine;
    if engine.cmd_queue_key > 0 {
        let queue = ShmCommandQueue::open_or_create(
            Path::new(&engine.shm_dir),
            engine.cmd_queue_key,
            PROTOCOL_VERSION,
        )?;
        Ok(Box::new(queue))
    } else {
        let topic = TopicCommandSource::bind(Path::new(&engine.topic_dir), engine.account_id)?;
        Ok(Box::new(topic))
    }
}
