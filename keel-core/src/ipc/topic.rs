//! Topic command transport
//!
//! Fallback intake when no shared-memory key is configured. The engine
//! binds a Unix domain socket named after the account id; strategy
//! processes connect and write raw 80-byte `TraderCommand` frames.
//! Per-connection reader threads feed one channel, so the engine sees a
//! single merged stream exactly like the ring path.

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info, warn};

use super::CommandSource;
use crate::core::protocol::TraderCommand;
use zerocopy::AsBytes;

/// Socket path for an account's command topic.
pub fn topic_path(dir: &Path, account_id: u64) -> PathBuf {
    dir.join(format!("keel_cmd_{account_id}.sock"))
}

/// Consumer side of the command topic.
pub struct TopicCommandSource {
    rx: Receiver<TraderCommand>,
    path: PathBuf,
}

impl TopicCommandSource {
    /// Bind the account's topic socket, replacing any stale one.
    pub fn bind(dir: &Path, account_id: u64) -> Result<Self> {
        let path = topic_path(dir, account_id);
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path)
            .with_context(|| format!("bind command topic {}", path.display()))?;
        info!("command topic listening on {}", path.display());

        let (tx, rx) = unbounded();
        thread::Builder::new()
            .name("keel-topic-accept".to_string())
            .spawn(move || accept_loop(listener, tx))
            .context("spawn topic accept thread")?;

        Ok(Self { rx, path })
    }
}

fn accept_loop(listener: UnixListener, tx: Sender<TraderCommand>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                debug!("command topic: strategy connected");
                let tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name("keel-topic-read".to_string())
                    .spawn(move || reader_loop(stream, tx));
                if let Err(e) = spawned {
                    warn!("command topic: failed to spawn reader: {}", e);
                }
            }
            Err(e) => {
                warn!("command topic: accept failed: {}", e);
                return;
            }
        }
    }
}

fn reader_loop(mut stream: UnixStream, tx: Sender<TraderCommand>) {
    let mut frame = [0u8; TraderCommand::WIRE_LEN];
    loop {
        match stream.read_exact(&mut frame) {
            Ok(()) => {
                let Some(cmd) = TraderCommand::read(&frame) else {
                    continue;
                };
                if tx.send(cmd).is_err() {
                    return;
                }
            }
            Err(_) => {
                debug!("command topic: strategy disconnected");
                return;
            }
        }
    }
}

impl CommandSource for TopicCommandSource {
    fn poll(&mut self) -> Option<TraderCommand> {
        self.rx.try_recv().ok()
    }

    fn describe(&self) -> String {
        format!("topic socket {}", self.path.display())
    }
}

/// Producer side, for strategy processes and tooling.
pub struct TopicCommandClient {
    stream: UnixStream,
}

impl TopicCommandClient {
    pub fn connect(dir: &Path, account_id: u64) -> Result<Self> {
        let path = topic_path(dir, account_id);
        let stream = UnixStream::connect(&path)
            .with_context(|| format!("connect command topic {}", path.display()))?;
        Ok(Self { stream })
    }

    pub fn send(&mut self, cmd: &TraderCommand) -> Result<()> {
        self.stream
            .write_all(cmd.as_bytes())
            .context("write command frame")
    }
}
