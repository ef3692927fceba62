//! Shared-memory command ring
//!
//! Single-producer/single-consumer ring over a file in `/dev/shm`,
//! mapped on both sides for zero-copy transfer of `TraderCommand`
//! frames. The header carries a format magic plus the creator's user
//! tag; opening a segment whose magic or tag does not match fails
//! loudly instead of attaching — attaching to a foreign segment is the
//! classic way to corrupt someone else's memory.
//!
//! The engine resets both cursors on attach: each session starts fresh
//! and commands queued before the engine came up are discarded on
//! purpose. The segment itself is never unlinked here; its lifetime
//! belongs to external tooling.

use anyhow::{Context, Result};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::CommandSource;
use crate::core::protocol::TraderCommand;

/// Ring format magic ("KQ" + format version 1).
pub const RING_MAGIC: u32 = 0x4b51_0001;

/// Slots per ring.
pub const RING_CAPACITY: u32 = 16384;

/// Header bytes reserved ahead of the slot array (one cache line).
const HEADER_LEN: usize = 64;

#[repr(C)]
struct RingHeader {
    magic: u32,
    user_tag: u32,
    elem_size: u32,
    capacity: u32,
    /// bit 0: wrap flag, false on create
    flags: u32,
    _reserved: u32,
    write_pos: AtomicU64,
    read_pos: AtomicU64,
}

/// Raw SPSC byte ring over a shared mapping.
#[derive(Debug)]
struct ShmRing {
    mmap: MmapMut,
    elem_size: usize,
    capacity: u64,
}

impl ShmRing {
    /// Create a fresh segment. Fails if the file already exists.
    fn create(path: &Path, user_tag: u32, elem_size: usize, capacity: u32) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("create shm segment {}", path.display()))?;
        let len = HEADER_LEN + elem_size * capacity as usize;
        file.set_len(len as u64)
            .with_context(|| format!("size shm segment {}", path.display()))?;

        let mut mmap = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("map shm segment {}", path.display()))?;

        let header = RingHeader {
            magic: RING_MAGIC,
            user_tag,
            elem_size: elem_size as u32,
            capacity,
            flags: 0,
            _reserved: 0,
            write_pos: AtomicU64::new(0),
            read_pos: AtomicU64::new(0),
        };
        // Fresh zeroed mapping; placing the header is the only
        // initialization the slots need none of.
        unsafe { std::ptr::write(mmap.as_mut_ptr() as *mut RingHeader, header) };
        mmap.flush()
            .with_context(|| format!("flush shm header {}", path.display()))?;
        Ok(())
    }

    /// Map an existing segment, validating every header field.
    fn open(path: &Path, user_tag: u32, elem_size: usize, capacity: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open shm segment {}", path.display()))?;
        let expected_len = (HEADER_LEN + elem_size * capacity as usize) as u64;
        let actual_len = file.metadata()?.len();
        if actual_len < expected_len {
            anyhow::bail!(
                "shm segment {} is {} bytes, expected {}",
                path.display(),
                actual_len,
                expected_len
            );
        }

        let mmap = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("map shm segment {}", path.display()))?;
        let ring = Self {
            mmap,
            elem_size,
            capacity: capacity as u64,
        };

        let header = ring.header();
        if header.magic != RING_MAGIC {
            anyhow::bail!(
                "shm segment {} has format magic {:#010x}, expected {:#010x} — refusing to attach",
                path.display(),
                header.magic,
                RING_MAGIC
            );
        }
        if header.user_tag != user_tag {
            anyhow::bail!(
                "shm segment {} belongs to user tag {}, expected {} — refusing to attach",
                path.display(),
                header.user_tag,
                user_tag
            );
        }
        if header.elem_size != elem_size as u32 || header.capacity != capacity {
            anyhow::bail!(
                "shm segment {} geometry mismatch: {}x{} vs expected {}x{}",
                path.display(),
                header.elem_size,
                header.capacity,
                elem_size,
                capacity
            );
        }
        Ok(ring)
    }

    fn header(&self) -> &RingHeader {
        // The mapping is page-aligned and outlives self; the header is
        // only ever accessed through atomics or read-only fields.
        unsafe { &*(self.mmap.as_ptr() as *const RingHeader) }
    }

    /// Reset both cursors, discarding queued elements.
    fn reset(&self) {
        let header = self.header();
        header.read_pos.store(0, Ordering::Release);
        header.write_pos.store(0, Ordering::Release);
    }

    fn slot_range(&self, pos: u64) -> std::ops::Range<usize> {
        let slot = HEADER_LEN + (pos % self.capacity) as usize * self.elem_size;
        slot..slot + self.elem_size
    }

    /// Producer side. Returns false when the ring is full.
    fn push(&mut self, bytes: &[u8]) -> bool {
        debug_assert_eq!(bytes.len(), self.elem_size);
        let write = self.header().write_pos.load(Ordering::Relaxed);
        let read = self.header().read_pos.load(Ordering::Acquire);
        if write - read >= self.capacity {
            return false;
        }
        let range = self.slot_range(write);
        self.mmap[range].copy_from_slice(bytes);
        self.header().write_pos.store(write + 1, Ordering::Release);
        true
    }

    /// Consumer side. Returns false when the ring is empty.
    fn pop(&mut self, buf: &mut [u8]) -> bool {
        debug_assert_eq!(buf.len(), self.elem_size);
        let read = self.header().read_pos.load(Ordering::Relaxed);
        let write = self.header().write_pos.load(Ordering::Acquire);
        if read == write {
            return false;
        }
        let range = self.slot_range(read);
        buf.copy_from_slice(&self.mmap[range]);
        self.header().read_pos.store(read + 1, Ordering::Release);
        true
    }
}

/// The command ring, typed to `TraderCommand` frames.
#[derive(Debug)]
pub struct ShmCommandQueue {
    ring: ShmRing,
    path: PathBuf,
}

impl ShmCommandQueue {
    /// Segment file for a queue key.
    pub fn segment_path(dir: &Path, key: u32) -> PathBuf {
        dir.join(format!("keel_cmd_{key:08x}"))
    }

    /// Consumer-side attach: open the keyed segment, creating it when
    /// absent, then reset the cursors so the session starts fresh. A
    /// segment with a foreign tag is a hard error.
    pub fn open_or_create(dir: &Path, key: u32, user_tag: u32) -> Result<Self> {
        let path = Self::segment_path(dir, key);
        let elem = TraderCommand::WIRE_LEN;

        if !path.exists() {
            ShmRing::create(&path, user_tag, elem, RING_CAPACITY)?;
            info!(
                "created command ring {} ({} slots of {} bytes, tag {})",
                path.display(),
                RING_CAPACITY,
                elem,
                user_tag
            );
        }

        let ring = ShmRing::open(&path, user_tag, elem, RING_CAPACITY)?;
        ring.reset();
        info!("attached command ring {} (cursors reset)", path.display());
        Ok(Self { ring, path })
    }

    /// Producer-side attach for strategy processes: open without
    /// resetting cursors. The segment must already exist.
    pub fn attach(dir: &Path, key: u32, user_tag: u32) -> Result<Self> {
        let path = Self::segment_path(dir, key);
        let ring = ShmRing::open(&path, user_tag, TraderCommand::WIRE_LEN, RING_CAPACITY)?;
        Ok(Self { ring, path })
    }

    /// Enqueue one command. Returns false when the ring is full.
    pub fn push(&mut self, cmd: &TraderCommand) -> bool {
        use zerocopy::AsBytes;
        self.ring.push(cmd.as_bytes())
    }
}

impl CommandSource for ShmCommandQueue {
    fn poll(&mut self) -> Option<TraderCommand> {
        let mut frame = [0u8; TraderCommand::WIRE_LEN];
        if self.ring.pop(&mut frame) {
            TraderCommand::read(&frame)
        } else {
            None
        }
    }

    fn describe(&self) -> String {
        format!("shm ring {}", self.path.display())
    }
}
