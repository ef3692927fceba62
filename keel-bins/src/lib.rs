//! Shared helpers for the keel binaries.

pub mod common;
