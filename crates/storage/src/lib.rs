//! Storage layer for Waypoint
//!
//! This crate provides the snapshot persistence collaborator: an async
//! [`SnapshotStore`] trait, in-memory and sled-backed implementations, and
//! versioned, checksummed envelopes for the stored blobs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod kv;
pub mod snapshot;

pub use kv::{KvConfig, KvStore};
pub use snapshot::{open, seal, MemorySnapshotStore, Result, SnapshotStore, StorageError};
