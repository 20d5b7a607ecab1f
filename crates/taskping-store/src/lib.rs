//! # TaskPing Store
//! File-based snapshot of users and tasks, served from memory.
//! JSON on disk: human-readable, easy to seed. Only reads the file on
//! open/reload, never on a lookup.

pub mod snapshot;

pub use snapshot::{Snapshot, SnapshotStore};
