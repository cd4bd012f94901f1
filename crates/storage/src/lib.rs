//! Storage layer for the telemetry logger
//!
//! This crate provides the install-scoped key-value store and the durable
//! queue that holds events waiting to be delivered.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod kv;
pub mod queue;

pub use kv::{KvConfig, KvError, KvStore};
pub use queue::{PersistentQueue, QueueConfig, QueueError, QueueStore, DEFAULT_QUEUE_KEY};
