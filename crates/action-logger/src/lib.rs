//! User action logging with offline-resilient delivery
//!
//! Events are buffered in memory and posted to a collector in batches.
//! Batches that cannot be delivered are kept in a durable queue and retried
//! on the next flush: periodically, on demand, and whenever connectivity
//! comes back.
//!
//! # Modules
//!
//! - [`events`]: event model and typed inputs
//! - [`batcher`]: buffering and single-flight flush
//! - [`payload`]: send-time annotation of batches
//! - [`context`]: device context resolution
//! - [`logger`]: the [`UserActionLogger`] facade
//! - [`global`]: the process-wide logger

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batcher;
pub mod context;
pub mod error;
pub mod events;
pub mod global;
pub mod logger;
pub mod payload;

#[cfg(test)]
mod testing;

pub use batcher::{Batcher, FlushOutcome, FlushTrigger};
pub use context::DeviceContext;
pub use error::{LoggerError, Result};
pub use events::{keys, BugData, ErrorData, EventData, LogEvent, MetricData, QueryData};
pub use logger::{
    LoggerBuilder, LoggerConfig, UserActionLogger, DEFAULT_DEVICE_QUERY_TIMEOUT,
    DEFAULT_FLUSH_INTERVAL,
};
pub use payload::{DeliverySettings, SendContext, DEFAULT_EVENT_PREFIX};
