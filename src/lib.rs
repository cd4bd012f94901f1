//! Mobile telemetry
//!
//! Umbrella crate for the user action logger and the storage, transport and
//! platform pieces it is assembled from.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use action_logger::{
    global, keys, BugData, ErrorData, EventData, FlushOutcome, LogEvent, LoggerBuilder,
    LoggerConfig, LoggerError, MetricData, QueryData, UserActionLogger,
};
pub use app_platform::{
    ConnectivityMonitor, DeviceField, DeviceIdentity, DeviceInfoProvider, NetworkMonitor,
    NetworkState, StaticDeviceInfo,
};
pub use networking::{Credentials, FetchParams, HttpMethod, HttpTransport, TransportConfig};
pub use storage::{KvConfig, KvStore, PersistentQueue, QueueConfig, QueueStore};

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber for the logger's diagnostics
///
/// `RUST_LOG` takes precedence over `default_filter`. Does nothing if a
/// global subscriber is already set.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
