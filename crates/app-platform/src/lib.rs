//! Platform collaborators for the telemetry logger
//!
//! This crate defines how the logger observes the device: connectivity
//! transitions and device information. Platform glue (Android, iOS, desktop)
//! feeds these interfaces; the logger only consumes them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connectivity;
pub mod device;

pub use connectivity::{ConnectivityMonitor, NetworkMonitor, NetworkState};
pub use device::{
    DeviceField, DeviceIdentity, DeviceInfoProvider, PlatformError, PowerState, StaticDeviceInfo,
};
