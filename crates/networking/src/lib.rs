//! Networking utilities for the telemetry logger
//!
//! This crate provides the delivery transport that posts batches of
//! telemetry events to a collector endpoint.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod transport;

pub use transport::{
    Credentials, DeliveryError, DeliveryTransport, FetchParams, HttpMethod, HttpTransport,
    TransportConfig,
};
