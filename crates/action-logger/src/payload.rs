//! Delivery payload construction
//!
//! Events are annotated at send time, not at enqueue time: the custom
//! payload and device context in effect when a batch leaves the device are
//! the ones the collector sees, including for events that waited on disk.

use networking::FetchParams;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::context::DeviceContext;
use crate::events::LogEvent;

/// Prefix prepended to every delivered event name
pub const DEFAULT_EVENT_PREFIX: &str = "mobile_app";

/// Level reported for every event
const EVENT_LEVEL: &str = "info";

/// Where and how batches are delivered
#[derive(Debug, Clone, Default)]
pub struct DeliverySettings {
    /// Collector endpoint; nothing is sent until it is set
    pub base_url: Option<String>,
    /// Request parameters
    pub fetch_params: FetchParams,
    /// Key/value pairs merged into every delivered event
    pub custom_payload: BTreeMap<String, String>,
}

/// A batch ready to hand to the transport
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    /// Collector endpoint
    pub endpoint: String,
    /// Request parameters
    pub params: FetchParams,
    /// Annotated events, in delivery order
    pub events: Vec<Value>,
}

/// Send-time state shared by the logger and its batcher
#[derive(Debug)]
pub struct SendContext {
    settings: RwLock<DeliverySettings>,
    device: RwLock<DeviceContext>,
    prefix: String,
}

impl SendContext {
    /// Create send-time state
    pub fn new(
        settings: DeliverySettings,
        device: DeviceContext,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            settings: RwLock::new(settings),
            device: RwLock::new(device),
            prefix: prefix.into(),
        }
    }

    /// Set the collector endpoint
    pub fn set_base_url(&self, base_url: String) {
        self.settings.write().base_url = Some(base_url);
    }

    /// Replace the request parameters
    pub fn set_fetch_params(&self, params: FetchParams) {
        self.settings.write().fetch_params = params;
    }

    /// Replace the custom payload
    pub fn set_custom_payload(&self, payload: BTreeMap<String, String>) {
        self.settings.write().custom_payload = payload;
    }

    /// Replace the device context
    pub fn set_device_context(&self, context: DeviceContext) {
        *self.device.write() = context;
    }

    /// Annotate events for delivery
    ///
    /// Returns `None` when no endpoint is configured yet.
    pub fn prepare<'a, I>(&self, events: I) -> Result<Option<PreparedBatch>, serde_json::Error>
    where
        I: IntoIterator<Item = &'a LogEvent>,
    {
        let settings = self.settings.read();
        let Some(endpoint) = settings.base_url.clone() else {
            return Ok(None);
        };

        let device = self.device.read();
        let events = events
            .into_iter()
            .map(|event| annotate(event, &settings.custom_payload, &device, &self.prefix))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(PreparedBatch { endpoint, params: settings.fetch_params.clone(), events }))
    }
}

/// Build the wire form of one event
///
/// Later sources win on key collisions: custom payload, then device
/// context, then the event's own fields.
pub fn annotate(
    event: &LogEvent,
    custom_payload: &BTreeMap<String, String>,
    device: &DeviceContext,
    prefix: &str,
) -> Result<Value, serde_json::Error> {
    let name = if prefix.is_empty() {
        event.event_type.clone()
    } else {
        format!("{}_{}", prefix, event.event_type)
    };

    let mut object = Map::new();
    object.insert("event".to_string(), json!({ "name": name }));
    object.insert("level".to_string(), Value::from(EVENT_LEVEL));
    object.insert("ts".to_string(), Value::from(event.timestamp as f64 / 1000.0));

    for (key, value) in custom_payload {
        object.insert(key.clone(), Value::String(value.clone()));
    }
    for (key, value) in device.fields() {
        object.insert(key.clone(), value.clone());
    }

    if let Value::Object(fields) = serde_json::to_value(event)? {
        for (key, value) in fields {
            if key != "timestamp" {
                object.insert(key, value);
            }
        }
    }

    Ok(Value::Object(object))
}
