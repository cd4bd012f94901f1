//! Telemetry event model
//!
//! A [`LogEvent`] is what gets buffered, persisted and (after annotation)
//! delivered. Device and session context are not part of it;
//! they are attached when a batch is sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Well-known event keys used across the app
pub mod keys {
    /// Plain events
    pub mod event {
        /// User-submitted bug report
        pub const BUG_REPORT: &str = "bug_report";
    }

    /// Metrics
    pub mod metric {
        /// GPS fix obtained with poor accuracy
        pub const GPS_LOCK_LOW_ACCURACY: &str = "gps_lock_low_accuracy";
    }

    /// Errors
    pub mod error {
        /// Reading the current location failed
        pub const ERROR_GETTING_GEOLOCATION: &str = "error_getting_geolocation";
        /// Picking a photo from the library failed
        pub const ERROR_PICKING_PHOTO: &str = "error_picking_photo";
        /// Taking a photo with the camera failed
        pub const ERROR_TAKING_PHOTO: &str = "error_taking_photo";
    }
}

/// A single telemetry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Semantic key of the event
    pub event_type: String,

    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Metric value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_value: Option<f64>,

    /// Error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Free-form message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,

    /// GraphQL operation kind ("query", "mutation", …)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_kind: Option<String>,

    /// GraphQL operation name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_name: Option<String>,

    /// Correlation id of the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Base-64 encoded screenshot attached to a bug report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_shot: Option<String>,

    /// Device state captured when the event was created
    #[serde(flatten)]
    pub device_state: BTreeMap<String, Value>,
}

impl LogEvent {
    /// Create an event stamped with the current time
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            metric_value: None,
            error: None,
            log_message: None,
            operation_kind: None,
            query_name: None,
            correlation_id: None,
            screen_shot: None,
            device_state: BTreeMap::new(),
        }
    }

    /// Build a bug report event from its input and the captured device state
    pub fn bug_report(data: BugData, device_state: BTreeMap<String, Value>) -> Self {
        Self {
            log_message: data.details,
            screen_shot: data.screen_shot,
            device_state,
            ..Self::new(data.key)
        }
    }
}

/// Input for a metric event
#[derive(Debug, Clone, PartialEq)]
pub struct MetricData {
    /// Metric key
    pub key: String,
    /// Measured value
    pub metric: f64,
}

impl MetricData {
    /// Create metric input
    pub fn new(key: impl Into<String>, metric: f64) -> Self {
        Self { key: key.into(), metric }
    }
}

impl From<MetricData> for LogEvent {
    fn from(data: MetricData) -> Self {
        Self { metric_value: Some(data.metric), ..LogEvent::new(data.key) }
    }
}

/// Input for an error event
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorData {
    /// Error key
    pub key: String,
    /// Error message
    pub error_message: String,
}

impl ErrorData {
    /// Create error input
    pub fn new(key: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self { key: key.into(), error_message: error_message.into() }
    }
}

impl From<ErrorData> for LogEvent {
    fn from(data: ErrorData) -> Self {
        Self { error: Some(data.error_message), ..LogEvent::new(data.key) }
    }
}

/// Input for a plain event
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    /// Event key
    pub key: String,
    /// Optional message
    pub log_message: Option<String>,
}

impl EventData {
    /// Create event input without a message
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), log_message: None }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = Some(message.into());
        self
    }
}

impl From<EventData> for LogEvent {
    fn from(data: EventData) -> Self {
        Self { log_message: data.log_message, ..LogEvent::new(data.key) }
    }
}

/// Input for a network query timing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryData {
    /// Metric key
    pub key: String,
    /// Duration or other measured value
    pub metric: f64,
    /// Operation kind
    pub operation_kind: Option<String>,
    /// Operation name
    pub query_name: Option<String>,
    /// Correlation id
    pub correlation_id: Option<String>,
}

impl From<QueryData> for LogEvent {
    fn from(data: QueryData) -> Self {
        Self {
            metric_value: Some(data.metric),
            operation_kind: data.operation_kind,
            query_name: data.query_name,
            correlation_id: data.correlation_id,
            ..LogEvent::new(data.key)
        }
    }
}

/// Input for a bug report
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BugData {
    /// Event key, usually [`keys::event::BUG_REPORT`]
    pub key: String,
    /// What the user described
    pub details: Option<String>,
    /// Base-64 encoded screenshot
    pub screen_shot: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_event() {
        let event = LogEvent::from(MetricData::new("m1", 5.0));
        assert_eq!(event.event_type, "m1");
        assert_eq!(event.metric_value, Some(5.0));
        assert!(event.timestamp > 0);
    }

    #[test]
    fn test_serializes_camel_case_without_empty_fields() {
        let mut event = LogEvent::from(QueryData {
            key: "query_ms".to_string(),
            metric: 123.0,
            operation_kind: Some("query".to_string()),
            query_name: Some("myQuery".to_string()),
            correlation_id: None,
        });
        event.timestamp = 1_000;

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "eventType": "query_ms",
                "timestamp": 1000,
                "metricValue": 123.0,
                "operationKind": "query",
                "queryName": "myQuery",
            })
        );
    }

    #[test]
    fn test_error_and_event_inputs() {
        let error = LogEvent::from(ErrorData::new(keys::error::ERROR_TAKING_PHOTO, "camera busy"));
        assert_eq!(error.error.as_deref(), Some("camera busy"));

        let plain = LogEvent::from(EventData::new("opened").with_message("from push"));
        assert_eq!(plain.log_message.as_deref(), Some("from push"));

        let bare = LogEvent::from(EventData::new("opened"));
        assert!(bare.log_message.is_none());
    }

    #[test]
    fn test_bug_report_keeps_device_state() {
        let mut state = BTreeMap::new();
        state.insert("isAirplaneMode".to_string(), json!("false"));

        let event = LogEvent::bug_report(
            BugData {
                key: keys::event::BUG_REPORT.to_string(),
                details: Some("broken screen".to_string()),
                screen_shot: Some("1234abcd".to_string()),
            },
            state,
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventType"], "bug_report");
        assert_eq!(value["logMessage"], "broken screen");
        assert_eq!(value["screenShot"], "1234abcd");
        assert_eq!(value["isAirplaneMode"], "false");
    }

    #[test]
    fn test_deserializes_stored_record() {
        let stored = json!({
            "eventType": "bug_report",
            "timestamp": 1700000000000i64,
            "logMessage": "details",
            "usedMemory": 1024,
        });

        let event: LogEvent = serde_json::from_value(stored).unwrap();
        assert_eq!(event.event_type, "bug_report");
        assert_eq!(event.timestamp, 1_700_000_000_000);
        assert_eq!(event.device_state.get("usedMemory"), Some(&json!(1024)));
        assert!(event.metric_value.is_none());
    }
}
