//! Device context resolution
//!
//! Every field is resolved independently. A field the platform cannot
//! provide, or does not answer within the query timeout, is left out; it
//! never fails the whole lookup.

use app_platform::{DeviceField, DeviceIdentity, DeviceInfoProvider};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Device context attached to delivered events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceContext {
    fields: Map<String, Value>,
}

impl DeviceContext {
    /// Context holding only the synchronously known identity fields
    pub fn from_identity(identity: &DeviceIdentity) -> Self {
        let mut fields = Map::new();
        let strings = [
            ("applicationName", &identity.application_name),
            ("brand", &identity.brand),
            ("buildNumber", &identity.build_number),
            ("bundleId", &identity.bundle_id),
            ("deviceId", &identity.device_id),
            ("model", &identity.model),
            ("readableVersion", &identity.readable_version),
            ("systemVersion", &identity.system_version),
            ("versionString", &identity.version),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                fields.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(is_tablet) = identity.is_tablet {
            fields.insert("isTablet".to_string(), flag(is_tablet));
        }

        Self { fields }
    }

    /// Resolve the identity and every context field
    ///
    /// Each field waits at most `timeout`.
    pub async fn gather(provider: &dyn DeviceInfoProvider, timeout: Duration) -> Self {
        let mut context = Self::from_identity(&provider.identity());

        let resolved = join_all(DeviceField::CONTEXT.iter().map(|field| async move {
            (*field, bounded(field.key(), timeout, provider.read(*field)).await)
        }))
        .await;

        for (field, result) in resolved {
            match result {
                Some(Ok(value)) => {
                    context.fields.insert(field.key().to_string(), encode(field, value));
                }
                Some(Err(e)) => {
                    tracing::debug!(field = field.key(), error = %e, "Device field unavailable");
                }
                None => {}
            }
        }

        context
    }

    /// Look up a resolved field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All resolved fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Number of resolved fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether nothing is known yet
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Capture the extended device state attached to a bug report
///
/// Each field, and the power state, waits at most `timeout`.
pub async fn gather_bug_state(
    provider: &dyn DeviceInfoProvider,
    timeout: Duration,
) -> BTreeMap<String, Value> {
    let reads = join_all(DeviceField::BUG_REPORT.iter().map(|field| async move {
        (*field, bounded(field.key(), timeout, provider.read(*field)).await)
    }));
    let power = bounded("powerState", timeout, provider.power_state());
    let (resolved, power) = futures::join!(reads, power);

    let mut state = BTreeMap::new();
    for (field, result) in resolved {
        match result {
            Some(Ok(value)) => {
                state.insert(field.key().to_string(), encode(field, value));
            }
            Some(Err(e)) => {
                tracing::debug!(field = field.key(), error = %e, "Bug report field unavailable");
            }
            None => {}
        }
    }

    match power {
        Some(Ok(power)) => {
            if let Some(low_power) = power.low_power_mode {
                state.insert("lowPowerMode".to_string(), flag(low_power));
            }
            if let Some(level) = power.battery_level {
                state.insert("batteryLevel".to_string(), Value::from(level));
            }
            if let Some(battery_state) = power.battery_state {
                state.insert("batteryState".to_string(), Value::String(battery_state));
            }
        }
        Some(Err(e)) => tracing::debug!(error = %e, "Power state unavailable"),
        None => {}
    }

    state
}

/// Await one platform query, giving up after `timeout`
async fn bounded<T>(key: &str, timeout: Duration, query: impl Future<Output = T>) -> Option<T> {
    match tokio::time::timeout(timeout, query).await {
        Ok(result) => Some(result),
        Err(_) => {
            let timeout_ms = timeout.as_millis() as u64;
            tracing::debug!(field = key, timeout_ms, "Device query timed out");
            None
        }
    }
}

/// Booleans are reported to the collector as "true"/"false" strings
fn flag(value: bool) -> Value {
    Value::String(value.to_string())
}

fn encode(field: DeviceField, value: Value) -> Value {
    if field.is_json_encoded() {
        return Value::String(value.to_string());
    }
    match (field, value) {
        (
            DeviceField::IsAirplaneMode
            | DeviceField::IsBatteryCharging
            | DeviceField::IsLocationEnabled,
            Value::Bool(b),
        ) => flag(b),
        (_, value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StallingDeviceInfo;
    use app_platform::{PowerState, StaticDeviceInfo};
    use serde_json::json;

    const WAIT: Duration = Duration::from_secs(1);

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            application_name: Some("Field App".to_string()),
            brand: Some("google".to_string()),
            version: Some("1.2.0".to_string()),
            is_tablet: Some(false),
            ..Default::default()
        }
    }

    #[test]
    fn test_identity_fields() {
        let context = DeviceContext::from_identity(&identity());

        assert_eq!(context.get("applicationName"), Some(&json!("Field App")));
        assert_eq!(context.get("versionString"), Some(&json!("1.2.0")));
        assert_eq!(context.get("isTablet"), Some(&json!("false")));
        assert!(context.get("model").is_none());
        assert_eq!(context.len(), 4);
    }

    #[tokio::test]
    async fn test_gather_skips_unavailable_fields() {
        let provider = StaticDeviceInfo::new(identity())
            .with_field(DeviceField::Carrier, "T-Mobile")
            .with_field(DeviceField::ApiLevel, 30)
            .with_field(DeviceField::IsEmulator, false);

        let context = DeviceContext::gather(&provider, WAIT).await;

        assert_eq!(context.get("carrier"), Some(&json!("T-Mobile")));
        assert_eq!(context.get("apiLevel"), Some(&json!(30)));
        assert_eq!(context.get("isEmulator"), Some(&json!(false)));
        assert!(context.get("hardware").is_none());
        assert_eq!(context.len(), 7);
    }

    #[tokio::test]
    async fn test_gather_json_encodes_structured_fields() {
        let provider = StaticDeviceInfo::default()
            .with_field(DeviceField::SupportedAbis, json!(["arm64-v8a", "armeabi-v7a"]))
            .with_field(DeviceField::AvailableLocationProviders, json!({"gps": true}));

        let context = DeviceContext::gather(&provider, WAIT).await;

        assert_eq!(context.get("supportedAbis"), Some(&json!("[\"arm64-v8a\",\"armeabi-v7a\"]")));
        assert_eq!(context.get("availableLocationProviders"), Some(&json!("{\"gps\":true}")));
    }

    #[tokio::test]
    async fn test_gather_with_nothing_available() {
        let context = DeviceContext::gather(&StaticDeviceInfo::default(), WAIT).await;
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_bug_state_full() {
        let provider = StaticDeviceInfo::default()
            .with_field(DeviceField::UsedMemory, 4096)
            .with_field(DeviceField::IsAirplaneMode, false)
            .with_field(DeviceField::IsBatteryCharging, true)
            .with_field(DeviceField::IsLocationEnabled, true)
            .with_power_state(PowerState {
                low_power_mode: Some(false),
                battery_level: Some(0.5),
                battery_state: Some("charging".to_string()),
            });

        let state = gather_bug_state(&provider, WAIT).await;

        assert_eq!(state.get("usedMemory"), Some(&json!(4096)));
        assert_eq!(state.get("isAirplaneMode"), Some(&json!("false")));
        assert_eq!(state.get("isBatteryCharging"), Some(&json!("true")));
        assert_eq!(state.get("isLocationEnabled"), Some(&json!("true")));
        assert_eq!(state.get("lowPowerMode"), Some(&json!("false")));
        assert_eq!(state.get("batteryLevel"), Some(&json!(0.5)));
        assert_eq!(state.get("batteryState"), Some(&json!("charging")));
    }

    #[tokio::test]
    async fn test_bug_state_partial() {
        let provider = StaticDeviceInfo::default().with_field(DeviceField::IsAirplaneMode, true);

        let state = gather_bug_state(&provider, WAIT).await;

        assert_eq!(state.len(), 1);
        assert_eq!(state.get("isAirplaneMode"), Some(&json!("true")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gather_leaves_out_unanswered_field() {
        let provider = StallingDeviceInfo::new(
            StaticDeviceInfo::new(identity())
                .with_field(DeviceField::Carrier, "T-Mobile")
                .with_field(DeviceField::Hardware, "qcom"),
            &[DeviceField::Hardware],
        );

        let context = DeviceContext::gather(&provider, WAIT).await;

        assert_eq!(context.get("carrier"), Some(&json!("T-Mobile")));
        assert!(context.get("hardware").is_none());
        assert_eq!(context.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bug_state_leaves_out_unanswered_queries() {
        let provider = StallingDeviceInfo::new(
            StaticDeviceInfo::default()
                .with_field(DeviceField::UsedMemory, 4096)
                .with_field(DeviceField::IsAirplaneMode, true),
            &[DeviceField::UsedMemory],
        );

        let state = gather_bug_state(&provider, WAIT).await;

        assert_eq!(state.len(), 1);
        assert_eq!(state.get("isAirplaneMode"), Some(&json!("true")));
        assert!(state.get("usedMemory").is_none());
        assert!(state.get("batteryLevel").is_none());
    }
}
