//! Device information lookup
//!
//! The logger annotates every delivered event with device context. Some of
//! it is known immediately ([`DeviceIdentity`]), the rest has to be queried
//! from the platform and may fail or never be available on a given OS.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Device lookup error types
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform cannot provide this field
    #[error("Device field unavailable: {0}")]
    Unavailable(&'static str),

    /// The platform query itself failed
    #[error("Device query failed: {0}")]
    Query(String),
}

/// Result type for device lookups
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Device fields that require an asynchronous platform query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceField {
    /// Android API level
    ApiLevel,
    /// Enabled location providers
    AvailableLocationProviders,
    /// OS build id
    BuildId,
    /// Mobile carrier name
    Carrier,
    /// OS code name
    CodeName,
    /// Board/device name
    Device,
    /// Build display id
    Display,
    /// User-visible device name
    DeviceName,
    /// First install time (ms since epoch)
    FirstInstallTime,
    /// Free disk storage in bytes
    FreeDiskStorage,
    /// Hardware name
    Hardware,
    /// Build host
    Host,
    /// Incremental build version
    Incremental,
    /// Installer package name
    InstallerPackageName,
    /// Install referrer
    InstallReferrer,
    /// Last update time (ms since epoch)
    LastUpdateTime,
    /// Manufacturer
    Manufacturer,
    /// Product name
    Product,
    /// Build tags
    Tags,
    /// Build type
    DeviceType,
    /// Web view user agent
    UserAgent,
    /// Whether running in an emulator
    IsEmulator,
    /// Supported ABIs
    SupportedAbis,
    /// Memory used by the app in bytes
    UsedMemory,
    /// Airplane mode enabled
    IsAirplaneMode,
    /// Battery currently charging
    IsBatteryCharging,
    /// Location services enabled
    IsLocationEnabled,
}

impl DeviceField {
    /// Fields resolved once by the logger's `init`
    pub const CONTEXT: [DeviceField; 23] = [
        DeviceField::ApiLevel,
        DeviceField::AvailableLocationProviders,
        DeviceField::BuildId,
        DeviceField::Carrier,
        DeviceField::CodeName,
        DeviceField::Device,
        DeviceField::Display,
        DeviceField::DeviceName,
        DeviceField::FirstInstallTime,
        DeviceField::FreeDiskStorage,
        DeviceField::Hardware,
        DeviceField::Host,
        DeviceField::Incremental,
        DeviceField::InstallerPackageName,
        DeviceField::InstallReferrer,
        DeviceField::LastUpdateTime,
        DeviceField::Manufacturer,
        DeviceField::Product,
        DeviceField::Tags,
        DeviceField::DeviceType,
        DeviceField::UserAgent,
        DeviceField::IsEmulator,
        DeviceField::SupportedAbis,
    ];

    /// Fields captured at the moment a bug is reported
    pub const BUG_REPORT: [DeviceField; 4] = [
        DeviceField::UsedMemory,
        DeviceField::IsAirplaneMode,
        DeviceField::IsBatteryCharging,
        DeviceField::IsLocationEnabled,
    ];

    /// Key used for this field in delivered payloads
    pub fn key(&self) -> &'static str {
        match self {
            DeviceField::ApiLevel => "apiLevel",
            DeviceField::AvailableLocationProviders => "availableLocationProviders",
            DeviceField::BuildId => "buildId",
            DeviceField::Carrier => "carrier",
            DeviceField::CodeName => "codeName",
            DeviceField::Device => "device",
            DeviceField::Display => "display",
            DeviceField::DeviceName => "devicename",
            DeviceField::FirstInstallTime => "firstInstallTime",
            DeviceField::FreeDiskStorage => "freeDiskStorage",
            DeviceField::Hardware => "hardware",
            DeviceField::Host => "host",
            DeviceField::Incremental => "incremental",
            DeviceField::InstallerPackageName => "installerPackageName",
            DeviceField::InstallReferrer => "installReferrer",
            DeviceField::LastUpdateTime => "lastUpdateTime",
            DeviceField::Manufacturer => "manufacturer",
            DeviceField::Product => "product",
            DeviceField::Tags => "tags",
            DeviceField::DeviceType => "type",
            DeviceField::UserAgent => "userAgent",
            DeviceField::IsEmulator => "isEmulator",
            DeviceField::SupportedAbis => "supportedAbis",
            DeviceField::UsedMemory => "usedMemory",
            DeviceField::IsAirplaneMode => "isAirplaneMode",
            DeviceField::IsBatteryCharging => "isBatteryCharging",
            DeviceField::IsLocationEnabled => "isLocationEnabled",
        }
    }

    /// Structured fields the collector expects as a JSON-encoded string
    pub fn is_json_encoded(&self) -> bool {
        matches!(self, DeviceField::AvailableLocationProviders | DeviceField::SupportedAbis)
    }
}

/// Device information available without a platform round-trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Application display name
    pub application_name: Option<String>,
    /// Device brand
    pub brand: Option<String>,
    /// App build number
    pub build_number: Option<String>,
    /// App bundle identifier
    pub bundle_id: Option<String>,
    /// Device model identifier
    pub device_id: Option<String>,
    /// Marketing model name
    pub model: Option<String>,
    /// Version plus build number
    pub readable_version: Option<String>,
    /// OS version
    pub system_version: Option<String>,
    /// App version
    pub version: Option<String>,
    /// Whether the device is a tablet
    pub is_tablet: Option<bool>,
}

/// Battery and power-saving state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerState {
    /// Low power mode active
    pub low_power_mode: Option<bool>,
    /// Battery level between 0.0 and 1.0
    pub battery_level: Option<f64>,
    /// Battery state ("charging", "unplugged", …)
    pub battery_state: Option<String>,
}

/// Platform device-information collaborator
#[async_trait]
pub trait DeviceInfoProvider: Send + Sync {
    /// Fields known without suspending
    fn identity(&self) -> DeviceIdentity;

    /// Query one device field
    async fn read(&self, field: DeviceField) -> Result<serde_json::Value>;

    /// Query the current power state
    async fn power_state(&self) -> Result<PowerState>;
}

/// Device info backed by fixed values
///
/// Used on platforms where the values are known up front and in tests.
/// Fields that were never set report [`PlatformError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceInfo {
    identity: DeviceIdentity,
    fields: HashMap<DeviceField, serde_json::Value>,
    power: Option<PowerState>,
}

impl StaticDeviceInfo {
    /// Create a provider with only an identity
    pub fn new(identity: DeviceIdentity) -> Self {
        Self { identity, ..Default::default() }
    }

    /// Set a queried field
    pub fn with_field(mut self, field: DeviceField, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Set the power state
    pub fn with_power_state(mut self, power: PowerState) -> Self {
        self.power = Some(power);
        self
    }
}

#[async_trait]
impl DeviceInfoProvider for StaticDeviceInfo {
    fn identity(&self) -> DeviceIdentity {
        self.identity.clone()
    }

    async fn read(&self, field: DeviceField) -> Result<serde_json::Value> {
        self.fields.get(&field).cloned().ok_or(PlatformError::Unavailable(field.key()))
    }

    async fn power_state(&self) -> Result<PowerState> {
        self.power.clone().ok_or(PlatformError::Unavailable("powerState"))
    }
}
