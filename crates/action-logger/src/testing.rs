//! Test doubles shared by the unit tests

use app_platform::{DeviceField, DeviceIdentity, DeviceInfoProvider, PowerState, StaticDeviceInfo};
use async_trait::async_trait;
use networking::{DeliveryError, DeliveryTransport, FetchParams};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::{KvError, KvStore, PersistentQueue, QueueConfig, QueueError, QueueStore};
use tokio::sync::Semaphore;

use crate::events::LogEvent;

mockall::mock! {
    pub Transport {}

    #[async_trait]
    impl DeliveryTransport for Transport {
        async fn send(
            &self,
            endpoint: &str,
            params: &FetchParams,
            events: &[Value],
        ) -> Result<(), DeliveryError>;
    }
}

/// In-memory sled-backed queue
pub fn memory_store() -> Arc<PersistentQueue<LogEvent>> {
    let kv = KvStore::in_memory().unwrap();
    Arc::new(PersistentQueue::new(kv, QueueConfig::default()))
}

/// Transport that records every attempt
///
/// A gated transport blocks each attempt until [`RecordingTransport::release`]
/// hands out a permit for it.
pub struct RecordingTransport {
    failing: AtomicBool,
    gate: Option<Semaphore>,
    sent: Mutex<Vec<Vec<Value>>>,
}

impl RecordingTransport {
    pub fn succeeding() -> Self {
        Self { failing: AtomicBool::new(false), gate: None, sent: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        let transport = Self::succeeding();
        transport.set_failing(true);
        transport
    }

    pub fn gated() -> Self {
        Self { gate: Some(Semaphore::new(0)), ..Self::succeeding() }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn release(&self, attempts: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(attempts);
        }
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn sent(&self) -> Vec<Vec<Value>> {
        self.sent.lock().clone()
    }

    /// Event types of every attempted batch
    pub fn sent_types(&self) -> Vec<Vec<String>> {
        self.sent
            .lock()
            .iter()
            .map(|batch| {
                batch
                    .iter()
                    .map(|e| e["eventType"].as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .collect()
    }

    pub async fn wait_for_attempts(&self, attempts: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.attempts() < attempts {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("transport was never called");
    }
}

#[async_trait]
impl DeliveryTransport for RecordingTransport {
    async fn send(
        &self,
        _endpoint: &str,
        _params: &FetchParams,
        events: &[Value],
    ) -> Result<(), DeliveryError> {
        self.sent.lock().push(events.to_vec());

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        if self.failing.load(Ordering::SeqCst) {
            Err(DeliveryError::Status { status: 503, body: "unavailable".to_string() })
        } else {
            Ok(())
        }
    }
}

/// Queue store whose every operation fails
pub struct FailingStore;

fn storage_error() -> QueueError {
    let parse = serde_json::from_str::<Value>("{").unwrap_err();
    QueueError::Storage(KvError::Serialization(parse))
}

#[async_trait]
impl QueueStore<LogEvent> for FailingStore {
    async fn load(&self) -> storage::queue::Result<Vec<LogEvent>> {
        Err(storage_error())
    }

    async fn append(&self, _items: Vec<LogEvent>) -> storage::queue::Result<()> {
        Err(storage_error())
    }

    async fn clear(&self) -> storage::queue::Result<()> {
        Err(storage_error())
    }
}

/// Device provider that never answers for the stalled fields or the power state
pub struct StallingDeviceInfo {
    inner: StaticDeviceInfo,
    stalled: Vec<DeviceField>,
}

impl StallingDeviceInfo {
    pub fn new(inner: StaticDeviceInfo, stalled: &[DeviceField]) -> Self {
        Self { inner, stalled: stalled.to_vec() }
    }
}

#[async_trait]
impl DeviceInfoProvider for StallingDeviceInfo {
    fn identity(&self) -> DeviceIdentity {
        self.inner.identity()
    }

    async fn read(&self, field: DeviceField) -> app_platform::device::Result<Value> {
        if self.stalled.contains(&field) {
            std::future::pending::<()>().await;
        }
        self.inner.read(field).await
    }

    async fn power_state(&self) -> app_platform::device::Result<PowerState> {
        std::future::pending().await
    }
}
