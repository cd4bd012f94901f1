//! User action logger
//!
//! [`UserActionLogger`] is the facade the app calls into. It stamps events,
//! hands them to the [`Batcher`], resolves device context and runs the two
//! background flush triggers: a periodic timer and connectivity recovery.
//!
//! # Example
//!
//! ```rust,no_run
//! use action_logger::{LoggerBuilder, MetricData};
//! use std::sync::Arc;
//! use storage::{KvStore, PersistentQueue, QueueConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let kv = KvStore::in_memory()?;
//! let logger = LoggerBuilder::new()
//!     .store(Arc::new(PersistentQueue::new(kv, QueueConfig::default())))
//!     .base_url("https://collector.example.com/logs")
//!     .build()?;
//!
//! logger.init().await;
//! logger.log_metric(MetricData::new("screen_load_ms", 182.0));
//! logger.flush().await;
//! # Ok(())
//! # }
//! ```

use app_platform::{ConnectivityMonitor, DeviceInfoProvider, StaticDeviceInfo};
use networking::{DeliveryTransport, FetchParams, HttpTransport, TransportConfig};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::QueueStore;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::batcher::{Batcher, FlushOutcome, FlushTrigger};
use crate::context::{gather_bug_state, DeviceContext};
use crate::error::{LoggerError, Result};
use crate::events::{BugData, ErrorData, EventData, LogEvent, MetricData, QueryData};
use crate::payload::{DeliverySettings, SendContext, DEFAULT_EVENT_PREFIX};

/// Default time between periodic flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Default limit on a single device-information query
pub const DEFAULT_DEVICE_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Configuration
// =============================================================================

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Time between periodic flushes
    pub flush_interval: Duration,
    /// Prefix of delivered event names (empty for none)
    pub event_prefix: String,
    /// Longest wait for one device field; slower fields are left out
    pub device_query_timeout: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            event_prefix: DEFAULT_EVENT_PREFIX.to_string(),
            device_query_timeout: DEFAULT_DEVICE_QUERY_TIMEOUT,
        }
    }
}

impl LoggerConfig {
    /// Set the periodic flush interval
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the event name prefix
    pub fn with_event_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.event_prefix = prefix.into();
        self
    }

    /// Set the per-field device query timeout
    pub fn with_device_query_timeout(mut self, timeout: Duration) -> Self {
        self.device_query_timeout = timeout;
        self
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`UserActionLogger`]
///
/// Only the queue store is required. Without a transport the logger posts
/// with a default [`HttpTransport`]; without a connectivity monitor it relies
/// on the periodic timer alone.
#[derive(Default)]
pub struct LoggerBuilder {
    config: LoggerConfig,
    store: Option<Arc<dyn QueueStore<LogEvent>>>,
    transport: Option<Arc<dyn DeliveryTransport>>,
    connectivity: Option<Arc<dyn ConnectivityMonitor>>,
    device: Option<Arc<dyn DeviceInfoProvider>>,
    settings: DeliverySettings,
}

impl LoggerBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the logger configuration
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the persisted queue
    pub fn store(mut self, store: Arc<dyn QueueStore<LogEvent>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the delivery transport
    pub fn transport(mut self, transport: Arc<dyn DeliveryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Flush automatically whenever this monitor reports a reconnect
    pub fn connectivity(mut self, monitor: Arc<dyn ConnectivityMonitor>) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    /// Set the device information source
    pub fn device_info(mut self, provider: Arc<dyn DeviceInfoProvider>) -> Self {
        self.device = Some(provider);
        self
    }

    /// Set the collector endpoint
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.settings.base_url = Some(base_url.into());
        self
    }

    /// Set the request parameters
    pub fn fetch_params(mut self, params: FetchParams) -> Self {
        self.settings.fetch_params = params;
        self
    }

    /// Set the custom payload merged into every event
    pub fn custom_payload(mut self, payload: BTreeMap<String, String>) -> Self {
        self.settings.custom_payload = payload;
        self
    }

    /// Build the logger and start its background tasks
    ///
    /// Must be called from within a tokio runtime. The flush interval must
    /// be non-zero.
    pub fn build(self) -> Result<UserActionLogger> {
        let runtime = Handle::try_current().map_err(|_| LoggerError::NoRuntime)?;
        if self.config.flush_interval.is_zero() {
            return Err(LoggerError::InvalidFlushInterval);
        }
        let store = self.store.ok_or(LoggerError::MissingStore)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(TransportConfig::default())?),
        };
        let device = self.device.unwrap_or_else(|| Arc::new(StaticDeviceInfo::default()));

        let send_context = Arc::new(SendContext::new(
            self.settings,
            DeviceContext::from_identity(&device.identity()),
            self.config.event_prefix.clone(),
        ));
        let batcher = Arc::new(Batcher::new(store, transport, Arc::clone(&send_context)));

        let interval = self.config.flush_interval;
        let mut tasks = vec![spawn_interval_flush(&runtime, Arc::clone(&batcher), interval)];
        if let Some(monitor) = self.connectivity {
            tasks.push(spawn_reconnect_flush(&runtime, Arc::clone(&batcher), monitor));
        }

        tracing::debug!(interval_ms = interval.as_millis() as u64, "User action logger started");

        Ok(UserActionLogger {
            inner: Arc::new(LoggerInner {
                batcher,
                send_context,
                device,
                device_query_timeout: self.config.device_query_timeout,
                runtime,
                initialized: AtomicBool::new(false),
                init_started: AtomicBool::new(false),
                warned_uninitialized: AtomicBool::new(false),
                tasks: Mutex::new(tasks),
            }),
        })
    }
}

// =============================================================================
// Logger
// =============================================================================

struct LoggerInner {
    batcher: Arc<Batcher>,
    send_context: Arc<SendContext>,
    device: Arc<dyn DeviceInfoProvider>,
    device_query_timeout: Duration,
    runtime: Handle,
    initialized: AtomicBool,
    init_started: AtomicBool,
    warned_uninitialized: AtomicBool,
    tasks: Mutex<Vec<TaskHandle>>,
}

impl LoggerInner {
    async fn init(&self) {
        self.init_started.store(true, Ordering::SeqCst);
        let context =
            DeviceContext::gather(self.device.as_ref(), self.device_query_timeout).await;
        tracing::debug!(fields = context.len(), "Device context resolved");
        self.send_context.set_device_context(context);
        self.initialized.store(true, Ordering::SeqCst);
    }
}

/// Telemetry logger handle
///
/// Cloning is cheap and every clone drives the same buffer, queue and
/// background tasks. The tasks stop once the last clone is dropped.
#[derive(Clone)]
pub struct UserActionLogger {
    inner: Arc<LoggerInner>,
}

impl UserActionLogger {
    /// Start building a logger
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Record a metric
    pub fn log_metric(&self, data: MetricData) {
        self.enqueue(data.into());
    }

    /// Record an error
    pub fn log_error(&self, data: ErrorData) {
        self.enqueue(data.into());
    }

    /// Record a plain event
    pub fn log_event(&self, data: EventData) {
        self.enqueue(data.into());
    }

    /// Record a network query timing
    pub fn log_query(&self, data: QueryData) {
        self.enqueue(data.into());
    }

    /// Record a bug report along with the current device state
    ///
    /// Device state that cannot be read is left out of the report.
    pub async fn log_bug(&self, data: BugData) {
        let state =
            gather_bug_state(self.inner.device.as_ref(), self.inner.device_query_timeout).await;
        self.enqueue(LogEvent::bug_report(data, state));
    }

    /// Deliver everything pending now
    ///
    /// Waits for an in-flight flush to finish first, then makes its own
    /// attempt.
    pub async fn flush(&self) -> FlushOutcome {
        self.inner.batcher.flush(FlushTrigger::Explicit).await
    }

    /// Resolve the device context attached to delivered events
    pub async fn init(&self) {
        self.inner.init().await;
    }

    /// Whether [`UserActionLogger::init`] has completed
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Set the collector endpoint
    pub fn set_base_url(&self, base_url: impl Into<String>) {
        self.inner.send_context.set_base_url(base_url.into());
    }

    /// Replace the request parameters
    pub fn set_fetch_params(&self, params: FetchParams) {
        self.inner.send_context.set_fetch_params(params);
    }

    /// Replace the custom payload merged into every delivered event
    pub fn set_custom_payload(&self, payload: BTreeMap<String, String>) {
        self.inner.send_context.set_custom_payload(payload);
    }

    /// Number of events waiting in memory
    pub fn buffered(&self) -> usize {
        self.inner.batcher.buffered()
    }

    /// Stop the background tasks and flush one last time
    ///
    /// Once this returns no background flush is running or will start.
    pub async fn shutdown(&self) -> FlushOutcome {
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            task.stop().await;
        }
        self.inner.batcher.flush(FlushTrigger::Shutdown).await
    }

    fn enqueue(&self, event: LogEvent) {
        self.inner.batcher.push(event);

        if self.is_initialized() {
            return;
        }
        if !self.inner.warned_uninitialized.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                "Logging before init(), device context will be resolved in the background"
            );
        }
        if !self.inner.init_started.swap(true, Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            self.inner.runtime.spawn(async move { inner.init().await });
        }
    }
}

// =============================================================================
// Background Tasks
// =============================================================================

/// Handle to a background flush task
///
/// When dropped, the task is stopped.
struct TaskHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Stop the task and wait for it to exit
    async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            tracing::error!(error = %e, "Background flush task failed");
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn spawn_interval_flush(runtime: &Handle, batcher: Arc<Batcher>, period: Duration) -> TaskHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel();

    let handle = runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    batcher.flush(FlushTrigger::Interval).await;
                }
                _ = &mut stop_rx => {
                    break;
                }
            }
        }
    });

    TaskHandle { stop_tx: Some(stop_tx), handle }
}

fn spawn_reconnect_flush(
    runtime: &Handle,
    batcher: Arc<Batcher>,
    monitor: Arc<dyn ConnectivityMonitor>,
) -> TaskHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel();
    // Subscribe before spawning so no transition is missed
    let mut changes = monitor.subscribe();
    let mut connected = monitor.is_connected();

    let handle = runtime.spawn(async move {
        loop {
            let now_connected = tokio::select! {
                change = changes.recv() => match change {
                    Ok(state) => state.is_connected(),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(
                            skipped,
                            "Missed connectivity transitions, re-reading state"
                        );
                        monitor.is_connected()
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut stop_rx => break,
            };

            if now_connected && !connected {
                tracing::debug!("Connectivity restored, flushing pending events");
                batcher.flush(FlushTrigger::Reconnect).await;
            }
            connected = now_connected;
        }
    });

    TaskHandle { stop_tx: Some(stop_tx), handle }
}
