//! Process-wide logger
//!
//! Code that cannot be handed a [`UserActionLogger`] logs through the one
//! installed here. Call [`install`], [`get_or_init`] or [`try_get_or_init`]
//! before the first log call: the free functions never build a logger
//! themselves, and events logged while nothing is installed are discarded
//! with a warning.

use std::sync::OnceLock;

use crate::batcher::FlushOutcome;
use crate::error::{LoggerError, Result};
use crate::events::{BugData, ErrorData, EventData, MetricData, QueryData};
use crate::logger::{LoggerBuilder, UserActionLogger};

static INSTANCE: OnceLock<UserActionLogger> = OnceLock::new();

/// Install the process-wide logger
///
/// Fails if one is already installed.
pub fn install(logger: UserActionLogger) -> Result<()> {
    INSTANCE.set(logger).map_err(|_| LoggerError::AlreadyInstalled)
}

/// The installed logger, if any
pub fn instance() -> Option<&'static UserActionLogger> {
    INSTANCE.get()
}

/// The installed logger, building and installing one on first use
///
/// `builder` is only called when nothing is installed yet.
pub fn try_get_or_init<F>(builder: F) -> Result<&'static UserActionLogger>
where
    F: FnOnce() -> LoggerBuilder,
{
    if let Some(logger) = INSTANCE.get() {
        return Ok(logger);
    }

    let logger = builder().build()?;
    // Another thread may have won the race; its logger is kept and ours
    // is dropped along with its background tasks.
    let _ = INSTANCE.set(logger);
    INSTANCE.get().ok_or(LoggerError::AlreadyInstalled)
}

/// The installed logger, installing the one `init` returns on first use
pub fn get_or_init<F>(init: F) -> &'static UserActionLogger
where
    F: FnOnce() -> UserActionLogger,
{
    INSTANCE.get_or_init(init)
}

fn with_instance(op: &str, f: impl FnOnce(&UserActionLogger)) {
    match INSTANCE.get() {
        Some(logger) => f(logger),
        None => tracing::warn!(op, "No process-wide logger installed, event discarded"),
    }
}

/// Record a metric on the process-wide logger
///
/// Discarded when nothing is installed yet.
pub fn log_metric(data: MetricData) {
    with_instance("log_metric", |logger| logger.log_metric(data));
}

/// Record an error on the process-wide logger
pub fn log_error(data: ErrorData) {
    with_instance("log_error", |logger| logger.log_error(data));
}

/// Record a plain event on the process-wide logger
pub fn log_event(data: EventData) {
    with_instance("log_event", |logger| logger.log_event(data));
}

/// Record a query timing on the process-wide logger
pub fn log_query(data: QueryData) {
    with_instance("log_query", |logger| logger.log_query(data));
}

/// Record a bug report on the process-wide logger
pub async fn log_bug(data: BugData) {
    match INSTANCE.get() {
        Some(logger) => logger.log_bug(data).await,
        None => tracing::warn!("No process-wide logger installed, bug report discarded"),
    }
}

/// Flush the process-wide logger
///
/// Returns `None` when nothing is installed.
pub async fn flush() -> Option<FlushOutcome> {
    match INSTANCE.get() {
        Some(logger) => Some(logger.flush().await),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_store, RecordingTransport};
    use std::sync::Arc;

    // The slot is process-wide, so everything touching it lives in one test.
    #[tokio::test]
    async fn test_process_wide_logger() {
        log_metric(MetricData::new("before_install", 1.0));
        log_bug(BugData { key: "bug_before_install".to_string(), ..Default::default() }).await;
        assert!(instance().is_none());
        assert!(flush().await.is_none());

        let transport = Arc::new(RecordingTransport::succeeding());
        let first = try_get_or_init(|| {
            LoggerBuilder::new()
                .store(memory_store())
                .transport(transport.clone())
                .base_url("http://collector.test/logs")
        })
        .unwrap();

        let again = try_get_or_init(|| panic!("builder must not run twice")).unwrap();
        assert!(std::ptr::eq(first, again));
        assert!(std::ptr::eq(get_or_init(|| panic!("already installed")), first));

        let other = LoggerBuilder::new()
            .store(memory_store())
            .transport(transport.clone())
            .build()
            .unwrap();
        assert!(matches!(install(other), Err(LoggerError::AlreadyInstalled)));

        log_metric(MetricData::new("m1", 1.0));
        log_error(ErrorData::new("e1", "boom"));
        log_event(EventData::new("ev1"));
        log_query(QueryData { key: "q1".to_string(), metric: 3.0, ..Default::default() });
        log_bug(BugData { key: "bug_report".to_string(), ..Default::default() }).await;

        // Nothing logged before install reaches the installed logger
        assert_eq!(flush().await, Some(FlushOutcome::Delivered { count: 5 }));
        assert_eq!(transport.sent_types(), vec![vec!["m1", "e1", "ev1", "q1", "bug_report"]]);
    }
}
