//! Event buffering and flush coordination
//!
//! The batcher owns the in-memory buffer and drives one flush at a time:
//! snapshot (persisted ++ buffered) → deliver → clear the store on success,
//! or append the buffered part behind the stored part on failure.
//!
//! Only one flush is ever in flight. Explicit flushes queue behind the one
//! in flight; periodic and reconnect flushes are skipped while another runs.

use networking::DeliveryTransport;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use storage::QueueStore;

use crate::events::LogEvent;
use crate::payload::SendContext;

/// What started a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Caller asked for it
    Explicit,
    /// Periodic timer
    Interval,
    /// Connectivity came back
    Reconnect,
    /// Logger is shutting down
    Shutdown,
}

impl FlushTrigger {
    /// Whether this trigger waits for an in-flight flush instead of skipping
    fn waits(&self) -> bool {
        matches!(self, FlushTrigger::Explicit | FlushTrigger::Shutdown)
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushTrigger::Explicit => write!(f, "explicit"),
            FlushTrigger::Interval => write!(f, "interval"),
            FlushTrigger::Reconnect => write!(f, "reconnect"),
            FlushTrigger::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Result of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending
    Empty,
    /// Collector accepted every pending event
    Delivered {
        /// Number of events delivered
        count: usize,
    },
    /// Delivery failed; every pending event is in the persisted queue
    Requeued {
        /// Number of events kept for retry
        count: usize,
    },
    /// Delivery failed and the buffered events could not be persisted
    Dropped {
        /// Number of events lost
        count: usize,
    },
    /// Another flush was in flight; nothing was done
    Coalesced,
}

/// In-memory buffer plus single-flight flush logic
pub struct Batcher {
    buffer: Mutex<Vec<LogEvent>>,
    store: Arc<dyn QueueStore<LogEvent>>,
    transport: Arc<dyn DeliveryTransport>,
    send_context: Arc<SendContext>,
    flush_lock: tokio::sync::Mutex<()>,
}

impl Batcher {
    /// Create a batcher
    pub fn new(
        store: Arc<dyn QueueStore<LogEvent>>,
        transport: Arc<dyn DeliveryTransport>,
        send_context: Arc<SendContext>,
    ) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            store,
            transport,
            send_context,
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Add an event to the in-memory buffer
    pub fn push(&self, event: LogEvent) {
        self.buffer.lock().push(event);
    }

    /// Number of events waiting in memory
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// The persisted queue this batcher writes to
    pub fn store(&self) -> &Arc<dyn QueueStore<LogEvent>> {
        &self.store
    }

    /// Attempt delivery of everything pending
    pub async fn flush(&self, trigger: FlushTrigger) -> FlushOutcome {
        let _guard = if trigger.waits() {
            self.flush_lock.lock().await
        } else {
            match self.flush_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::trace!(%trigger, "Flush already in flight, skipping");
                    return FlushOutcome::Coalesced;
                }
            }
        };

        self.flush_locked(trigger).await
    }

    async fn flush_locked(&self, trigger: FlushTrigger) -> FlushOutcome {
        // A store that cannot be read is left untouched: nothing from it is
        // sent, so nothing in it may be cleared.
        let persisted = match self.store.load().await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read pending queue");
                Vec::new()
            }
        };
        let buffered = std::mem::take(&mut *self.buffer.lock());

        let total = persisted.len() + buffered.len();
        if total == 0 {
            return FlushOutcome::Empty;
        }

        let delivered = match self.send_context.prepare(persisted.iter().chain(buffered.iter())) {
            Ok(Some(batch)) => {
                match self.transport.send(&batch.endpoint, &batch.params, &batch.events).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            %trigger,
                            count = total,
                            status = ?e.status(),
                            error = %e,
                            "Delivery failed, keeping events for retry"
                        );
                        false
                    }
                }
            }
            Ok(None) => {
                tracing::debug!(
                    %trigger,
                    count = total,
                    "No delivery endpoint configured, keeping events"
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    %trigger,
                    count = total,
                    error = %e,
                    "Failed to encode batch, keeping events"
                );
                false
            }
        };

        if delivered {
            if !persisted.is_empty() {
                if let Err(e) = self.store.clear().await {
                    tracing::error!(
                        count = persisted.len(),
                        error = %e,
                        "Delivered events could not be removed from the pending queue"
                    );
                }
            }
            tracing::debug!(%trigger, count = total, "Flushed events");
            return FlushOutcome::Delivered { count: total };
        }

        // The persisted part never left the store; only the buffered part
        // has to be written behind it.
        let buffered_count = buffered.len();
        match self.store.append(buffered).await {
            Ok(()) => FlushOutcome::Requeued { count: total },
            Err(e) => {
                tracing::error!(
                    dropped = buffered_count,
                    error = %e,
                    "Failed to persist undelivered events, dropping them"
                );
                FlushOutcome::Dropped { count: buffered_count }
            }
        }
    }
}
