//! Durable FIFO queue of pending records
//!
//! Records are kept as a single JSON array under one fixed key. Every
//! mutation is a read-modify-write of that array, serialized through an
//! async mutex so that overlapping appends never lose each other's records.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::kv::{KvError, KvStore};

/// Key under which pending log events are stored
pub const DEFAULT_QUEUE_KEY: &str = "log_events";

/// Default number of records kept before the oldest are dropped
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// Queue error types
#[derive(Debug, Error)]
pub enum QueueError {
    /// Underlying key-value store failed
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),

    /// Blocking disk sync task failed to complete
    #[error("Sync task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Persistent queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Storage key holding the serialized queue
    pub key: String,
    /// Maximum number of records retained (None for unbounded)
    pub max_items: Option<usize>,
    /// Force a disk sync before append/clear resolve
    pub sync_on_write: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_QUEUE_KEY.to_string(),
            max_items: Some(DEFAULT_MAX_ITEMS),
            sync_on_write: true,
        }
    }
}

impl QueueConfig {
    /// Create a configuration with a custom key
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Default::default() }
    }

    /// Set the capacity (None disables the cap)
    pub fn max_items(mut self, max_items: Option<usize>) -> Self {
        self.max_items = max_items;
        self
    }

    /// Enable or disable the disk sync after each write
    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        self.sync_on_write = enabled;
        self
    }
}

/// Durable store for records that still have to be delivered
#[async_trait]
pub trait QueueStore<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Read every stored record, oldest first
    async fn load(&self) -> Result<Vec<T>>;

    /// Append records behind the ones already stored
    async fn append(&self, items: Vec<T>) -> Result<()>;

    /// Remove every stored record
    async fn clear(&self) -> Result<()>;
}

/// Queue persisted in a [`KvStore`]
pub struct PersistentQueue<T> {
    kv: KvStore,
    config: QueueConfig,
    write_lock: Mutex<()>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> PersistentQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a queue on top of an open store
    pub fn new(kv: KvStore, config: QueueConfig) -> Self {
        Self { kv, config, write_lock: Mutex::new(()), _phantom: PhantomData }
    }

    /// Get the queue configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Number of records currently stored
    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    /// Check whether nothing is stored
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Read the stored array, treating unreadable data as an empty queue
    fn read_records(&self) -> Result<Vec<T>> {
        match self.kv.get::<Vec<T>>(&self.config.key) {
            Ok(Some(records)) => Ok(records),
            Ok(None) => Ok(Vec::new()),
            Err(KvError::Serialization(e)) => {
                tracing::warn!(
                    key = %self.config.key,
                    error = %e,
                    "Stored queue is unreadable, treating it as empty"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sync(&self) -> Result<()> {
        if !self.config.sync_on_write {
            return Ok(());
        }

        let kv = self.kv.clone();
        tokio::task::spawn_blocking(move || kv.flush()).await??;
        Ok(())
    }
}

#[async_trait]
impl<T> QueueStore<T> for PersistentQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> Result<Vec<T>> {
        let _guard = self.write_lock.lock().await;
        self.read_records()
    }

    async fn append(&self, items: Vec<T>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let mut records = self.read_records()?;
        records.extend(items);

        if let Some(max) = self.config.max_items {
            if records.len() > max {
                let overflow = records.len() - max;
                records.drain(..overflow);
                tracing::warn!(
                    key = %self.config.key,
                    dropped = overflow,
                    max,
                    "Pending queue over capacity, dropped oldest records"
                );
            }
        }

        self.kv.set(&self.config.key, &records)?;
        self.sync().await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.kv.remove(&self.config.key)? {
            self.sync().await?;
        }
        Ok(())
    }
}
