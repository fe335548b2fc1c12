//! Trip history: append-only records of completed generations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::models::TripRecord;
use crate::errors::PlannerError;

#[async_trait]
pub trait TripStore: Send + Sync {
    async fn append(&self, record: TripRecord) -> Result<(), PlannerError>;

    /// Records in insertion order.
    async fn list(&self) -> Result<Vec<TripRecord>, PlannerError>;
}

#[derive(Debug, Default)]
pub struct MemoryTripStore {
    records: Mutex<Vec<TripRecord>>,
}

impl MemoryTripStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn append(&self, record: TripRecord) -> Result<(), PlannerError> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TripRecord>, PlannerError> {
        Ok(self.records.lock().await.clone())
    }
}

/// One JSON object per line. Appends are serialised through a lock.
#[derive(Debug)]
pub struct JsonlTripStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTripStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TripStore for JsonlTripStore {
    async fn append(&self, record: TripRecord) -> Result<(), PlannerError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(id = %record.id, path = %self.path.display(), "Saved trip record");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TripRecord>, PlannerError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TripRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(line = index + 1, error = %e, "Skipping unreadable trip record");
                }
            }
        }
        Ok(records)
    }
}
