//! In-memory registry of detected scan results.
//!
//! The pipeline reports each detection once; consumers that want to act
//! on the value later (product lookup, audit, UI history) record it
//! here, keyed by session, and subscribe to live updates.

use caja_core::time::Timestamp;
use caja_core::{BarcodeFormat, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session_id must not be empty")]
    InvalidSessionId,
    #[error("raw_value must not be empty")]
    InvalidRawValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub session_id: SessionId,
    pub raw_value: String,
    pub format: Option<BarcodeFormat>,
    pub timestamp: Timestamp,
}

#[derive(Clone)]
pub struct ScanRegistry {
    records: Arc<RwLock<HashMap<String, ScanRecord>>>,
    latest: Arc<RwLock<Option<ScanRecord>>>,
    tx: broadcast::Sender<ScanRecord>,
}

impl ScanRegistry {
    pub fn new(channel_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity);
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            latest: Arc::new(RwLock::new(None)),
            tx,
        }
    }

    pub async fn record(
        &self,
        session_id: impl AsRef<str>,
        raw_value: impl AsRef<str>,
        format: Option<BarcodeFormat>,
    ) -> Result<ScanRecord, RegistryError> {
        let session_id = normalize_session_id(session_id.as_ref())?;
        let raw_value = normalize_raw_value(raw_value.as_ref())?;

        let record = ScanRecord {
            session_id: SessionId(session_id.clone()),
            raw_value,
            format,
            timestamp: Timestamp::now(),
        };

        self.records
            .write()
            .await
            .insert(session_id, record.clone());
        *self.latest.write().await = Some(record.clone());
        let _ = self.tx.send(record.clone());
        Ok(record)
    }

    pub async fn get(&self, session_id: &str) -> Option<ScanRecord> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return None;
        }
        self.records.read().await.get(session_id).cloned()
    }

    /// Most recently recorded scan, across all sessions.
    pub async fn latest(&self) -> Option<ScanRecord> {
        self.latest.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanRecord> {
        self.tx.subscribe()
    }
}

impl Default for ScanRegistry {
    fn default() -> Self {
        Self::new(1024)
    }
}

fn normalize_session_id(session_id: &str) -> Result<String, RegistryError> {
    let normalized = session_id.trim();
    if normalized.is_empty() {
        return Err(RegistryError::InvalidSessionId);
    }
    Ok(normalized.to_string())
}

fn normalize_raw_value(raw_value: &str) -> Result<String, RegistryError> {
    let normalized = raw_value.trim();
    if normalized.is_empty() {
        return Err(RegistryError::InvalidRawValue);
    }
    Ok(normalized.to_string())
}
