//! In-memory stand-ins for the AWS clients.
//!
//! They honour the same conditional semantics as the DynamoDB implementation
//! and record everything sent to the queue and the bucket for inspection.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use tokio::sync::RwLock;

use crate::clients::dynamodb::DUPLICATE_ID_ERROR;
use crate::clients::{MessageQueue, RecordStore, SnapshotArchive, Transition};
use crate::common::errors::Error;
use crate::common::{Record, Status};

#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<BTreeMap<i64, Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        store
            .records
            .write()
            .await
            .extend(records.into_iter().map(|r| (r.id, r)));
        store
    }

    pub async fn snapshot(&self) -> Vec<Record> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn scan(&self) -> Result<Vec<Record>, Error> {
        Ok(self.snapshot().await)
    }

    async fn get(&self, id: i64) -> Result<Option<Record>, Error> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn insert(&self, record: &Record) -> Result<(), Error> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(Error::Conflict(DUPLICATE_ID_ERROR.into()));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &Record) -> Result<(), Error> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&record.id)
            .ok_or_else(|| Error::NotFound(format!("Item with id {} not found", record.id)))?;
        stored.status = record.status;
        stored.time = record.time;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), Error> {
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Item with id {id} not found")))
    }

    async fn transition(
        &self,
        id: i64,
        from: Status,
        to: Status,
        expiry: DateTime<FixedOffset>,
    ) -> Result<Transition, Error> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(stored) if stored.status == from => {
                stored.status = to;
                stored.expiry = Some(expiry);
                Ok(Transition::Applied)
            }
            _ => Ok(Transition::Skipped),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityChange {
    pub queue_url: String,
    pub receipt_handle: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    published: Arc<RwLock<Vec<Record>>>,
    visibility_changes: Arc<RwLock<Vec<VisibilityChange>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<Record> {
        self.published.read().await.clone()
    }

    pub async fn visibility_changes(&self) -> Vec<VisibilityChange> {
        self.visibility_changes.read().await.clone()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn publish(&self, record: &Record) -> Result<Option<String>, Error> {
        let mut published = self.published.write().await;
        published.push(record.clone());
        Ok(Some(format!("memory-{}", published.len())))
    }

    async fn extend_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), Error> {
        self.visibility_changes.write().await.push(VisibilityChange {
            queue_url: queue_url.into(),
            receipt_handle: receipt_handle.into(),
            timeout,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    objects: Arc<RwLock<Vec<(String, Vec<u8>)>>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write in order, including overwrites of the same key.
    pub async fn writes(&self) -> Vec<(String, Vec<u8>)> {
        self.objects.read().await.clone()
    }
}

#[async_trait]
impl SnapshotArchive for MemoryArchive {
    async fn put_snapshot(&self, key: &str, body: Vec<u8>) -> Result<(), Error> {
        self.objects.write().await.push((key.into(), body));
        Ok(())
    }
}
