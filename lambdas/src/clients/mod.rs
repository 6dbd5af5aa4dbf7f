//! Service seams for the record table, the notification queue and the snapshot bucket.
//!
//! Functions receive their clients through [`Services`], built once per process
//! in `main`. The AWS implementations live next to in-memory ones used by tests.

pub mod dynamodb;
pub mod memory;
pub mod s3;
pub mod sqs;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::common::errors::Error;
use crate::common::{Record, Status};

/// Outcome of a status-gated write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The stored status no longer matched, nothing was written.
    Skipped,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record, following the scan's pages to the end.
    async fn scan(&self) -> Result<Vec<Record>, Error>;

    async fn get(&self, id: i64) -> Result<Option<Record>, Error>;

    /// Fails with [`Error::Conflict`] when the id is taken.
    async fn insert(&self, record: &Record) -> Result<(), Error>;

    /// Overwrites status and time of an existing record, [`Error::NotFound`] otherwise.
    async fn update(&self, record: &Record) -> Result<(), Error>;

    /// [`Error::NotFound`] when there is nothing to delete.
    async fn delete(&self, id: i64) -> Result<(), Error>;

    /// Sets `to` and `expiry` only while the stored status equals `from`.
    async fn transition(
        &self,
        id: i64,
        from: Status,
        to: Status,
        expiry: DateTime<FixedOffset>,
    ) -> Result<Transition, Error>;
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Publishes a status-change notification, returns the message id.
    async fn publish(&self, record: &Record) -> Result<Option<String>, Error>;

    /// Keeps a received message hidden for `timeout` so it is redelivered later.
    async fn extend_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), Error>;
}

#[async_trait]
pub trait SnapshotArchive: Send + Sync {
    async fn put_snapshot(&self, key: &str, body: Vec<u8>) -> Result<(), Error>;
}

#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn RecordStore>,
    pub queue: Arc<dyn MessageQueue>,
    pub archive: Arc<dyn SnapshotArchive>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

impl Services {
    pub fn new(
        store: impl RecordStore + 'static,
        queue: impl MessageQueue + 'static,
        archive: impl SnapshotArchive + 'static,
    ) -> Self {
        Self {
            store: Arc::new(store),
            queue: Arc::new(queue),
            archive: Arc::new(archive),
        }
    }

    /// AWS-backed services sharing one SDK configuration.
    pub fn from_sdk_config(config: &aws_config::SdkConfig, settings: &crate::Settings) -> Self {
        Self::new(
            dynamodb::DynamoRecordStore::new(
                aws_sdk_dynamodb::Client::new(config),
                &settings.table_name,
            ),
            sqs::SqsQueue::new(aws_sdk_sqs::Client::new(config), &settings.queue_url),
            s3::S3Archive::new(aws_sdk_s3::Client::new(config), &settings.bucket_name),
        )
    }
}
