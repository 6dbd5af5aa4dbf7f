//! Queue reactor: mirrors records into the snapshot bucket and advances their status.
//!
//! `NEW` and `UPDATED` notifications are reconciled: the current record is
//! archived, then moved to `UPDATE_COMPLETED` only if its stored status still
//! equals the notified one. `FAILED` and `DELETED` notifications, and any
//! message that could not be processed, are deferred by hiding the message
//! for five minutes and reporting it as a batch item failure.

use std::time::Duration;

use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent, SqsMessage};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::clients::{Services, Transition};
use crate::common::config::Settings;
use crate::common::errors::Error;
use crate::common::utils::queue_url_from_arn;
use crate::common::{Record, Status};

pub const VISIBILITY_EXTENSION: Duration = Duration::from_secs(5 * 60);
pub const EXPIRY_WINDOW_MINUTES: i64 = 5;

/// The parts of an SQS record the reactor looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: Option<String>,
    pub receipt_handle: Option<String>,
    pub body: Option<String>,
    pub event_source_arn: Option<String>,
}

impl From<SqsMessage> for Delivery {
    fn from(message: SqsMessage) -> Self {
        Self {
            message_id: message.message_id,
            receipt_handle: message.receipt_handle,
            body: message.body,
            event_source_arn: message.event_source_arn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Reconciled(Transition),
    /// The record was deleted before the notification arrived.
    Missing,
    /// Statuses that need no work.
    Ignored(Status),
    Deferred,
}

pub fn snapshot_key(prefix: &str, id: i64) -> String {
    format!("{prefix}data_{id}.json")
}

pub async fn process_event(
    event: SqsEvent,
    services: &Services,
    settings: &Settings,
) -> SqsBatchResponse {
    process_deliveries(
        event.records.into_iter().map(Delivery::from),
        services,
        settings,
        Utc::now(),
    )
    .await
}

/// Handles each delivery in order; deferred ones come back as batch item failures.
pub async fn process_deliveries(
    deliveries: impl IntoIterator<Item = Delivery>,
    services: &Services,
    settings: &Settings,
    now: DateTime<Utc>,
) -> SqsBatchResponse {
    let mut batch_item_failures = Vec::new();

    for delivery in deliveries {
        let message_id = delivery.message_id.as_deref().unwrap_or("unknown");
        info!("Message body: {}", delivery.body.as_deref().unwrap_or_default());

        let outcome = match handle_delivery(&delivery, services, settings, now).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Error processing message {message_id}: {err}");
                Outcome::Deferred
            }
        };

        if outcome != Outcome::Deferred {
            continue;
        }

        match defer(&delivery, services, settings).await {
            Ok(()) => info!("Message {message_id} visibility timeout set to 5 minutes"),
            Err(err) => error!("Could not defer message {message_id}: {err}"),
        }

        match &delivery.message_id {
            Some(id) => batch_item_failures.push(BatchItemFailure {
                item_identifier: id.clone(),
            }),
            None => warn!("Deferred message has no id, it cannot be reported"),
        }
    }

    SqsBatchResponse {
        batch_item_failures,
    }
}

pub async fn handle_delivery(
    delivery: &Delivery,
    services: &Services,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<Outcome, Error> {
    let body = delivery
        .body
        .as_deref()
        .ok_or_else(|| Error::Validation("Message has no body".into()))?;
    let record: Record =
        serde_json::from_str(body).map_err(|err| Error::Validation(err.to_string()))?;

    match record.status {
        Status::New | Status::Updated => {
            reconcile(record.id, record.status, services, settings, now).await
        }
        Status::Failed | Status::Deleted => Ok(Outcome::Deferred),
        status @ (Status::Created | Status::UpdateCompleted) => Ok(Outcome::Ignored(status)),
    }
}

/// Archives the current record, then advances it to `UPDATE_COMPLETED` if it is still `from`.
pub async fn reconcile(
    id: i64,
    from: Status,
    services: &Services,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<Outcome, Error> {
    let Some(current) = services.store.get(id).await? else {
        warn!("Record {id} no longer exists, nothing to reconcile");
        return Ok(Outcome::Missing);
    };

    let key = snapshot_key(&settings.snapshot_prefix, id);
    services
        .archive
        .put_snapshot(&key, serde_json::to_vec(&current)?)
        .await?;
    info!("Data for Id={id} successfully written to {key}");

    let expiry = (now + chrono::Duration::minutes(EXPIRY_WINDOW_MINUTES))
        .with_timezone(&settings.expiry_time_zone)
        .fixed_offset();
    let transition = services
        .store
        .transition(id, from, Status::UpdateCompleted, expiry)
        .await?;

    match transition {
        Transition::Applied => info!(
            "Status for Id={id} successfully updated to {}",
            Status::UpdateCompleted
        ),
        Transition::Skipped => info!("Status for Id={id} is no longer {from}, skipping"),
    }

    Ok(Outcome::Reconciled(transition))
}

async fn defer(delivery: &Delivery, services: &Services, settings: &Settings) -> Result<(), Error> {
    let receipt_handle = delivery
        .receipt_handle
        .as_deref()
        .ok_or_else(|| Error::Validation("Message has no receipt handle".into()))?;

    let queue_url = delivery
        .event_source_arn
        .as_deref()
        .and_then(queue_url_from_arn)
        .unwrap_or_else(|| settings.queue_url.clone());
    if queue_url.is_empty() {
        return Err(Error::Validation("No queue url to defer the message on".into()));
    }

    services
        .queue
        .extend_visibility(&queue_url, receipt_handle, VISIBILITY_EXTENSION)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::{MemoryArchive, MemoryQueue, MemoryRecordStore};
    use crate::clients::RecordStore;
    use chrono::TimeZone;

    const ARN: &str = "arn:aws:sqs:ap-south-1:662674611977:sqs-queue";

    fn delivery(id: &str, body: &str) -> Delivery {
        Delivery {
            message_id: Some(id.into()),
            receipt_handle: Some(format!("receipt-{id}")),
            body: Some(body.into()),
            event_source_arn: Some(ARN.into()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn snapshot_key_is_derived_from_the_id() {
        assert_eq!(snapshot_key("", 17), "data_17.json");
        assert_eq!(snapshot_key("wandu/", 17), "wandu/data_17.json");
    }

    #[tokio::test]
    async fn expiry_is_five_minutes_ahead_in_the_configured_zone() {
        let store = MemoryRecordStore::with_records([Record::new(1, Status::New, now())]).await;
        let services = Services::new(store.clone(), MemoryQueue::new(), MemoryArchive::new());

        reconcile(1, Status::New, &services, &Settings::default(), now())
            .await
            .unwrap();

        let expiry = store.get(1).await.unwrap().unwrap().expiry.unwrap();
        assert_eq!(expiry.to_rfc3339(), "2024-06-01T17:35:00+05:30");
    }

    #[tokio::test]
    async fn missing_record_writes_nothing() {
        let archive = MemoryArchive::new();
        let services = Services::new(MemoryRecordStore::new(), MemoryQueue::new(), archive.clone());

        let outcome = reconcile(3, Status::Updated, &services, &Settings::default(), now())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Missing);
        assert!(archive.writes().await.is_empty());
    }

    #[tokio::test]
    async fn terminal_statuses_do_not_read_the_store() {
        let services = Services::new(MemoryRecordStore::new(), MemoryQueue::new(), MemoryArchive::new());
        let body = r#"{"id": 8, "status": "FAILED", "time": "2024-06-01T12:00:00Z"}"#;

        let outcome = handle_delivery(&delivery("m-1", body), &services, &Settings::default(), now())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Deferred);
    }

    #[tokio::test]
    async fn completed_statuses_are_acknowledged() {
        let queue = MemoryQueue::new();
        let services = Services::new(MemoryRecordStore::new(), queue.clone(), MemoryArchive::new());
        let body = r#"{"id": 8, "status": "UPDATE_COMPLETED", "time": "2024-06-01T12:00:00Z"}"#;

        let response =
            process_deliveries([delivery("m-1", body)], &services, &Settings::default(), now()).await;

        assert!(response.batch_item_failures.is_empty());
        assert!(queue.visibility_changes().await.is_empty());
    }

    #[tokio::test]
    async fn undecodable_message_is_deferred_on_the_source_queue() {
        let queue = MemoryQueue::new();
        let services = Services::new(MemoryRecordStore::new(), queue.clone(), MemoryArchive::new());

        let response =
            process_deliveries([delivery("m-9", "not json")], &services, &Settings::default(), now())
                .await;

        assert_eq!(response.batch_item_failures.len(), 1);
        assert_eq!(response.batch_item_failures[0].item_identifier, "m-9");

        let changes = queue.visibility_changes().await;
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].queue_url,
            "https://sqs.ap-south-1.amazonaws.com/662674611977/sqs-queue"
        );
        assert_eq!(changes[0].receipt_handle, "receipt-m-9");
        assert_eq!(changes[0].timeout, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn configured_queue_url_is_the_fallback() {
        let queue = MemoryQueue::new();
        let services = Services::new(MemoryRecordStore::new(), queue.clone(), MemoryArchive::new());
        let settings = Settings {
            queue_url: "https://sqs.ap-south-1.amazonaws.com/1/fallback".into(),
            ..Settings::default()
        };
        let mut message = delivery("m-2", r#"{"id": 1, "status": "DELETED", "time": "2024-06-01T12:00:00Z"}"#);
        message.event_source_arn = None;

        process_deliveries([message], &services, &settings, now()).await;

        let changes = queue.visibility_changes().await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].queue_url, settings.queue_url);
    }

    #[test]
    fn sqs_message_fields_are_carried_over() {
        let message = SqsMessage {
            message_id: Some("abc".into()),
            receipt_handle: Some("handle".into()),
            body: Some("{}".into()),
            event_source_arn: Some(ARN.into()),
            ..Default::default()
        };

        assert_eq!(
            Delivery::from(message),
            Delivery {
                message_id: Some("abc".into()),
                receipt_handle: Some("handle".into()),
                body: Some("{}".into()),
                event_source_arn: Some(ARN.into()),
            }
        );
    }
}
