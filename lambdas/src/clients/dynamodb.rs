use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use tracing::{info, warn};

use crate::clients::{RecordStore, Transition};
use crate::common::errors::Error;
use crate::common::{parse_time, Record, Status};

pub const ATTR_ID: &str = "Id";
pub const ATTR_STATUS: &str = "Status";
pub const ATTR_TIME: &str = "Time";
pub const ATTR_EXPIRY: &str = "Expiry";

pub const DUPLICATE_ID_ERROR: &str = "Error: Item with given primary key already exists.";

#[derive(Debug, Clone)]
pub struct DynamoRecordStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoRecordStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn not_found(id: i64) -> Error {
        Error::NotFound(format!("Item with id {id} not found"))
    }
}

fn key(id: i64) -> AttributeValue {
    AttributeValue::N(id.to_string())
}

impl From<&Record> for HashMap<String, AttributeValue> {
    fn from(record: &Record) -> Self {
        let mut item = HashMap::from([
            (ATTR_ID.to_string(), key(record.id)),
            (
                ATTR_STATUS.to_string(),
                AttributeValue::S(record.status.as_str().into()),
            ),
            (
                ATTR_TIME.to_string(),
                AttributeValue::S(record.time.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            ),
        ]);
        if let Some(expiry) = record.expiry {
            item.insert(
                ATTR_EXPIRY.to_string(),
                AttributeValue::S(expiry.to_rfc3339_opts(SecondsFormat::Secs, false)),
            );
        }

        item
    }
}

impl TryFrom<&HashMap<String, AttributeValue>> for Record {
    type Error = Error;

    fn try_from(item: &HashMap<String, AttributeValue>) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| Error::backend(format!("Corrupt item {item:?}: {what}"));

        let id = item
            .get(ATTR_ID)
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| corrupt("Id"))?;
        let status = item
            .get(ATTR_STATUS)
            .and_then(|v| v.as_s().ok())
            .and_then(|s| s.parse::<Status>().ok())
            .ok_or_else(|| corrupt("Status"))?;
        let time = item
            .get(ATTR_TIME)
            .and_then(|v| v.as_s().ok())
            .and_then(|s| parse_time(s))
            .ok_or_else(|| corrupt("Time"))?;
        let expiry = match item.get(ATTR_EXPIRY).and_then(|v| v.as_s().ok()) {
            Some(s) => Some(DateTime::parse_from_rfc3339(s).map_err(|_| corrupt("Expiry"))?),
            None => None,
        };

        Ok(Record {
            id,
            status,
            time,
            expiry,
        })
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn scan(&self) -> Result<Vec<Record>, Error> {
        let mut records = Vec::new();
        let mut last_evaluated_key = None;

        loop {
            let response = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(last_evaluated_key.take())
                .send()
                .await?;

            for item in response.items() {
                match Record::try_from(item) {
                    Ok(record) => records.push(record),
                    Err(err) => warn!("Skipping unreadable item: {err}"),
                }
            }

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => last_evaluated_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn get(&self, id: i64) -> Result<Option<Record>, Error> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(ATTR_ID, key(id))
            .consistent_read(true)
            .send()
            .await?;

        response.item().map(Record::try_from).transpose()
    }

    async fn insert(&self, record: &Record) -> Result<(), Error> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record.into()))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", ATTR_ID)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!("Inserted item with id: {}", record.id);
                Ok(())
            }
            Err(SdkError::ServiceError(err)) => match err.err() {
                PutItemError::ConditionalCheckFailedException(_) => {
                    warn!("Item with id {} already exists", record.id);
                    Err(Error::Conflict(DUPLICATE_ID_ERROR.into()))
                }
                _ => Err(SdkError::ServiceError(err).into()),
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn update(&self, record: &Record) -> Result<(), Error> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(ATTR_ID, key(record.id))
            .update_expression("SET #status = :status, #time = :time")
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", ATTR_ID)
            .expression_attribute_names("#status", ATTR_STATUS)
            .expression_attribute_names("#time", ATTR_TIME)
            .expression_attribute_values(":status", AttributeValue::S(record.status.as_str().into()))
            .expression_attribute_values(
                ":time",
                AttributeValue::S(record.time.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(err)) => match err.err() {
                UpdateItemError::ConditionalCheckFailedException(_) => Err(Self::not_found(record.id)),
                _ => Err(SdkError::ServiceError(err).into()),
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), Error> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key(ATTR_ID, key(id))
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", ATTR_ID)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(err)) => match err.err() {
                DeleteItemError::ConditionalCheckFailedException(_) => Err(Self::not_found(id)),
                _ => Err(SdkError::ServiceError(err).into()),
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn transition(
        &self,
        id: i64,
        from: Status,
        to: Status,
        expiry: DateTime<FixedOffset>,
    ) -> Result<Transition, Error> {
        // Rows written by older functions may still carry the legacy label.
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(ATTR_ID, key(id))
            .update_expression("SET #status = :status, #expiry = :expiry");
        request = match from.legacy_label() {
            Some(legacy) => request
                .condition_expression("#status IN (:oldstatus, :legacystatus)")
                .expression_attribute_values(":legacystatus", AttributeValue::S(legacy.into())),
            None => request.condition_expression("#status = :oldstatus"),
        };

        let result = request
            .expression_attribute_names("#status", ATTR_STATUS)
            .expression_attribute_names("#expiry", ATTR_EXPIRY)
            .expression_attribute_values(":status", AttributeValue::S(to.as_str().into()))
            .expression_attribute_values(
                ":expiry",
                AttributeValue::S(expiry.to_rfc3339_opts(SecondsFormat::Secs, false)),
            )
            .expression_attribute_values(":oldstatus", AttributeValue::S(from.as_str().into()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(Transition::Applied),
            Err(SdkError::ServiceError(err)) => match err.err() {
                UpdateItemError::ConditionalCheckFailedException(_) => Ok(Transition::Skipped),
                _ => Err(SdkError::ServiceError(err).into()),
            },
            Err(err) => Err(err.into()),
        }
    }
}
