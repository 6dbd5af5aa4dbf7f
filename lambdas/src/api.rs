//! HTTP functions over the record table.
//!
//! Each `handle_*` function backs one API Gateway route and always answers
//! with a response; only a failure to build that response reaches the runtime.

use chrono::Utc;
use lambda_http::http::StatusCode;
use lambda_http::{Error as LambdaError, Request, Response};
use tracing::{error, info};

use crate::clients::Services;
use crate::common::errors::Error;
use crate::common::utils::{extract_id, extract_request, json_response};
use crate::common::{Record, Status};

pub const INVALID_INPUT_ERROR: &str = "Error: Invalid input.";
pub const INTERNAL_SERVER_ERROR: &str = "Error: Internal Server Error";
pub const UPDATED_MESSAGE: &str = "Item updated successfully.";
pub const DELETED_MESSAGE: &str = "Success: successfully deleted";

/// What a 500 answer may reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    Generic,
    Detailed,
}

pub fn error_response(err: Error, exposure: Exposure) -> Result<Response<String>, LambdaError> {
    let Some(status) = err.status_code() else {
        return Err(err.into());
    };

    let body = match (&err, exposure) {
        (Error::Backend(_), Exposure::Generic) => INTERNAL_SERVER_ERROR.to_string(),
        _ => err.to_string(),
    };

    Ok(json_response(status, body)?)
}

pub async fn list_records(services: &Services) -> Result<Vec<Record>, Error> {
    services.store.scan().await
}

/// Stores the record as `NEW`, notifies the queue and returns the whole table.
pub async fn create_record(record: Record, services: &Services) -> Result<Vec<Record>, Error> {
    let record = record.with_status(Status::New);

    info!("Initializing item with id: {}", record.id);
    services.store.insert(&record).await?;

    info!("Sending message to SQS");
    services.queue.publish(&record).await?;

    list_records(services).await
}

pub async fn update_record(id: i64, record: Record, services: &Services) -> Result<(), Error> {
    if record.id != id {
        return Err(Error::Validation(INVALID_INPUT_ERROR.into()));
    }

    if services.store.get(id).await?.is_none() {
        return Err(Error::NotFound("Error: Item not found.".into()));
    }

    let record = record.with_status(Status::Updated);
    services.store.update(&record).await?;

    info!("Sending message to SQS");
    services.queue.publish(&record).await?;

    Ok(())
}

pub async fn delete_record(id: i64, services: &Services) -> Result<(), Error> {
    let Some(existing) = services.store.get(id).await? else {
        return Err(Error::NotFound(format!("Item with id {id} not found")));
    };

    services.store.delete(id).await?;

    let removed = Record::new(existing.id, Status::Deleted, Utc::now());
    info!("Sending message to SQS");
    services.queue.publish(&removed).await?;

    Ok(())
}

#[tracing::instrument(skip(services))]
pub async fn handle_list(
    request: Request,
    services: &Services,
) -> Result<Response<String>, LambdaError> {
    let result: Result<Response<String>, Error> = async {
        let records = list_records(services).await?;
        json_response(StatusCode::OK, serde_json::to_string(&records)?)
    }
    .await;

    result.or_else(|err| {
        error!("Listing failed: {err}");
        error_response(err, Exposure::Generic)
    })
}

#[tracing::instrument(skip(services))]
pub async fn handle_create(
    request: Request,
    services: &Services,
) -> Result<Response<String>, LambdaError> {
    let result: Result<Response<String>, Error> = async {
        let record = extract_request::<Record>(&request)?;
        let records = create_record(record, services).await?;
        json_response(StatusCode::OK, serde_json::to_string(&records)?)
    }
    .await;

    result.or_else(|err| {
        error!("Create failed: {err}");
        error_response(err, Exposure::Generic)
    })
}

#[tracing::instrument(skip(services))]
pub async fn handle_update(
    request: Request,
    services: &Services,
) -> Result<Response<String>, LambdaError> {
    let result: Result<Response<String>, Error> = async {
        let id = extract_id(&request)?;
        let record = extract_request::<Record>(&request)
            .map_err(|_| Error::Validation(INVALID_INPUT_ERROR.into()))?;
        update_record(id, record, services).await?;
        json_response(StatusCode::OK, UPDATED_MESSAGE.into())
    }
    .await;

    result.or_else(|err| {
        error!("Update failed: {err}");
        error_response(err, Exposure::Generic)
    })
}

#[tracing::instrument(skip(services))]
pub async fn handle_delete(
    request: Request,
    services: &Services,
) -> Result<Response<String>, LambdaError> {
    let result: Result<Response<String>, Error> = async {
        let id = extract_id(&request)?;
        delete_record(id, services).await?;
        json_response(StatusCode::ACCEPTED, DELETED_MESSAGE.into())
    }
    .await;

    result.or_else(|err| {
        error!("Delete failed: {err}");
        error_response(err, Exposure::Detailed)
    })
}
