use lambda_http::http::StatusCode;
use lambda_http::{Request, RequestExt, Response};
use serde::de::DeserializeOwned;

use crate::common::errors::Error;

pub const EMPTY_PAYLOAD_ERROR: &str = "Request payload is empty";
pub const INVALID_ID_ERROR: &str = "Invalid id";

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .without_time() // CloudWatch will add the ingestion time
        .with_target(false)
        .init();
}

/// Decodes the JSON body. A missing body and a malformed one are both validation errors.
///
/// The body is read as JSON whatever the `Content-Type` header says; API Gateway
/// test events often arrive without one.
pub fn extract_request<T: DeserializeOwned>(request: &Request) -> Result<T, Error> {
    let body: &[u8] = request.body().as_ref();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::Validation(EMPTY_PAYLOAD_ERROR.into()));
    }

    serde_json::from_slice(body).map_err(|err| Error::Validation(err.to_string()))
}

pub fn extract_id(request: &Request) -> Result<i64, Error> {
    request
        .path_parameters_ref()
        .and_then(|params| params.first("id"))
        .and_then(|id| id.trim().parse().ok())
        .ok_or_else(|| Error::Validation(INVALID_ID_ERROR.into()))
}

pub fn json_response(status: StatusCode, body: String) -> Result<Response<String>, Error> {
    let response = Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body)?;

    Ok(response)
}

/// `https://sqs.<region>.amazonaws.com/<account>/<name>` for an
/// `arn:aws:sqs:<region>:<account>:<name>` ARN.
pub fn queue_url_from_arn(arn: &str) -> Option<String> {
    let mut parts = arn.split(':');
    if parts.next()? != "arn" {
        return None;
    }
    let partition = parts.next()?;
    if parts.next()? != "sqs" {
        return None;
    }
    let region = parts.next()?;
    let account = parts.next()?;
    let name = parts.next()?;
    if parts.next().is_some() || [region, account, name].iter().any(|p| p.is_empty()) {
        return None;
    }

    let domain = match partition {
        "aws-cn" => "amazonaws.com.cn",
        _ => "amazonaws.com",
    };

    Some(format!("https://sqs.{region}.{domain}/{account}/{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::Body;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Deserialize)]
    struct Payload {
        id: i64,
    }

    fn request_with_body(body: &str) -> Request {
        lambda_http::http::Request::builder()
            .method("POST")
            .uri("/records")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn empty_body_is_rejected() {
        let err = extract_request::<Payload>(&request_with_body("")).unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg == EMPTY_PAYLOAD_ERROR));
    }

    #[test]
    fn malformed_body_is_a_validation_error() {
        let err = extract_request::<Payload>(&request_with_body("{\"id\": \"x\"}")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn body_without_content_type_is_decoded() {
        let request = request_with_body("{\"id\": 5}");
        assert!(request.headers().get("content-type").is_none());

        let payload = extract_request::<Payload>(&request).unwrap();
        assert_eq!(payload.id, 5);
    }

    #[test]
    fn body_is_decoded() {
        let payload = extract_request::<Payload>(&request_with_body("{\"id\": 4}")).unwrap();
        assert_eq!(payload.id, 4);
    }

    #[test]
    fn id_comes_from_path_parameters() {
        let request = request_with_body("").with_path_parameters(HashMap::from([(
            "id".to_string(),
            "12".to_string(),
        )]));
        assert_eq!(extract_id(&request).unwrap(), 12);

        let request = request_with_body("").with_path_parameters(HashMap::from([(
            "id".to_string(),
            "twelve".to_string(),
        )]));
        assert!(matches!(extract_id(&request), Err(Error::Validation(_))));

        assert!(matches!(
            extract_id(&request_with_body("")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn arn_maps_to_queue_url() {
        assert_eq!(
            queue_url_from_arn("arn:aws:sqs:ap-south-1:662674611977:sqs-queue").as_deref(),
            Some("https://sqs.ap-south-1.amazonaws.com/662674611977/sqs-queue")
        );
        assert_eq!(
            queue_url_from_arn("arn:aws-cn:sqs:cn-north-1:123456789012:jobs").as_deref(),
            Some("https://sqs.cn-north-1.amazonaws.com.cn/123456789012/jobs")
        );
        assert_eq!(queue_url_from_arn("arn:aws:sns:us-east-1:1:topic"), None);
        assert_eq!(queue_url_from_arn("not-an-arn"), None);
    }
}
