use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use lambda_http::http::StatusCode;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{}", error_chain(.0.as_ref()))]
    Backend(BoxError),
    #[error(transparent)]
    Http(#[from] lambda_http::http::Error),
}

/// `error: source: source ...`, the way the SDK nests the service message under "service error".
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        let next = err.to_string();
        if !message.ends_with(&next) {
            message.push_str(": ");
            message.push_str(&next);
        }
        source = err.source();
    }
    message
}

impl Error {
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Error::Backend(err.into())
    }

    /// `None` for errors that should fail the invocation instead of answering.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Error::Validation(_) => Some(StatusCode::BAD_REQUEST),
            Error::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Error::Conflict(_) => Some(StatusCode::CONFLICT),
            Error::Backend(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            Error::Http(_) => None,
        }
    }
}

// All aws-sdk crates share the smithy `SdkError`, so this covers dynamodb, sqs and s3.
impl<E, R> From<SdkError<E, R>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    fn from(err: SdkError<E, R>) -> Self {
        Error::Backend(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Backend(Box::new(err))
    }
}
