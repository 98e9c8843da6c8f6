//! Outbound collaborators.
//!
//! Each external service is reached through a trait so the service layer can
//! be exercised with mocks; the HTTP implementations live next to the traits.

pub mod attachments;
pub mod identity;
pub mod notifier;

pub use attachments::{AttachmentChecker, HttpAttachmentChecker};
pub use identity::{HttpIdentityClient, IdentityProvider};
pub use notifier::{HttpNotificationSink, Notification, NotificationSink};

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Http(String),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid upstream payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Http(format!("timeout: {}", err))
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Http(err.to_string())
        }
    }
}

/// Runs a fallible call under a deadline.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(duration)),
    }
}

pub(crate) fn build_http_client(call_timeout: Duration) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(call_timeout)
        .build()
        .map_err(|e| ClientError::Http(e.to_string()))
}

/// Maps non-success statuses to [`ClientError::Status`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}
