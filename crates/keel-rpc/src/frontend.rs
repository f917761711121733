//! HTTP response shaping for operation polling.
//!
//! These helpers turn a stored [`Status`] into a status code, headers and an
//! optional body. They are transport-neutral: any HTTP server can copy the
//! [`OperationResponse`] onto its own response type.
//!
//! | Endpoint | Not recorded | Running | Finished |
//! |----------|--------------|---------|----------|
//! | operation status | 404 | 200 + polling headers | 200 |
//! | operation result | 404 | 202 + polling headers | 204 |

use std::time::Duration;

use http::header::{HeaderMap, HeaderValue, LOCATION, RETRY_AFTER};
use http::StatusCode;
use keel_core::ResourceId;
use uuid::Uuid;

use crate::api::AsyncOperationStatus;
use crate::error::{Error, Result};
use crate::statusmanager::{Status, StatusManager};

/// Polling hint used when a record carries none.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// A shaped polling response.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body, if any.
    pub body: Option<AsyncOperationStatus>,
}

impl OperationResponse {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// The `Retry-After` value in seconds, if present.
    #[must_use]
    pub fn retry_after(&self) -> Option<u64> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    /// The `Location` value, if present.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}

fn polling_headers(status: &Status, request_url: &str) -> Result<HeaderMap> {
    let location = HeaderValue::from_str(request_url).map_err(|e| Error::InvalidHeader {
        name: LOCATION.to_string(),
        reason: e.to_string(),
    })?;
    let retry_after = if status.retry_after.is_zero() {
        DEFAULT_RETRY_AFTER
    } else {
        status.retry_after
    };

    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, location);
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
    Ok(headers)
}

async fn lookup(
    manager: &dyn StatusManager,
    resource_id: &ResourceId,
    operation_id: Uuid,
) -> Result<Option<Status>> {
    match manager.get(resource_id, operation_id).await {
        Ok(status) => Ok(Some(status)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Shapes a GET of the operation status.
///
/// `request_url` is echoed in `Location` while the operation is running.
///
/// # Errors
///
/// Returns store errors other than not-found, and [`Error::InvalidHeader`] if
/// `request_url` is not a valid header value.
pub async fn operation_status(
    manager: &dyn StatusManager,
    resource_id: &ResourceId,
    operation_id: Uuid,
    request_url: &str,
) -> Result<OperationResponse> {
    let Some(status) = lookup(manager, resource_id, operation_id).await? else {
        return Ok(OperationResponse::new(StatusCode::NOT_FOUND));
    };

    let mut response = OperationResponse::new(StatusCode::OK);
    if !status.operation.status.is_terminal() {
        response.headers = polling_headers(&status, request_url)?;
    }
    response.body = Some(status.operation);
    Ok(response)
}

/// Shapes a GET of the operation result.
///
/// # Errors
///
/// Same as [`operation_status`].
pub async fn operation_result(
    manager: &dyn StatusManager,
    resource_id: &ResourceId,
    operation_id: Uuid,
    request_url: &str,
) -> Result<OperationResponse> {
    let Some(status) = lookup(manager, resource_id, operation_id).await? else {
        return Ok(OperationResponse::new(StatusCode::NOT_FOUND));
    };

    if status.operation.status.is_terminal() {
        return Ok(OperationResponse::new(StatusCode::NO_CONTENT));
    }

    let mut response = OperationResponse::new(StatusCode::ACCEPTED);
    response.headers = polling_headers(&status, request_url)?;
    Ok(response)
}
