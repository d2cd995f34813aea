//! Long-running operation polling rules for Azure Resource Manager.
//!
//! A mutating ARM request may finish synchronously or hand back a URL to
//! poll. The strategy is chosen from the initial response, in order:
//!
//! 1. `Azure-AsyncOperation` header: poll a status document until terminal
//! 2. `Location` header: poll until the response is no longer `202`
//! 3. non-terminal `properties.provisioningState` in the body: poll the resource
//! 4. otherwise the operation is already complete

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;

/// Header carrying the status-document URL.
pub const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Header carrying the final-result URL.
pub const LOCATION: &str = "location";

/// Header with the suggested delay (seconds) before the next poll.
pub const RETRY_AFTER: &str = "retry-after";

/// How to observe completion of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollingStrategy {
    /// Poll the status document at this URL.
    AsyncOperation(String),
    /// Poll this URL until it stops answering `202 Accepted`.
    Location(String),
    /// Re-read the resource until its provisioning state is terminal.
    ProvisioningState,
    /// Nothing to wait for.
    Done,
}

/// Choose a polling strategy from the initial response.
pub fn select_strategy(
    status: StatusCode,
    headers: &HeaderMap,
    body: Option<&serde_json::Value>,
) -> PollingStrategy {
    if let Some(url) = header_str(headers, AZURE_ASYNC_OPERATION) {
        return PollingStrategy::AsyncOperation(url);
    }
    if status == StatusCode::ACCEPTED {
        if let Some(url) = header_str(headers, LOCATION) {
            return PollingStrategy::Location(url);
        }
    }
    let state = body.and_then(provisioning_state);
    match state {
        Some(state) if !OperationStatus::parse(&state).is_terminal() => {
            PollingStrategy::ProvisioningState
        }
        _ => PollingStrategy::Done,
    }
}

/// Extract `properties.provisioningState` from a resource body.
pub fn provisioning_state(body: &serde_json::Value) -> Option<String> {
    body.get("properties")?
        .get("provisioningState")?
        .as_str()
        .map(str::to_string)
}

/// Parse the `Retry-After` header (delta-seconds form only).
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, RETRY_AFTER)?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// State of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Succeeded,
    Failed,
    Canceled,
    /// Any non-terminal state ("InProgress", "Creating", "Updating", ...)
    Running(String),
}

impl OperationStatus {
    /// Parse a status string. Matching is case-insensitive.
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Running(status.trim().to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running(_))
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Canceled => write!(f, "Canceled"),
            Self::Running(state) => write!(f, "{}", state),
        }
    }
}

/// Body returned by an `Azure-AsyncOperation` status URL.
#[derive(Debug, Clone, Deserialize)]
pub struct AsyncOperationDocument {
    pub status: String,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

/// ARM error envelope: `{ "error": { "code": ..., "message": ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

/// Error code and message reported by ARM.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorDetail {
    /// Decode an error body, falling back to the raw text when it is not an envelope.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope.error,
            Err(_) => Self {
                code: String::new(),
                message: body.trim().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_async_operation_header_wins() {
        let h = headers(&[
            ("azure-asyncoperation", "https://management.azure.com/op/1"),
            ("location", "https://management.azure.com/loc/1"),
        ]);
        assert_eq!(
            select_strategy(StatusCode::CREATED, &h, None),
            PollingStrategy::AsyncOperation("https://management.azure.com/op/1".to_string())
        );
    }

    #[test]
    fn test_location_used_for_accepted() {
        let h = headers(&[("location", "https://management.azure.com/loc/1")]);
        assert_eq!(
            select_strategy(StatusCode::ACCEPTED, &h, None),
            PollingStrategy::Location("https://management.azure.com/loc/1".to_string())
        );
    }

    #[test]
    fn test_location_ignored_when_not_accepted() {
        let h = headers(&[("location", "https://management.azure.com/loc/1")]);
        assert_eq!(
            select_strategy(StatusCode::OK, &h, None),
            PollingStrategy::Done
        );
    }

    #[test]
    fn test_non_terminal_provisioning_state_polls_resource() {
        let body = serde_json::json!({"properties": {"provisioningState": "Creating"}});
        assert_eq!(
            select_strategy(StatusCode::CREATED, &HeaderMap::new(), Some(&body)),
            PollingStrategy::ProvisioningState
        );
    }

    #[test]
    fn test_terminal_provisioning_state_is_done() {
        let body = serde_json::json!({"properties": {"provisioningState": "Succeeded"}});
        assert_eq!(
            select_strategy(StatusCode::OK, &HeaderMap::new(), Some(&body)),
            PollingStrategy::Done
        );
        assert_eq!(
            select_strategy(StatusCode::OK, &HeaderMap::new(), None),
            PollingStrategy::Done
        );
    }

    #[test]
    fn test_operation_status_parse() {
        assert_eq!(OperationStatus::parse("Succeeded"), OperationStatus::Succeeded);
        assert_eq!(OperationStatus::parse("succeeded"), OperationStatus::Succeeded);
        assert_eq!(OperationStatus::parse("Failed"), OperationStatus::Failed);
        assert_eq!(OperationStatus::parse("Canceled"), OperationStatus::Canceled);
        assert_eq!(
            OperationStatus::parse("InProgress"),
            OperationStatus::Running("InProgress".to_string())
        );
        assert!(!OperationStatus::parse("Updating").is_terminal());
        assert!(OperationStatus::parse("Failed").is_terminal());
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(
            retry_after(&headers(&[("retry-after", "10")])),
            Some(Duration::from_secs(10))
        );
        assert_eq!(retry_after(&headers(&[("retry-after", "soon")])), None);
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn test_error_detail_from_envelope() {
        let detail = ErrorDetail::from_body(
            r#"{"error":{"code":"AuthorizationFailed","message":"no access"}}"#,
        );
        assert_eq!(detail.code, "AuthorizationFailed");
        assert_eq!(detail.message, "no access");
    }

    #[test]
    fn test_error_detail_from_plain_text() {
        let detail = ErrorDetail::from_body("Service Unavailable\n");
        assert_eq!(detail.code, "");
        assert_eq!(detail.message, "Service Unavailable");
    }

    #[test]
    fn test_async_operation_document_with_error() {
        let doc: AsyncOperationDocument = serde_json::from_str(
            r#"{"status":"Failed","error":{"code":"QuotaExceeded","message":"too many cores"}}"#,
        )
        .unwrap();
        assert_eq!(OperationStatus::parse(&doc.status), OperationStatus::Failed);
        assert_eq!(doc.error.unwrap().code, "QuotaExceeded");
    }
}
