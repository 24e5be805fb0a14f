//! Meeting Coordinator error types.
//!
//! Errors surface two ways:
//! - On the signaling channel they become targeted notifications to the
//!   requester (`action-error`, `meeting-error`, `meeting-locked`).
//! - On the HTTP surface they map to status codes via `IntoResponse`.
//!
//! Internal details are logged server-side and never sent to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Meeting Coordinator error type.
///
/// Maps to numeric error codes (see [`CoordinatorError::error_code`]):
/// - `BadRequest`: 1
/// - `Unauthorized`: 2
/// - `Forbidden`: 3
/// - `MeetingNotFound`, `ParticipantNotFound`: 4
/// - `Conflict`: 5
/// - `Config`, `Internal`: 6
/// - `Locked`: 8
/// - `StaleReference`: 9
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Meeting does not exist (never created, or ended).
    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),

    /// Participant is not part of the meeting.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Authorization failure on a host-only or co-host-only action.
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Join attempt against a locked meeting by a non-member.
    #[error("Meeting is locked: {0}")]
    Locked(String),

    /// Action references a connection or meeting that was already cleaned up.
    ///
    /// Expected under normal churn; callers drop the action silently.
    #[error("Stale reference: {0}")]
    StaleReference(String),

    /// Conflicting state (e.g., meeting id already in use).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed client input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Caller was not authenticated by the external collaborator.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (actor channel failures and similar).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Returns the numeric error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            CoordinatorError::BadRequest(_) => 1,
            CoordinatorError::Unauthorized(_) => 2,
            CoordinatorError::Forbidden(_) => 3,
            CoordinatorError::MeetingNotFound(_) | CoordinatorError::ParticipantNotFound(_) => 4,
            CoordinatorError::Conflict(_) => 5,
            CoordinatorError::Config(_) | CoordinatorError::Internal(_) => 6,
            CoordinatorError::Locked(_) => 8,
            CoordinatorError::StaleReference(_) => 9,
        }
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoordinatorError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CoordinatorError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoordinatorError::MeetingNotFound(_) | CoordinatorError::ParticipantNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            CoordinatorError::Conflict(_) => StatusCode::CONFLICT,
            CoordinatorError::Locked(_) => StatusCode::LOCKED,
            CoordinatorError::StaleReference(_) => StatusCode::GONE,
            CoordinatorError::Config(_) | CoordinatorError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label used for metrics and the HTTP error body.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::BadRequest(_) => "BAD_REQUEST",
            CoordinatorError::Unauthorized(_) => "UNAUTHORIZED",
            CoordinatorError::Forbidden(_) => "FORBIDDEN",
            CoordinatorError::MeetingNotFound(_) | CoordinatorError::ParticipantNotFound(_) => {
                "NOT_FOUND"
            }
            CoordinatorError::Conflict(_) => "CONFLICT",
            CoordinatorError::Locked(_) => "LOCKED",
            CoordinatorError::StaleReference(_) => "STALE_REFERENCE",
            CoordinatorError::Config(_) | CoordinatorError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            CoordinatorError::Config(_) | CoordinatorError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            CoordinatorError::MeetingNotFound(_) => "Meeting not found".to_string(),
            CoordinatorError::ParticipantNotFound(_) => "Participant not found".to_string(),
            CoordinatorError::Locked(_) => {
                "The host disabled New Entries, Meeting Inaccessible".to_string()
            }
            CoordinatorError::StaleReference(_) => "Session no longer active".to_string(),
            CoordinatorError::Forbidden(msg)
            | CoordinatorError::Conflict(msg)
            | CoordinatorError::BadRequest(msg)
            | CoordinatorError::Unauthorized(msg) => msg.clone(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        if let CoordinatorError::Internal(err) | CoordinatorError::Config(err) = &self {
            tracing::error!(target: "coord.errors", error = %err, "Request failed internally");
        }

        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.kind().to_string(),
                message: self.client_message(),
            },
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"meeting-coordinator\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(CoordinatorError::BadRequest("x".into()).error_code(), 1);
        assert_eq!(CoordinatorError::Unauthorized("x".into()).error_code(), 2);
        assert_eq!(CoordinatorError::Forbidden("x".into()).error_code(), 3);
        assert_eq!(
            CoordinatorError::MeetingNotFound("ABCD1234".into()).error_code(),
            4
        );
        assert_eq!(
            CoordinatorError::ParticipantNotFound("conn-1".into()).error_code(),
            4
        );
        assert_eq!(CoordinatorError::Conflict("x".into()).error_code(), 5);
        assert_eq!(CoordinatorError::Internal("x".into()).error_code(), 6);
        assert_eq!(CoordinatorError::Locked("x".into()).error_code(), 8);
        assert_eq!(CoordinatorError::StaleReference("x".into()).error_code(), 9);
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = CoordinatorError::Internal("channel send failed: receiver dropped".into());
        assert_eq!(err.client_message(), "An internal error occurred");

        let err = CoordinatorError::MeetingNotFound("SECRET01".into());
        assert!(!err.client_message().contains("SECRET01"));
    }

    #[test]
    fn test_forbidden_message_is_passed_through() {
        let err = CoordinatorError::Forbidden("Only host can make co-hosts".into());
        assert_eq!(err.client_message(), "Only host can make co-hosts");
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", CoordinatorError::MeetingNotFound("ABCD1234".into())),
            "Meeting not found: ABCD1234"
        );
        assert_eq!(
            format!("{}", CoordinatorError::Locked("ABCD1234".into())),
            "Meeting is locked: ABCD1234"
        );
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let response = CoordinatorError::MeetingNotFound("ABCD1234".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Meeting not found");
    }

    #[tokio::test]
    async fn test_into_response_unauthorized_sets_challenge() {
        let response = CoordinatorError::Unauthorized("Missing token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("WWW-Authenticate"));
    }

    #[test]
    fn test_locked_maps_to_423() {
        assert_eq!(
            CoordinatorError::Locked("x".into()).status_code(),
            StatusCode::LOCKED
        );
    }
}
