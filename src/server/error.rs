//! JSON error responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

use crate::error::{ApprovalError, DatabaseError, Error, SourceError, TransportError};

/// An error rendered as `{"status": <code>, "message": "<text>"}`.
///
/// Provider rejections also carry the provider's error code and help link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub more_info: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            code: None,
            more_info: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Several failures reported as one bad request.
    pub fn collected(errors: &[TransportError]) -> Self {
        let mut message = String::from("Collected errors:");
        for (i, e) in errors.iter().enumerate() {
            message.push_str(&format!("\n\tError {i}: {e}"));
        }
        Self::bad_request(message)
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        let mut api = Self {
            status: e.status(),
            message: e.to_string(),
            code: None,
            more_info: None,
        };
        if let TransportError::Rejected {
            code, more_info, ..
        } = e
        {
            api.code = Some(code);
            api.more_info = Some(more_info);
        }
        api
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Transport(t) => t.into(),
            Error::Approval(ApprovalError::RequestNotFound { .. }) => {
                Self::new(StatusCode::NOT_FOUND, e.to_string())
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        warn!(status = self.status, message = %self.message, "Request failed");
        (status, Json(self)).into_response()
    }
}
