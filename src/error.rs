//! Relay and client error types.
//!
//! [`RelayError`] is the central error type on the server side. Errors on
//! the socket path are logged and swallowed (the relay never answers a
//! sender with an error frame); errors on the REST path map to a status
//! code and a structured JSON body. [`ClientError`] covers the socket
//! manager.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ConnectionId, RoomName};

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "room not found: patient_42",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status               |
/// |-----------|-------------------|---------------------------|
/// | 1000–1999 | Malformed input   | 400 Bad Request           |
/// | 2000–2999 | Not found / state | 404 Not Found / 409       |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A socket frame could not be decoded into a known event.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    /// An event carried nothing the routing table can deliver.
    #[error("unroutable event {event}: {reason}")]
    Unroutable {
        /// Source event name.
        event: &'static str,
        /// Why it could not be routed.
        reason: &'static str,
    },

    /// The room has no members (rooms exist only while occupied).
    #[error("room not found: {0}")]
    RoomNotFound(RoomName),

    /// The connection is not (or no longer) registered.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// A connection id was registered twice.
    #[error("connection already registered: {0}")]
    DuplicateConnection(ConnectionId),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MalformedFrame(_) => 1001,
            Self::Unroutable { .. } => 1002,
            Self::RoomNotFound(_) => 2001,
            Self::ConnectionNotFound(_) => 2002,
            Self::DuplicateConnection(_) => 2003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedFrame(_) | Self::Unroutable { .. } => StatusCode::BAD_REQUEST,
            Self::RoomNotFound(_) | Self::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateConnection(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Socket manager errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No session is active; the event was dropped.
    #[error("not connected")]
    NotConnected,

    /// The WebSocket transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// An event could not be encoded.
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_not_found_maps_to_404() {
        let err = RelayError::RoomNotFound(RoomName::new("patient_42"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), 2001);
        assert_eq!(err.to_string(), "room not found: patient_42");
    }

    #[test]
    fn malformed_frame_wraps_serde_error() {
        let Err(source) = serde_json::from_str::<serde_json::Value>("{") else {
            return;
        };
        let err = RelayError::from(source);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("malformed frame"));
    }

    #[test]
    fn into_response_sets_status() {
        let response = RelayError::DuplicateConnection(ConnectionId::new()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
