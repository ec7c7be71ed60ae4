//! Error handling

use std::time::Duration;

use axum::response::IntoResponse;
use tracing::info;

/// Error definitions for the chitrakar application.
#[derive(Debug)]
pub enum ChitrakarError {
    /// When you didn't do the right thing
    BadRequest,
    /// When a requested resource is not found
    NotFound(String),
    /// The request never got a response: connection, TLS or body read failures
    Transport(String),
    /// The upstream service answered with a non-success status
    Service {
        /// Name of the upstream service
        service: &'static str,
        /// HTTP status code returned
        status: u16,
        /// Response body, for the logs
        body: String,
    },
    /// The upstream response did not have the expected shape
    MalformedResponse(String),
    /// The operation was aborted before it finished
    Aborted,
    /// The operation ran past its time limit and was aborted
    TimedOut(Duration),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl std::fmt::Display for ChitrakarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChitrakarError::BadRequest => write!(f, "Bad request"),
            ChitrakarError::NotFound(what) => write!(f, "Not found: {what}"),
            ChitrakarError::Transport(message) => write!(f, "Transport error: {message}"),
            ChitrakarError::Service {
                service,
                status,
                body,
            } => write!(f, "{service} returned {status}: {body}"),
            ChitrakarError::MalformedResponse(message) => {
                write!(f, "Malformed response: {message}")
            }
            ChitrakarError::Aborted => write!(f, "Operation aborted"),
            ChitrakarError::TimedOut(limit) => {
                write!(f, "Operation timed out after {}ms", limit.as_millis())
            }
            ChitrakarError::InternalServerError(message) => {
                write!(f, "Internal server error: {message}")
            }
        }
    }
}

impl std::error::Error for ChitrakarError {}

impl From<reqwest::Error> for ChitrakarError {
    fn from(err: reqwest::Error) -> Self {
        ChitrakarError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ChitrakarError {
    fn from(err: serde_json::Error) -> Self {
        ChitrakarError::MalformedResponse(err.to_string())
    }
}

impl From<std::io::Error> for ChitrakarError {
    fn from(err: std::io::Error) -> Self {
        ChitrakarError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for ChitrakarError {
    fn from(err: axum::http::Error) -> Self {
        ChitrakarError::InternalServerError(err.to_string())
    }
}

impl From<url::ParseError> for ChitrakarError {
    fn from(err: url::ParseError) -> Self {
        ChitrakarError::InternalServerError(err.to_string())
    }
}

impl IntoResponse for ChitrakarError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ChitrakarError::BadRequest => {
                info!("Bad request received");
                (axum::http::StatusCode::BAD_REQUEST, "Bad Request")
            }
            ChitrakarError::NotFound(what) => {
                info!("404 {what}");
                (axum::http::StatusCode::NOT_FOUND, "Not Found")
            }
            other => {
                tracing::error!("Internal server error: {}", other);
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                )
            }
        };
        let mut response = axum::response::Response::new(axum::body::Body::from(body));
        *response.status_mut() = status;
        response
    }
}
