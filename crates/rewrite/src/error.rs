use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Every way a transform can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The text is empty or only whitespace.
    EmptyInput,
    /// The text has more characters than allowed.
    InputTooLong,
    /// The caller, or the upstream on every retry, refused further requests.
    RateLimited,
    /// An upstream attempt did not finish in time.
    Timeout,
    /// Every endpoint candidate answered 404.
    EndpointNotFound,
    /// The upstream answered 2xx without generated text.
    InvalidResponse,
    /// The upstream could not be reached.
    NetworkError,
    /// The upstream answered with an unexpected status.
    UpstreamError,
    /// No usable credential, or the upstream rejected it.
    ServerMisconfigured,
    /// Anything else.
    Unknown,
}

/// Presentation of an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDescriptor {
    /// Stable machine readable key, sent as `code`.
    pub key: &'static str,
    /// Short message shown to the user.
    pub message: &'static str,
    /// HTTP status of the response.
    pub status: StatusCode,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 10] = [
        Self::EmptyInput,
        Self::InputTooLong,
        Self::RateLimited,
        Self::Timeout,
        Self::EndpointNotFound,
        Self::InvalidResponse,
        Self::NetworkError,
        Self::UpstreamError,
        Self::ServerMisconfigured,
        Self::Unknown,
    ];

    /// The key, message and status of this kind.
    pub const fn descriptor(self) -> ErrorDescriptor {
        let (key, message, status) = match self {
            Self::EmptyInput => (
                "empty_input",
                "Please enter some text to transform.",
                StatusCode::BAD_REQUEST,
            ),
            Self::InputTooLong => (
                "input_too_long",
                "The text is too long. Please shorten it and try again.",
                StatusCode::BAD_REQUEST,
            ),
            Self::RateLimited => (
                "rate_limited",
                "Too many requests. Please wait a moment and try again.",
                StatusCode::TOO_MANY_REQUESTS,
            ),
            Self::Timeout => (
                "timeout",
                "The request took too long. Please try again.",
                StatusCode::GATEWAY_TIMEOUT,
            ),
            Self::EndpointNotFound => (
                "endpoint_not_found",
                "The text service is currently unavailable. Please try again later.",
                StatusCode::BAD_GATEWAY,
            ),
            Self::InvalidResponse => (
                "invalid_response",
                "The text service returned an unexpected response.",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Self::NetworkError => (
                "network_error",
                "Could not reach the text service. Please try again later.",
                StatusCode::BAD_GATEWAY,
            ),
            Self::UpstreamError => (
                "upstream_error",
                "The text service returned an error. Please try again later.",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Self::ServerMisconfigured => (
                "server_misconfigured",
                "The service is not configured correctly. Please contact the administrator.",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Self::Unknown => (
                "unknown",
                "An unexpected error occurred. Please try again.",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        };

        ErrorDescriptor { key, message, status }
    }

    /// Stable machine readable key.
    pub const fn key(self) -> &'static str {
        self.descriptor().key
    }

    /// Short user facing message.
    pub const fn message(self) -> &'static str {
        self.descriptor().message
    }

    /// HTTP status of the response.
    pub const fn status_code(self) -> StatusCode {
        self.descriptor().status
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A failed transform. Only the kind reaches the caller; the detail is for the logs.
#[derive(Debug, Clone, Error)]
#[error("{}", .kind.message())]
pub struct TransformError {
    kind: ErrorKind,
    detail: Option<String>,
}

impl TransformError {
    /// Create an error without detail.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    /// Attach a server side detail, such as an upstream status or body.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The kind of the failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The server side detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<ErrorKind> for TransformError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    code: &'static str,
}

impl IntoResponse for TransformError {
    fn into_response(self) -> Response {
        let ErrorDescriptor { key, message, status } = self.kind.descriptor();

        if status.is_server_error() {
            match &self.detail {
                Some(detail) => log::error!("Transform failed with {key} ({}): {detail}", status.as_u16()),
                None => log::error!("Transform failed with {key} ({})", status.as_u16()),
            }
        } else {
            log::debug!("Transform rejected with {key}: {:?}", self.detail);
        }

        let body = ErrorResponse { error: message, code: key };

        (status, Json(body)).into_response()
    }
}
