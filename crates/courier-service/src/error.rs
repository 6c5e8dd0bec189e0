use std::fmt;

use thiserror::Error;

use crate::transport::TransportError;
use crate::types::{Method, RawResponse, ResponseMeta};

/// The reserved status a failure carries when the server could not be reached at all.
pub const NETWORK_REQUEST_FAILED: &str = "NETWORK_REQUEST_FAILED";

/// The status attached to a [`Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawStatus {
    /// The HTTP status code of a response that was received.
    Code(u16),
    /// The transport failed before any response was received.
    NetworkRequestFailed,
}

impl RawStatus {
    pub fn code(&self) -> Option<u16> {
        match self {
            RawStatus::Code(code) => Some(*code),
            RawStatus::NetworkRequestFailed => None,
        }
    }
}

impl fmt::Display for RawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawStatus::Code(code) => write!(f, "{code}"),
            RawStatus::NetworkRequestFailed => f.write_str(NETWORK_REQUEST_FAILED),
        }
    }
}

/// A coarse classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    NetworkUnreachable,
    ClientError,
    ServerError,
    AuthExpired,
    Unknown,
}

impl StatusCategory {
    pub fn from_status(status: RawStatus) -> Self {
        match status {
            RawStatus::NetworkRequestFailed => Self::NetworkUnreachable,
            RawStatus::Code(401) => Self::AuthExpired,
            RawStatus::Code(400..=499) => Self::ClientError,
            RawStatus::Code(500..=599) => Self::ServerError,
            RawStatus::Code(_) => Self::Unknown,
        }
    }

    /// A short name used for metric tags and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkUnreachable => "network_unreachable",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::AuthExpired => "auth_expired",
            Self::Unknown => "unknown",
        }
    }
}

/// A call that reached a conclusion other than success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    /// A human readable message, preferring the decoded `error` field of the body.
    pub message: String,
    pub category: StatusCategory,
    pub status: RawStatus,
    /// The response the failure was derived from, absent for network failures.
    pub response: Option<ResponseMeta>,
}

impl Failure {
    /// A failure of the transport itself, carrying the reserved network status.
    pub fn network(error: &TransportError) -> Self {
        let status = RawStatus::NetworkRequestFailed;
        Self {
            message: error.to_string(),
            category: StatusCategory::from_status(status),
            status,
            response: None,
        }
    }

    /// A failure derived from a non-successful response.
    pub fn from_response(message: impl Into<String>, raw: &RawResponse) -> Self {
        let status = RawStatus::Code(raw.status.as_u16());
        Self {
            message: message.into(),
            category: StatusCategory::from_status(status),
            status,
            response: Some(raw.meta()),
        }
    }
}

/// The error returned to callers of the coordinator, and published on the error event bus.
///
/// The error is cheap to clone so that the outcome of one transport call can be handed to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No URL was given.
    #[error("url is undefined")]
    MissingUrl,
    /// A `POST` or `PUT` request was made without a body.
    #[error("this is a {0} request without a body")]
    MissingBody(Method),
    /// The URL could not be resolved against the configured base URL.
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The transport failed or the server answered with a non-successful status.
    #[error(transparent)]
    Failed(#[from] Failure),
    /// The body of a response could not be decoded.
    #[error("failed to decode response body: {0}")]
    Decode(String),
    /// An unexpected error in the coordinator itself.
    #[error("internal error")]
    Internal,
}

impl RequestError {
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            RequestError::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// The HTTP status of the response that caused this error, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        self.failure()?.status.code()
    }

    /// A short name used for metric tags and log fields.
    pub fn category_str(&self) -> &'static str {
        match self {
            RequestError::MissingUrl | RequestError::MissingBody(_) => "validation",
            RequestError::InvalidUrl { .. } => "invalid_url",
            RequestError::Failed(failure) => failure.category.as_str(),
            RequestError::Decode(_) => "decode",
            RequestError::Internal => "internal",
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
