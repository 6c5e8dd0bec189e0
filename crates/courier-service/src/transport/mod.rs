//! The seam between the coordinator and the network.
//!
//! The coordinator never talks to the network directly. It hands a resolved URL and the final
//! [`RequestSettings`] to a [`Transport`], which either produces a [`RawResponse`] (for any
//! status code) or fails with a [`TransportError`] when no response could be obtained at all.

use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::types::{RawResponse, RequestSettings};

mod http;

pub use self::http::{ReqwestTransport, USER_AGENT, create_client};

/// A failure to obtain any response from the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// No response was received in time.
    #[error("request timed out")]
    Timeout,
    /// Any other transport level problem.
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    fn from_source(mut error: &dyn Error) -> String {
        while let Some(src) = error.source() {
            error = src;
        }
        error.to_string()
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(Self::from_source(&error))
        } else {
            Self::Other(Self::from_source(&error))
        }
    }
}

/// A black-box asynchronous HTTP call.
pub trait Transport: Send + Sync + 'static {
    /// Issues one call to `url` with the given `settings`.
    ///
    /// Any response that was received, regardless of its status, is returned as `Ok`.
    fn call<'a>(
        &'a self,
        url: &'a str,
        settings: &'a RequestSettings,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>>;
}
