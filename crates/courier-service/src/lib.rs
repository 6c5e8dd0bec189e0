//! Client-side request coordination.
//!
//! The [`RequestCoordinator`] sits between application code and an HTTP [`Transport`]. It
//! deduplicates identical `GET` requests that are in flight, caches successful payloads,
//! normalizes responses and publishes failures on an [`ErrorEventBus`].

#[macro_use]
pub mod metrics;

pub mod activity;
pub mod auth;
pub mod cache;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logging;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test;

pub use crate::coordinator::{RequestCoordinator, ResponseFuture};
pub use crate::error::{Failure, RawStatus, RequestError, StatusCategory};
pub use crate::events::{ERROR_EVENT, ErrorEventBus, HandlerId};
pub use crate::transport::{ReqwestTransport, Transport, TransportError};
pub use crate::types::{Method, Payload, RawResponse, RequestSettings, ResourceKey};
