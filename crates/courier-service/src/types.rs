//! Types shared by the coordinator, the classifier and the transports.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

/// The name of the field a header snapshot is attached under in structured payloads.
pub const HEADERS_FIELD: &str = "_headers";

/// A flattened `name -> value` snapshot of response headers.
pub type HeaderSnapshot = BTreeMap<String, String>;

/// The HTTP methods the coordinator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }

    /// Whether a request with this method is rejected when it has no body.
    pub fn requires_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            _ => Err(format!("unsupported method `{s}`")),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Identifies a logical request for coalescing and caching.
///
/// The `url` is always the resolved, absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub url: String,
    pub method: Method,
}

impl ResourceKey {
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A successfully decoded response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// The body of a response with a structured (JSON) content type.
    Json(serde_json::Value),
    /// The body of any other response.
    Text(String),
}

impl Payload {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Json(_) => None,
            Payload::Text(text) => Some(text),
        }
    }

    /// Returns the header snapshot attached to a structured object payload.
    pub fn headers(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.as_json()?.get(HEADERS_FIELD)?.as_object()
    }
}

/// Whether the transport should send credentials (cookies) along with a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Credentials {
    /// Always send credentials.
    Include,
    /// Only send credentials to the configured origin.
    #[default]
    SameOrigin,
    /// Never send credentials.
    Omit,
}

/// The options handed to a [`Transport`](crate::transport::Transport) for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSettings {
    pub method: Method,
    pub credentials: Credentials,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl RequestSettings {
    /// Settings as built by the coordinator: the given method, credentials included.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            credentials: Credentials::Include,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A response as delivered by a transport, before classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Creates an empty response with the canonical status text of `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a JSON response by serializing `value`.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header(header::CONTENT_TYPE, "application/json")
            .with_body(value.to_string())
    }

    /// Creates a plain text response.
    pub fn text(status: StatusCode, text: impl Into<Bytes>) -> Self {
        Self::new(status)
            .with_header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .with_body(text)
    }

    /// Appends a header. Invalid header values are skipped.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// The transport's success flag: `true` for any `2xx` status.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// The declared content type, if it is present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// The metadata that is attached to failures for correlation.
    pub fn meta(&self) -> ResponseMeta {
        ResponseMeta {
            status: self.status.as_u16(),
            status_text: self.status_text.clone(),
            headers: header_snapshot(&self.headers),
        }
    }
}

/// Metadata of a raw response, attached to every [`Failure`](crate::error::Failure)
/// that originated from a reached server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderSnapshot,
}

/// Flattens `headers` into a `name -> value` map.
///
/// Every header name is visited exactly once. Repeated values of the same header are
/// joined with `", "`.
pub fn header_snapshot(headers: &HeaderMap) -> HeaderSnapshot {
    headers
        .keys()
        .map(|name| {
            let value = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_owned(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_display_and_parse() {
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!("patch".parse::<Method>(), Ok(Method::Patch));
        assert!("TRACE".parse::<Method>().is_err());
        assert!(Method::Post.requires_body());
        assert!(Method::Put.requires_body());
        assert!(!Method::Patch.requires_body());
        assert!(!Method::Delete.requires_body());
    }

    #[test]
    fn test_header_snapshot_joins_repeated_headers() {
        let raw = RawResponse::new(StatusCode::OK)
            .with_header(HeaderName::from_static("foo"), "bar")
            .with_header(header::SET_COOKIE, "a=1")
            .with_header(header::SET_COOKIE, "b=2");

        let snapshot = header_snapshot(&raw.headers);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["foo"], "bar");
        assert_eq!(snapshot["set-cookie"], "a=1, b=2");
    }

    #[test]
    fn test_raw_response_ok_flag() {
        assert!(RawResponse::new(StatusCode::NO_CONTENT).is_ok());
        assert!(!RawResponse::new(StatusCode::NOT_MODIFIED).is_ok());
        assert!(!RawResponse::new(StatusCode::BAD_REQUEST).is_ok());
        assert_eq!(
            RawResponse::new(StatusCode::NOT_FOUND).status_text,
            "Not Found"
        );
    }
}
