//! Support to issue calls over HTTP with [`reqwest`].

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use hyper::ext::ReasonPhrase;
use reqwest::{Client, Url, header};

use crate::config::Config;
use crate::types::{Credentials, RawResponse, RequestSettings};

use super::{Transport, TransportError};

/// The user agent sent with every request.
pub const USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Creates a [`reqwest::Client`] with the timeouts from the `config`.
///
/// * `cookies` determines whether the client keeps a cookie store, i.e. whether it sends
///   credentials along with its requests.
pub fn create_client(config: &Config, cookies: bool) -> reqwest::Result<Client> {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .cookie_store(cookies)
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
}

/// A [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    /// Used for requests that carry credentials.
    client: Client,
    /// Used for requests that must not carry credentials.
    anonymous_client: Client,
    /// The configured origin, used to decide [`Credentials::SameOrigin`].
    origin: Option<Url>,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        Ok(Self {
            client: create_client(config, true)?,
            anonymous_client: create_client(config, false)?,
            origin: config.base_url.clone(),
        })
    }

    fn is_same_origin(&self, url: &Url) -> bool {
        self.origin
            .as_ref()
            .is_some_and(|origin| origin.origin() == url.origin())
    }

    fn client_for(&self, url: &Url, credentials: Credentials) -> &Client {
        let with_credentials = match credentials {
            Credentials::Include => true,
            Credentials::SameOrigin => self.is_same_origin(url),
            Credentials::Omit => false,
        };

        if with_credentials {
            &self.client
        } else {
            &self.anonymous_client
        }
    }

    async fn send(&self, url: &str, settings: &RequestSettings) -> Result<RawResponse, TransportError> {
        let url = Url::parse(url).map_err(|err| TransportError::Other(err.to_string()))?;

        tracing::debug!(method = %settings.method, %url, "Sending request");

        let mut builder = self
            .client_for(&url, settings.credentials)
            .request(settings.method.into(), url);

        for (name, value) in &settings.headers {
            if let Ok(name) = header::HeaderName::from_bytes(name.as_bytes()) {
                builder = builder.header(name, value.as_str());
            }
        }
        if let Some(body) = &settings.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        // only present if the server sent a non-canonical reason
        let reason = response
            .extensions()
            .get::<ReasonPhrase>()
            .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        let mut raw = RawResponse::new(status).with_body(body);
        if let Some(reason) = reason {
            raw = raw.with_status_text(reason);
        }
        raw.headers = headers;
        Ok(raw)
    }
}

impl Transport for ReqwestTransport {
    fn call<'a>(
        &'a self,
        url: &'a str,
        settings: &'a RequestSettings,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        self.send(url, settings).boxed()
    }
}
