//! The authentication step applied to every coordinated request.

use std::collections::BTreeMap;

use crate::types::RequestSettings;

/// Augments request settings with authentication material before they reach the transport.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, settings: RequestSettings) -> RequestSettings;
}

/// Leaves settings untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuthentication;

impl Authenticator for NoAuthentication {
    fn authenticate(&self, settings: RequestSettings) -> RequestSettings {
        settings
    }
}

/// Merges a fixed set of headers (such as a CSRF token) into every request.
///
/// Configured headers override request headers of the same name.
#[derive(Debug, Default, Clone)]
pub struct StaticHeaders {
    headers: BTreeMap<String, String>,
}

impl StaticHeaders {
    pub fn new(headers: BTreeMap<String, String>) -> Self {
        Self { headers }
    }
}

impl Authenticator for StaticHeaders {
    fn authenticate(&self, mut settings: RequestSettings) -> RequestSettings {
        for (name, value) in &self.headers {
            // header names are case insensitive
            settings
                .headers
                .retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            settings.headers.insert(name.clone(), value.clone());
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Method;

    #[test]
    fn test_static_headers_are_merged() {
        let auth = StaticHeaders::new(BTreeMap::from([(
            "X-CSRF-Token".to_owned(),
            "csrf-token-secret".to_owned(),
        )]));
        let settings = RequestSettings::new(Method::Get)
            .with_header("Accept", "application/json")
            .with_header("x-csrf-token", "stale");

        let settings = auth.authenticate(settings);
        assert_eq!(
            settings.headers,
            BTreeMap::from([
                ("Accept".to_owned(), "application/json".to_owned()),
                ("X-CSRF-Token".to_owned(), "csrf-token-secret".to_owned()),
            ])
        );
        assert_eq!(settings.method, Method::Get);
    }

    #[test]
    fn test_no_authentication() {
        let settings = RequestSettings::new(Method::Post).with_body("{}");
        assert_eq!(NoAuthentication.authenticate(settings.clone()), settings);
    }
}
