//! Trusted proxy header identity handler.
//!
//! Reads the identity from headers set by an upstream authenticating proxy (for example
//! oauth2-proxy). The request does not apply to this handler unless at least the email or the
//! organization header is present.

use async_trait::async_trait;
use axum::http::request::Parts;
use tracing::instrument;

use crate::{
    auth::identity::{Group, IdentityHandler, IdentityProfile, RequestContext},
    config::ProxyHeaderAuthConfig,
    errors::HandlerError,
};

pub struct ProxyHeaderHandler {
    config: ProxyHeaderAuthConfig,
}

impl ProxyHeaderHandler {
    pub fn new(config: ProxyHeaderAuthConfig) -> Self {
        Self { config }
    }

    fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, HandlerError> {
        let Some(value) = parts.headers.get(name) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|e| HandlerError::MalformedHeader {
            header: name.to_string(),
            message: e.to_string(),
        })?;
        let value = value.trim();
        Ok((!value.is_empty()).then_some(value))
    }
}

#[async_trait]
impl IdentityHandler for ProxyHeaderHandler {
    fn name(&self) -> &'static str {
        "proxy_header"
    }

    #[instrument(skip_all)]
    async fn check_auth(&self, parts: &Parts, _ctx: &RequestContext) -> Result<Option<IdentityProfile>, HandlerError> {
        let email = Self::header(parts, &self.config.email_header_name)?;
        let organization_id = Self::header(parts, &self.config.organization_header_name)?;

        if email.is_none() && organization_id.is_none() {
            return Ok(None);
        }

        let groups = Self::header(parts, &self.config.groups_header_name)?
            .map(|groups| {
                groups
                    .split(self.config.group_separator.as_str())
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(Group::new)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(IdentityProfile {
            email: email.map(str::to_string),
            organization_id: organization_id.map(str::to_string),
            groups,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/test");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_identity_from_headers() {
        let handler = ProxyHeaderHandler::new(ProxyHeaderAuthConfig::default());
        let parts = parts(&[
            ("x-aclgate-email", "u@acme.com"),
            ("x-aclgate-organization", "ORG1"),
            ("x-aclgate-groups", "readers, admins,,"),
        ]);

        let identity = handler.check_auth(&parts, &RequestContext::new()).await.unwrap().unwrap();

        assert_eq!(identity.email.as_deref(), Some("u@acme.com"));
        assert_eq!(identity.organization_id.as_deref(), Some("ORG1"));
        assert_eq!(identity.groups, vec![Group::new("readers"), Group::new("admins")]);
    }

    #[tokio::test]
    async fn test_groups_alone_are_no_match() {
        let handler = ProxyHeaderHandler::new(ProxyHeaderAuthConfig::default());
        let parts = parts(&[("x-aclgate-groups", "admins")]);

        assert!(handler.check_auth(&parts, &RequestContext::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_ascii_header_is_an_error() {
        let handler = ProxyHeaderHandler::new(ProxyHeaderAuthConfig::default());
        let mut parts = parts(&[]);
        parts
            .headers
            .insert("x-aclgate-email", HeaderValue::from_bytes(b"caf\xe9@acme.com").unwrap());

        let result = handler.check_auth(&parts, &RequestContext::new()).await;
        assert!(matches!(result, Err(HandlerError::MalformedHeader { .. })));
    }
}
