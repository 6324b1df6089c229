//! Identities, identity handlers and the request-scoped context they run in.

use crate::{auth::context::AuthorizationContext, errors::HandlerError};
use async_trait::async_trait;
use axum::http::{request::Parts, Extensions};
use serde::{Deserialize, Serialize};

/// Header carrying the caller-supplied request ID used for log correlation
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A group the identity belongs to at its identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), id: None }
    }
}

/// The result of a successful authentication attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl IdentityProfile {
    /// A profile carrying no email, organization or group identifies nobody and is treated as
    /// a non-match by the authentication manager.
    pub fn is_well_formed(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.email) || present(&self.organization_id) || !self.groups.is_empty()
    }
}

/// A pluggable authentication strategy.
///
/// Returns:
/// - `Ok(None)`: the handler does not apply to this request (no credentials it understands)
/// - `Ok(Some(identity))`: the request is authenticated
/// - `Err(error)`: credentials were present but could not be verified
#[async_trait]
pub trait IdentityHandler: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &'static str;

    async fn check_auth(&self, parts: &Parts, ctx: &RequestContext) -> Result<Option<IdentityProfile>, HandlerError>;
}

/// Per-request state shared between the interceptor, the identity handlers and the
/// authentication manager. Never shared across requests.
#[derive(Debug, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
    attributes: Option<Extensions>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context for an inbound request, picking up its request ID if one was sent
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            request_id: parts
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string),
            attributes: None,
        }
    }

    pub fn attributes(&self) -> Option<&Extensions> {
        self.attributes.as_ref()
    }

    /// The attribute bag, created on first use
    pub fn attributes_mut(&mut self) -> &mut Extensions {
        self.attributes.get_or_insert_with(Extensions::new)
    }

    /// The published authorization context, if the request has been authenticated
    pub fn auth_info(&self) -> Option<&AuthorizationContext> {
        self.attributes.as_ref()?.get::<AuthorizationContext>()
    }

    pub(crate) fn publish(&mut self, auth_info: AuthorizationContext) {
        self.attributes_mut().insert(auth_info);
    }

    pub fn into_attributes(self) -> Option<Extensions> {
        self.attributes
    }
}
