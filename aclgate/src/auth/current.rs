use crate::{
    auth::context::AuthorizationContext,
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Extractor for the authorization context published by [`auth_middleware`].
///
/// Rejects with 401 when the route was not authenticated, which happens only for exempt routes.
///
/// [`auth_middleware`]: crate::auth::middleware::auth_middleware
#[derive(Debug, Clone)]
pub struct AuthInfo(pub AuthorizationContext);

impl<S: Send + Sync> FromRequestParts<S> for AuthInfo {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthorizationContext>()
            .cloned()
            .map(AuthInfo)
            .ok_or(Error::NotAuthenticated)
    }
}
