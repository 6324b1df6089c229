//! Request interceptor that runs the authentication manager in front of every protected route.

use crate::{auth::identity::RequestContext, config::AuthConfig, errors::Error, AppState};
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tracing::{instrument, trace};

fn split_rule(rule: &str) -> Option<(&str, &str)> {
    rule.split_once(' ').map(|(method, path)| (method.trim(), path.trim()))
}

/// Whether a request bypasses authentication: CORS preflights, configured anonymous routes
/// (exact method and path) and anonymous prefixes (exact method, path prefix).
pub fn is_exempt(config: &AuthConfig, method: &Method, path: &str) -> bool {
    if method == Method::OPTIONS {
        return true;
    }

    let same_method = |m: &str| m.eq_ignore_ascii_case(method.as_str());

    config
        .anonymous_routes
        .iter()
        .filter_map(|rule| split_rule(rule))
        .any(|(m, p)| same_method(m) && p == path)
        || config
            .anonymous_prefixes
            .iter()
            .filter_map(|rule| split_rule(rule))
            .any(|(m, prefix)| same_method(m) && path.starts_with(prefix))
}

/// Authenticate a request and attach its authorization context to the request extensions.
/// Since we only modify the request, the middleware can just return it from here.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub(crate) async fn authenticate_request(state: AppState, request: Request) -> Result<Request, Error> {
    if is_exempt(&state.config.auth, request.method(), request.uri().path()) {
        trace!("Route is exempt from authentication");
        return Ok(request);
    }

    let manager = state.auth.manager().await?;

    let (mut parts, body) = request.into_parts();
    let mut ctx = RequestContext::from_parts(&parts);
    manager.authenticate(&parts, &mut ctx).await?;

    if let Some(attributes) = ctx.into_attributes() {
        parts.extensions.extend(attributes);
    }

    Ok(Request::from_parts(parts, body))
}

/// Middleware rejecting unauthenticated requests with 401 and broken configurations or
/// unreadable authorization stores with 500.
pub async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    let request = authenticate_request(state, request).await?;
    Ok(next.run(request).await)
}
