use crate::{
    api::models::authz::{AccessCheckQuery, AccessCheckResponse},
    auth::{context::AuthorizationContext, current::AuthInfo},
    errors::{Error, Result},
};
use axum::{extract::Query, Json};

/// The authorization context resolved for the caller
#[tracing::instrument(skip_all)]
pub async fn whoami(AuthInfo(auth_info): AuthInfo) -> Json<AuthorizationContext> {
    Json(auth_info)
}

/// Evaluate the caller's ACL for one path and action
#[tracing::instrument(skip_all)]
pub async fn check_access(AuthInfo(auth_info): AuthInfo, Query(query): Query<AccessCheckQuery>) -> Result<Json<AccessCheckResponse>> {
    if !query.path.starts_with('/') {
        return Err(Error::BadRequest {
            message: format!("Path '{}' must start with '/'", query.path),
        });
    }

    let granted = auth_info.actions_for(&query.path);
    let allowed = granted.as_ref().is_some_and(|actions| actions.contains(&query.action));

    Ok(Json(AccessCheckResponse {
        path: query.path,
        action: query.action,
        allowed,
        granted,
    }))
}
