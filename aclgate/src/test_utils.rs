//! Test doubles and fixtures shared by the unit tests.

use crate::{
    auth::identity::{IdentityHandler, IdentityProfile, RequestContext},
    config::{AuthConfig, Config, HandlerKind, TokenAuthConfig},
    errors::HandlerError,
};
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, request::Parts};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub const TEST_SECRET: &str = "test-secret-key-for-jwt";

enum StubOutcome {
    Identity(IdentityProfile),
    NoMatch,
    Fail,
    Pending,
}

/// Identity handler with a fixed outcome that counts how often it is consulted
pub struct StubHandler {
    name: &'static str,
    outcome: StubOutcome,
    calls: Arc<AtomicUsize>,
}

impl StubHandler {
    fn new(name: &'static str, outcome: StubOutcome) -> Self {
        Self {
            name,
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn succeeding(name: &'static str, identity: IdentityProfile) -> Self {
        Self::new(name, StubOutcome::Identity(identity))
    }

    pub fn no_match(name: &'static str) -> Self {
        Self::new(name, StubOutcome::NoMatch)
    }

    pub fn failing(name: &'static str) -> Self {
        Self::new(name, StubOutcome::Fail)
    }

    /// Never completes
    pub fn pending(name: &'static str) -> Self {
        Self::new(name, StubOutcome::Pending)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl IdentityHandler for StubHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn check_auth(&self, _parts: &Parts, _ctx: &RequestContext) -> Result<Option<IdentityProfile>, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            StubOutcome::Identity(identity) => Ok(Some(identity.clone())),
            StubOutcome::NoMatch => Ok(None),
            StubOutcome::Fail => Err(HandlerError::InvalidCredentials("stub failure".to_string())),
            StubOutcome::Pending => std::future::pending().await,
        }
    }
}

/// Sign an HS256 token with [`TEST_SECRET`], valid for an hour
pub fn sign_token(email: &str, org_id: &str, groups: &[&str]) -> String {
    let claims = serde_json::json!({
        "email": email,
        "org_id": org_id,
        "groups": groups.iter().map(|name| serde_json::json!({ "name": name })).collect::<Vec<_>>(),
        "exp": (Utc::now() + chrono::Duration::hours(1)).timestamp(),
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_SECRET.as_bytes())).unwrap()
}

pub fn parts_with_bearer(token: &str) -> Parts {
    axum::http::Request::builder()
        .uri("http://localhost/test")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(())
        .unwrap()
        .into_parts()
        .0
}

/// Configuration with the token and proxy header handlers enabled, in that order
pub fn create_test_config() -> Config {
    Config {
        auth: AuthConfig {
            handlers: vec![HandlerKind::Token, HandlerKind::ProxyHeader],
            token: TokenAuthConfig {
                secret: Some(TEST_SECRET.to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}
