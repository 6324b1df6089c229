//! Bearer token (JWT) identity handler.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

use crate::{
    auth::identity::{Group, IdentityHandler, IdentityProfile, RequestContext},
    config::TokenAuthConfig,
    errors::{Error, HandlerError},
};

/// Claims read from the identity provider's token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "imsOrgId")]
    pub org_id: Option<String>,
    #[serde(default)]
    pub groups: Vec<Group>,
    pub exp: i64,
}

impl From<TokenClaims> for IdentityProfile {
    fn from(claims: TokenClaims) -> Self {
        Self {
            email: claims.email,
            organization_id: claims.org_id,
            groups: claims.groups,
        }
    }
}

pub struct TokenHandler {
    key: DecodingKey,
    validation: Validation,
}

impl TokenHandler {
    pub fn new(config: &TokenAuthConfig) -> Result<Self, Error> {
        let secret = config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidConfiguration {
                message: "auth.token.secret is required when the token handler is enabled".to_string(),
            })?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway.as_secs();
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
            validation.required_spec_claims.insert("iss".to_string());
        }
        match &config.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                validation.required_spec_claims.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Verify and decode a bearer token
    pub fn verify(&self, token: &str) -> Result<IdentityProfile, HandlerError> {
        let token_data = decode::<TokenClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            // Rejected credentials - malformed tokens, invalid claims, expired tokens
            jsonwebtoken::errors::ErrorKind::InvalidToken
            | jsonwebtoken::errors::ErrorKind::InvalidSignature
            | jsonwebtoken::errors::ErrorKind::ExpiredSignature
            | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
            | jsonwebtoken::errors::ErrorKind::InvalidIssuer
            | jsonwebtoken::errors::ErrorKind::InvalidAudience
            | jsonwebtoken::errors::ErrorKind::InvalidSubject
            | jsonwebtoken::errors::ErrorKind::ImmatureSignature
            | jsonwebtoken::errors::ErrorKind::Base64(_)
            | jsonwebtoken::errors::ErrorKind::Json(_)
            | jsonwebtoken::errors::ErrorKind::Utf8(_)
            | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => HandlerError::InvalidCredentials(e.to_string()),

            // Anything else is a fault on our side
            _ => HandlerError::Other(anyhow::anyhow!("JWT verification: {e}")),
        })?;

        Ok(IdentityProfile::from(token_data.claims))
    }
}

#[async_trait]
impl IdentityHandler for TokenHandler {
    fn name(&self) -> &'static str {
        "token"
    }

    #[instrument(skip_all)]
    async fn check_auth(&self, parts: &Parts, _ctx: &RequestContext) -> Result<Option<IdentityProfile>, HandlerError> {
        let Some(auth_header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(None);
        };

        let auth_str = auth_header.to_str().map_err(|e| HandlerError::MalformedHeader {
            header: AUTHORIZATION.to_string(),
            message: e.to_string(),
        })?;

        let Some(token) = auth_str.strip_prefix("Bearer ") else {
            trace!("Authorization header is not a bearer token");
            return Ok(None);
        };

        self.verify(token.trim()).map(Some)
    }
}
