use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The handler chain cannot be built from the given configuration
    #[error("Invalid authentication configuration: {message}")]
    InvalidConfiguration { message: String },

    /// No identity handler was able to authenticate the request
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The role store could not be queried after a successful authentication
    #[error("Failed to look up role mappings for organization {organization_id}")]
    RoleLookupFailed {
        organization_id: String,
        #[source]
        source: StoreError,
    },

    /// The ACL store could not be queried after a successful authentication
    #[error("Failed to look up ACL rules for organization {organization_id}")]
    AclLookupFailed {
        organization_id: String,
        #[source]
        source: StoreError,
    },

    /// A role mapping record carries an identifier type the resolver does not understand.
    /// Reported and skipped, never returned from a resolution.
    #[error("Unknown role identifier type: {identifier_type}")]
    UnknownIdentifierType { identifier_type: String },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },
}

/// Failure of a single identity handler. Recovered by the authentication manager, which logs it
/// and moves on to the next handler in the chain.
#[derive(ThisError, Debug)]
pub enum HandlerError {
    /// Credentials were presented but rejected
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A header the handler reads is present but unreadable
    #[error("Malformed {header} header: {message}")]
    MalformedHeader { header: String, message: String },

    /// Unexpected error inside the handler
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidConfiguration { .. }
            | Error::RoleLookupFailed { .. }
            | Error::AclLookupFailed { .. }
            | Error::UnknownIdentifierType { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::NotAuthenticated => "Unauthorized".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::InvalidConfiguration { .. } => "Server error".to_string(),
            Error::RoleLookupFailed { .. } | Error::AclLookupFailed { .. } => "Authorization lookup failed".to_string(),
            Error::UnknownIdentifierType { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::InvalidConfiguration { .. } | Error::UnknownIdentifierType { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::RoleLookupFailed { source, .. } | Error::AclLookupFailed { source, .. } => {
                tracing::error!("Authorization lookup error: {} ({})", self, source);
            }
            Error::NotAuthenticated => {
                tracing::info!("Authentication error: {}", self);
            }
            Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
