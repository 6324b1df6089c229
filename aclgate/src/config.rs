//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `ACLGATE_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `ACLGATE_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `ACLGATE_AUTH__TOKEN__SECRET=...` sets the `auth.token.secret` field.
//!
//! ## Example
//!
//! ```yaml
//! port: 3001
//! database:
//!   url: postgres://localhost/aclgate
//! auth:
//!   # Tried in this order; the first handler that authenticates the request wins
//!   handlers: [token, proxy_header]
//!   token:
//!     secret: change-me
//!     issuer: https://idp.example.com
//!   anonymous_routes:
//!     - GET /healthz
//!     - POST /slack/events
//!   anonymous_prefixes:
//!     - POST /hooks/site-detection/
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, time::Duration};

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ACLGATE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Set from the `DATABASE_URL` environment variable; overrides `database.url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Role and ACL store connection settings
    pub database: DatabaseConfig,
    /// Install a Prometheus recorder and serve it at `/internal/metrics`
    pub enable_metrics: bool,
    /// Upper bound on the handling time of a request, authentication included
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Authentication chain and interceptor configuration
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: None,
            database: DatabaseConfig::default(),
            enable_metrics: false,
            request_timeout: Duration::from_secs(30),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/aclgate".to_string(),
            max_connections: 10,
        }
    }
}

/// The identity handlers that can be placed in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Bearer JWT in the `Authorization` header
    Token,
    /// Identity headers set by a trusted upstream proxy
    ProxyHeader,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Identity handlers in priority order. Must not be empty.
    pub handlers: Vec<HandlerKind>,
    /// Bearer token handler settings
    pub token: TokenAuthConfig,
    /// Proxy header handler settings
    pub proxy_header: ProxyHeaderAuthConfig,
    /// `METHOD /path` pairs that bypass authentication entirely
    pub anonymous_routes: Vec<String>,
    /// `METHOD /prefix` rules that bypass authentication for every path under the prefix
    pub anonymous_prefixes: Vec<String>,
    /// Entity types the published ACL paths are scoped to
    pub scope_entity_types: BTreeSet<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            handlers: vec![HandlerKind::Token],
            token: TokenAuthConfig::default(),
            proxy_header: ProxyHeaderAuthConfig::default(),
            anonymous_routes: vec![
                "GET /healthz".to_string(),
                "GET /slack/events".to_string(),
                "POST /slack/events".to_string(),
            ],
            anonymous_prefixes: vec!["POST /hooks/site-detection/".to_string()],
            scope_entity_types: BTreeSet::from(["organization".to_string()]),
        }
    }
}

/// Bearer token authentication configuration.
///
/// Tokens are HS256 JWTs signed with `secret`. The identity is read from the `email`, `org_id`
/// and `groups` claims.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenAuthConfig {
    /// Shared signing secret (required when the token handler is enabled)
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Required `iss` claim, if set
    pub issuer: Option<String>,
    /// Required `aud` claim, if set
    pub audience: Option<String>,
    /// Clock skew tolerated when checking `exp`
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl fmt::Debug for TokenAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl Default for TokenAuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: None,
            audience: None,
            leeway: Duration::from_secs(60),
        }
    }
}

/// Proxy header-based authentication configuration.
///
/// Only enable this handler behind a proxy that strips these headers from client requests;
/// otherwise any client can claim any identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyHeaderAuthConfig {
    /// HTTP header containing the user's email
    pub email_header_name: String,
    /// HTTP header containing the user's organization ID
    pub organization_header_name: String,
    /// HTTP header containing the user's groups
    pub groups_header_name: String,
    /// Separator between group names in `groups_header_name`
    pub group_separator: String,
}

impl Default for ProxyHeaderAuthConfig {
    fn default() -> Self {
        Self {
            email_header_name: "x-aclgate-email".to_string(),
            organization_header_name: "x-aclgate-organization".to_string(),
            groups_header_name: "x-aclgate-groups".to_string(),
            group_separator: ",".to_string(),
        }
    }
}

impl AuthConfig {
    /// Check that a handler chain can be built from this configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.handlers.is_empty() {
            return Err(Error::InvalidConfiguration {
                message: "No handlers provided".to_string(),
            });
        }

        if self.handlers.contains(&HandlerKind::Token) && self.token.secret.as_deref().is_none_or(str::is_empty) {
            return Err(Error::InvalidConfiguration {
                message: "auth.token.secret is required when the token handler is enabled".to_string(),
            });
        }

        if self.handlers.contains(&HandlerKind::ProxyHeader) && self.proxy_header.group_separator.is_empty() {
            return Err(Error::InvalidConfiguration {
                message: "auth.proxy_header.group_separator must not be empty".to_string(),
            });
        }

        for route in self.anonymous_routes.iter().chain(&self.anonymous_prefixes) {
            if route.split_once(' ').is_none() {
                return Err(Error::InvalidConfiguration {
                    message: format!("Anonymous route '{route}' must have the form 'METHOD /path'"),
                });
            }
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from file and environment, then validate it.
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfiguration {
                message: "request_timeout must be greater than zero".to_string(),
            });
        }
        self.auth.validate()
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            // ACLGATE_CONFIG names the file itself and is not a config key
            .merge(Env::prefixed("ACLGATE_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
