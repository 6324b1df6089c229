//! # aclgate: per-request authentication and ACL resolution
//!
//! `aclgate` sits in front of an HTTP service and answers, for every inbound request, two
//! questions: *who is calling* and *what may they do*. The answer is an
//! [`AuthorizationContext`](auth::context::AuthorizationContext) attached to the request, which
//! route handlers read through the [`AuthInfo`](auth::current::AuthInfo) extractor.
//!
//! ## Request Flow
//!
//! The [`auth_middleware`](auth::middleware::auth_middleware) intercepts every request that is
//! not exempt (CORS preflights and configured anonymous routes). It hands the request to the
//! [`AuthenticationManager`](auth::manager::AuthenticationManager), which:
//!
//! 1. tries the configured identity handlers in order (bearer token, trusted proxy headers) until
//!    one produces an identity; handler failures are logged and skipped,
//! 2. resolves the identity's roles from the role mapping records of its organization,
//! 3. resolves the ACL entries of those roles,
//! 4. publishes the context on the request.
//!
//! Requests no handler can authenticate get 401. Requests whose roles or ACL cannot be read get
//! 500: authorization data that cannot be read is never treated as "no permissions".
//!
//! ## Storage
//!
//! Role mappings and ACL rules live in PostgreSQL (see [`migrator`]); [`store::InMemoryStore`]
//! provides the same interface for tests and embedding.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use aclgate::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = aclgate::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     aclgate::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod store;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use crate::{
    api::handlers::{authz, health},
    auth::{manager::AuthState, middleware::auth_middleware},
    store::PostgresStore,
};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use bon::Builder;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, Level};

pub use config::Config;

/// Shared state of the HTTP application.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .auth(auth)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub auth: AuthState,
    pub metrics: Option<PrometheusHandle>,
}

/// Get the aclgate database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the application router.
///
/// Everything except `/internal/metrics` sits behind the authentication middleware; exemptions
/// such as `/healthz` are decided by the middleware from configuration.
pub fn build_router(state: &AppState) -> Router {
    let protected = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/authz/whoami", get(authz::whoami))
        .route("/authz/check", get(authz::check_access))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());

    let mut router = protected;

    if let Some(handle) = state.metrics.clone() {
        router = router.route(
            "/internal/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    router
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Connect to the database, run migrations and build the router.
    ///
    /// The authentication handler chain is built on the first protected request, so a broken
    /// `auth` section surfaces as 500 responses rather than a startup failure when configuration
    /// validation was bypassed.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting aclgate with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;
        let store = Arc::new(PostgresStore::new(pool.clone()));
        let auth = AuthState::from_config(config.auth.clone(), store.clone(), store);

        let metrics = if config.enable_metrics {
            Some(telemetry::get_or_install_prometheus_handle()?)
        } else {
            None
        };

        let app_state = AppState::builder()
            .config(config.clone())
            .auth(auth)
            .maybe_metrics(metrics)
            .build();
        let router = build_router(&app_state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("aclgate listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
