//! HTTP API exposing the resolved authorization context.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - `GET /healthz`: Liveness, exempt from authentication by default
//! - `GET /authz/whoami`: The caller's identity, roles and ACL
//! - `GET /authz/check?path=...&action=...`: Whether the caller's ACL permits an action on a path
//! - `GET /internal/metrics`: Prometheus metrics, when enabled

pub mod handlers;
pub mod models;
