//! External role and ACL stores.
//!
//! The authentication manager never reads authorization data from anywhere but these two
//! traits. Both lookups are keyed by organization:
//!
//! ```text
//! ┌──────────────────────┐      organization_id       ┌─────────────┐
//! │ AuthenticationManager│ ─────────────────────────→ │  RoleStore  │ → Vec<RoleMappingRecord>
//! └──────────┬───────────┘                            └─────────────┘
//!            │ organization_id + resolved roles
//!            ↓
//!     ┌─────────────┐
//!     │  AclStore   │ → Vec<AclRule>
//!     └─────────────┘
//! ```
//!
//! # Implementations
//!
//! - [`PostgresStore`]: production store backed by the `role_mappings` and `acl_rules` tables
//! - [`InMemoryStore`]: process-local store for tests and embedding

use crate::types::{AclRule, Role, RoleMappingRecord};
use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Errors raised by a store query
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying database query failed
    #[error("store query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// A row was returned but could not be decoded
    #[error("store row could not be decoded: {0}")]
    Decode(String),

    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Type alias for store query results
pub type Result<T> = std::result::Result<T, StoreError>;

/// Source of role mapping records.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// All role mapping records of an organization. Identifier matching is done by the caller.
    async fn role_mappings(&self, organization_id: &str) -> Result<Vec<RoleMappingRecord>>;
}

/// Source of per-role ACL rules.
#[async_trait]
pub trait AclStore: Send + Sync {
    /// The ACL rules of an organization whose role is a member of `roles`, in store order.
    async fn acl_rules(&self, organization_id: &str, roles: &BTreeSet<Role>) -> Result<Vec<AclRule>>;
}
