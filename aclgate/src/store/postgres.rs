//! PostgreSQL-backed role and ACL store.

use crate::{
    store::{AclStore, Result, RoleStore, StoreError},
    types::{AclEntry, AclRule, IdentifierType, Role, RoleMappingRecord},
};
use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use std::collections::BTreeSet;
use tracing::instrument;

// Database entity models
#[derive(Debug, Clone, FromRow)]
struct RoleMappingRow {
    identifier_type: String,
    identifier_value: String,
    roles: Vec<String>,
}

#[derive(Debug, Clone, FromRow)]
struct AclRuleRow {
    role: String,
    entries: Json<Vec<AclEntry>>,
}

impl From<RoleMappingRow> for RoleMappingRecord {
    fn from(row: RoleMappingRow) -> Self {
        RoleMappingRecord::new(IdentifierType::from(row.identifier_type), row.identifier_value, row.roles)
    }
}

impl From<AclRuleRow> for AclRule {
    fn from(row: AclRuleRow) -> Self {
        Self {
            role: Role::from(row.role),
            entries: row.entries.0,
        }
    }
}

/// Store backed by the `role_mappings` and `acl_rules` tables.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    db: PgPool,
}

impl PostgresStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn role_mappings(&self, organization_id: &str) -> Result<Vec<RoleMappingRecord>> {
        let rows = sqlx::query_as::<_, RoleMappingRow>(
            r#"
            SELECT identifier_type, identifier_value, roles
            FROM role_mappings
            WHERE organization_id = $1
            ORDER BY id
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(RoleMappingRecord::from).collect())
    }
}

#[async_trait]
impl AclStore for PostgresStore {
    #[instrument(skip(self, roles), fields(roles = roles.len()), err)]
    async fn acl_rules(&self, organization_id: &str, roles: &BTreeSet<Role>) -> Result<Vec<AclRule>> {
        let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, AclRuleRow>(
            r#"
            SELECT role, entries
            FROM acl_rules
            WHERE organization_id = $1 AND role = ANY($2)
            ORDER BY position, id
            "#,
        )
        .bind(organization_id)
        .bind(&roles)
        .fetch_all(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::ColumnDecode { index, source } => StoreError::Decode(format!("acl_rules column {index}: {source}")),
            other => StoreError::Query(other),
        })?;

        Ok(rows.into_iter().map(AclRule::from).collect())
    }
}
