//! Process-local role and ACL store.
//!
//! Records are kept per organization in insertion order. The store can be switched into a
//! failing mode and counts the queries it serves, which makes it the store double of choice
//! for exercising the resolution engine.

use crate::{
    store::{AclStore, Result, RoleStore, StoreError},
    types::{AclRule, Role, RoleMappingRecord},
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    role_mappings: DashMap<String, Vec<RoleMappingRecord>>,
    acl_rules: DashMap<String, Vec<AclRule>>,
    fail_role_queries: AtomicBool,
    fail_acl_queries: AtomicBool,
    role_queries: AtomicUsize,
    acl_queries: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_role_mapping(&self, organization_id: &str, record: RoleMappingRecord) {
        self.role_mappings.entry(organization_id.to_string()).or_default().push(record);
    }

    pub fn add_acl_rule(&self, organization_id: &str, rule: AclRule) {
        self.acl_rules.entry(organization_id.to_string()).or_default().push(rule);
    }

    /// Make subsequent role queries fail with [`StoreError::Unavailable`]
    pub fn fail_role_queries(&self, fail: bool) {
        self.fail_role_queries.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent ACL queries fail with [`StoreError::Unavailable`]
    pub fn fail_acl_queries(&self, fail: bool) {
        self.fail_acl_queries.store(fail, Ordering::SeqCst);
    }

    /// Number of role queries served, including failed ones
    pub fn role_query_count(&self) -> usize {
        self.role_queries.load(Ordering::SeqCst)
    }

    /// Number of ACL queries served, including failed ones
    pub fn acl_query_count(&self) -> usize {
        self.acl_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn role_mappings(&self, organization_id: &str) -> Result<Vec<RoleMappingRecord>> {
        self.role_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_role_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("role store is switched off".to_string()));
        }

        Ok(self
            .role_mappings
            .get(organization_id)
            .map(|records| records.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AclStore for InMemoryStore {
    async fn acl_rules(&self, organization_id: &str, roles: &BTreeSet<Role>) -> Result<Vec<AclRule>> {
        self.acl_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_acl_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("ACL store is switched off".to_string()));
        }

        Ok(self
            .acl_rules
            .get(organization_id)
            .map(|rules| rules.iter().filter(|rule| roles.contains(&rule.role)).cloned().collect())
            .unwrap_or_default())
    }
}
