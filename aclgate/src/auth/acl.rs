//! ACL resolution: turning a role set into the ordered ACL of an organization.

use crate::{
    errors::{Error, Result},
    store::AclStore,
    types::{AclEntry, Role},
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

pub struct AclResolver {
    store: Arc<dyn AclStore>,
}

impl AclResolver {
    pub fn new(store: Arc<dyn AclStore>) -> Self {
        Self { store }
    }

    /// Flatten the ACL rules granted to `roles` into one ordered sequence.
    ///
    /// Rule order is the store's order and entry order within a rule is preserved. Duplicate
    /// paths are kept; combining them is up to the consumer. Store failures fail closed with
    /// [`Error::AclLookupFailed`], never with an empty ACL.
    #[instrument(skip(self, roles), fields(roles = roles.len()), err)]
    pub async fn resolve_acl(&self, organization_id: &str, roles: &BTreeSet<Role>) -> Result<Vec<AclEntry>> {
        if roles.is_empty() {
            trace!("No roles resolved, skipping ACL lookup");
            return Ok(Vec::new());
        }

        let rules = self.store.acl_rules(organization_id, roles).await.map_err(|source| {
            metrics::counter!("aclgate_acl_lookup_failures_total").increment(1);
            Error::AclLookupFailed {
                organization_id: organization_id.to_string(),
                source,
            }
        })?;

        debug!("Resolved {} ACL rules for {} roles", rules.len(), roles.len());
        Ok(rules.into_iter().flat_map(|rule| rule.entries).collect())
    }
}
