//! Role resolution: matching an identity against the role mapping records of its organization.

use crate::{
    auth::identity::IdentityProfile,
    errors::Error,
    types::{IdentifierType, Role, RoleMappingRecord},
};
use std::collections::BTreeSet;
use tracing::{trace, warn};

fn matches(identity: &IdentityProfile, record: &RoleMappingRecord) -> bool {
    let value = record.identifier_value.as_str();
    match &record.identifier_type {
        IdentifierType::Email => identity.email.as_deref() == Some(value),
        IdentifierType::OrgId => identity.organization_id.as_deref() == Some(value),
        IdentifierType::OrgGroup => {
            // Without an organization there is no "{org}/{group}" to compare against
            let Some(org_id) = identity.organization_id.as_deref() else {
                return false;
            };
            identity.groups.iter().any(|group| {
                value
                    .strip_prefix(org_id)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .is_some_and(|name| name == group.name)
            })
        }
        IdentifierType::Unknown(identifier_type) => {
            report_unknown_identifier_type(identifier_type);
            false
        }
    }
}

fn report_unknown_identifier_type(identifier_type: &str) {
    let err = Error::UnknownIdentifierType {
        identifier_type: identifier_type.to_string(),
    };
    warn!("{}, skipping role mapping record", err);
    metrics::counter!("aclgate_unknown_identifier_type_total", "identifier_type" => identifier_type.to_string()).increment(1);
}

/// Union of the roles of every record matching `identity`. Matching no record yields an empty
/// set, which is a valid outcome.
pub fn resolve_roles(identity: &IdentityProfile, records: &[RoleMappingRecord]) -> BTreeSet<Role> {
    let mut roles = BTreeSet::new();

    for record in records {
        if matches(identity, record) {
            trace!(
                "Role mapping {} '{}' matched, granting {:?}",
                record.identifier_type, record.identifier_value, record.roles
            );
            roles.extend(record.roles.iter().cloned());
        }
    }

    roles
}
