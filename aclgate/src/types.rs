//! Common type definitions for role mapping and access control.
//!
//! This module defines:
//! - [`Role`]: opaque role tag assigned to an identity
//! - [`IdentifierType`] and [`RoleMappingRecord`]: rules read from the role store
//! - [`Action`], [`AclEntry`] and [`AclRule`]: path-scoped permissions read from the ACL store
//!
//! # Wire formats
//!
//! Role mapping identifier types are stored as `EMAIL`, `ORG_ID` or `ORG_GROUP`. The legacy
//! spellings `email`, `imsorgid` and `imsorgid/groupname` are accepted on read. Anything else is
//! kept as [`IdentifierType::Unknown`] so that the role resolver can skip and report it.
//!
//! ACL actions accept either the full name (`CREATE`, `READ`, ...) or the single-letter shorthand
//! (`C`, `R`, `U`, `D`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An opaque permission-grouping tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// How a role mapping record identifies the identities it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IdentifierType {
    /// Matches the identity's email address
    Email,
    /// Matches the identity's organization ID
    OrgId,
    /// Matches `{organization_id}/{group_name}` for any of the identity's groups
    OrgGroup,
    /// Unrecognised type, preserved verbatim for reporting
    Unknown(String),
}

impl IdentifierType {
    pub fn as_str(&self) -> &str {
        match self {
            IdentifierType::Email => "EMAIL",
            IdentifierType::OrgId => "ORG_ID",
            IdentifierType::OrgGroup => "ORG_GROUP",
            IdentifierType::Unknown(other) => other,
        }
    }
}

impl From<&str> for IdentifierType {
    fn from(value: &str) -> Self {
        match value {
            "EMAIL" | "email" => IdentifierType::Email,
            "ORG_ID" | "imsorgid" => IdentifierType::OrgId,
            "ORG_GROUP" | "imsorgid/groupname" => IdentifierType::OrgGroup,
            other => IdentifierType::Unknown(other.to_string()),
        }
    }
}

impl From<String> for IdentifierType {
    fn from(value: String) -> Self {
        IdentifierType::from(value.as_str())
    }
}

impl From<IdentifierType> for String {
    fn from(value: IdentifierType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role mapping rule read from the role store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMappingRecord {
    pub identifier_type: IdentifierType,
    pub identifier_value: String,
    pub roles: BTreeSet<Role>,
}

impl RoleMappingRecord {
    pub fn new<I, R>(identifier_type: IdentifierType, identifier_value: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            identifier_type,
            identifier_value: identifier_value.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

// Actions that can be permitted on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    #[serde(alias = "C")]
    Create,
    #[serde(alias = "R")]
    Read,
    #[serde(alias = "U")]
    Update,
    #[serde(alias = "D")]
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "Create"),
            Action::Read => write!(f, "Read"),
            Action::Update => write!(f, "Update"),
            Action::Delete => write!(f, "Delete"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "C" | "CREATE" => Ok(Action::Create),
            "R" | "READ" => Ok(Action::Read),
            "U" | "UPDATE" => Ok(Action::Update),
            "D" | "DELETE" => Ok(Action::Delete),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// A path pattern paired with the actions permitted on it.
///
/// An empty `actions` set is an explicit denial for the pattern, which is different from the
/// pattern having no entry at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    #[serde(alias = "pathPattern")]
    pub path: String,
    #[serde(default)]
    pub actions: BTreeSet<Action>,
}

impl AclEntry {
    pub fn new(path: impl Into<String>, actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            path: path.into(),
            actions: actions.into_iter().collect(),
        }
    }
}

/// The ACL entries granted to a single role, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRule {
    pub role: Role,
    #[serde(alias = "acl")]
    pub entries: Vec<AclEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_type_accepts_legacy_spellings() {
        assert_eq!(IdentifierType::from("email"), IdentifierType::Email);
        assert_eq!(IdentifierType::from("imsorgid"), IdentifierType::OrgId);
        assert_eq!(IdentifierType::from("imsorgid/groupname"), IdentifierType::OrgGroup);
        assert_eq!(IdentifierType::from("ORG_GROUP"), IdentifierType::OrgGroup);
        assert_eq!(IdentifierType::from("phone"), IdentifierType::Unknown("phone".to_string()));
    }

    #[test]
    fn test_unknown_identifier_type_survives_serialization() {
        let record: RoleMappingRecord = serde_json::from_value(serde_json::json!({
            "identifier_type": "ldap_dn",
            "identifier_value": "cn=admins",
            "roles": ["admin"]
        }))
        .unwrap();

        assert_eq!(record.identifier_type, IdentifierType::Unknown("ldap_dn".to_string()));
        assert_eq!(serde_json::to_value(&record).unwrap()["identifier_type"], "ldap_dn");
    }

    #[test]
    fn test_acl_entry_accepts_action_shorthand() {
        let entry: AclEntry = serde_json::from_value(serde_json::json!({
            "path": "/organization/*",
            "actions": ["C", "R", "UPDATE", "D", "R"]
        }))
        .unwrap();

        assert_eq!(
            entry.actions,
            BTreeSet::from([Action::Create, Action::Read, Action::Update, Action::Delete])
        );
    }

    #[test]
    fn test_acl_entry_missing_actions_is_explicit_denial() {
        let entry: AclEntry = serde_json::from_value(serde_json::json!({ "pathPattern": "/organization/123" })).unwrap();
        assert_eq!(entry.path, "/organization/123");
        assert!(entry.actions.is_empty());
    }

    #[test]
    fn test_acl_rule_accepts_acl_alias() {
        let rule: AclRule = serde_json::from_value(serde_json::json!({
            "role": "org-viewer",
            "acl": [{ "path": "/organization/*", "actions": ["R"] }]
        }))
        .unwrap();

        assert_eq!(rule.role, Role::from("org-viewer"));
        assert_eq!(rule.entries, vec![AclEntry::new("/organization/*", [Action::Read])]);
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("r".parse::<Action>().unwrap(), Action::Read);
        assert_eq!("Delete".parse::<Action>().unwrap(), Action::Delete);
        assert!("X".parse::<Action>().is_err());
    }
}
