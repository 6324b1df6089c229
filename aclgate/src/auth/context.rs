//! The per-request authorization context published after a successful authentication.
//!
//! # Path matching
//!
//! [`AuthorizationContext::permits`] evaluates the ACL the way downstream handlers are expected
//! to:
//!
//! - A pattern without a trailing `*` matches only the identical path.
//! - A pattern ending in `*` matches every path starting with the text before the `*`.
//! - The most specific matching pattern wins: an exact match beats any wildcard, and a longer
//!   wildcard prefix beats a shorter one.
//! - Entries sharing the winning pattern have their actions unioned. If the union is empty the
//!   path is explicitly denied, even when a broader pattern would allow it.

use crate::{
    auth::identity::IdentityProfile,
    types::{AclEntry, Action, Role},
};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationContext {
    pub identity: IdentityProfile,
    pub roles: BTreeSet<Role>,
    pub acl: Vec<AclEntry>,
    pub scope_entity_types: BTreeSet<String>,
}

/// How specifically a pattern matched a path; larger is more specific
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Specificity {
    Prefix(usize),
    Exact,
}

fn match_pattern(pattern: &str, path: &str) -> Option<Specificity> {
    match pattern.strip_suffix('*') {
        Some(prefix) if path.starts_with(prefix) => Some(Specificity::Prefix(prefix.len())),
        Some(_) => None,
        None if pattern == path => Some(Specificity::Exact),
        None => None,
    }
}

impl AuthorizationContext {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }

    /// The actions granted on `path` by its most specific matching pattern, or `None` when no
    /// entry matches at all.
    pub fn actions_for(&self, path: &str) -> Option<BTreeSet<Action>> {
        let best = self.acl.iter().filter_map(|entry| match_pattern(&entry.path, path)).max()?;

        Some(
            self.acl
                .iter()
                .filter(|entry| match_pattern(&entry.path, path) == Some(best))
                .flat_map(|entry| entry.actions.iter().copied())
                .collect(),
        )
    }

    pub fn permits(&self, path: &str, action: Action) -> bool {
        self.actions_for(path).is_some_and(|actions| actions.contains(&action))
    }
}
