use crate::types::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Query parameters of `GET /authz/check`
#[derive(Debug, Clone, Deserialize)]
pub struct AccessCheckQuery {
    pub path: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCheckResponse {
    pub path: String,
    pub action: Action,
    pub allowed: bool,
    /// Actions granted by the most specific matching ACL pattern, absent when nothing matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granted: Option<BTreeSet<Action>>,
}
