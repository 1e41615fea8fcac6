// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Username template EKS expands for nodes joining through a mapped role
pub const NODE_USERNAME_TEMPLATE: &str = "system:node:{{EC2PrivateDNSName}}";

pub const NODE_GROUPS: &[&str] = &["system:bootstrappers", "system:nodes"];

/// Kind of access entry created for the node principal
pub const EC2_LINUX_ACCESS_ENTRY: &str = "EC2_LINUX";

/// Binding of an external principal to in-cluster groups
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthEntry {
    pub rolearn: String,
    pub username: String,
    pub groups: Vec<String>,
}

impl AuthEntry {
    /// Entry letting nodes launched with `role_arn` join the cluster
    pub fn for_node_role(role_arn: impl Into<String>) -> Self {
        Self {
            rolearn: role_arn.into(),
            username: NODE_USERNAME_TEMPLATE.to_string(),
            groups: NODE_GROUPS.iter().map(|g| g.to_string()).collect(),
        }
    }
}

/// How the node principal ended up bound inside the cluster
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MergeOutcome {
    /// An entry with the same principal already existed
    AlreadyPresent,
    Appended,
    /// No cluster connection was supplied; only the access entry was ensured
    Skipped,
}

/// Result of reconciling cluster authentication for one onboarding
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthReconciliation {
    pub entry: AuthEntry,
    pub access_entry_created: bool,
    pub legacy_merge: MergeOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_entry_uses_bootstrap_groups() {
        let entry = AuthEntry::for_node_role("arn:aws:iam::1:role/node");

        assert_eq!(entry.username, "system:node:{{EC2PrivateDNSName}}");
        assert_eq!(entry.groups, vec!["system:bootstrappers", "system:nodes"]);
    }
}
