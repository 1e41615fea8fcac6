// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::secret::Secret;
use serde::Serialize;

/// Who may act as a provisioned identity
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrustStatement {
    pub principal: String,
    pub action: String,
}

/// A principal the control plane uses to manage the cluster's cloud resources.
///
/// Created once per onboarding; afterwards only the attachment list may grow.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CloudIdentity {
    /// Role ARN (AWS) or service account email (GCP)
    pub stable_id: String,
    pub trust: TrustStatement,
    attachments: Vec<String>,
    pub detail: IdentityDetail,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase", tag = "provider")]
pub enum IdentityDetail {
    #[serde(rename = "aws", rename_all = "camelCase")]
    Aws {
        role_name: String,
        node_role_arn: String,
        instance_profile_arn: String,
    },
    #[serde(rename = "gcp", rename_all = "camelCase")]
    Gcp { credentials_json: Secret<String> },
}

impl CloudIdentity {
    pub fn new(stable_id: impl Into<String>, trust: TrustStatement, detail: IdentityDetail) -> Self {
        Self {
            stable_id: stable_id.into(),
            trust,
            attachments: Vec::new(),
            detail,
        }
    }

    /// Record an attached policy or role binding; repeated attachments are ignored
    pub fn attach(&mut self, permission: impl Into<String>) {
        let permission = permission.into();
        if !self.attachments.contains(&permission) {
            self.attachments.push(permission);
        }
    }

    pub fn attachments(&self) -> &[String] {
        &self.attachments
    }

    /// The principal that must be bound inside the cluster for provisioned nodes to join
    pub fn node_principal(&self) -> Option<&str> {
        match &self.detail {
            IdentityDetail::Aws { node_role_arn, .. } => Some(node_role_arn),
            IdentityDetail::Gcp { .. } => None,
        }
    }

    pub fn instance_profile_arn(&self) -> Option<&str> {
        match &self.detail {
            IdentityDetail::Aws {
                instance_profile_arn,
                ..
            } => Some(instance_profile_arn),
            IdentityDetail::Gcp { .. } => None,
        }
    }
}
