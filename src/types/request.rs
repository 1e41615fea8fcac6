// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::DEFAULT_API_URL;
use crate::secret::Secret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable input of one onboarding run
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRequest {
    pub cluster_name: String,
    pub cloud: CloudLocation,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub api_token: Secret<String>,
    /// `false` registers the cluster for monitoring only
    #[serde(default)]
    pub full_management: bool,
    #[serde(default)]
    pub network: NetworkScope,
    #[serde(default)]
    pub delete_nodes_on_disconnect: bool,
    #[serde(default)]
    pub components: ComponentToggles,
    /// Extra tags applied to nodes provisioned by the control plane
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum CloudLocation {
    #[serde(rename_all = "camelCase")]
    Eks {
        account_id: String,
        region: String,
        /// Discovered from the cluster when omitted
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vpc_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Gke { project_id: String, location: String },
}

impl CloudLocation {
    /// Provider key understood by the control plane and the cluster components
    pub fn provider(&self) -> &'static str {
        match self {
            CloudLocation::Eks { .. } => "eks",
            CloudLocation::Gke { .. } => "gke",
        }
    }
}

/// Where nodes provisioned by the control plane are placed.
///
/// Only consulted in full-management mode.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkScope {
    #[serde(default)]
    pub subnets: Vec<String>,
    /// EKS: security groups attached to provisioned nodes
    #[serde(default)]
    pub security_groups: Vec<String>,
    /// GKE: network tags attached to provisioned nodes
    #[serde(default)]
    pub network_tags: Vec<String>,
}

/// Optional cluster components, all off by default
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentToggles {
    #[serde(default)]
    pub workload_autoscaler: bool,
    #[serde(default)]
    pub egressd: bool,
    #[serde(default)]
    pub security_agent: bool,
}

impl OnboardingRequest {
    pub fn provider(&self) -> &'static str {
        self.cloud.provider()
    }

    pub fn is_eks(&self) -> bool {
        matches!(self.cloud, CloudLocation::Eks { .. })
    }
}
