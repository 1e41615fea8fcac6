// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wire types of the control-plane REST API.

use crate::secret::Secret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Phase-1 registration payload: provider, location and name only
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClusterRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks: Option<EksLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gke: Option<GkeLocation>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EksLocation {
    pub account_id: String,
    pub region: String,
    pub cluster_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GkeLocation {
    pub project_id: String,
    pub location: String,
    pub cluster_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCluster {
    pub id: String,
    #[serde(default)]
    pub credentials_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClusterToken {
    pub token: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AssumeRoleUser {
    pub arn: String,
}

/// Phase-2 payload granting the control plane management credentials
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ElevateClusterRequest {
    /// GKE service account key JSON, exposed only when the request is serialized
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::secret::expose_option"
    )]
    pub credentials: Option<Secret<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eks: Option<EksCredentials>,
    pub delete_nodes_on_disconnect: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EksCredentials {
    pub assume_role_arn: String,
}

/// Node placement details only known after provisioning
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkUpdate {
    pub eks: EksNetwork,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EksNetwork {
    pub instance_profile_arn: String,
    pub security_groups: Vec<String>,
}

/// Template for nodes the control plane provisions
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfiguration {
    pub name: String,
    pub subnets: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks: Option<EksNodeConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gke: Option<GkeNodeConfiguration>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EksNodeConfiguration {
    pub security_groups: Vec<String>,
    pub instance_profile_arn: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GkeNodeConfiguration {
    pub disk_type: String,
    pub network_tags: Vec<String>,
    pub max_pods_per_node: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigurationRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NodeConfigurationList {
    #[serde(default)]
    pub items: Vec<NodeConfigurationRef>,
}
