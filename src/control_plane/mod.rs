// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fleet-management control plane seam.

pub mod client;
pub mod memory;
pub mod types;

pub use client::HttpControlPlane;
pub use memory::MemoryControlPlane;
pub use types::*;

use crate::error::ApiResult;
use crate::secret::Secret;
use async_trait::async_trait;

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Phase-1: make the cluster known to the control plane
    async fn register_cluster(&self, request: &RegisterClusterRequest) -> ApiResult<ExternalCluster>;

    /// Issue the token the monitoring agent authenticates with
    async fn create_cluster_token(&self, cluster_id: &str) -> ApiResult<Secret<String>>;

    /// Principal the control plane assumes roles as (EKS only)
    async fn delegate_principal(&self, cluster_id: &str) -> ApiResult<String>;

    /// Phase-2: hand over management credentials
    async fn elevate_cluster(
        &self,
        cluster_id: &str,
        request: &ElevateClusterRequest,
    ) -> ApiResult<ExternalCluster>;

    async fn update_cluster_network(
        &self,
        cluster_id: &str,
        update: &ClusterNetworkUpdate,
    ) -> ApiResult<()>;

    /// Create the configuration, or update it in place when one with the same name exists.
    /// Returns its id.
    async fn upsert_node_configuration(
        &self,
        cluster_id: &str,
        configuration: &NodeConfiguration,
    ) -> ApiResult<String>;

    async fn set_default_node_configuration(
        &self,
        cluster_id: &str,
        configuration_id: &str,
    ) -> ApiResult<()>;
}
