// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::types::*;
use super::ControlPlane;
use crate::error::{ApiError, ApiResult};
use crate::secret::Secret;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

const DELEGATE_ACCOUNT: &str = "999999999999";

#[derive(Debug, Clone, Default)]
pub struct ClusterState {
    pub name: String,
    pub registration: RegisterClusterRequest,
    pub elevation: Option<ElevateClusterRequest>,
    pub network: Option<ClusterNetworkUpdate>,
    /// id -> configuration
    pub node_configurations: BTreeMap<String, NodeConfiguration>,
    pub default_configuration: Option<String>,
    pub tokens_issued: usize,
}

#[derive(Default)]
struct Inner {
    clusters: BTreeMap<String, ClusterState>,
    calls: Vec<String>,
    failures: HashMap<&'static str, ApiErrorTemplate>,
    next_id: usize,
}

#[derive(Clone)]
enum ApiErrorTemplate {
    Status(u16),
    NotFound,
}

impl ApiErrorTemplate {
    fn build(&self, method: &str) -> ApiError {
        match self {
            ApiErrorTemplate::Status(status) => ApiError::Status {
                status: *status,
                body: format!("{} failed", method),
            },
            ApiErrorTemplate::NotFound => ApiError::NotFound(method.to_string()),
        }
    }
}

/// Control plane kept in process memory. Registration is idempotent by cluster name.
#[derive(Clone, Default)]
pub struct MemoryControlPlane {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `method` fail with the given HTTP status
    pub fn fail_on(self, method: &'static str, status: u16) -> Self {
        self.lock()
            .failures
            .insert(method, ApiErrorTemplate::Status(status));
        self
    }

    pub fn not_found_on(self, method: &'static str) -> Self {
        self.lock().failures.insert(method, ApiErrorTemplate::NotFound);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == method).count()
    }

    pub fn cluster(&self, cluster_id: &str) -> Option<ClusterState> {
        self.lock().clusters.get(cluster_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, method: &'static str) -> ApiResult<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.calls.push(method.to_string());
        if let Some(template) = inner.failures.get(method) {
            return Err(template.build(method));
        }
        Ok(inner)
    }
}

fn cluster_mut<'a>(inner: &'a mut Inner, cluster_id: &str) -> ApiResult<&'a mut ClusterState> {
    inner
        .clusters
        .get_mut(cluster_id)
        .ok_or_else(|| ApiError::NotFound(format!("cluster {}", cluster_id)))
}

#[async_trait]
impl ControlPlane for MemoryControlPlane {
    async fn register_cluster(&self, request: &RegisterClusterRequest) -> ApiResult<ExternalCluster> {
        let mut inner = self.enter("register_cluster")?;

        if let Some((id, _)) = inner
            .clusters
            .iter()
            .find(|(_, c)| c.registration == *request)
        {
            return Ok(ExternalCluster {
                id: id.clone(),
                credentials_id: None,
            });
        }

        inner.next_id += 1;
        let id = format!("{:08x}-0000-4000-8000-{:012x}", inner.next_id, inner.next_id);
        inner.clusters.insert(
            id.clone(),
            ClusterState {
                name: request.name.clone(),
                registration: request.clone(),
                ..Default::default()
            },
        );
        Ok(ExternalCluster {
            id,
            credentials_id: None,
        })
    }

    async fn create_cluster_token(&self, cluster_id: &str) -> ApiResult<Secret<String>> {
        let mut inner = self.enter("create_cluster_token")?;
        let cluster = cluster_mut(&mut inner, cluster_id)?;
        cluster.tokens_issued += 1;
        Ok(Secret::new(format!(
            "bootstrap-{}-{}",
            cluster_id, cluster.tokens_issued
        )))
    }

    async fn delegate_principal(&self, cluster_id: &str) -> ApiResult<String> {
        let mut inner = self.enter("delegate_principal")?;
        cluster_mut(&mut inner, cluster_id)?;
        let suffix: String = cluster_id.chars().take(8).collect();
        Ok(format!(
            "arn:aws:iam::{}:user/cast-crossrole-{}",
            DELEGATE_ACCOUNT, suffix
        ))
    }

    async fn elevate_cluster(
        &self,
        cluster_id: &str,
        request: &ElevateClusterRequest,
    ) -> ApiResult<ExternalCluster> {
        let mut inner = self.enter("elevate_cluster")?;
        let cluster = cluster_mut(&mut inner, cluster_id)?;
        cluster.elevation = Some(request.clone());
        Ok(ExternalCluster {
            id: cluster_id.to_string(),
            credentials_id: Some(format!("cred-{}", cluster_id)),
        })
    }

    async fn update_cluster_network(
        &self,
        cluster_id: &str,
        update: &ClusterNetworkUpdate,
    ) -> ApiResult<()> {
        let mut inner = self.enter("update_cluster_network")?;
        cluster_mut(&mut inner, cluster_id)?.network = Some(update.clone());
        Ok(())
    }

    async fn upsert_node_configuration(
        &self,
        cluster_id: &str,
        configuration: &NodeConfiguration,
    ) -> ApiResult<String> {
        let mut inner = self.enter("upsert_node_configuration")?;
        let cluster = cluster_mut(&mut inner, cluster_id)?;

        let existing = cluster
            .node_configurations
            .iter()
            .find(|(_, c)| c.name == configuration.name)
            .map(|(id, _)| id.clone());
        let id = existing
            .unwrap_or_else(|| format!("cfg-{}", cluster.node_configurations.len() + 1));
        cluster
            .node_configurations
            .insert(id.clone(), configuration.clone());
        Ok(id)
    }

    async fn set_default_node_configuration(
        &self,
        cluster_id: &str,
        configuration_id: &str,
    ) -> ApiResult<()> {
        let mut inner = self.enter("set_default_node_configuration")?;
        let cluster = cluster_mut(&mut inner, cluster_id)?;
        if !cluster.node_configurations.contains_key(configuration_id) {
            return Err(ApiError::NotFound(format!(
                "node configuration {}",
                configuration_id
            )));
        }
        cluster.default_configuration = Some(configuration_id.to_string());
        Ok(())
    }
}
