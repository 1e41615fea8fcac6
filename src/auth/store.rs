// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Access to the shared authentication object with optimistic concurrency.
//!
//! The object is only ever updated in place. A cluster without it authenticates
//! through access entries alone, so a missing object is a read failure and
//! nothing here creates one.

use crate::constants::{aws_auth, OPERATOR_NAME};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::{Patch, PatchParams},
    Api, Client,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// The `mapRoles` field together with the version it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub map_roles: String,
    pub version: String,
}

#[async_trait]
pub trait SharedAuthStore: Send + Sync {
    /// Fails with [`ApiError::NotFound`] when the object does not exist
    async fn read(&self) -> ApiResult<AuthSnapshot>;

    /// Replace `mapRoles` if the object is still at `expected_version`.
    /// Fails with [`ApiError::Conflict`] when another writer got there first.
    async fn write(&self, map_roles: &str, expected_version: &str) -> ApiResult<()>;
}

/// The `kube-system/aws-auth` ConfigMap of an EKS cluster
pub struct KubeAuthStore {
    api: Api<ConfigMap>,
}

impl KubeAuthStore {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::namespaced(client, aws_auth::NAMESPACE),
        }
    }
}

fn object_ref() -> String {
    format!("configmap {}/{}", aws_auth::NAMESPACE, aws_auth::NAME)
}

fn conflict_aware(err: kube::Error) -> ApiError {
    match err {
        kube::Error::Api(resp) if resp.code == 409 => ApiError::Conflict(resp.message),
        kube::Error::Api(resp) if resp.code == 404 => ApiError::NotFound(object_ref()),
        other => ApiError::Kube(other),
    }
}

#[async_trait]
impl SharedAuthStore for KubeAuthStore {
    #[instrument(skip(self))]
    async fn read(&self) -> ApiResult<AuthSnapshot> {
        let Some(cm) = self.api.get_opt(aws_auth::NAME).await? else {
            debug!("{}/{} does not exist", aws_auth::NAMESPACE, aws_auth::NAME);
            return Err(ApiError::NotFound(object_ref()));
        };

        let map_roles = cm
            .data
            .as_ref()
            .and_then(|d| d.get(aws_auth::MAP_ROLES_KEY))
            .cloned()
            .unwrap_or_default();
        let version = cm
            .metadata
            .resource_version
            .ok_or_else(|| ApiError::InvalidResponse(format!("{} has no resourceVersion", object_ref())))?;

        Ok(AuthSnapshot { map_roles, version })
    }

    #[instrument(skip(self, map_roles))]
    async fn write(&self, map_roles: &str, expected_version: &str) -> ApiResult<()> {
        // resourceVersion in a merge patch makes the API server reject stale writes with 409
        let patch = json!({
            "metadata": { "resourceVersion": expected_version },
            "data": { (aws_auth::MAP_ROLES_KEY): map_roles },
        });
        let pp = PatchParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        };
        self.api
            .patch(aws_auth::NAME, &pp, &Patch::Merge(&patch))
            .await
            .map_err(conflict_aware)?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    map_roles: Option<String>,
    version: u64,
    /// Writes by other parties applied right before our next write lands
    interleaved: Vec<String>,
    writes: usize,
    fail_reads: bool,
}

/// In-memory authentication object with the same compare-and-swap semantics.
///
/// [`MemoryAuthStore::new`] models a cluster without the object.
#[derive(Clone, Default)]
pub struct MemoryAuthStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map_roles(map_roles: impl Into<String>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            state.map_roles = Some(map_roles.into());
            state.version = 1;
        }
        store
    }

    /// Simulate another writer appending `block` between our read and our write
    pub fn interleave_write(&self, block: impl Into<String>) {
        self.lock().interleaved.push(block.into());
    }

    pub fn fail_reads(&self) {
        self.lock().fail_reads = true;
    }

    pub fn map_roles(&self) -> Option<String> {
        self.lock().map_roles.clone()
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SharedAuthStore for MemoryAuthStore {
    async fn read(&self) -> ApiResult<AuthSnapshot> {
        let state = self.lock();
        if state.fail_reads {
            return Err(ApiError::Status {
                status: 403,
                body: "configmaps \"aws-auth\" is forbidden".to_string(),
            });
        }
        let map_roles = state
            .map_roles
            .clone()
            .ok_or_else(|| ApiError::NotFound(object_ref()))?;
        Ok(AuthSnapshot {
            map_roles,
            version: state.version.to_string(),
        })
    }

    async fn write(&self, map_roles: &str, expected_version: &str) -> ApiResult<()> {
        let mut state = self.lock();
        let Some(mut current) = state.map_roles.clone() else {
            return Err(ApiError::NotFound(object_ref()));
        };

        if !state.interleaved.is_empty() {
            for block in state.interleaved.drain(..).collect::<Vec<_>>() {
                current.push_str(&block);
            }
            state.map_roles = Some(current);
            state.version += 1;
        }

        let current_version = state.version.to_string();
        if current_version != expected_version {
            return Err(ApiError::Conflict(format!(
                "object has been modified; expected version {}, found {}",
                expected_version, current_version
            )));
        }

        state.map_roles = Some(map_roles.to_string());
        state.version += 1;
        state.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{configmap_json, MockService};

    #[tokio::test]
    async fn test_memory_store_rejects_stale_version() {
        let store = MemoryAuthStore::with_map_roles("- rolearn: a\n");
        let snapshot = store.read().await.unwrap();

        store.write("- rolearn: b\n", &snapshot.version).await.unwrap();
        let err = store
            .write("- rolearn: c\n", &snapshot.version)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(store.map_roles().as_deref(), Some("- rolearn: b\n"));
    }

    #[tokio::test]
    async fn test_memory_store_interleaved_write_causes_conflict() {
        let store = MemoryAuthStore::with_map_roles("");
        let snapshot = store.read().await.unwrap();
        assert_eq!(snapshot.version, "1");

        store.interleave_write("- rolearn: other\n");
        let err = store
            .write("- rolearn: mine\n", &snapshot.version)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(store.map_roles().as_deref(), Some("- rolearn: other\n"));
    }

    #[tokio::test]
    async fn test_memory_store_without_object_refuses_reads_and_writes() {
        let store = MemoryAuthStore::new();

        let read = store.read().await.unwrap_err();
        let write = store.write("- rolearn: a\n", "1").await.unwrap_err();

        assert!(matches!(read, ApiError::NotFound(_)));
        assert!(matches!(write, ApiError::NotFound(_)));
        assert!(store.map_roles().is_none());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_kube_store_reads_map_roles_and_version() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/kube-system/configmaps/aws-auth",
                200,
                &configmap_json("kube-system", "aws-auth", "42", &[("mapRoles", "- rolearn: a\n")]),
            )
            .into_client();

        let snapshot = KubeAuthStore::new(client).read().await.unwrap();

        assert_eq!(snapshot.map_roles, "- rolearn: a\n");
        assert_eq!(snapshot.version, "42");
    }

    #[tokio::test]
    async fn test_kube_store_missing_object_is_not_found() {
        let mock = MockService::new();
        let client = mock.clone().into_client();

        let err = KubeAuthStore::new(client).read().await.unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(!err.is_retryable());
        assert!(mock.requests().iter().all(|(method, _)| method == "GET"));
    }

    #[tokio::test]
    async fn test_kube_store_maps_409_to_conflict() {
        let status = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": "the object has been modified",
            "reason": "Conflict",
            "code": 409
        })
        .to_string();
        let client = MockService::new()
            .on_patch(
                "/api/v1/namespaces/kube-system/configmaps/aws-auth",
                409,
                &status,
            )
            .into_client();

        let err = KubeAuthStore::new(client)
            .write("- rolearn: a\n", "41")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_kube_store_patch_succeeds_at_current_version() {
        let mock = MockService::new().on_patch(
            "/api/v1/namespaces/kube-system/configmaps/aws-auth",
            200,
            &configmap_json("kube-system", "aws-auth", "43", &[("mapRoles", "- rolearn: a\n")]),
        );
        let client = mock.clone().into_client();

        KubeAuthStore::new(client)
            .write("- rolearn: a\n", "42")
            .await
            .unwrap();

        assert_eq!(
            mock.requests(),
            vec![(
                "PATCH".to_string(),
                "/api/v1/namespaces/kube-system/configmaps/aws-auth".to_string()
            )]
        );
    }
}
