// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Binds the node principal inside the cluster so provisioned nodes can join.

pub mod map_roles;
pub mod store;

pub use store::{AuthSnapshot, KubeAuthStore, MemoryAuthStore, SharedAuthStore};

use crate::cloud::CloudApi;
use crate::error::{ApiError, OnboardError, Result};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::types::auth::EC2_LINUX_ACCESS_ENTRY;
use crate::types::{AuthEntry, AuthReconciliation, CloudIdentity, MergeOutcome, StepId};
use map_roles::Merge;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

const STEP: StepId = StepId::ReconcileAuth;

pub struct AuthModeReconciler {
    cloud: Arc<dyn CloudApi>,
    retry: RetryConfig,
    /// One lock per cluster name; writers inside this process queue up here
    /// before racing other processes through the compare-and-swap.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AuthModeReconciler {
    pub fn new(cloud: Arc<dyn CloudApi>, retry: RetryConfig) -> Self {
        Self {
            cloud,
            retry,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn cluster_lock(&self, cluster_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(cluster_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Forget the lock of `cluster_name` once no other merge holds or awaits it
    fn release_cluster_lock(&self, cluster_name: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(cluster_name)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(cluster_name);
        }
    }

    /// Ensure the node principal of `identity` can join `cluster_name`.
    ///
    /// Creates the access entry, then merges the principal into the legacy
    /// shared object when `store` is given. Returns `None` for identities
    /// without a node principal (GKE), which need no in-cluster binding.
    #[instrument(skip(self, identity, store), fields(cluster = %cluster_name))]
    pub async fn reconcile(
        &self,
        cluster_name: &str,
        identity: &CloudIdentity,
        store: Option<&dyn SharedAuthStore>,
    ) -> Result<Option<AuthReconciliation>> {
        let Some(principal) = identity.node_principal() else {
            debug!("Identity has no node principal, nothing to bind");
            return Ok(None);
        };
        let entry = AuthEntry::for_node_role(principal);

        let access_entry_created = retry_with_backoff(
            &self.retry,
            "ensure_access_entry",
            ApiError::is_retryable,
            move || {
                self.cloud
                    .ensure_access_entry(cluster_name, principal, EC2_LINUX_ACCESS_ENTRY)
            },
        )
        .await
        .map_err(|e| OnboardError::reconciliation(STEP, cluster_name, e))?;

        if access_entry_created {
            info!(principal = %principal, "Created access entry");
        }

        let legacy_merge = match store {
            Some(store) => self.merge_legacy(cluster_name, &entry, store).await?,
            None => MergeOutcome::Skipped,
        };

        Ok(Some(AuthReconciliation {
            entry,
            access_entry_created,
            legacy_merge,
        }))
    }

    async fn merge_legacy(
        &self,
        cluster_name: &str,
        entry: &AuthEntry,
        store: &dyn SharedAuthStore,
    ) -> Result<MergeOutcome> {
        let lock = self.cluster_lock(cluster_name);
        let outcome = {
            let _guard = lock.lock().await;
            retry_with_backoff(
                &self.retry,
                "merge_map_roles",
                |e: &MergeError| e.is_retryable(),
                move || async move {
                    let snapshot = store.read().await.map_err(MergeError::Read)?;
                    match map_roles::merge(&snapshot.map_roles, entry)
                        .map_err(|e| MergeError::Parse(e.to_string()))?
                    {
                        Merge::Unchanged => Ok(MergeOutcome::AlreadyPresent),
                        Merge::Updated(blob) => {
                            store
                                .write(&blob, &snapshot.version)
                                .await
                                .map_err(MergeError::Write)?;
                            Ok(MergeOutcome::Appended)
                        }
                    }
                },
            )
            .await
        };
        self.release_cluster_lock(cluster_name, lock);
        let outcome = outcome.map_err(|e| OnboardError::reconciliation(STEP, cluster_name, e))?;

        match outcome {
            MergeOutcome::Appended => info!(principal = %entry.rolearn, "Appended node role to mapRoles"),
            _ => debug!(principal = %entry.rolearn, "Node role already mapped"),
        }
        Ok(outcome)
    }
}

#[derive(Debug, thiserror::Error)]
enum MergeError {
    #[error("failed to read shared auth object: {0}")]
    Read(ApiError),
    #[error("{0}")]
    Parse(String),
    #[error("failed to write shared auth object: {0}")]
    Write(ApiError),
}

impl MergeError {
    fn is_retryable(&self) -> bool {
        match self {
            MergeError::Read(e) | MergeError::Write(e) => e.is_retryable(),
            MergeError::Parse(_) => false,
        }
    }
}
