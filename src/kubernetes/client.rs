// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster client creation from kubeconfig files

use crate::error::{ApiError, ApiResult};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::Path;
use tracing::{info, instrument};

/// Create a client for the cluster named by the current context of the kubeconfig at `path`
#[instrument(fields(path = %path.display()))]
pub async fn client_from_kubeconfig_file(path: &Path) -> ApiResult<Client> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        ApiError::Kubeconfig(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let client = create_client_from_kubeconfig(&raw).await?;
    info!("Connected to cluster");
    Ok(client)
}

/// Create a Kubernetes client from a kubeconfig string
pub async fn create_client_from_kubeconfig(kubeconfig: &str) -> ApiResult<Client> {
    let kubeconfig_parsed: Kubeconfig = serde_yaml::from_str(kubeconfig)
        .map_err(|e| ApiError::Kubeconfig(format!("Failed to parse kubeconfig: {}", e)))?;

    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig_parsed, &KubeConfigOptions::default())
            .await
            .map_err(|e| ApiError::Kubeconfig(format!("Failed to create config: {}", e)))?;

    Client::try_from(client_config)
        .map_err(|e| ApiError::Kubeconfig(format!("Failed to create client: {}", e)))
}
