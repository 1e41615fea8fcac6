// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use castai_onboard::auth::{KubeAuthStore, MemoryAuthStore};
use castai_onboard::cloud::MemoryCloud;
use castai_onboard::config::Config;
use castai_onboard::control_plane::{HttpControlPlane, MemoryControlPlane};
use castai_onboard::install::{HelmInstaller, MemoryInstaller};
use castai_onboard::kubernetes::client_from_kubeconfig_file;
use castai_onboard::orchestrator::{Orchestrator, OrchestratorSettings};
use castai_onboard::retry::RetryConfig;
use castai_onboard::types::OnboardingRequest;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting cluster onboarding");

    let config = Config::from_env()?;
    let request = config.load_request().await?;
    info!(
        "Request loaded: cluster={}, provider={}, full_management={}, dry_run={}",
        request.cluster_name,
        request.provider(),
        request.full_management,
        config.dry_run
    );

    let settings = OrchestratorSettings {
        retry: RetryConfig::with_max_attempts(config.retry_max_attempts),
        install_timeout: config.install_timeout,
    };

    let orchestrator = if config.dry_run {
        dry_run_orchestrator(settings)
    } else {
        live_orchestrator(&config, &request, settings).await?
    };

    let report = orchestrator.onboard(&request).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(failure) = report.failure() {
        bail!("Onboarding stopped in phase {}: {}", report.phase, failure);
    }
    info!("Cluster {} is {}", request.cluster_name, report.phase);
    Ok(())
}

/// Every collaborator in memory, with an empty aws-auth object; nothing leaves the process
fn dry_run_orchestrator(settings: OrchestratorSettings) -> Orchestrator {
    warn!("Dry run: no cloud, control plane or cluster changes are made");
    Orchestrator::new(
        Arc::new(MemoryControlPlane::new()),
        Arc::new(MemoryCloud::new()),
        Arc::new(MemoryInstaller::new()),
        settings,
    )
    .with_auth_store(Arc::new(MemoryAuthStore::with_map_roles("")))
}

async fn live_orchestrator(
    config: &Config,
    request: &OnboardingRequest,
    settings: OrchestratorSettings,
) -> Result<Orchestrator> {
    if request.full_management {
        bail!(
            "Full management needs a cloud provider integration, which this build does not link; \
             rerun with DRY_RUN=true to rehearse it"
        );
    }

    let control_plane = HttpControlPlane::new(&request.api_url, request.api_token.clone())
        .context("Failed to create control plane client")?;

    let client = match &config.kubeconfig_path {
        Some(path) => client_from_kubeconfig_file(path).await?,
        None => Client::try_default()
            .await
            .context("No KUBECONFIG_PATH given and no in-cluster configuration found")?,
    };
    info!("Connected to Kubernetes cluster");

    let installer = HelmInstaller::new(
        client.clone(),
        config.helm_repository.clone(),
        config.kubeconfig_path.clone(),
    );

    // observe-only plans make no cloud calls
    Ok(Orchestrator::new(
        Arc::new(control_plane),
        Arc::new(MemoryCloud::new()),
        Arc::new(installer),
        settings,
    )
    .with_auth_store(Arc::new(KubeAuthStore::new(client))))
}
