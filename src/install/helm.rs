// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Installs releases with the `helm` CLI.

use super::{ComponentInstaller, Release};
use crate::error::{ApiError, ApiResult};
use crate::kubernetes::ensure_namespace_exists;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::wait::await_condition;
use kube::{Api, Client};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

pub struct HelmInstaller {
    client: Client,
    repository: String,
    kubeconfig: Option<PathBuf>,
    helm_bin: String,
}

impl HelmInstaller {
    pub fn new(client: Client, repository: impl Into<String>, kubeconfig: Option<PathBuf>) -> Self {
        Self {
            client,
            repository: repository.into(),
            kubeconfig,
            helm_bin: "helm".to_string(),
        }
    }

    /// Use a different helm executable
    pub fn with_helm_bin(mut self, helm_bin: impl Into<String>) -> Self {
        self.helm_bin = helm_bin.into();
        self
    }

    fn args(&self, release: &Release) -> Vec<String> {
        let mut args: Vec<String> = [
            "upgrade",
            "--install",
            release.name,
            release.chart,
            "--repo",
            self.repository.as_str(),
            "--namespace",
            release.namespace,
            "--cleanup-on-fail",
            // values are read from stdin so API keys never show up in the process list
            "--values",
            "-",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        args
    }

    async fn run_helm(&self, release: &Release) -> ApiResult<()> {
        let args = self.args(release);
        debug!("Running {} {}", self.helm_bin, args.join(" "));

        let mut child = Command::new(&self.helm_bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ApiError::Command(format!("failed to start {}: {}", self.helm_bin, e)))?;

        let values = serde_json::to_vec(release.values.expose())
            .map_err(|e| ApiError::Command(format!("failed to encode values: {}", e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&values).await {
                Ok(()) => {}
                // the process exited without reading; its exit status tells the story
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(ApiError::Command(format!("failed to pass values: {}", e))),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ApiError::Command(format!("helm did not finish: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ApiError::Command(format!(
                "helm upgrade --install {} failed: {}",
                release.name,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn wait_until_available(&self, release: &Release) -> ApiResult<()> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), release.namespace);
        info!("Waiting for deployment {} to become available", release.name);
        await_condition(deployments, release.name, is_deployment_available)
            .await
            .map_err(|e| ApiError::Command(format!("waiting for {}: {}", release.name, e)))?;
        Ok(())
    }
}

/// At least one replica is available
pub fn is_deployment_available(deployment: Option<&Deployment>) -> bool {
    deployment
        .and_then(|d| d.status.as_ref())
        .and_then(|s| s.available_replicas)
        .unwrap_or(0)
        > 0
}

#[async_trait]
impl ComponentInstaller for HelmInstaller {
    #[instrument(skip(self, release), fields(release = %release.name, namespace = %release.namespace))]
    async fn install(&self, release: &Release) -> ApiResult<()> {
        if release.create_namespace {
            ensure_namespace_exists(&self.client, release.namespace).await?;
        }

        self.run_helm(release).await?;
        info!("Release {} applied", release.name);

        if release.await_ready {
            self.wait_until_available(release).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{deployment_json, namespace_json, MockService};
    use crate::types::Component;
    use serde_json::json;

    fn make_installer(helm_bin: &str) -> HelmInstaller {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/castai-agent",
                200,
                &namespace_json("castai-agent"),
            )
            .into_client();
        HelmInstaller::new(
            client,
            "https://castai.github.io/helm-charts",
            Some(PathBuf::from("/tmp/kubeconfig")),
        )
        .with_helm_bin(helm_bin)
    }

    #[tokio::test]
    async fn test_args_install_from_repository_with_stdin_values() {
        let installer = make_installer("helm");
        let release = Release::new(Component::ClusterController, json!({}));

        assert_eq!(
            installer.args(&release),
            vec![
                "upgrade",
                "--install",
                "cluster-controller",
                "castai-cluster-controller",
                "--repo",
                "https://castai.github.io/helm-charts",
                "--namespace",
                "castai-agent",
                "--cleanup-on-fail",
                "--values",
                "-",
                "--kubeconfig",
                "/tmp/kubeconfig",
            ]
        );
    }

    #[tokio::test]
    async fn test_values_are_not_on_the_command_line() {
        let installer = make_installer("helm");
        let release = Release::new(Component::PodPinner, json!({"castai": {"apiKey": "secret"}}));

        assert!(installer.args(&release).iter().all(|a| !a.contains("secret")));
    }

    #[test]
    fn test_deployment_availability() {
        let ready: Deployment =
            serde_json::from_str(&deployment_json("castai-agent", "castai-agent", 1, 1)).unwrap();
        let pending: Deployment =
            serde_json::from_str(&deployment_json("castai-agent", "castai-agent", 1, 0)).unwrap();

        assert!(is_deployment_available(Some(&ready)));
        assert!(!is_deployment_available(Some(&pending)));
        assert!(!is_deployment_available(None));
    }

    #[tokio::test]
    async fn test_failing_helm_is_command_error() {
        let installer = make_installer("false");
        let release = Release::new(Component::Evictor, json!({"replicaCount": 0}));

        let err = installer.install(&release).await.unwrap_err();
        assert!(matches!(err, ApiError::Command(ref m) if m.contains("castai-evictor")));
    }

    #[tokio::test]
    async fn test_missing_helm_binary_is_command_error() {
        let installer = make_installer("/nonexistent/helm");
        let release = Release::new(Component::Evictor, json!({}));

        let err = installer.install(&release).await.unwrap_err();
        assert!(matches!(err, ApiError::Command(ref m) if m.contains("failed to start")));
    }

    #[tokio::test]
    async fn test_successful_helm_run_without_wait() {
        let installer = make_installer("true");
        let release = Release::new(Component::SpotHandler, json!({}));

        installer.install(&release).await.unwrap();
    }
}
