// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Drives one onboarding from request to report.

pub mod executor;
pub mod phase;
pub mod plan;
pub mod report;

pub use executor::{Execution, Outputs, StepOutput, StepReport, StepStatus};
pub use plan::{Operation, Plan, PlanError, Task};
pub use report::OnboardingReport;

use crate::auth::{AuthModeReconciler, SharedAuthStore};
use crate::cloud::CloudApi;
use crate::constants::helm;
use crate::control_plane::ControlPlane;
use crate::error::{ApiError, ApiResult, OnboardError, Result};
use crate::install::{values_for, ComponentInstaller, Release, ValuesContext};
use crate::provision::{IdentityProvisioner, NetworkSecurityProvisioner};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::types::{
    Component, ComponentInstallation, InstallStatus, OnboardingRequest, Phase, RegistrationRecord,
    StepId,
};
use crate::validate::validate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    /// Backoff applied to every control-plane and cloud call
    pub retry: RetryConfig,
    /// Upper bound for one component install, readiness wait included
    pub install_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            install_timeout: Duration::from_secs(helm::DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub struct Orchestrator {
    control_plane: Arc<dyn ControlPlane>,
    identity: IdentityProvisioner,
    network: NetworkSecurityProvisioner,
    auth: AuthModeReconciler,
    auth_store: Option<Arc<dyn SharedAuthStore>>,
    installer: Arc<dyn ComponentInstaller>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        cloud: Arc<dyn CloudApi>,
        installer: Arc<dyn ComponentInstaller>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            control_plane,
            identity: IdentityProvisioner::new(cloud.clone(), settings.retry.clone()),
            network: NetworkSecurityProvisioner::new(cloud.clone(), settings.retry.clone()),
            auth: AuthModeReconciler::new(cloud, settings.retry.clone()),
            auth_store: None,
            installer,
            settings,
        }
    }

    /// Also merge the node principal into the cluster's legacy shared auth object
    pub fn with_auth_store(mut self, store: Arc<dyn SharedAuthStore>) -> Self {
        self.auth_store = Some(store);
        self
    }

    /// Onboard the cluster described by `request`.
    ///
    /// Only an invalid request is returned as `Err`, and it is detected before
    /// any side effect. Failures of individual steps end up in the report,
    /// next to everything that did complete.
    #[instrument(skip(self, request), fields(cluster = %request.cluster_name))]
    pub async fn onboard(&self, request: &OnboardingRequest) -> Result<OnboardingReport> {
        validate(request)?;
        let plan = Plan::for_request(request)
            .map_err(|e| OnboardError::InvalidConfiguration(e.to_string()))?;
        info!(
            steps = plan.tasks().len(),
            full_management = request.full_management,
            "Starting onboarding"
        );

        let execution =
            executor::execute(&plan, move |operation, outputs| self.run(request, operation, outputs))
                .await;
        let report = OnboardingReport::from_execution(&request.cluster_name, execution);

        match report.failure() {
            None => info!(phase = %report.phase, "Onboarding completed"),
            Some(failure) => warn!(phase = %report.phase, error = %failure, "Onboarding finished with failures"),
        }
        Ok(report)
    }

    async fn run(
        &self,
        request: &OnboardingRequest,
        operation: Operation,
        outputs: Outputs,
    ) -> (StepId, Result<StepOutput>) {
        let step = operation.step_id();
        let result = self.run_operation(request, operation, &outputs).await;
        (step, result)
    }

    async fn run_operation(
        &self,
        request: &OnboardingRequest,
        operation: Operation,
        outputs: &Outputs,
    ) -> Result<StepOutput> {
        let step = operation.step_id();
        let cluster_name = request.cluster_name.as_str();
        let control_plane = &*self.control_plane;

        match operation {
            Operation::RegisterCluster(payload) => {
                let payload = &payload;
                let cluster = self
                    .control_plane_call(step, cluster_name, "register_cluster", move || {
                        control_plane.register_cluster(payload)
                    })
                    .await?;
                let cluster_id = cluster.id.as_str();
                let token = self
                    .control_plane_call(step, cluster_id, "create_cluster_token", move || {
                        control_plane.create_cluster_token(cluster_id)
                    })
                    .await?;
                info!(cluster_id = %cluster.id, "Cluster registered");
                Ok(StepOutput::Registered(RegistrationRecord::registered(
                    cluster.id.clone(),
                    token,
                    cluster.credentials_id.clone(),
                )))
            }
            Operation::LookupDelegate => {
                let cluster_id = registered_id(outputs, step)?;
                let arn = self
                    .control_plane_call(step, cluster_id, "delegate_principal", move || {
                        control_plane.delegate_principal(cluster_id)
                    })
                    .await?;
                Ok(StepOutput::Delegate(arn))
            }
            Operation::ProvisionIdentity => {
                let cluster_id = registered_id(outputs, step)?;
                let identity = self
                    .identity
                    .provision(request, cluster_id, outputs.delegate.as_deref())
                    .await?;
                Ok(StepOutput::Identity(identity))
            }
            Operation::ProvisionNetwork => {
                let cluster_id = registered_id(outputs, step)?;
                let scope = self.network.provision(request, cluster_id).await?;
                Ok(StepOutput::SecurityScope(scope))
            }
            Operation::ReconcileAuth => {
                let identity = produced(outputs.identity.as_ref(), step, StepId::ProvisionIdentity)?;
                let auth = self
                    .auth
                    .reconcile(cluster_name, identity, self.auth_store.as_deref())
                    .await?;
                Ok(StepOutput::Auth(auth))
            }
            Operation::ElevateCluster {
                delete_nodes_on_disconnect,
            } => {
                let record =
                    phase::require_phase(outputs, step, cluster_name, Phase::Registered)?;
                let identity = produced(outputs.identity.as_ref(), step, StepId::ProvisionIdentity)?;
                let elevation = phase::elevation_request(identity, delete_nodes_on_disconnect);
                let (cluster_id, elevation) = (record.cluster_id.as_str(), &elevation);
                let cluster = self
                    .control_plane_call(step, cluster_id, "elevate_cluster", move || {
                        control_plane.elevate_cluster(cluster_id, elevation)
                    })
                    .await?;
                info!(cluster_id = %cluster.id, "Cluster elevated to full management");
                Ok(StepOutput::Elevated(cluster.id))
            }
            Operation::UpdateClusterNetwork { security_groups } => {
                let record =
                    phase::require_phase(outputs, step, cluster_name, Phase::Managed)?;
                let identity = produced(outputs.identity.as_ref(), step, StepId::ProvisionIdentity)?;
                let scope = produced(outputs.security_scope_id.as_ref(), step, StepId::ProvisionNetwork)?;
                let cluster_id = record.cluster_id.as_str();
                let update = phase::network_update(identity, scope, &security_groups)
                    .map_err(|e| OnboardError::registration(step, cluster_id, e))?;
                let update = &update;
                self.control_plane_call(step, cluster_id, "update_cluster_network", move || {
                    control_plane.update_cluster_network(cluster_id, update)
                })
                .await?;
                Ok(StepOutput::NetworkUpdated)
            }
            Operation::CreateNodeConfiguration { name } => {
                let record =
                    phase::require_phase(outputs, step, cluster_name, Phase::Managed)?;
                let identity = produced(outputs.identity.as_ref(), step, StepId::ProvisionIdentity)?;
                let scope = produced(outputs.security_scope_id.as_ref(), step, StepId::ProvisionNetwork)?;
                let configuration = phase::node_configuration(&name, request, identity, scope)
                    .map_err(|e| OnboardError::registration(step, &name, e))?;
                let (cluster_id, configuration) = (record.cluster_id.as_str(), &configuration);
                let id = self
                    .control_plane_call(step, &name, "upsert_node_configuration", move || {
                        control_plane.upsert_node_configuration(cluster_id, configuration)
                    })
                    .await?;
                Ok(StepOutput::NodeConfiguration(id))
            }
            Operation::SetDefaultNodeConfiguration => {
                let record =
                    phase::require_phase(outputs, step, cluster_name, Phase::Managed)?;
                let id = produced(
                    outputs.node_configuration_id.as_ref(),
                    step,
                    StepId::CreateNodeConfiguration,
                )?;
                let (cluster_id, configuration_id) = (record.cluster_id.as_str(), id.as_str());
                self.control_plane_call(step, id, "set_default_node_configuration", move || {
                    control_plane.set_default_node_configuration(cluster_id, configuration_id)
                })
                .await?;
                Ok(StepOutput::DefaultConfiguration(id.clone()))
            }
            Operation::Install(component) => self.install(request, component, outputs).await,
        }
    }

    /// Install one component. A failed or timed out install is reported as
    /// the component's status; it never changes the registration phase.
    async fn install(
        &self,
        request: &OnboardingRequest,
        component: Component,
        outputs: &Outputs,
    ) -> Result<StepOutput> {
        let step = StepId::Install(component);
        let record =
            phase::require_phase(outputs, step, &request.cluster_name, component.required_phase())?;
        let values = values_for(
            component,
            &ValuesContext {
                provider: request.provider(),
                api_url: &request.api_url,
                api_token: &request.api_token,
                cluster_id: &record.cluster_id,
                bootstrap_token: &record.bootstrap_token,
            },
        );
        let release = Release::new(component, values);

        let timeout = self.settings.install_timeout;
        let status = match tokio::time::timeout(timeout, self.installer.install(&release)).await {
            Ok(Ok(())) => {
                info!(release = %release.name, "Component installed");
                InstallStatus::Installed
            }
            Ok(Err(e)) => {
                warn!(release = %release.name, error = %e, "Component install failed");
                InstallStatus::Failed {
                    message: e.to_string(),
                }
            }
            Err(_) => {
                warn!(release = %release.name, timeout_secs = timeout.as_secs(), "Component install timed out");
                InstallStatus::TimedOut {
                    after_secs: timeout.as_secs(),
                }
            }
        };
        Ok(StepOutput::Installed(ComponentInstallation::new(
            component, status,
        )))
    }

    async fn control_plane_call<T, F, Fut>(
        &self,
        step: StepId,
        target: &str,
        operation: &str,
        call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        retry_with_backoff(&self.settings.retry, operation, ApiError::is_retryable, call)
            .await
            .map_err(|e| OnboardError::registration(step, target, e))
    }
}

fn registered_id(outputs: &Outputs, step: StepId) -> Result<&str> {
    outputs
        .registration
        .as_ref()
        .map(|r| r.cluster_id.as_str())
        .ok_or_else(|| OnboardError::DependencyFailed {
            step: step.to_string(),
            dependency: StepId::RegisterCluster.to_string(),
        })
}

/// A value an earlier step should have produced
fn produced<T>(value: Option<&T>, step: StepId, producer: StepId) -> Result<&T> {
    value.ok_or_else(|| OnboardError::DependencyFailed {
        step: step.to_string(),
        dependency: producer.to_string(),
    })
}
