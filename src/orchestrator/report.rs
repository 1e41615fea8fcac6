// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::executor::{Execution, StepReport};
use crate::error::{FailureKind, OnboardError};
use crate::secret::Secret;
use crate::types::{AuthReconciliation, ComponentInstallation, Phase};
use serde::Serialize;

/// Everything one onboarding run produced, including partial results when a
/// step failed. Nothing is rolled back.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingReport {
    pub cluster_name: String,
    pub phase: Phase,
    pub cluster_id: Option<String>,
    pub credentials_id: Option<String>,
    pub bootstrap_token: Option<Secret<String>>,
    pub identity_id: Option<String>,
    pub security_scope_id: Option<String>,
    pub default_configuration_id: Option<String>,
    pub auth: Option<AuthReconciliation>,
    pub installations: Vec<ComponentInstallation>,
    pub steps: Vec<StepReport>,
    #[serde(skip)]
    pub failures: Vec<OnboardError>,
}

impl OnboardingReport {
    pub(crate) fn from_execution(cluster_name: &str, execution: Execution) -> Self {
        let outputs = execution.outputs;
        let registration = outputs.registration;
        Self {
            cluster_name: cluster_name.to_string(),
            phase: registration
                .as_ref()
                .map(|r| r.phase())
                .unwrap_or(Phase::Requested),
            cluster_id: registration.as_ref().map(|r| r.cluster_id.clone()),
            credentials_id: registration.as_ref().and_then(|r| r.credentials_id.clone()),
            bootstrap_token: registration.map(|r| r.bootstrap_token),
            identity_id: outputs.identity.map(|i| i.stable_id),
            security_scope_id: outputs.security_scope_id,
            default_configuration_id: outputs.default_configuration_id,
            auth: outputs.auth,
            installations: outputs.installations,
            steps: execution.steps,
            failures: execution.failures,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure that caused the others: the first one that is not a
    /// skipped dependency
    pub fn failure(&self) -> Option<&OnboardError> {
        self.failures
            .iter()
            .find(|f| f.kind() != FailureKind::DependencyFailed)
            .or_else(|| self.failures.first())
    }

    pub fn installed(&self) -> impl Iterator<Item = &ComponentInstallation> {
        self.installations.iter().filter(|i| i.is_installed())
    }
}
