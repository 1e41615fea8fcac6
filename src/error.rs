// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::fmt::Display;
use thiserror::Error;

/// Errors raised by the collaborators (cloud, control plane, cluster, helm).
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(String),

    #[error("Cloud provider error: {0}")]
    Provider(String),
}

impl ApiError {
    /// Transient failures worth another attempt: transport errors, throttling,
    /// server-side errors and lost optimistic writes
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_timeout() || e.is_connect(),
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Kube(kube::Error::Api(resp)) => resp.code == 429 || resp.code >= 500,
            ApiError::Kube(kube::Error::HyperError(_) | kube::Error::Service(_)) => true,
            ApiError::Kube(_) => false,
            ApiError::Conflict(_) => true,
            ApiError::NotFound(_)
            | ApiError::InvalidResponse(_)
            | ApiError::Command(_)
            | ApiError::Kubeconfig(_)
            | ApiError::Provider(_) => false,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure taxonomy of an onboarding run.
///
/// Every variant past `InvalidConfiguration` names the step that failed and the
/// target it acted on, so an operator can retry just that step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OnboardError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Provisioning failed at step '{step}' for {target}: {message}")]
    ProvisioningFailure {
        step: String,
        target: String,
        message: String,
    },

    #[error("Reconciliation failed at step '{step}' for {target}: {message}")]
    ReconciliationFailure {
        step: String,
        target: String,
        message: String,
    },

    #[error("Registration failed at step '{step}' for {target}: {message}")]
    RegistrationFailure {
        step: String,
        target: String,
        message: String,
    },

    #[error("Installation failed at step '{step}' for {target}: {message}")]
    InstallationFailure {
        step: String,
        target: String,
        message: String,
    },

    #[error("Step '{step}' did not run: dependency '{dependency}' did not complete")]
    DependencyFailed { step: String, dependency: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidConfiguration,
    Provisioning,
    Reconciliation,
    Registration,
    Installation,
    DependencyFailed,
}

impl OnboardError {
    pub fn provisioning(step: impl Display, target: impl Display, err: impl Display) -> Self {
        Self::ProvisioningFailure {
            step: step.to_string(),
            target: target.to_string(),
            message: err.to_string(),
        }
    }

    pub fn reconciliation(step: impl Display, target: impl Display, err: impl Display) -> Self {
        Self::ReconciliationFailure {
            step: step.to_string(),
            target: target.to_string(),
            message: err.to_string(),
        }
    }

    pub fn registration(step: impl Display, target: impl Display, err: impl Display) -> Self {
        Self::RegistrationFailure {
            step: step.to_string(),
            target: target.to_string(),
            message: err.to_string(),
        }
    }

    pub fn installation(step: impl Display, target: impl Display, err: impl Display) -> Self {
        Self::InstallationFailure {
            step: step.to_string(),
            target: target.to_string(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidConfiguration(_) => FailureKind::InvalidConfiguration,
            Self::ProvisioningFailure { .. } => FailureKind::Provisioning,
            Self::ReconciliationFailure { .. } => FailureKind::Reconciliation,
            Self::RegistrationFailure { .. } => FailureKind::Registration,
            Self::InstallationFailure { .. } => FailureKind::Installation,
            Self::DependencyFailed { .. } => FailureKind::DependencyFailed,
        }
    }

    /// The step this failure is recorded against, if it happened inside the workflow
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::InvalidConfiguration(_) => None,
            Self::ProvisioningFailure { step, .. }
            | Self::ReconciliationFailure { step, .. }
            | Self::RegistrationFailure { step, .. }
            | Self::InstallationFailure { step, .. }
            | Self::DependencyFailed { step, .. } => Some(step),
        }
    }
}

pub type Result<T> = std::result::Result<T, OnboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_step_and_target() {
        let err = OnboardError::provisioning(
            "provision-identity",
            "cast-eks-demo-role-1234abcd",
            ApiError::Provider("AccessDenied".to_string()),
        );

        assert_eq!(err.kind(), FailureKind::Provisioning);
        assert_eq!(err.step(), Some("provision-identity"));
        assert_eq!(
            err.to_string(),
            "Provisioning failed at step 'provision-identity' for cast-eks-demo-role-1234abcd: \
             Cloud provider error: AccessDenied"
        );
    }

    #[test]
    fn test_only_kube_transport_and_server_errors_are_retried() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!ApiError::Kube(kube::Error::SerdeError(decode)).is_retryable());

        let unavailable = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "etcdserver: leader changed".to_string(),
            reason: "ServiceUnavailable".to_string(),
            code: 503,
        });
        assert!(ApiError::Kube(unavailable).is_retryable());

        let forbidden = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "configmaps is forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        });
        assert!(!ApiError::Kube(forbidden).is_retryable());

        let transport = kube::Error::Service("connection reset".into());
        assert!(ApiError::Kube(transport).is_retryable());
    }

    #[test]
    fn test_invalid_configuration_has_no_step() {
        let err = OnboardError::InvalidConfiguration("network.subnets is required".to_string());
        assert_eq!(err.step(), None);
        assert_eq!(err.kind(), FailureKind::InvalidConfiguration);
    }
}
