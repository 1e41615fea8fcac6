// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::AGENT_NAMESPACE;
use crate::types::registration::Phase;
use crate::types::request::ComponentToggles;
use serde::Serialize;
use std::fmt;

/// Cluster-side components of the management plane
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    Agent,
    ClusterController,
    SpotHandler,
    Evictor,
    PodPinner,
    WorkloadAutoscaler,
    Egressd,
    SecurityAgent,
}

impl Component {
    /// Components installed once the cluster is managed
    pub const MANAGED: [Component; 4] = [
        Component::ClusterController,
        Component::SpotHandler,
        Component::Evictor,
        Component::PodPinner,
    ];

    pub fn chart(&self) -> &'static str {
        match self {
            Component::Agent => "castai-agent",
            Component::ClusterController => "castai-cluster-controller",
            Component::SpotHandler => "castai-spot-handler",
            Component::Evictor => "castai-evictor",
            Component::PodPinner => "castai-pod-pinner",
            Component::WorkloadAutoscaler => "castai-workload-autoscaler",
            Component::Egressd => "egressd",
            Component::SecurityAgent => "castai-kvisor",
        }
    }

    pub fn release_name(&self) -> &'static str {
        match self {
            Component::ClusterController => "cluster-controller",
            other => other.chart(),
        }
    }

    pub fn namespace(&self) -> &'static str {
        AGENT_NAMESPACE
    }

    /// Only the monitoring agent is waited on; the rest are fire-and-forget
    pub fn await_ready(&self) -> bool {
        matches!(self, Component::Agent)
    }

    /// The agent owns the namespace the other releases share
    pub fn creates_namespace(&self) -> bool {
        matches!(self, Component::Agent)
    }

    /// Registration phase the cluster must reach before this component is installed
    pub fn required_phase(&self) -> Phase {
        match self {
            Component::Agent => Phase::Registered,
            _ => Phase::Managed,
        }
    }

    /// Optional components enabled by the request toggles
    pub fn optional(toggles: &ComponentToggles) -> Vec<Component> {
        let mut components = Vec::new();
        if toggles.workload_autoscaler {
            components.push(Component::WorkloadAutoscaler);
        }
        if toggles.egressd {
            components.push(Component::Egressd);
        }
        if toggles.security_agent {
            components.push(Component::SecurityAgent);
        }
        components
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.release_name())
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum InstallStatus {
    Installed,
    Failed { message: String },
    TimedOut { after_secs: u64 },
}

/// Outcome of installing one component
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInstallation {
    pub component: Component,
    pub release: String,
    pub namespace: String,
    pub required_phase: Phase,
    pub status: InstallStatus,
}

impl ComponentInstallation {
    pub fn new(component: Component, status: InstallStatus) -> Self {
        Self {
            component,
            release: component.release_name().to_string(),
            namespace: component.namespace().to_string(),
            required_phase: component.required_phase(),
            status,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.status == InstallStatus::Installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_is_phase_one_and_awaited() {
        assert_eq!(Component::Agent.required_phase(), Phase::Registered);
        assert!(Component::Agent.await_ready());
        assert!(Component::Agent.creates_namespace());
        assert_eq!(Component::Agent.namespace(), "castai-agent");
    }

    #[test]
    fn test_managed_components_wait_for_phase_two() {
        for component in Component::MANAGED {
            assert_eq!(component.required_phase(), Phase::Managed);
            assert!(!component.await_ready());
        }
    }

    #[test]
    fn test_controller_release_differs_from_chart() {
        assert_eq!(Component::ClusterController.chart(), "castai-cluster-controller");
        assert_eq!(Component::ClusterController.release_name(), "cluster-controller");
    }

    #[test]
    fn test_optional_components_follow_toggles() {
        assert!(Component::optional(&ComponentToggles::default()).is_empty());

        let toggles = ComponentToggles {
            workload_autoscaler: true,
            egressd: false,
            security_agent: true,
        };
        assert_eq!(
            Component::optional(&toggles),
            vec![Component::WorkloadAutoscaler, Component::SecurityAgent]
        );
    }
}
