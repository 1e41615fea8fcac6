// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::component::Component;
use serde::{Serialize, Serializer};
use std::fmt;

/// Identifies one step of the onboarding workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepId {
    RegisterCluster,
    LookupDelegate,
    ProvisionIdentity,
    ProvisionNetwork,
    ReconcileAuth,
    ElevateCluster,
    UpdateClusterNetwork,
    CreateNodeConfiguration,
    SetDefaultNodeConfiguration,
    Install(Component),
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepId::RegisterCluster => f.write_str("register-cluster"),
            StepId::LookupDelegate => f.write_str("lookup-delegate"),
            StepId::ProvisionIdentity => f.write_str("provision-identity"),
            StepId::ProvisionNetwork => f.write_str("provision-network"),
            StepId::ReconcileAuth => f.write_str("reconcile-auth"),
            StepId::ElevateCluster => f.write_str("elevate-cluster"),
            StepId::UpdateClusterNetwork => f.write_str("update-cluster-network"),
            StepId::CreateNodeConfiguration => f.write_str("create-node-configuration"),
            StepId::SetDefaultNodeConfiguration => f.write_str("set-default-node-configuration"),
            StepId::Install(component) => write!(f, "install-{}", component_key(component)),
        }
    }
}

fn component_key(component: &Component) -> &'static str {
    match component {
        Component::Agent => "agent",
        Component::ClusterController => "cluster-controller",
        Component::SpotHandler => "spot-handler",
        Component::Evictor => "evictor",
        Component::PodPinner => "pod-pinner",
        Component::WorkloadAutoscaler => "workload-autoscaler",
        Component::Egressd => "egressd",
        Component::SecurityAgent => "security-agent",
    }
}

impl Serialize for StepId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
