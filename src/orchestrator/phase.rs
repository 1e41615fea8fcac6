// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Registration phases: the gate every phase-bound step passes, and the
//! payloads sent to the control plane when moving between phases.

use super::executor::Outputs;
use crate::control_plane::{
    ClusterNetworkUpdate, EksCredentials, EksLocation, EksNetwork, EksNodeConfiguration,
    ElevateClusterRequest, GkeLocation, GkeNodeConfiguration, NodeConfiguration,
    RegisterClusterRequest,
};
use crate::error::{OnboardError, Result};
use crate::types::{
    CloudIdentity, CloudLocation, IdentityDetail, OnboardingRequest, Phase, PhaseError,
    RegistrationRecord, StepId,
};

pub const GKE_DISK_TYPE: &str = "pd-standard";
pub const GKE_MAX_PODS_PER_NODE: u32 = 110;

/// The registration record, provided the cluster already reached `required`
pub fn require_phase<'a>(
    outputs: &'a Outputs,
    step: StepId,
    cluster_name: &str,
    required: Phase,
) -> Result<&'a RegistrationRecord> {
    let record = outputs.registration.as_ref().ok_or_else(|| {
        OnboardError::registration(
            step,
            cluster_name,
            PhaseError::InvalidTransition {
                from: Phase::Requested,
                to: required,
            },
        )
    })?;
    if record.phase() < required {
        return Err(OnboardError::registration(
            step,
            &record.cluster_id,
            format!("cluster is {}, step requires {}", record.phase(), required),
        ));
    }
    Ok(record)
}

/// Phase-1 payload: provider, location and name only
pub fn registration_request(request: &OnboardingRequest) -> RegisterClusterRequest {
    let cluster_name = request.cluster_name.clone();
    match &request.cloud {
        CloudLocation::Eks {
            account_id, region, ..
        } => RegisterClusterRequest {
            name: cluster_name.clone(),
            eks: Some(EksLocation {
                account_id: account_id.clone(),
                region: region.clone(),
                cluster_name,
            }),
            gke: None,
        },
        CloudLocation::Gke {
            project_id,
            location,
        } => RegisterClusterRequest {
            name: cluster_name.clone(),
            eks: None,
            gke: Some(GkeLocation {
                project_id: project_id.clone(),
                location: location.clone(),
                cluster_name,
            }),
        },
    }
}

/// Phase-2 payload handing the provisioned identity to the control plane
pub fn elevation_request(
    identity: &CloudIdentity,
    delete_nodes_on_disconnect: bool,
) -> ElevateClusterRequest {
    match &identity.detail {
        IdentityDetail::Aws { .. } => ElevateClusterRequest {
            credentials: None,
            eks: Some(EksCredentials {
                assume_role_arn: identity.stable_id.clone(),
            }),
            delete_nodes_on_disconnect,
        },
        IdentityDetail::Gcp { credentials_json } => ElevateClusterRequest {
            credentials: Some(credentials_json.clone()),
            eks: None,
            delete_nodes_on_disconnect,
        },
    }
}

/// The created security group first, then the user's, without duplicates
fn node_security_groups(scope_id: &str, user_groups: &[String]) -> Vec<String> {
    let mut groups = vec![scope_id.to_string()];
    for group in user_groups {
        if !groups.contains(group) {
            groups.push(group.clone());
        }
    }
    groups
}

fn instance_profile(identity: &CloudIdentity) -> std::result::Result<String, &'static str> {
    identity
        .instance_profile_arn()
        .map(str::to_string)
        .ok_or("identity has no instance profile")
}

pub fn network_update(
    identity: &CloudIdentity,
    scope_id: &str,
    user_groups: &[String],
) -> std::result::Result<ClusterNetworkUpdate, &'static str> {
    Ok(ClusterNetworkUpdate {
        eks: EksNetwork {
            instance_profile_arn: instance_profile(identity)?,
            security_groups: node_security_groups(scope_id, user_groups),
        },
    })
}

/// Template for the nodes the control plane provisions once the cluster is managed
pub fn node_configuration(
    name: &str,
    request: &OnboardingRequest,
    identity: &CloudIdentity,
    scope_id: &str,
) -> std::result::Result<NodeConfiguration, &'static str> {
    let mut configuration = NodeConfiguration {
        name: name.to_string(),
        subnets: request.network.subnets.clone(),
        tags: request.tags.clone(),
        eks: None,
        gke: None,
    };
    match request.cloud {
        CloudLocation::Eks { .. } => {
            configuration.eks = Some(EksNodeConfiguration {
                security_groups: node_security_groups(scope_id, &request.network.security_groups),
                instance_profile_arn: instance_profile(identity)?,
            });
        }
        CloudLocation::Gke { .. } => {
            configuration.gke = Some(GkeNodeConfiguration {
                disk_type: GKE_DISK_TYPE.to_string(),
                network_tags: request.network.network_tags.clone(),
                max_pods_per_node: GKE_MAX_PODS_PER_NODE,
            });
        }
    }
    Ok(configuration)
}
