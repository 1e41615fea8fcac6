// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Creates the principal the control plane acts as inside the customer's cloud.
//!
//! On AWS this is a role trusted by exactly one external principal, the
//! control plane's delegated user, plus the node role and instance profile
//! that provisioned nodes run with. On GCP it is a service account with two
//! custom roles and a key handed to the control plane.

use super::{cloud_call, ownership_tags};
use crate::cloud::{CloudApi, CustomRoleSpec, RoleSpec};
use crate::constants::prefixes;
use crate::error::{OnboardError, Result};
use crate::naming::{
    bounded_name, GCP_CUSTOM_ROLE, GCP_SERVICE_ACCOUNT, IAM_INSTANCE_PROFILE, IAM_POLICY, IAM_ROLE,
};
use crate::policy::{
    assume_role_trust, ec2_service_trust, eks_control_plane_policy,
    CONTROL_PLANE_MANAGED_POLICIES, GCP_SERVICE_ACCOUNT_USER_ROLE, GKE_CLUSTER_PERMISSIONS,
    GKE_COMPUTE_PERMISSIONS, NODE_MANAGED_POLICIES,
};
use crate::retry::RetryConfig;
use crate::types::{CloudIdentity, CloudLocation, IdentityDetail, OnboardingRequest, StepId, TrustStatement};
use std::sync::Arc;
use tracing::{info, instrument};

const STEP: StepId = StepId::ProvisionIdentity;

/// Action the control plane performs with the service account key
pub const GCP_KEY_ACTION: &str = "iam.serviceAccountKeys.use";

pub struct IdentityProvisioner {
    cloud: Arc<dyn CloudApi>,
    retry: RetryConfig,
}

impl IdentityProvisioner {
    pub fn new(cloud: Arc<dyn CloudApi>, retry: RetryConfig) -> Self {
        Self { cloud, retry }
    }

    /// Create or fetch the control-plane identity for the cluster.
    ///
    /// `delegate` is the control plane's principal that the AWS role trusts; it
    /// is required for EKS and unused for GKE.
    #[instrument(skip(self, request, delegate), fields(cluster = %request.cluster_name))]
    pub async fn provision(
        &self,
        request: &OnboardingRequest,
        cluster_id: &str,
        delegate: Option<&str>,
    ) -> Result<CloudIdentity> {
        match &request.cloud {
            CloudLocation::Eks { .. } => {
                let delegate = delegate.ok_or_else(|| {
                    OnboardError::provisioning(
                        STEP,
                        &request.cluster_name,
                        "no delegated principal to trust",
                    )
                })?;
                self.provision_aws(&request.cluster_name, cluster_id, delegate)
                    .await
            }
            CloudLocation::Gke { project_id, .. } => {
                self.provision_gcp(&request.cluster_name, project_id, cluster_id)
                    .await
            }
        }
    }

    async fn provision_aws(
        &self,
        cluster_name: &str,
        cluster_id: &str,
        delegate: &str,
    ) -> Result<CloudIdentity> {
        let cloud = &*self.cloud;
        let retry = &self.retry;

        let role = RoleSpec {
            name: bounded_name(&IAM_ROLE, prefixes::EKS, cluster_name, Some("role"), cluster_id),
            description: format!("Role to manage EKS cluster {} by CAST AI", cluster_name),
            trust_policy: assume_role_trust(delegate),
            tags: ownership_tags(cluster_id),
        };
        let role_ref = &role;
        let role_arn = cloud_call(retry, STEP, &role.name, "put_role", move || {
            cloud.put_role(role_ref)
        })
        .await?;
        info!(role = %role_arn, "Control-plane role ready");

        let mut identity = CloudIdentity::new(
            role_arn,
            TrustStatement {
                principal: delegate.to_string(),
                action: "sts:AssumeRole".to_string(),
            },
            IdentityDetail::Aws {
                role_name: role.name.clone(),
                node_role_arn: String::new(),
                instance_profile_arn: String::new(),
            },
        );

        let policy_name = bounded_name(
            &IAM_POLICY,
            prefixes::EKS_POLICY,
            cluster_name,
            Some("policy"),
            cluster_id,
        );
        let document = eks_control_plane_policy(cluster_name);
        let (name_ref, doc_ref) = (policy_name.as_str(), &document);
        let policy_arn = cloud_call(retry, STEP, &policy_name, "put_policy", move || {
            cloud.put_policy(name_ref, doc_ref)
        })
        .await?;

        let managed = CONTROL_PLANE_MANAGED_POLICIES.iter().map(|p| p.to_string());
        for policy in std::iter::once(policy_arn).chain(managed) {
            self.attach(&role.name, &policy).await?;
            identity.attach(policy);
        }

        let node_role = RoleSpec {
            name: bounded_name(
                &IAM_ROLE,
                prefixes::EKS,
                cluster_name,
                Some("node-role"),
                cluster_id,
            ),
            description: format!("Role for nodes of EKS cluster {} provisioned by CAST AI", cluster_name),
            trust_policy: ec2_service_trust(),
            tags: ownership_tags(cluster_id),
        };
        let node_ref = &node_role;
        let node_role_arn = cloud_call(retry, STEP, &node_role.name, "put_role", move || {
            cloud.put_role(node_ref)
        })
        .await?;
        for policy in NODE_MANAGED_POLICIES {
            self.attach(&node_role.name, policy).await?;
        }

        let profile_name = bounded_name(
            &IAM_INSTANCE_PROFILE,
            prefixes::EKS,
            cluster_name,
            Some("profile"),
            cluster_id,
        );
        let (profile_ref, node_name) = (profile_name.as_str(), node_role.name.as_str());
        let instance_profile_arn =
            cloud_call(retry, STEP, &profile_name, "put_instance_profile", move || {
                cloud.put_instance_profile(profile_ref, node_name)
            })
            .await?;
        info!(node_role = %node_role_arn, profile = %instance_profile_arn, "Node identity ready");

        identity.detail = IdentityDetail::Aws {
            role_name: role.name,
            node_role_arn,
            instance_profile_arn,
        };
        Ok(identity)
    }

    async fn attach(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let cloud = &*self.cloud;
        cloud_call(&self.retry, STEP, role_name, "attach_role_policy", move || {
            cloud.attach_role_policy(role_name, policy_arn)
        })
        .await
    }

    async fn provision_gcp(
        &self,
        cluster_name: &str,
        project_id: &str,
        cluster_id: &str,
    ) -> Result<CloudIdentity> {
        let cloud = &*self.cloud;
        let retry = &self.retry;

        let account_id = bounded_name(
            &GCP_SERVICE_ACCOUNT,
            prefixes::GKE_SERVICE_ACCOUNT,
            cluster_name,
            None,
            cluster_id,
        );
        let display_name = format!("Service account to manage {} GKE cluster via CAST", cluster_name);
        let (account_ref, display_ref) = (account_id.as_str(), display_name.as_str());
        let email = cloud_call(retry, STEP, &account_id, "put_service_account", move || {
            cloud.put_service_account(project_id, account_ref, display_ref)
        })
        .await?;
        let member = format!("serviceAccount:{}", email);

        // GCP has no trust policy: whoever holds the key acts as the account, so
        // the statement names the account the key authenticates as
        let mut identity = CloudIdentity::new(
            email.clone(),
            TrustStatement {
                principal: member.clone(),
                action: GCP_KEY_ACTION.to_string(),
            },
            IdentityDetail::Gcp {
                credentials_json: Default::default(),
            },
        );

        let custom_roles = [
            ("cluster", "CAST AI GKE cluster access", GKE_CLUSTER_PERMISSIONS),
            ("compute", "CAST AI GKE compute access", GKE_COMPUTE_PERMISSIONS),
        ];
        for (kind, title, permissions) in custom_roles {
            let spec = CustomRoleSpec {
                role_id: bounded_name(
                    &GCP_CUSTOM_ROLE,
                    prefixes::GKE_CUSTOM_ROLE,
                    cluster_name,
                    Some(kind),
                    cluster_id,
                ),
                title: format!("{} ({})", title, cluster_name),
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            };
            let spec_ref = &spec;
            let role = cloud_call(retry, STEP, &spec.role_id, "put_custom_role", move || {
                cloud.put_custom_role(project_id, spec_ref)
            })
            .await?;
            self.bind(project_id, &role, &member).await?;
            identity.attach(role);
        }

        self.bind(project_id, GCP_SERVICE_ACCOUNT_USER_ROLE, &member)
            .await?;
        identity.attach(GCP_SERVICE_ACCOUNT_USER_ROLE);

        // a single attempt: a retry after a lost response would revoke the key just issued
        let credentials_json = cloud
            .rotate_service_account_key(&email)
            .await
            .map_err(|e| OnboardError::provisioning(STEP, &email, e))?;
        info!(service_account = %email, "Service account and key ready");

        identity.detail = IdentityDetail::Gcp { credentials_json };
        Ok(identity)
    }

    async fn bind(&self, project_id: &str, role: &str, member: &str) -> Result<()> {
        let cloud = &*self.cloud;
        cloud_call(&self.retry, STEP, role, "add_project_binding", move || {
            cloud.add_project_binding(project_id, role, member)
        })
        .await
    }
}
