// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use super::{cloud_call, ownership_tags};
use crate::cloud::{CloudApi, SecurityGroupSpec};
use crate::constants::prefixes;
use crate::error::{OnboardError, Result};
use crate::naming::{bounded_name, SECURITY_GROUP};
use crate::retry::RetryConfig;
use crate::types::{CloudLocation, OnboardingRequest, StepId};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const STEP: StepId = StepId::ProvisionNetwork;

/// Creates the security scope provisioned nodes are placed in
pub struct NetworkSecurityProvisioner {
    cloud: Arc<dyn CloudApi>,
    retry: RetryConfig,
}

impl NetworkSecurityProvisioner {
    pub fn new(cloud: Arc<dyn CloudApi>, retry: RetryConfig) -> Self {
        Self { cloud, retry }
    }

    /// Returns the security scope id: a security group id on EKS, the first
    /// network tag on GKE. GKE scopes by firewall tag, so no cloud call is made.
    #[instrument(skip(self, request), fields(cluster = %request.cluster_name))]
    pub async fn provision(&self, request: &OnboardingRequest, cluster_id: &str) -> Result<String> {
        match &request.cloud {
            CloudLocation::Eks { region, vpc_id, .. } => {
                self.provision_security_group(
                    &request.cluster_name,
                    region,
                    vpc_id.as_deref(),
                    cluster_id,
                )
                .await
            }
            CloudLocation::Gke { .. } => {
                let tag = request.network.network_tags.first().ok_or_else(|| {
                    OnboardError::provisioning(STEP, &request.cluster_name, "no network tags to scope by")
                })?;
                debug!(tag = %tag, "Using network tag as security scope");
                Ok(tag.clone())
            }
        }
    }

    async fn provision_security_group(
        &self,
        cluster_name: &str,
        region: &str,
        vpc_id: Option<&str>,
        cluster_id: &str,
    ) -> Result<String> {
        let cloud = &*self.cloud;
        let retry = &self.retry;

        let vpc_id = match vpc_id {
            Some(vpc_id) => vpc_id.to_string(),
            None => {
                cloud_call(retry, STEP, cluster_name, "cluster_vpc", move || {
                    cloud.cluster_vpc(cluster_name, region)
                })
                .await?
            }
        };

        let mut tags = ownership_tags(cluster_id);
        tags.insert(format!("kubernetes.io/cluster/{}", cluster_name), "owned".to_string());
        let spec = SecurityGroupSpec {
            name: bounded_name(&SECURITY_GROUP, prefixes::EKS, cluster_name, Some("sg"), cluster_id),
            vpc_id,
            description: format!("CAST AI created security group for cluster {}", cluster_name),
            tags,
        };

        let spec_ref = &spec;
        let group_id = cloud_call(retry, STEP, &spec.name, "put_security_group", move || {
            cloud.put_security_group(spec_ref)
        })
        .await?;

        let group_ref = group_id.as_str();
        let created = cloud_call(retry, STEP, &group_id, "authorize_self_ingress", move || {
            cloud.authorize_self_ingress(group_ref)
        })
        .await?;
        if created {
            info!(group = %group_id, vpc = %spec.vpc_id, "Security group ready");
        } else {
            debug!(group = %group_id, "Security group already allowed self ingress");
        }

        Ok(group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::MemoryCloud;
    use crate::constants::tags;
    use crate::error::FailureKind;
    use crate::secret::Secret;
    use crate::types::{ComponentToggles, NetworkScope};
    use std::collections::BTreeMap;

    const CLUSTER_ID: &str = "1234abcd-5678-90ef-aaaa-bbbbccccdddd";

    fn make_request(cloud: CloudLocation, network: NetworkScope) -> OnboardingRequest {
        OnboardingRequest {
            cluster_name: "demo".to_string(),
            cloud,
            api_url: "https://api.cast.ai".to_string(),
            api_token: Secret::new("token".to_string()),
            full_management: true,
            network,
            delete_nodes_on_disconnect: false,
            components: ComponentToggles::default(),
            tags: BTreeMap::new(),
        }
    }

    fn eks(vpc_id: Option<&str>) -> CloudLocation {
        CloudLocation::Eks {
            account_id: "111122223333".to_string(),
            region: "eu-west-1".to_string(),
            vpc_id: vpc_id.map(String::from),
        }
    }

    fn make_provisioner(cloud: &MemoryCloud) -> NetworkSecurityProvisioner {
        NetworkSecurityProvisioner::new(Arc::new(cloud.clone()), RetryConfig::once())
    }

    #[tokio::test]
    async fn test_security_group_in_discovered_vpc() {
        let cloud = MemoryCloud::new().with_vpc("vpc-123");

        let id = make_provisioner(&cloud)
            .provision(&make_request(eks(None), NetworkScope::default()), CLUSTER_ID)
            .await
            .unwrap();

        let (stored_id, spec) =
            cloud.inspect(|s| s.security_groups["cast-eks-demo-sg-1234abcd"].clone());
        assert_eq!(stored_id, id);
        assert_eq!(spec.vpc_id, "vpc-123");
        assert_eq!(spec.tags[tags::CLUSTER_ID], CLUSTER_ID);
        assert_eq!(cloud.inspect(|s| s.self_ingress_rules[&id]), 1);
    }

    #[tokio::test]
    async fn test_explicit_vpc_skips_discovery() {
        let cloud = MemoryCloud::new();

        make_provisioner(&cloud)
            .provision(&make_request(eks(Some("vpc-given")), NetworkScope::default()), CLUSTER_ID)
            .await
            .unwrap();

        assert_eq!(cloud.call_count("cluster_vpc"), 0);
    }

    #[tokio::test]
    async fn test_rerun_keeps_one_group_and_one_rule() {
        let cloud = MemoryCloud::new();
        let provisioner = make_provisioner(&cloud);
        let request = make_request(eks(None), NetworkScope::default());

        let first = provisioner.provision(&request, CLUSTER_ID).await.unwrap();
        let second = provisioner.provision(&request, CLUSTER_ID).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cloud.inspect(|s| s.security_groups.len()), 1);
        assert_eq!(cloud.inspect(|s| s.self_ingress_rules[&first]), 1);
    }

    #[tokio::test]
    async fn test_gke_uses_first_network_tag_without_cloud_calls() {
        let cloud = MemoryCloud::new();
        let network = NetworkScope {
            subnets: vec!["subnet-a".to_string()],
            security_groups: vec![],
            network_tags: vec!["castai-nodes".to_string(), "web".to_string()],
        };
        let request = make_request(
            CloudLocation::Gke {
                project_id: "p".to_string(),
                location: "us-central1".to_string(),
            },
            network,
        );

        let scope = make_provisioner(&cloud)
            .provision(&request, CLUSTER_ID)
            .await
            .unwrap();

        assert_eq!(scope, "castai-nodes");
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_security_group_failure_names_the_group() {
        let cloud = MemoryCloud::new().fail_on("put_security_group", "VpcLimitExceeded");

        let err = make_provisioner(&cloud)
            .provision(&make_request(eks(None), NetworkScope::default()), CLUSTER_ID)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Provisioning);
        assert!(err.to_string().contains("cast-eks-demo-sg-1234abcd"));
        assert!(err.to_string().contains("VpcLimitExceeded"));
    }
}
