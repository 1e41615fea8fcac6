// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Permission documents attached to the control-plane identities.

use serde_json::{json, Value};

pub const AWS_POLICY_VERSION: &str = "2012-10-17";

/// Managed policies attached to the control-plane role for discovery
pub const CONTROL_PLANE_MANAGED_POLICIES: &[&str] = &[
    "arn:aws:iam::aws:policy/AmazonEC2ReadOnlyAccess",
    "arn:aws:iam::aws:policy/IAMReadOnlyAccess",
];

/// Managed policies attached to the role assumed by provisioned nodes
pub const NODE_MANAGED_POLICIES: &[&str] = &[
    "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy",
    "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy",
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
    "arn:aws:iam::aws:policy/AmazonSSMManagedInstanceCore",
    "arn:aws:iam::aws:policy/service-role/AmazonEBSCSIDriverPolicy",
];

/// Trust policy allowing exactly one AWS principal to assume the role
pub fn assume_role_trust(principal_arn: &str) -> Value {
    json!({
        "Version": AWS_POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": principal_arn },
            "Action": "sts:AssumeRole",
        }],
    })
}

/// Trust policy for instances launched with the node instance profile
pub fn ec2_service_trust() -> Value {
    json!({
        "Version": AWS_POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "ec2.amazonaws.com" },
            "Action": "sts:AssumeRole",
        }],
    })
}

/// Least-privilege policy for the control-plane role.
///
/// Mutating instance and autoscaling-group actions are limited to resources
/// tagged `kubernetes.io/cluster/<cluster>=owned`.
pub fn eks_control_plane_policy(cluster_name: &str) -> Value {
    let owned_tag = format!("kubernetes.io/cluster/{}", cluster_name);
    let ec2_owned = format!("ec2:ResourceTag/{}", owned_tag);
    let asg_owned = format!("autoscaling:ResourceTag/{}", owned_tag);

    json!({
        "Version": AWS_POLICY_VERSION,
        "Statement": [
            {
                "Sid": "RunInstancesTagging",
                "Effect": "Allow",
                "Action": "ec2:CreateTags",
                "Resource": "*",
                "Condition": { "StringEquals": { "ec2:CreateAction": ["RunInstances"] } },
            },
            {
                "Sid": "RunInstances",
                "Effect": "Allow",
                "Action": "ec2:RunInstances",
                "Resource": [
                    "arn:aws:ec2:*::image/*",
                    "arn:aws:ec2:*::snapshot/*",
                    "arn:aws:ec2:*:*:instance/*",
                    "arn:aws:ec2:*:*:key-pair/*",
                    "arn:aws:ec2:*:*:launch-template/*",
                    "arn:aws:ec2:*:*:network-interface/*",
                    "arn:aws:ec2:*:*:security-group/*",
                    "arn:aws:ec2:*:*:subnet/*",
                    "arn:aws:ec2:*:*:volume/*",
                ],
            },
            {
                "Sid": "RunInstancesInstanceProfile",
                "Effect": "Allow",
                "Action": "iam:PassRole",
                "Resource": "*",
                "Condition": { "StringEquals": { "iam:PassedToService": "ec2.amazonaws.com" } },
            },
            {
                "Sid": "InstanceActions",
                "Effect": "Allow",
                "Action": [
                    "ec2:TerminateInstances",
                    "ec2:StartInstances",
                    "ec2:StopInstances",
                    "ec2:ModifyInstanceAttribute",
                ],
                "Resource": "*",
                "Condition": {
                    "StringEquals": { ec2_owned: "owned" }
                },
            },
            {
                "Sid": "AutoscalingGroups",
                "Effect": "Allow",
                "Action": [
                    "autoscaling:UpdateAutoScalingGroup",
                    "autoscaling:SuspendProcesses",
                    "autoscaling:ResumeProcesses",
                    "autoscaling:TerminateInstanceInAutoScalingGroup",
                ],
                "Resource": "*",
                "Condition": {
                    "StringEquals": { asg_owned: "owned" }
                },
            },
            {
                "Sid": "EKS",
                "Effect": "Allow",
                "Action": ["eks:Describe*", "eks:List*"],
                "Resource": "*",
            },
            {
                "Sid": "EC2Read",
                "Effect": "Allow",
                "Action": [
                    "ec2:DescribeInstances",
                    "ec2:DescribeImages",
                    "ec2:DescribeVolumes",
                    "ec2:DescribeSecurityGroups",
                    "ec2:DescribeSubnets",
                    "ec2:DescribeInstanceTypes",
                    "ec2:DescribeInstanceTypeOfferings",
                    "ec2:DescribeLaunchTemplateVersions",
                    "ec2:DescribeAvailabilityZones",
                    "ec2:DescribeSpotPriceHistory",
                    "ec2:DescribeRegions",
                ],
                "Resource": "*",
            },
            {
                "Sid": "AutoscalingRead",
                "Effect": "Allow",
                "Action": [
                    "autoscaling:DescribeAutoScalingGroups",
                    "autoscaling:DescribeLaunchConfigurations",
                    "autoscaling:DescribeScalingActivities",
                ],
                "Resource": "*",
            },
            {
                "Sid": "IAMRead",
                "Effect": "Allow",
                "Action": ["iam:GetInstanceProfile", "iam:GetRole", "iam:SimulatePrincipalPolicy"],
                "Resource": "*",
            },
        ],
    })
}

pub const GKE_CLUSTER_PERMISSIONS: &[&str] = &[
    "container.clusters.get",
    "container.clusters.update",
    "container.operations.get",
    "serviceusage.services.list",
    "resourcemanager.projects.getIamPolicy",
];

/// Compute permissions; nodes are managed through instance group managers and templates
pub const GKE_COMPUTE_PERMISSIONS: &[&str] = &[
    "compute.instances.create",
    "compute.instances.delete",
    "compute.instances.get",
    "compute.instances.list",
    "compute.instances.setLabels",
    "compute.instances.setMetadata",
    "compute.instances.setServiceAccount",
    "compute.instances.setTags",
    "compute.instances.start",
    "compute.instances.stop",
    "compute.instanceGroupManagers.get",
    "compute.instanceGroupManagers.update",
    "compute.instanceGroups.get",
    "compute.instanceTemplates.create",
    "compute.instanceTemplates.delete",
    "compute.instanceTemplates.get",
    "compute.instanceTemplates.list",
    "compute.disks.create",
    "compute.disks.get",
    "compute.disks.list",
    "compute.disks.setLabels",
    "compute.disks.use",
    "compute.addresses.use",
    "compute.subnetworks.get",
    "compute.subnetworks.use",
    "compute.subnetworks.useExternalIp",
    "compute.networks.get",
    "compute.networks.use",
    "compute.zones.get",
    "compute.zones.list",
    "compute.regions.get",
    "compute.regions.list",
    "compute.zoneOperations.get",
    "compute.regionOperations.get",
    "compute.machineTypes.get",
    "compute.machineTypes.list",
    "compute.images.get",
    "compute.images.list",
    "compute.images.useReadOnly",
];

pub const GCP_SERVICE_ACCOUNT_USER_ROLE: &str = "roles/iam.serviceAccountUser";
