// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Control plane endpoint used when the request does not name one
pub const DEFAULT_API_URL: &str = "https://api.cast.ai";

/// Header carrying the control-plane API token
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Namespace shared by all cluster-side components
pub const AGENT_NAMESPACE: &str = "castai-agent";

/// The operator name used as field manager for writes to the cluster
pub const OPERATOR_NAME: &str = "castai-onboard";

/// Name of the default node configuration created on full management
pub const DEFAULT_NODE_CONFIGURATION: &str = "default";

/// Legacy shared authentication object on EKS
pub mod aws_auth {
    pub const NAMESPACE: &str = "kube-system";
    pub const NAME: &str = "aws-auth";
    pub const MAP_ROLES_KEY: &str = "mapRoles";
}

/// Helm installation defaults
pub mod helm {
    pub const DEFAULT_REPOSITORY: &str = "https://castai.github.io/helm-charts";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
}

/// Name prefixes for provisioned cloud resources
pub mod prefixes {
    pub const EKS: &str = "cast-eks";
    pub const EKS_POLICY: &str = "castai-eks";
    pub const GKE_SERVICE_ACCOUNT: &str = "castai-gke";
    pub const GKE_CUSTOM_ROLE: &str = "castai_gke";
}

/// Tags applied to provisioned cloud resources
pub mod tags {
    pub const CLUSTER_ID: &str = "cast:cluster-id";
    pub const MANAGED_BY: &str = "cast:managed-by";
}
