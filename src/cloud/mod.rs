// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cloud provider seam.
//!
//! Every create is put-style: calling it again with the same name returns the
//! existing resource instead of failing. Provider errors are passed through as
//! [`crate::error::ApiError::Provider`] with the provider's own message.

pub mod memory;

pub use memory::MemoryCloud;

use crate::error::ApiResult;
use crate::secret::Secret;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct RoleSpec {
    pub name: String,
    pub description: String,
    pub trust_policy: Value,
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub vpc_id: String,
    pub description: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomRoleSpec {
    pub role_id: String,
    pub title: String,
    pub permissions: Vec<String>,
}

/// Cloud API calls the onboarding workflow needs on AWS and GCP
#[async_trait]
pub trait CloudApi: Send + Sync {
    // AWS IAM

    /// Create or fetch a role; returns its ARN
    async fn put_role(&self, spec: &RoleSpec) -> ApiResult<String>;
    /// Create or fetch a customer-managed policy; returns its ARN
    async fn put_policy(&self, name: &str, document: &Value) -> ApiResult<String>;
    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> ApiResult<()>;
    /// Create or fetch an instance profile holding `role_name`; returns its ARN
    async fn put_instance_profile(&self, name: &str, role_name: &str) -> ApiResult<String>;

    // AWS networking and EKS

    /// VPC the EKS cluster runs in
    async fn cluster_vpc(&self, cluster_name: &str, region: &str) -> ApiResult<String>;
    /// Create or fetch a security group; returns its id
    async fn put_security_group(&self, spec: &SecurityGroupSpec) -> ApiResult<String>;
    /// Allow all traffic between members of the group. Returns `false` if the rule existed.
    async fn authorize_self_ingress(&self, group_id: &str) -> ApiResult<bool>;
    /// Returns `false` if an entry for the principal already existed
    async fn ensure_access_entry(
        &self,
        cluster_name: &str,
        principal_arn: &str,
        kind: &str,
    ) -> ApiResult<bool>;

    // GCP IAM

    /// Create or fetch a service account; returns its email
    async fn put_service_account(
        &self,
        project_id: &str,
        account_id: &str,
        display_name: &str,
    ) -> ApiResult<String>;
    /// Create or update a project-level custom role; returns its full name
    async fn put_custom_role(&self, project_id: &str, spec: &CustomRoleSpec) -> ApiResult<String>;
    async fn add_project_binding(&self, project_id: &str, role: &str, member: &str)
        -> ApiResult<()>;
    /// Revoke the user-managed keys of the service account, then issue a new one.
    /// Returns the private key JSON. Every call invalidates the key returned by
    /// the previous one, so callers must not retry it blindly.
    async fn rotate_service_account_key(&self, email: &str) -> ApiResult<Secret<String>>;
}
